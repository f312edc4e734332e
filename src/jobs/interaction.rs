//! # Callbacks Interactivos
//! src/jobs/interaction.rs
//!
//! Las opciones adjuntas a los mensajes de estado vuelven como strings de
//! callback:
//!
//! - `variant_<id>` - muestra una opción por variante
//! - `setvariant_<id>_<variant>` - cambia la variante
//! - `cancel_<id>` - cancela el job
//!
//! Los ids pueden contener `_`, por eso la variante se separa por la derecha.

use crate::error::{InteractionError, SchedulerError};
use crate::jobs::dispatcher::Dispatcher;
use crate::jobs::notify::{texts, Notification};
use crate::jobs::types::{JobId, JobState, Variant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    ChooseVariant(JobId),
    SetVariant(JobId, Variant),
    Cancel(JobId),
}

impl Interaction {
    pub fn parse(data: &str) -> Result<Self, InteractionError> {
        let (action, rest) = data
            .split_once('_')
            .ok_or_else(|| InteractionError::Malformed(data.to_string()))?;
        if rest.is_empty() {
            return Err(InteractionError::Malformed(data.to_string()));
        }

        match action {
            "variant" => Ok(Interaction::ChooseVariant(JobId::new(rest))),
            "cancel" => Ok(Interaction::Cancel(JobId::new(rest))),
            "setvariant" => {
                let (id, name) = rest
                    .rsplit_once('_')
                    .filter(|(id, _)| !id.is_empty())
                    .ok_or_else(|| InteractionError::Malformed(data.to_string()))?;
                let variant = Variant::from_name(name)
                    .ok_or_else(|| InteractionError::UnknownVariant(name.to_string()))?;
                Ok(Interaction::SetVariant(JobId::new(id), variant))
            }
            other => Err(InteractionError::UnknownAction(other.to_string())),
        }
    }
}

/// Resuelve un callback y retorna la respuesta para el cliente
pub fn respond(dispatcher: &Dispatcher, data: &str) -> Notification {
    let interaction = match Interaction::parse(data) {
        Ok(interaction) => interaction,
        Err(e) => {
            tracing::warn!(data, error = %e, "callback inválido");
            return Notification::text(texts::INTERACTION_ERROR);
        }
    };

    match interaction {
        Interaction::ChooseVariant(id) => match dispatcher.snapshot(&id) {
            Ok(snapshot) if snapshot.state == JobState::Queued => {
                Notification::text(texts::CHOOSE_VARIANT).with_options(texts::variant_options(&id))
            }
            Ok(_) => Notification::text(texts::TOO_LATE),
            Err(_) => Notification::text(texts::NOT_FOUND),
        },
        Interaction::SetVariant(id, variant) => match dispatcher.set_variant(&id, variant) {
            Ok(()) => Notification::text(texts::variant_set(variant)),
            Err(e) => Notification::text(rejection_text(&e, texts::TOO_LATE)),
        },
        Interaction::Cancel(id) => match dispatcher.cancel(&id) {
            Ok(()) => Notification::text(texts::CANCELLED),
            Err(e) => Notification::text(rejection_text(&e, texts::CANNOT_CANCEL)),
        },
    }
}

/// Traduce un rechazo del dispatcher a un aviso para el usuario
pub fn rejection_text(error: &SchedulerError, invalid_state: &'static str) -> &'static str {
    match error {
        SchedulerError::NotFound(_) => texts::NOT_FOUND,
        SchedulerError::InvalidState { .. } => invalid_state,
        _ => texts::INTERACTION_ERROR,
    }
}
