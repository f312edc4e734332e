//! # Notificaciones
//! src/jobs/notify.rs
//!
//! Contrato con el colaborador externo que entrega los mensajes de estado
//! al cliente, y el envoltorio best-effort que usa el núcleo.
//!
//! Una notificación fallida nunca falla ni bloquea al job: se intenta editar
//! el mensaje previo, si no se puede se manda uno nuevo, y si tampoco se
//! puede se registra un warning y se sigue.

use crate::error::NotificationDeliveryError;
use crate::jobs::types::{ChatContext, JobId, StatusHandle, Variant};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Botón/opción interactiva adjunta a un mensaje
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractiveOption {
    pub label: String,

    /// Dato que vuelve en el callback (ver `jobs::interaction`)
    pub data: String,
}

impl InteractiveOption {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Archivo producido por una transformación exitosa
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Mensaje a entregar al cliente
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notification {
    pub text: String,
    pub options: Vec<InteractiveOption>,
    pub artifact: Option<Artifact>,
}

impl Notification {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: Vec<InteractiveOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

/// Colaborador externo que entrega mensajes
///
/// Con `handle = Some(..)` debe actualizar ese mensaje; con `None` envía uno
/// nuevo. Retorna la referencia al mensaje resultante.
pub trait NotificationSink: Send + Sync {
    fn notify(
        &self,
        handle: Option<&StatusHandle>,
        context: &ChatContext,
        notification: &Notification,
    ) -> Result<StatusHandle, NotificationDeliveryError>;
}

/// Entrega best-effort sobre un `NotificationSink`
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Entrega la notificación; nunca falla
    ///
    /// Retorna el handle del mensaje entregado, o el previo si no se pudo
    /// entregar nada.
    pub fn deliver(
        &self,
        handle: Option<&StatusHandle>,
        context: &ChatContext,
        notification: &Notification,
    ) -> Option<StatusHandle> {
        if let Some(previous) = handle {
            match self.try_notify(Some(previous), context, notification) {
                Ok(updated) => return Some(updated),
                Err(e) => {
                    tracing::warn!(
                        chat = %context,
                        handle = previous.as_str(),
                        error = %e,
                        "no se pudo actualizar el mensaje, enviando uno nuevo"
                    );
                }
            }
        }

        match self.try_notify(None, context, notification) {
            Ok(sent) => Some(sent),
            Err(e) => {
                tracing::warn!(chat = %context, error = %e, "notificación descartada");
                handle.cloned()
            }
        }
    }

    fn try_notify(
        &self,
        handle: Option<&StatusHandle>,
        context: &ChatContext,
        notification: &Notification,
    ) -> Result<StatusHandle, NotificationDeliveryError> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.sink.notify(handle, context, notification)
        }))
        .unwrap_or_else(|_| {
            Err(NotificationDeliveryError::Unavailable(
                "notification sink panicked".to_string(),
            ))
        })
    }
}

/// Textos de cara al usuario
pub mod texts {
    use super::*;

    pub const START: &str = "Hi! Send an image to remove its background. Use /help for help.";
    pub const HELP: &str =
        "Send photos or images as documents and the background will be removed automatically.";
    pub const PROCESSING: &str = "Processing your image...";
    pub const SUCCESS: &str = "Background removed successfully!";
    pub const CANCELLED: &str = "Processing cancelled";
    pub const NOT_FOUND: &str = "This image was already processed or cancelled";
    pub const TOO_LATE: &str = "Too late to change: processing already started";
    pub const CANNOT_CANCEL: &str = "Cannot cancel: processing already in progress";
    pub const CHOOSE_VARIANT: &str = "Choose the processing model:";
    pub const NO_IMAGE: &str = "Please send a valid image (photo or document)";
    pub const INTERACTION_ERROR: &str = "An error occurred while processing your request";

    pub fn queued(jobs_ahead: usize, wait_secs: u64) -> String {
        format!(
            "Your image is at position {} in the queue\nEstimated wait: {} seconds",
            jobs_ahead, wait_secs
        )
    }

    pub fn failed(reason: &str) -> String {
        format!("Processing failed: {}. Please try again.", reason)
    }

    pub fn variant_set(variant: Variant) -> String {
        format!("Model set to: {} ({})", variant, variant.model_name())
    }

    /// Opciones adjuntas al mensaje de posición en la cola
    pub fn queued_options(id: &JobId) -> Vec<InteractiveOption> {
        vec![
            InteractiveOption::new("Change model", format!("variant_{}", id)),
            InteractiveOption::new("Cancel", format!("cancel_{}", id)),
        ]
    }

    /// Una opción por variante disponible
    pub fn variant_options(id: &JobId) -> Vec<InteractiveOption> {
        Variant::ALL
            .iter()
            .map(|variant| {
                InteractiveOption::new(
                    variant.as_str(),
                    format!("setvariant_{}_{}", id, variant),
                )
            })
            .collect()
    }
}
