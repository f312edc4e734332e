//! # Ejecución de un Job
//! src/jobs/worker.rs
//!
//! Cada job admitido corre en su propio thread. El worker publica el
//! estado al empezar, invoca la transformación, entrega el artefacto o el
//! error, y al salir devuelve el slot al dispatcher con un evento
//! `ExecutionFinished`.
//!
//! ## Garantías
//!
//! - Un error o un panic de la transformación termina el job en `Failed`,
//!   nunca tumba el loop de admisión.
//! - El slot se libera exactamente una vez en cualquier camino de salida:
//!   lo hace el `Drop` de `SlotGuard`.

use crate::error::TransformationError;
use crate::jobs::notify::{texts, Artifact, Notification, Notifier};
use crate::jobs::state::{ExecutionFinished, ExecutionTicket};
use crate::jobs::types::{JobId, Outcome};
use crate::transform::Transformer;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Devuelve el slot al salir del scope, pase lo que pase
struct SlotGuard {
    id: JobId,
    outcome: Option<Outcome>,
    events: Sender<ExecutionFinished>,
}

impl SlotGuard {
    fn new(id: JobId, events: Sender<ExecutionFinished>) -> Self {
        Self {
            id,
            outcome: None,
            events,
        }
    }

    fn complete(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| Outcome::Failed("worker exited unexpectedly".to_string()));

        let event = ExecutionFinished {
            id: self.id.clone(),
            outcome,
        };
        if self.events.send(event).is_err() {
            tracing::warn!(job_id = %self.id, "loop de admisión detenido, slot no devuelto");
        }
    }
}

/// Nombre del archivo entregado al cliente
pub fn artifact_filename(id: &JobId) -> String {
    format!("no_background_{}.png", id.short())
}

/// Forma de lanzar una ejecución; el dispatcher usa `spawn`
pub type Spawn =
    fn(ExecutionTicket, Arc<dyn Transformer>, Notifier, Sender<ExecutionFinished>) -> std::io::Result<()>;

/// Lanza la ejecución en un thread nuevo
pub fn spawn(
    ticket: ExecutionTicket,
    transformer: Arc<dyn Transformer>,
    notifier: Notifier,
    events: Sender<ExecutionFinished>,
) -> std::io::Result<()> {
    thread::Builder::new()
        .name(format!("worker-{}", ticket.id.short()))
        .spawn(move || execute(ticket, transformer.as_ref(), &notifier, events))
        .map(|_| ())
}

/// Ejecuta un job hasta su estado terminal
pub fn execute(
    ticket: ExecutionTicket,
    transformer: &dyn Transformer,
    notifier: &Notifier,
    events: Sender<ExecutionFinished>,
) {
    let span = tracing::info_span!("job", job_id = %ticket.id);
    let _entered = span.enter();

    let mut guard = SlotGuard::new(ticket.id.clone(), events);

    let status_handle = notifier.deliver(
        ticket.status_handle.as_ref(),
        &ticket.context,
        &Notification::text(texts::PROCESSING),
    );

    tracing::info!(
        variant = %ticket.variant,
        model = ticket.variant.model_name(),
        bytes = ticket.payload.len(),
        "procesando"
    );
    let started = Instant::now();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        transformer.transform(&ticket.payload, ticket.variant)
    }))
    .unwrap_or_else(|payload| Err(TransformationError::Panicked(panic_message(payload))));

    match result {
        Ok(bytes) => {
            guard.complete(Outcome::Succeeded);
            tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                output_bytes = bytes.len(),
                "job completado"
            );

            let artifact = Artifact {
                filename: artifact_filename(&ticket.id),
                bytes,
            };
            notifier.deliver(
                None,
                &ticket.context,
                &Notification::text(texts::SUCCESS).with_artifact(artifact),
            );
        }
        Err(e) => {
            let reason = e.to_string();
            guard.complete(Outcome::Failed(reason.clone()));
            tracing::error!(error = %reason, "job fallido");

            notifier.deliver(
                status_handle.as_ref(),
                &ticket.context,
                &Notification::text(texts::failed(&reason)),
            );
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationDeliveryError;
    use crate::jobs::notify::NotificationSink;
    use crate::jobs::types::{ChatContext, StatusHandle, Variant};
    use std::sync::mpsc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<Notification>>,
    }

    impl NotificationSink for RecordingSink {
        fn notify(
            &self,
            _handle: Option<&StatusHandle>,
            _context: &ChatContext,
            notification: &Notification,
        ) -> Result<StatusHandle, NotificationDeliveryError> {
            let mut messages = self.messages.lock().unwrap();
            messages.push(notification.clone());
            Ok(StatusHandle::new(messages.len().to_string()))
        }
    }

    struct Echo;

    impl Transformer for Echo {
        fn transform(&self, payload: &[u8], _variant: Variant) -> Result<Vec<u8>, TransformationError> {
            Ok(payload.to_vec())
        }
    }

    struct Broken;

    impl Transformer for Broken {
        fn transform(&self, _payload: &[u8], _variant: Variant) -> Result<Vec<u8>, TransformationError> {
            Err(TransformationError::Decode("bad header".to_string()))
        }
    }

    struct Panics;

    impl Transformer for Panics {
        fn transform(&self, _payload: &[u8], _variant: Variant) -> Result<Vec<u8>, TransformationError> {
            panic!("model crashed");
        }
    }

    fn ticket(id: &str) -> ExecutionTicket {
        ExecutionTicket {
            id: JobId::new(id),
            payload: Arc::from(vec![1u8, 2, 3]),
            variant: Variant::Auto,
            context: ChatContext::new("chat"),
            status_handle: None,
        }
    }

    fn run(transformer: &dyn Transformer) -> (ExecutionFinished, Vec<Notification>) {
        let sink = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(sink.clone());
        let (tx, rx) = mpsc::channel();

        execute(ticket("abcdefghijk"), transformer, &notifier, tx);

        let event = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err(), "slot released more than once");
        let messages = sink.messages.lock().unwrap().clone();
        (event, messages)
    }

    #[test]
    fn test_success_delivers_artifact() {
        let (event, messages) = run(&Echo);

        assert_eq!(event.outcome, Outcome::Succeeded);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, texts::PROCESSING);

        let artifact = messages[1].artifact.as_ref().unwrap();
        assert_eq!(artifact.filename, "no_background_abcdefgh.png");
        assert_eq!(artifact.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_transformation_error_maps_to_failed() {
        let (event, messages) = run(&Broken);

        assert!(matches!(event.outcome, Outcome::Failed(ref r) if r.contains("bad header")));
        assert!(messages.last().unwrap().text.contains("failed"));
    }

    #[test]
    fn test_panic_is_contained() {
        let (event, messages) = run(&Panics);

        assert!(matches!(event.outcome, Outcome::Failed(ref r) if r.contains("model crashed")));
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_guard_reports_failure_when_dropped_early() {
        let (tx, rx) = mpsc::channel();
        drop(SlotGuard::new(JobId::new("x"), tx));

        let event = rx.try_recv().unwrap();
        assert!(matches!(event.outcome, Outcome::Failed(_)));
    }
}
