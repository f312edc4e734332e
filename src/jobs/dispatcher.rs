//! # Dispatcher
//! src/jobs/dispatcher.rs
//!
//! Coordina la admisión: mantiene "jobs corriendo ≤ capacidad" y drena la
//! cola cada vez que se libera un slot.
//!
//! ## Disparadores de admisión
//!
//! 1. Después de cada `submit`, una vez entregado el aviso de posición.
//!    Un job no se admite antes de ese aviso, así el cliente nunca ve
//!    "procesando" antes que su posición en la cola.
//! 2. Al procesar cada evento `ExecutionFinished` en el loop de admisión
//! 3. En un tick periódico de respaldo (`tick_interval`), por si algún
//!    disparador se perdió
//!
//! `try_admit_more` es idempotente: con la cola vacía o los slots llenos
//! no cambia nada ni envía notificaciones, así que los tres caminos pueden
//! correr concurrentemente.
//!
//! ## Limitación
//!
//! La cancelación solo aplica a jobs en cola. Un job corriendo no se puede
//! interrumpir: la transformación no expone un token de cancelación.

use crate::config::Config;
use crate::error::SchedulerError;
use crate::jobs::notify::{texts, Notification, NotificationSink, Notifier};
use crate::jobs::state::{Counters, ExecutionFinished, ExecutionTicket, JobSnapshot, SchedulerState};
use crate::jobs::types::{ChatContext, JobId, Outcome, Variant};
use crate::jobs::worker;
use crate::jobs::job::Job;
use crate::transform::Transformer;
use serde::Serialize;
use std::iter;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

/// Configuración del Dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Slots de ejecución concurrentes
    pub max_concurrent_jobs: usize,

    /// Capacidad máxima de la cola de admisión
    pub max_queued_jobs: usize,

    /// Intervalo del tick de respaldo (`None` lo desactiva)
    pub tick_interval: Option<Duration>,

    /// Segundos estimados por job, para el tiempo de espera informado
    pub seconds_per_job: u64,

    pub default_variant: Variant,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_queued_jobs: 100,
            tick_interval: Some(Duration::from_secs(5)),
            seconds_per_job: 30,
            default_variant: Variant::Auto,
        }
    }
}

impl DispatcherConfig {
    /// Crea una configuración desde el Config principal
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_jobs: config.max_concurrent_jobs,
            max_queued_jobs: config.max_queued_jobs,
            tick_interval: config.tick_interval(),
            seconds_per_job: config.seconds_per_job,
            default_variant: config.default_variant().unwrap_or_default(),
        }
    }
}

/// Estadísticas del dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub queued: usize,
    pub running: usize,
    pub capacity: usize,
    #[serde(flatten)]
    pub counters: Counters,
}

pub struct Dispatcher {
    config: DispatcherConfig,

    /// Cola, store y contador de slots: un solo dominio de exclusión
    state: Mutex<SchedulerState>,

    /// Compartido solo-lectura entre todos los workers
    transformer: Arc<dyn Transformer>,

    notifier: Notifier,

    /// Canal de eventos de finalización hacia el loop de admisión
    events: Sender<ExecutionFinished>,

    spawn: worker::Spawn,
}

impl Dispatcher {
    /// Construye el dispatcher y arranca su loop de admisión
    pub fn start(
        config: DispatcherConfig,
        transformer: Arc<dyn Transformer>,
        sink: Arc<dyn NotificationSink>,
    ) -> std::io::Result<Arc<Self>> {
        Self::start_with(config, transformer, sink, worker::spawn)
    }

    fn start_with(
        config: DispatcherConfig,
        transformer: Arc<dyn Transformer>,
        sink: Arc<dyn NotificationSink>,
        spawn: worker::Spawn,
    ) -> std::io::Result<Arc<Self>> {
        let (events, receiver) = mpsc::channel();
        let tick = config.tick_interval;

        let dispatcher = Arc::new(Self {
            state: Mutex::new(SchedulerState::new(config.max_queued_jobs)),
            config,
            transformer,
            notifier: Notifier::new(sink),
            events,
            spawn,
        });

        let weak = Arc::downgrade(&dispatcher);
        thread::Builder::new()
            .name("admission-loop".to_string())
            .spawn(move || admission_loop(weak, receiver, tick))?;

        tracing::info!(
            capacity = dispatcher.config.max_concurrent_jobs,
            max_queued = dispatcher.config.max_queued_jobs,
            tick_ms = tick.map(|t| t.as_millis() as u64),
            "dispatcher iniciado"
        );

        Ok(dispatcher)
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        // Cada sección crítica deja el estado consistente antes de cualquier
        // llamada que pueda fallar
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.config.max_concurrent_jobs
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Encola un nuevo job y notifica su posición
    pub fn submit(
        &self,
        payload: Vec<u8>,
        file_id: JobId,
        context: ChatContext,
    ) -> Result<JobId, SchedulerError> {
        let job = Job::new(file_id, payload, self.config.default_variant, context);
        let id = job.id().clone();
        let context = job.context().clone();

        let enqueued = self.lock_state().enqueue(job)?;
        tracing::info!(
            job_id = %id,
            chat = %context,
            position = enqueued.position,
            jobs_ahead = enqueued.jobs_ahead,
            "job encolado"
        );

        let wait_secs = enqueued.jobs_ahead as u64 * self.config.seconds_per_job;
        let notification = Notification::text(texts::queued(enqueued.jobs_ahead, wait_secs))
            .with_options(texts::queued_options(&id));
        let handle = self.notifier.deliver(None, &context, &notification);

        // Aunque la entrega falle, el job queda habilitado para admisión
        if !self.lock_state().announce(&id, handle) {
            tracing::debug!(job_id = %id, "job cancelado antes de registrar su aviso");
        }

        self.try_admit_more();
        Ok(id)
    }

    /// Cambia la variante de un job que sigue en cola
    pub fn set_variant(&self, id: &JobId, variant: Variant) -> Result<(), SchedulerError> {
        self.lock_state().set_variant(id, variant)?;
        tracing::info!(job_id = %id, variant = %variant, "variante actualizada");
        Ok(())
    }

    /// Cancela un job en cola
    ///
    /// Un job corriendo retorna `InvalidState` y sigue hasta terminar.
    pub fn cancel(&self, id: &JobId) -> Result<(), SchedulerError> {
        let job = self.lock_state().cancel(id)?;
        tracing::info!(job_id = %id, "job cancelado");

        self.notifier.deliver(
            job.status_handle(),
            job.context(),
            &Notification::text(texts::CANCELLED),
        );
        Ok(())
    }

    /// Admite jobs mientras haya cola y slots libres
    ///
    /// Retorna cuántos jobs se admitieron.
    pub fn try_admit_more(&self) -> usize {
        let capacity = self.config.max_concurrent_jobs;
        let (tickets, running): (Vec<ExecutionTicket>, usize) = {
            let mut state = self.lock_state();
            let tickets = iter::from_fn(|| state.admit_next(capacity)).collect();
            (tickets, state.running())
        };

        let admitted = tickets.len();
        for ticket in tickets {
            tracing::info!(job_id = %ticket.id, variant = %ticket.variant, running, capacity, "job admitido");
            self.launch(ticket);
        }
        admitted
    }

    /// Re-sincronización periódica de respaldo
    pub fn resync(&self) -> usize {
        let admitted = self.try_admit_more();
        if admitted > 0 {
            tracing::warn!(admitted, "el tick de respaldo admitió jobs pendientes");
        }
        admitted
    }

    /// Procesa un evento de finalización: libera el slot y re-admite
    pub fn handle_finished(&self, event: ExecutionFinished) {
        let finished = self.lock_state().finish(&event);
        match finished {
            Ok(job) => tracing::info!(
                job_id = %event.id,
                state = %job.state(),
                elapsed_ms = job.elapsed().as_millis() as u64,
                execution_ms = job.execution_time().map(|t| t.as_millis() as u64),
                "slot liberado"
            ),
            Err(e) => tracing::warn!(job_id = %event.id, error = %e, "evento de finalización ignorado"),
        }
        self.try_admit_more();
    }

    fn launch(&self, ticket: ExecutionTicket) {
        let id = ticket.id.clone();
        let status_handle = ticket.status_handle.clone();
        let context = ticket.context.clone();
        let spawned = (self.spawn)(
            ticket,
            Arc::clone(&self.transformer),
            self.notifier.clone(),
            self.events.clone(),
        );

        if let Err(e) = spawned {
            tracing::error!(job_id = %id, error = %e, "no se pudo lanzar el worker");
            let reason = format!("could not start worker: {}", e);
            self.notifier.deliver(
                status_handle.as_ref(),
                &context,
                &Notification::text(texts::failed(&reason)),
            );

            let event = ExecutionFinished {
                id,
                outcome: Outcome::Failed(reason),
            };
            // El slot vuelve por el mismo camino que una ejecución normal
            if self.events.send(event).is_err() {
                tracing::error!("loop de admisión detenido");
            }
        }
    }

    /// Aviso suelto a un cliente, fuera del ciclo de vida de un job
    pub fn notify(&self, context: &ChatContext, notification: &Notification) {
        self.notifier.deliver(None, context, notification);
    }

    pub fn snapshot(&self, id: &JobId) -> Result<JobSnapshot, SchedulerError> {
        self.lock_state().snapshot(id)
    }

    pub fn is_live(&self, id: &JobId) -> bool {
        self.lock_state().is_live(id)
    }

    pub fn stats(&self) -> DispatcherStats {
        let state = self.lock_state();
        DispatcherStats {
            queued: state.queued(),
            running: state.running(),
            capacity: self.config.max_concurrent_jobs,
            counters: state.counters(),
        }
    }
}

/// Loop principal de admisión
///
/// Consume eventos de finalización; si no llega ninguno en `tick`, corre la
/// re-sincronización de respaldo. Termina cuando el dispatcher se libera.
fn admission_loop(
    dispatcher: Weak<Dispatcher>,
    events: Receiver<ExecutionFinished>,
    tick: Option<Duration>,
) {
    loop {
        let received = match tick {
            Some(interval) => events.recv_timeout(interval),
            None => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        let Some(dispatcher) = dispatcher.upgrade() else {
            break;
        };

        match received {
            Ok(event) => dispatcher.handle_finished(event),
            Err(RecvTimeoutError::Timeout) => {
                dispatcher.resync();
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!("loop de admisión terminado");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotificationDeliveryError, TransformationError};
    use crate::jobs::types::{JobState, StatusHandle};
    use std::sync::Condvar;
    use std::time::Instant;

    #[derive(Default)]
    struct NullSink;

    impl NotificationSink for NullSink {
        fn notify(
            &self,
            _handle: Option<&StatusHandle>,
            _context: &ChatContext,
            _notification: &Notification,
        ) -> Result<StatusHandle, NotificationDeliveryError> {
            Ok(StatusHandle::new("m"))
        }
    }

    /// Transformación que bloquea hasta que el test abre la compuerta
    #[derive(Default)]
    struct Gate {
        open: Mutex<bool>,
        cond: Condvar,
    }

    impl Gate {
        fn release(&self) {
            *self.open.lock().unwrap() = true;
            self.cond.notify_all();
        }
    }

    impl Transformer for Gate {
        fn transform(&self, payload: &[u8], _variant: Variant) -> Result<Vec<u8>, TransformationError> {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cond.wait(open).unwrap();
            }
            Ok(payload.to_vec())
        }
    }

    /// Registra (mensaje editado, texto) de cada entrega
    #[derive(Default)]
    struct TextSink {
        delivered: Mutex<Vec<(Option<StatusHandle>, String)>>,
    }

    impl NotificationSink for TextSink {
        fn notify(
            &self,
            handle: Option<&StatusHandle>,
            _context: &ChatContext,
            notification: &Notification,
        ) -> Result<StatusHandle, NotificationDeliveryError> {
            self.delivered
                .lock()
                .unwrap()
                .push((handle.cloned(), notification.text.clone()));
            Ok(handle.cloned().unwrap_or_else(|| StatusHandle::new("queued-msg")))
        }
    }

    fn no_threads(
        _ticket: ExecutionTicket,
        _transformer: Arc<dyn Transformer>,
        _notifier: Notifier,
        _events: Sender<ExecutionFinished>,
    ) -> std::io::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "no threads left"))
    }

    fn config(capacity: usize) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrent_jobs: capacity,
            tick_interval: None,
            ..DispatcherConfig::default()
        }
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.tick_interval, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_submit_admits_up_to_capacity() {
        let gate = Arc::new(Gate::default());
        let dispatcher = Dispatcher::start(config(1), gate.clone(), Arc::new(NullSink)).unwrap();

        dispatcher.submit(vec![1], JobId::new("a"), ChatContext::new("c")).unwrap();
        dispatcher.submit(vec![2], JobId::new("b"), ChatContext::new("c")).unwrap();

        assert_eq!(dispatcher.snapshot(&JobId::new("a")).unwrap().state, JobState::Running);
        assert_eq!(dispatcher.snapshot(&JobId::new("b")).unwrap().state, JobState::Queued);
        assert_eq!(dispatcher.stats().running, 1);

        gate.release();
        wait_until(|| dispatcher.stats().counters.succeeded == 2);
        assert!(!dispatcher.is_live(&JobId::new("a")));
        assert!(!dispatcher.is_live(&JobId::new("b")));
    }

    #[test]
    fn test_resync_is_idempotent() {
        let gate = Arc::new(Gate::default());
        let dispatcher = Dispatcher::start(config(1), gate.clone(), Arc::new(NullSink)).unwrap();

        assert_eq!(dispatcher.resync(), 0);

        dispatcher.submit(vec![1], JobId::new("a"), ChatContext::new("c")).unwrap();
        dispatcher.submit(vec![2], JobId::new("b"), ChatContext::new("c")).unwrap();
        let before = dispatcher.stats();

        assert_eq!(dispatcher.resync(), 0);
        assert_eq!(dispatcher.stats(), before);

        gate.release();
        wait_until(|| dispatcher.stats().counters.succeeded == 2);
    }

    #[test]
    fn test_unknown_finish_event_is_ignored() {
        let dispatcher = Dispatcher::start(config(1), Arc::new(Gate::default()), Arc::new(NullSink)).unwrap();
        dispatcher.handle_finished(ExecutionFinished {
            id: JobId::new("ghost"),
            outcome: Outcome::Succeeded,
        });
        assert_eq!(dispatcher.stats().running, 0);
        assert_eq!(dispatcher.stats().counters.succeeded, 0);
    }

    #[test]
    fn test_spawn_failure_notifies_client() {
        let sink = Arc::new(TextSink::default());
        let dispatcher =
            Dispatcher::start_with(config(1), Arc::new(Gate::default()), sink.clone(), no_threads).unwrap();

        dispatcher.submit(vec![1], JobId::new("a"), ChatContext::new("c")).unwrap();
        wait_until(|| dispatcher.stats().counters.failed == 1);

        assert!(!dispatcher.is_live(&JobId::new("a")));
        assert_eq!(dispatcher.stats().running, 0);

        // Aviso de posición y luego el fallo, editando ese mismo mensaje
        let delivered = sink.delivered.lock().unwrap().clone();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].0, None);
        assert_eq!(delivered[1].0, Some(StatusHandle::new("queued-msg")));
        assert!(delivered[1].1.starts_with("Processing failed: could not start worker"));
    }
}
