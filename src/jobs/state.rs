//! # Estado del Scheduler
//! src/jobs/state.rs
//!
//! `SchedulerState` agrupa la cola de admisión, el store de jobs y el
//! contador de slots activos. El dispatcher lo guarda detrás de un único
//! Mutex: cola y store se actualizan juntos y el contador cambia en la
//! misma sección crítica que el estado del job.
//!
//! Todo aquí es síncrono y sin I/O; las notificaciones y los threads
//! viven en `dispatcher` y `worker`.

use crate::error::SchedulerError;
use crate::jobs::job::Job;
use crate::jobs::queue::AdmissionQueue;
use crate::jobs::store::JobStore;
use crate::jobs::types::{ChatContext, JobId, JobState, Outcome, StatusHandle, Variant};
use serde::Serialize;
use std::sync::Arc;

/// Lo que un worker necesita para ejecutar un job admitido
///
/// La variante queda fijada en el momento de la admisión.
#[derive(Debug, Clone)]
pub struct ExecutionTicket {
    pub id: JobId,
    pub payload: Arc<[u8]>,
    pub variant: Variant,
    pub context: ChatContext,
    pub status_handle: Option<StatusHandle>,
}

/// Evento "ejecución terminada", consumido por el loop de admisión
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFinished {
    pub id: JobId,
    pub outcome: Outcome,
}

/// Resultado de encolar un job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    /// Posición (base 0) en la cola de admisión
    pub position: usize,

    /// Jobs por delante, contando los que están corriendo
    pub jobs_ahead: usize,
}

/// Vista serializable de un job vivo
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub state: JobState,
    pub variant: Variant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

/// Contadores acumulados desde el arranque
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[derive(Debug)]
pub struct SchedulerState {
    queue: AdmissionQueue,
    store: JobStore,
    running: usize,
    max_queued: usize,
    counters: Counters,
}

impl SchedulerState {
    pub fn new(max_queued: usize) -> Self {
        Self {
            queue: AdmissionQueue::new(),
            store: JobStore::new(),
            running: 0,
            max_queued,
            counters: Counters::default(),
        }
    }

    /// Registra el job y lo agrega al final de la cola, en una sola operación
    pub fn enqueue(&mut self, job: Job) -> Result<Enqueued, SchedulerError> {
        if job.payload().is_empty() {
            return Err(SchedulerError::EmptyPayload);
        }
        if self.store.contains(job.id()) {
            return Err(SchedulerError::DuplicateJob(job.id().clone()));
        }
        if self.queue.len() >= self.max_queued {
            return Err(SchedulerError::QueueFull {
                capacity: self.max_queued,
            });
        }

        let id = job.id().clone();
        self.store.register(job)?;
        self.queue.enqueue(id);
        self.counters.submitted += 1;

        let position = self.queue.len() - 1;
        Ok(Enqueued {
            position,
            jobs_ahead: position + self.running,
        })
    }

    /// Admite la cabeza de la cola si hay un slot libre
    ///
    /// Retorna `None` cuando la cola está vacía, los slots están llenos o la
    /// cabeza todavía no recibió su aviso de posición. En ese último caso la
    /// cola se detiene ahí para no romper el orden FIFO; `announce` vuelve a
    /// disparar la admisión.
    pub fn admit_next(&mut self, capacity: usize) -> Option<ExecutionTicket> {
        if self.running >= capacity {
            return None;
        }

        let head = self.queue.front()?;
        // Cola y store se mutan siempre juntos: un id en cola está en el store
        match self.store.lookup(head) {
            Ok(job) if !job.is_announced() => return None,
            Ok(_) => {}
            Err(_) => {
                tracing::error!(job_id = %head, "id en cola sin job registrado, descartado");
                self.queue.dequeue_front().ok();
                return None;
            }
        }

        let id = self.queue.dequeue_front().ok()?;
        let job = self.store.lookup_mut(&id).ok()?;

        job.mark_running();
        self.running += 1;

        Some(ExecutionTicket {
            id: job.id().clone(),
            payload: Arc::clone(job.payload()),
            variant: job.variant(),
            context: job.context().clone(),
            status_handle: job.status_handle().cloned(),
        })
    }

    /// Libera el slot de un job terminado y lo saca del store
    pub fn finish(&mut self, event: &ExecutionFinished) -> Result<Job, SchedulerError> {
        let state = self.store.lookup(&event.id)?.state();
        if state != JobState::Running {
            return Err(SchedulerError::InvalidState {
                id: event.id.clone(),
                state,
            });
        }

        let mut job = self.store.unregister(&event.id)?;
        job.finish(&event.outcome);
        self.running = self.running.saturating_sub(1);

        match event.outcome {
            Outcome::Succeeded => self.counters.succeeded += 1,
            Outcome::Failed(_) => self.counters.failed += 1,
        }

        Ok(job)
    }

    pub fn set_variant(&mut self, id: &JobId, variant: Variant) -> Result<(), SchedulerError> {
        self.store.lookup_mut(id)?.set_variant(variant)
    }

    /// Cancela un job en cola: sale de la cola y del store juntos
    pub fn cancel(&mut self, id: &JobId) -> Result<Job, SchedulerError> {
        let state = self.store.lookup(id)?.state();
        if state != JobState::Queued {
            return Err(SchedulerError::InvalidState {
                id: id.clone(),
                state,
            });
        }

        self.queue
            .remove(id)
            .map_err(|_| SchedulerError::NotFound(id.clone()))?;
        let mut job = self.store.unregister(id)?;
        job.mark_cancelled()?;
        self.counters.cancelled += 1;

        Ok(job)
    }

    /// Marca el job como avisado y guarda la referencia a ese aviso
    ///
    /// Retorna `false` si el job ya no está vivo (p.ej. se canceló mientras
    /// se entregaba el aviso).
    pub fn announce(&mut self, id: &JobId, handle: Option<StatusHandle>) -> bool {
        match self.store.lookup_mut(id) {
            Ok(job) => {
                job.mark_announced(handle);
                true
            }
            Err(_) => false,
        }
    }

    pub fn snapshot(&self, id: &JobId) -> Result<JobSnapshot, SchedulerError> {
        let job = self.store.lookup(id)?;
        Ok(JobSnapshot {
            id: job.id().clone(),
            state: job.state(),
            variant: job.variant(),
            position: self.queue.position_of(id).ok(),
        })
    }

    pub fn is_live(&self, id: &JobId) -> bool {
        self.store.contains(id)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }
}
