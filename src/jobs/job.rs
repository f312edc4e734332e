//! # Estructura de Job
//! src/jobs/job.rs
//!
//! Representa una unidad de trabajo: payload inmutable, variante mutable
//! mientras está en cola, estado y la última notificación enviada.

use crate::error::SchedulerError;
use crate::jobs::types::{ChatContext, JobId, JobState, Outcome, StatusHandle, Variant};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Representa un job individual
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,

    /// Contenido a transformar (compartido sin copiar con el worker)
    payload: Arc<[u8]>,

    variant: Variant,

    state: JobState,

    context: ChatContext,

    status_handle: Option<StatusHandle>,

    /// El aviso de posición ya se intentó entregar; antes de eso no se admite
    announced: bool,

    created_at: Instant,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl Job {
    /// Crea un nuevo job en estado `Queued`
    pub fn new(id: JobId, payload: Vec<u8>, variant: Variant, context: ChatContext) -> Self {
        Self {
            id,
            payload: Arc::from(payload),
            variant,
            state: JobState::Queued,
            context,
            status_handle: None,
            announced: false,
            created_at: Instant::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn payload(&self) -> &Arc<[u8]> {
        &self.payload
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn context(&self) -> &ChatContext {
        &self.context
    }

    pub fn status_handle(&self) -> Option<&StatusHandle> {
        self.status_handle.as_ref()
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    /// Marca el aviso de posición como enviado, guardando su referencia
    pub fn mark_announced(&mut self, handle: Option<StatusHandle>) {
        if let Some(handle) = handle {
            self.status_handle = Some(handle);
        }
        self.announced = true;
    }

    /// Cambia la variante. Solo se permite mientras el job está en cola.
    pub fn set_variant(&mut self, variant: Variant) -> Result<(), SchedulerError> {
        if self.state != JobState::Queued {
            return Err(SchedulerError::InvalidState {
                id: self.id.clone(),
                state: self.state,
            });
        }
        self.variant = variant;
        Ok(())
    }

    /// Marca el job como iniciado
    pub fn mark_running(&mut self) {
        self.state = JobState::Running;
        self.started_at = Some(Instant::now());
    }

    /// Marca el job como cancelado. Solo válido desde `Queued`.
    pub fn mark_cancelled(&mut self) -> Result<(), SchedulerError> {
        if self.state != JobState::Queued {
            return Err(SchedulerError::InvalidState {
                id: self.id.clone(),
                state: self.state,
            });
        }
        self.state = JobState::Cancelled;
        self.finished_at = Some(Instant::now());
        Ok(())
    }

    /// Aplica el resultado de la ejecución
    pub fn finish(&mut self, outcome: &Outcome) {
        self.state = outcome.terminal_state();
        self.finished_at = Some(Instant::now());
    }

    /// Tiempo transcurrido desde la creación
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Tiempo de ejecución (si ya empezó)
    pub fn execution_time(&self) -> Option<Duration> {
        self.started_at.map(|start| match self.finished_at {
            Some(end) => end.duration_since(start),
            None => start.elapsed(),
        })
    }
}
