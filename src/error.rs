//! # Errores del Sistema
//! src/error.rs
//!
//! Taxonomía de errores del núcleo de despacho y de sus colaboradores.
//!
//! - `QueueError`: operaciones sobre la cola de admisión
//! - `SchedulerError`: interacciones de clientes (submit, variante, cancelar)
//! - `TransformationError`: fallos del procesamiento de la imagen
//! - `NotificationDeliveryError`: entregas best-effort, nunca se escalan
//! - `InteractionError`: callbacks interactivos malformados
//! - `ConfigError`: configuración inválida al arrancar

use crate::jobs::types::{JobId, JobState};
use thiserror::Error;

/// Errores de la cola de admisión
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Admission queue is empty")]
    EmptyQueue,

    #[error("Job not found in queue: {0}")]
    NotFound(JobId),
}

/// Errores que ve un cliente al interactuar con el dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// El job no existe o ya terminó
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Mutación fuera del estado permitido
    #[error("Job {id} is {state} and cannot be modified")]
    InvalidState { id: JobId, state: JobState },

    /// Ya hay un job vivo con el mismo id
    #[error("Job already queued: {0}")]
    DuplicateJob(JobId),

    /// Backpressure: la cola alcanzó su capacidad
    #[error("Queue is full (max capacity: {capacity})")]
    QueueFull { capacity: usize },

    #[error("Payload is empty")]
    EmptyPayload,
}

/// Fallo interno de la transformación. El job termina en `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformationError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// La transformación hizo panic; se contiene en el borde del worker
    #[error("Transformation panicked: {0}")]
    Panicked(String),
}

/// Errores de entrega de notificaciones
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationDeliveryError {
    /// El mensaje a editar ya no existe
    #[error("Unknown status message: {0}")]
    UnknownHandle(String),

    #[error("Notification sink unavailable: {0}")]
    Unavailable(String),
}

/// Callback interactivo que no se pudo interpretar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionError {
    #[error("Malformed callback data: {0}")]
    Malformed(String),

    #[error("Unknown callback action: {0}")]
    UnknownAction(String),

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),
}

/// Configuración inválida
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Max concurrent jobs must be >= 1")]
    NoConcurrency,

    #[error("Max queued jobs must be >= 1")]
    NoQueueCapacity,

    #[error("Max payload bytes must be > 0")]
    NoPayloadLimit,

    #[error("Unknown default variant: {0}")]
    UnknownVariant(String),
}
