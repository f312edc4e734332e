//! # Tipos para el Sistema de Jobs
//! src/jobs/types.rs
//!
//! Define los tipos fundamentales compartidos por la cola, el store,
//! el dispatcher y los workers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identificador de correlación de un job
///
/// Se deriva del id del archivo fuente y es único entre los jobs vivos.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self(file_id.into())
    }

    /// Deriva un id a partir del contenido (primeros 16 hex del SHA-256)
    pub fn from_content(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefijo corto usado en nombres de archivo
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Variante de procesamiento seleccionable por el cliente
///
/// Cada variante corresponde a un modelo de segmentación distinto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Auto,
    People,
    Products,
    Animals,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Auto,
        Variant::People,
        Variant::Products,
        Variant::Animals,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "auto" => Some(Variant::Auto),
            "people" => Some(Variant::People),
            "products" => Some(Variant::Products),
            "animals" => Some(Variant::Animals),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Auto => "auto",
            Variant::People => "people",
            Variant::Products => "products",
            Variant::Animals => "animals",
        }
    }

    /// Modelo subyacente asociado
    pub fn model_name(&self) -> &'static str {
        match self {
            Variant::Auto => "u2net",
            Variant::People => "u2net_human_seg",
            Variant::Products => "u2netp",
            Variant::Animals => "u2net_cloth_seg",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estado del ciclo de vida de un job
///
/// `Queued → Running → Succeeded | Failed | Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// En la cola de admisión esperando un slot
    Queued,

    /// Ocupando un slot de ejecución
    Running,

    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contexto de correlación del cliente que originó el job (p.ej. un chat)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatContext(String);

impl ChatContext {
    pub fn new(chat: impl Into<String>) -> Self {
        Self(chat.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Referencia opaca a la última notificación enviada para un job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusHandle(String);

impl StatusHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resultado final de una ejecución
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(String),
}

impl Outcome {
    pub fn terminal_state(&self) -> JobState {
        match self {
            Outcome::Succeeded => JobState::Succeeded,
            Outcome::Failed(_) => JobState::Failed,
        }
    }
}
