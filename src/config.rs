//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración con soporte para argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./cutout_server --port 8080 \
//!   --max-concurrent-jobs 2 \
//!   --max-queued-jobs 100 \
//!   --tick-interval-ms 5000
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 MAX_CONCURRENT_JOBS=4 LOG_LEVEL=debug ./cutout_server
//! ```

use crate::error::ConfigError;
use crate::jobs::Variant;
use clap::Parser;
use std::time::Duration;

/// Configuración del servidor de recorte de fondos
#[derive(Debug, Clone, Parser)]
#[command(name = "cutout_server")]
#[command(about = "Servidor HTTP/1.0 que quita el fondo de imágenes con admisión acotada")]
#[command(version)]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    // === Dispatcher ===

    /// Slots de ejecución concurrentes
    #[arg(long = "max-concurrent-jobs", default_value = "2", env = "MAX_CONCURRENT_JOBS")]
    pub max_concurrent_jobs: usize,

    /// Capacidad de la cola de admisión; al llenarse se responde 503
    #[arg(long = "max-queued-jobs", default_value = "100", env = "MAX_QUEUED_JOBS")]
    pub max_queued_jobs: usize,

    /// Intervalo del tick de respaldo en milisegundos (0 lo desactiva)
    #[arg(long = "tick-interval-ms", default_value = "5000", env = "TICK_INTERVAL_MS")]
    pub tick_interval_ms: u64,

    /// Segundos estimados por job para el tiempo de espera informado
    #[arg(long = "seconds-per-job", default_value = "30", env = "SECONDS_PER_JOB")]
    pub seconds_per_job: u64,

    // === Requests ===

    /// Tamaño máximo de la imagen subida, en bytes
    #[arg(long = "max-payload-bytes", default_value = "20971520", env = "MAX_PAYLOAD_BYTES")]
    pub max_payload_bytes: usize,

    /// Variante con la que se crean los jobs (auto, people, products, animals)
    #[arg(long = "default-variant", default_value = "auto", env = "DEFAULT_VARIANT")]
    pub default_variant: String,

    // === Logging ===

    /// Filtro de logs cuando `RUST_LOG` no está definido
    #[arg(long = "log-level", default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Dirección completa para bind (host:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Intervalo del tick de respaldo; `None` si está desactivado
    pub fn tick_interval(&self) -> Option<Duration> {
        (self.tick_interval_ms > 0).then(|| Duration::from_millis(self.tick_interval_ms))
    }

    pub fn default_variant(&self) -> Result<Variant, ConfigError> {
        Variant::from_name(&self.default_variant)
            .ok_or_else(|| ConfigError::UnknownVariant(self.default_variant.clone()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::NoConcurrency);
        }
        if self.max_queued_jobs == 0 {
            return Err(ConfigError::NoQueueCapacity);
        }
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::NoPayloadLimit);
        }
        self.default_variant()?;
        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        tracing::info!(
            address = %self.address(),
            max_concurrent_jobs = self.max_concurrent_jobs,
            max_queued_jobs = self.max_queued_jobs,
            tick_interval_ms = self.tick_interval_ms,
            seconds_per_job = self.seconds_per_job,
            max_payload_bytes = self.max_payload_bytes,
            default_variant = %self.default_variant,
            "configuración cargada"
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            max_concurrent_jobs: 2,
            max_queued_jobs: 100,
            tick_interval_ms: 5_000,
            seconds_per_job: 30,
            max_payload_bytes: 20 * 1024 * 1024,
            default_variant: "auto".to_string(),
            log_level: "info".to_string(),
        }
    }
}
