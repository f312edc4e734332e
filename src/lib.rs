//! # Cutout Server
//! src/lib.rs
//!
//! Servidor que quita el fondo de imágenes. Las imágenes entran por HTTP,
//! esperan en una cola FIFO acotada y se procesan con un número fijo de
//! slots concurrentes; el progreso se informa al cliente con mensajes de
//! estado editables.
//!
//! ## Arquitectura
//!
//! - `jobs`: núcleo de admisión y despacho (cola, store, dispatcher, workers)
//! - `transform`: la transformación de imágenes (`BackgroundRemover`)
//! - `outbox`: sink de notificaciones en memoria consultable por HTTP
//! - `http`: parsing y construcción de mensajes HTTP/1.0
//! - `router`: enrutamiento de requests a handlers
//! - `server`: servidor TCP con un thread por conexión
//! - `config`: configuración por CLI y variables de entorno
//! - `error`: tipos de error
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use cutout_server::config::Config;
//! use cutout_server::jobs::{Dispatcher, DispatcherConfig};
//! use cutout_server::outbox::OutboxSink;
//! use cutout_server::server::Server;
//! use cutout_server::transform::BackgroundRemover;
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let outbox = Arc::new(OutboxSink::new());
//! let dispatcher = Dispatcher::start(
//!     DispatcherConfig::from_config(&config),
//!     Arc::new(BackgroundRemover),
//!     outbox.clone(),
//! )?;
//! Server::new(config, dispatcher, outbox).run()?;
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod jobs;
pub mod outbox;
pub mod router;
pub mod server;
pub mod transform;
