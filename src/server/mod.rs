//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Servidor TCP que acepta conexiones, lee requests HTTP/1.0 y los despacha
//! a los handlers de jobs y de notificaciones.

pub mod tcp;

pub use tcp::Server;
