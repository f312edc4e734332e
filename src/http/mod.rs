//! # Módulo HTTP
//!
//! Implementación mínima de HTTP/1.0 sobre `TcpStream`:
//!
//! - Parsing de requests con body binario (`Content-Length`)
//! - Construcción de responses
//! - Status codes
//!
//! Cada conexión atiende un único request y se cierra (`Connection: close`).

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, ParseError, Request};
pub use response::Response;
pub use status::StatusCode;
