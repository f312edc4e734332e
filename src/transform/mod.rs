//! # Transformación de Imágenes
//! src/transform/mod.rs
//!
//! El núcleo invoca la transformación como una capacidad opaca:
//! `transform(bytes, variant) -> bytes`. La instancia es de larga vida y se
//! comparte solo-lectura entre todos los workers, por eso el trait exige
//! `Send + Sync` y toma `&self`.
//!
//! `BackgroundRemover` es la implementación incluida: estima el color de
//! fondo a partir del borde de la imagen y vuelve transparentes los píxeles
//! cercanos a ese color.

mod background;

pub use background::BackgroundRemover;

use crate::error::TransformationError;
use crate::jobs::types::Variant;

/// Capacidad de transformación invocada por los workers
pub trait Transformer: Send + Sync {
    fn transform(&self, payload: &[u8], variant: Variant) -> Result<Vec<u8>, TransformationError>;
}
