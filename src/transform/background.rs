//! # Remoción de Fondo por Color de Borde
//! src/transform/background.rs
//!
//! Cada variante usa una tolerancia y una banda de suavizado distintas,
//! tomadas como los "parámetros del modelo".

use super::Transformer;
use crate::error::TransformationError;
use crate::jobs::types::Variant;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Parámetros del recorte para una variante
#[derive(Debug, Clone, Copy, PartialEq)]
struct KeyParams {
    /// Distancia RGB bajo la cual el píxel es fondo
    tolerance: f32,

    /// Ancho de la transición entre fondo y primer plano
    feather: f32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BackgroundRemover;

impl BackgroundRemover {
    pub fn new() -> Self {
        Self
    }

    fn params(variant: Variant) -> KeyParams {
        match variant {
            Variant::Auto => KeyParams { tolerance: 40.0, feather: 30.0 },
            // Piel y pelo suelen parecerse al fondo: más conservador
            Variant::People => KeyParams { tolerance: 28.0, feather: 40.0 },
            Variant::Products => KeyParams { tolerance: 55.0, feather: 15.0 },
            Variant::Animals => KeyParams { tolerance: 35.0, feather: 45.0 },
        }
    }

    fn remove_background(image: &mut RgbaImage, params: KeyParams) {
        let background = estimate_background(image);

        for pixel in image.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            let distance = color_distance([r, g, b], background);

            let keep = if distance <= params.tolerance {
                0.0
            } else if distance >= params.tolerance + params.feather {
                1.0
            } else {
                (distance - params.tolerance) / params.feather
            };

            pixel.0[3] = (f32::from(a) * keep).round() as u8;
        }
    }
}

impl Transformer for BackgroundRemover {
    fn transform(&self, payload: &[u8], variant: Variant) -> Result<Vec<u8>, TransformationError> {
        let decoded = image::load_from_memory(payload)
            .map_err(|e| TransformationError::Decode(e.to_string()))?;

        let mut rgba = decoded.to_rgba8();
        Self::remove_background(&mut rgba, Self::params(variant));

        let mut output = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut output, ImageFormat::Png)
            .map_err(|e| TransformationError::Encode(e.to_string()))?;

        tracing::debug!(
            variant = %variant,
            model = variant.model_name(),
            bytes = output.get_ref().len(),
            "transformación completada"
        );

        Ok(output.into_inner())
    }
}

/// Color promedio de los píxeles del borde
fn estimate_background(image: &RgbaImage) -> [u8; 3] {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return [255, 255, 255];
    }

    let mut sum = [0u64; 3];
    let mut count = 0u64;
    let mut add = |x: u32, y: u32| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        sum[0] += u64::from(r);
        sum[1] += u64::from(g);
        sum[2] += u64::from(b);
        count += 1;
    };

    for x in 0..width {
        add(x, 0);
        add(x, height - 1);
    }
    for y in 0..height {
        add(0, y);
        add(width - 1, y);
    }

    [
        (sum[0] / count) as u8,
        (sum[1] / count) as u8,
        (sum[2] / count) as u8,
    ]
}

fn color_distance(a: [u8; 3], b: [u8; 3]) -> f32 {
    let dr = f32::from(a[0]) - f32::from(b[0]);
    let dg = f32::from(a[1]) - f32::from(b[1]);
    let db = f32::from(a[2]) - f32::from(b[2]);
    (dr * dr + dg * dg + db * db).sqrt()
}
