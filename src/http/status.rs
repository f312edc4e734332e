//! # Códigos de Estado HTTP
//!
//! Códigos HTTP/1.0 que usa el servidor:
//!
//! - **2xx**: Éxito (200 OK)
//! - **4xx**: Error del cliente (400, 404, 405, 409, 413, 415)
//! - **5xx**: Error del servidor (500, 503)

/// Representa los códigos de estado HTTP que soporta nuestro servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK - La petición fue exitosa
    Ok = 200,

    /// 400 Bad Request - Parámetros inválidos o malformados
    BadRequest = 400,

    /// 404 Not Found - Ruta o job no encontrado
    NotFound = 404,

    /// 405 Method Not Allowed - La ruta existe con otro método
    MethodNotAllowed = 405,

    /// 409 Conflict - El job no está en un estado que permita la operación
    Conflict = 409,

    /// 413 Payload Too Large - La imagen supera el límite configurado
    PayloadTooLarge = 413,

    /// 415 Unsupported Media Type - El body no es una imagen
    UnsupportedMediaType = 415,

    /// 500 Internal Server Error - Error interno del servidor
    InternalServerError = 500,

    /// 503 Service Unavailable - Cola de admisión llena
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// Convierte el código a su valor numérico
    ///
    /// ```
    /// use cutout_server::http::StatusCode;
    /// assert_eq!(StatusCode::PayloadTooLarge.as_u16(), 413);
    /// ```
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Texto de razón (reason phrase) asociado al código
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::Conflict => "Conflict",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::UnsupportedMediaType => "Unsupported Media Type",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::ServiceUnavailable => "Service Unavailable",
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.as_u16())
    }
}

impl std::fmt::Display for StatusCode {
    /// Formato: "200 OK"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_values() {
        assert_eq!(StatusCode::Ok.as_u16(), 200);
        assert_eq!(StatusCode::Conflict.as_u16(), 409);
        assert_eq!(StatusCode::UnsupportedMediaType.as_u16(), 415);
        assert_eq!(StatusCode::ServiceUnavailable.as_u16(), 503);
    }

    #[test]
    fn test_categories() {
        assert!(StatusCode::Ok.is_success());
        assert!(StatusCode::PayloadTooLarge.is_client_error());
        assert!(!StatusCode::PayloadTooLarge.is_server_error());
        assert!(StatusCode::ServiceUnavailable.is_server_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::Ok.to_string(), "200 OK");
        assert_eq!(StatusCode::MethodNotAllowed.to_string(), "405 Method Not Allowed");
    }
}
