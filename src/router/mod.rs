//! # Sistema de Routing
//! src/router/mod.rs
//!
//! ```text
//! Request → Router → Handler → Response
//! ```
//!
//! Cada ruta es un par (método, path). Un path conocido con otro método
//! responde 405; un path desconocido responde 404.

use crate::http::{Method, Request, Response, StatusCode};

/// Un handler recibe un Request y retorna una Response.
///
/// Son closures para poder capturar el estado compartido (dispatcher, outbox).
pub type Handler = Box<dyn Fn(&Request) -> Response + Send + Sync>;

pub struct Router {
    routes: Vec<(Method, String, Handler)>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registra una ruta con su handler
    ///
    /// ```
    /// use cutout_server::http::{Method, Response};
    /// use cutout_server::router::Router;
    ///
    /// let mut router = Router::new();
    /// router.register(Method::GET, "/ping", |_req| Response::ok(&"pong"));
    /// ```
    pub fn register<F>(&mut self, method: Method, path: &str, handler: F)
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.routes.push((method, path.to_string(), Box::new(handler)));
    }

    pub fn route(&self, request: &Request) -> Response {
        let path = request.path();
        let mut path_known = false;

        for (method, route_path, handler) in &self.routes {
            if route_path != path {
                continue;
            }
            if *method == request.method() {
                let mut response = handler(request);
                Self::add_common_headers(&mut response);
                return response;
            }
            path_known = true;
        }

        let mut response = if path_known {
            Response::error(
                StatusCode::MethodNotAllowed,
                &format!("Method {} not allowed on {}", request.method().as_str(), path),
            )
        } else {
            Response::error(StatusCode::NotFound, &format!("Route not found: {}", path))
        };
        Self::add_common_headers(&mut response);
        response
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn add_common_headers(response: &mut Response) {
        response.add_header("Server", "Cutout-HTTP/1.0");
        response.add_header("Connection", "close");
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        let mut router = Router::new();
        router.register(Method::GET, "/test", |_req| Response::ok(&"ok"));
        router.register(Method::POST, "/submit", |req| {
            Response::ok(&req.body().len())
        });
        router
    }

    #[test]
    fn test_register_route() {
        assert_eq!(router().len(), 2);
        assert!(Router::new().is_empty());
    }

    #[test]
    fn test_route_found() {
        let request = Request::parse(b"GET /test HTTP/1.0\r\n\r\n").unwrap();
        let response = router().route(&request);

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.header("Connection"), Some("close"));
        assert_eq!(response.header("Server"), Some("Cutout-HTTP/1.0"));
    }

    #[test]
    fn test_route_not_found() {
        let request = Request::parse(b"GET /nonexistent HTTP/1.0\r\n\r\n").unwrap();
        let response = router().route(&request);

        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.header("Connection"), Some("close"));
    }

    #[test]
    fn test_wrong_method() {
        let request = Request::parse(b"GET /submit HTTP/1.0\r\n\r\n").unwrap();
        let response = router().route(&request);

        assert_eq!(response.status(), StatusCode::MethodNotAllowed);
    }

    #[test]
    fn test_closure_sees_body() {
        let request =
            Request::parse(b"POST /submit HTTP/1.0\r\nContent-Length: 3\r\n\r\nabc").unwrap();
        let response = router().route(&request);

        assert_eq!(response.body(), b"3");
    }
}
