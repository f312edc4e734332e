//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Un thread por conexión. Cada conexión lee un request completo (headers y
//! el body declarado en `Content-Length`), lo despacha por el router y cierra.

use crate::config::Config;
use crate::http::request::{content_length, header_end};
use crate::http::{Method, Request, Response, StatusCode};
use crate::jobs::{handlers as job_handlers, Dispatcher};
use crate::outbox::{self, OutboxSink};
use crate::router::Router;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const READ_CHUNK: usize = 8192;

/// Headers más grandes que esto se dan por malformados
const MAX_HEADER_BYTES: usize = 16 * 1024;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Resultado de leer un request del socket
#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    /// El peer cerró sin mandar nada
    Closed,
    Complete(Vec<u8>),
    /// El `Content-Length` declarado supera el límite
    TooLarge(usize),
}

pub struct Server {
    config: Config,
    router: Arc<Router>,
    listener: Option<TcpListener>,
}

impl Server {
    pub fn new(config: Config, dispatcher: Arc<Dispatcher>, outbox: Arc<OutboxSink>) -> Self {
        let router = Self::routes(dispatcher, outbox, config.max_payload_bytes);
        Self {
            config,
            router: Arc::new(router),
            listener: None,
        }
    }

    /// Tabla de rutas del servidor
    pub fn routes(
        dispatcher: Arc<Dispatcher>,
        outbox: Arc<OutboxSink>,
        max_payload_bytes: usize,
    ) -> Router {
        let mut router = Router::new();

        router.register(Method::GET, "/help", job_handlers::help_handler);

        let d = Arc::clone(&dispatcher);
        router.register(Method::POST, "/jobs/submit", move |req| {
            job_handlers::submit_handler(req, &d, max_payload_bytes)
        });
        let d = Arc::clone(&dispatcher);
        router.register(Method::GET, "/jobs/status", move |req| job_handlers::status_handler(req, &d));
        let d = Arc::clone(&dispatcher);
        router.register(Method::POST, "/jobs/variant", move |req| job_handlers::variant_handler(req, &d));
        let d = Arc::clone(&dispatcher);
        router.register(Method::POST, "/jobs/cancel", move |req| job_handlers::cancel_handler(req, &d));
        let d = Arc::clone(&dispatcher);
        router.register(Method::POST, "/jobs/callback", move |req| job_handlers::callback_handler(req, &d));
        router.register(Method::GET, "/jobs/stats", move |req| job_handlers::stats_handler(req, &dispatcher));

        let o = Arc::clone(&outbox);
        router.register(Method::GET, "/notifications", move |req| outbox::notifications_handler(req, &o));
        router.register(Method::GET, "/notifications/artifact", move |req| {
            outbox::artifact_handler(req, &outbox)
        });

        router
    }

    /// Abre el socket; con puerto 0 retorna el puerto asignado
    pub fn bind(&mut self) -> io::Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.address())?;
        let local = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(local)
    }

    pub fn run(&mut self) -> io::Result<()> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => {
                self.bind()?;
                self.listener
                    .take()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "listener not bound"))?
            }
        };
        tracing::info!(address = %listener.local_addr()?, "servidor escuchando");

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let router = Arc::clone(&self.router);
                    let max_payload = self.config.max_payload_bytes;
                    let peer = stream
                        .peer_addr()
                        .map(|addr| addr.to_string())
                        .unwrap_or_else(|_| "unknown".to_string());

                    tracing::debug!(peer = %peer, "nueva conexión");
                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(stream, &router, max_payload) {
                            tracing::warn!(peer = %peer, error = %e, "error en la conexión");
                        }
                    });
                }
                Err(e) => tracing::warn!(error = %e, "error al aceptar conexión"),
            }
        }

        Ok(())
    }

    fn handle_connection(mut stream: TcpStream, router: &Router, max_payload: usize) -> io::Result<()> {
        let start = Instant::now();
        let request_id = format!("{:016x}", REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed) + 1);
        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut response = match read_request(&mut stream, max_payload)? {
            ReadOutcome::Closed => return Ok(()),
            ReadOutcome::TooLarge(declared) => {
                tracing::warn!(request_id = %request_id, declared, limit = max_payload, "body demasiado grande");
                Response::error(
                    StatusCode::PayloadTooLarge,
                    &format!("Image exceeds {} bytes", max_payload),
                )
                .with_header("Connection", "close")
            }
            ReadOutcome::Complete(buffer) => match Request::parse(&buffer) {
                Ok(request) => {
                    let _span = tracing::info_span!(
                        "request",
                        request_id = %request_id,
                        method = request.method().as_str(),
                        path = request.path()
                    )
                    .entered();
                    router.route(&request)
                }
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "request inválido");
                    Response::error(StatusCode::BadRequest, &format!("Invalid request: {}", e))
                        .with_header("Connection", "close")
                }
            },
        };

        response.add_header("X-Request-Id", &request_id);
        stream.write_all(&response.to_bytes())?;
        stream.flush()?;

        tracing::info!(
            request_id = %request_id,
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "respuesta enviada"
        );
        Ok(())
    }
}

/// Lee hasta tener los headers y el body declarado completos
fn read_request(stream: &mut impl Read, max_body: usize) -> io::Result<ReadOutcome> {
    let mut buffer = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Ok(if buffer.is_empty() {
                ReadOutcome::Closed
            } else {
                ReadOutcome::Complete(buffer)
            });
        }
        buffer.extend_from_slice(&chunk[..n]);

        match header_end(&buffer) {
            Some(end) => {
                let declared = content_length(&buffer[..end]).unwrap_or(0);
                if declared > max_body {
                    return Ok(ReadOutcome::TooLarge(declared));
                }
                if buffer.len() >= end + 4 + declared {
                    return Ok(ReadOutcome::Complete(buffer));
                }
            }
            // El parser lo rechazará como incompleto
            None if buffer.len() > MAX_HEADER_BYTES => return Ok(ReadOutcome::Complete(buffer)),
            None => {}
        }
    }
}
