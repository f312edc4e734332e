//! # Handlers HTTP para Jobs
//! src/jobs/handlers.rs
//!
//! Puerta de entrada HTTP al dispatcher:
//! - /jobs/submit
//! - /jobs/status
//! - /jobs/variant
//! - /jobs/cancel
//! - /jobs/callback
//! - /jobs/stats
//! - /help

use crate::error::SchedulerError;
use crate::http::{Request, Response, StatusCode};
use crate::jobs::dispatcher::Dispatcher;
use crate::jobs::interaction;
use crate::jobs::notify::{texts, Notification};
use crate::jobs::types::{ChatContext, JobId, Variant};
use serde_json::json;

/// Traduce un rechazo del dispatcher a su status HTTP
pub fn error_response(error: &SchedulerError, dispatcher: &Dispatcher) -> Response {
    match error {
        SchedulerError::NotFound(_) => Response::error(StatusCode::NotFound, &error.to_string()),
        SchedulerError::InvalidState { .. } | SchedulerError::DuplicateJob(_) => {
            Response::error(StatusCode::Conflict, &error.to_string())
        }
        SchedulerError::QueueFull { .. } => {
            let retry_after = dispatcher.config().seconds_per_job.max(1);
            Response::error(StatusCode::ServiceUnavailable, &error.to_string())
                .with_header("Retry-After", &retry_after.to_string())
        }
        SchedulerError::EmptyPayload => Response::error(StatusCode::BadRequest, texts::NO_IMAGE),
    }
}

fn required<'a>(req: &'a Request, name: &str) -> Result<&'a str, Response> {
    req.query_param(name).filter(|v| !v.is_empty()).ok_or_else(|| {
        Response::error(
            StatusCode::BadRequest,
            &format!("Missing required parameter: {}", name),
        )
    })
}

fn is_image(req: &Request) -> bool {
    req.header("Content-Type")
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}

/// Handler para POST /jobs/submit?chat=CHAT[&file_id=ID]
///
/// El body es la imagen. Sin `file_id`, el id se deriva del contenido.
///
/// ```json
/// {"job_id": "3f2a9c01d4e5b6a7", "status": "queued"}
/// ```
pub fn submit_handler(req: &Request, dispatcher: &Dispatcher, max_payload_bytes: usize) -> Response {
    let chat = match required(req, "chat") {
        Ok(chat) => chat,
        Err(response) => return response,
    };
    let context = ChatContext::new(chat);

    if req.body().is_empty() || !is_image(req) {
        dispatcher.notify(&context, &Notification::text(texts::NO_IMAGE));
        let status = if req.body().is_empty() {
            StatusCode::BadRequest
        } else {
            StatusCode::UnsupportedMediaType
        };
        return Response::error(status, texts::NO_IMAGE);
    }

    if req.body().len() > max_payload_bytes {
        return Response::error(
            StatusCode::PayloadTooLarge,
            &format!("Image exceeds {} bytes", max_payload_bytes),
        );
    }

    let id = match req.query_param("file_id").filter(|f| !f.is_empty()) {
        Some(file_id) => JobId::new(file_id),
        None => JobId::from_content(req.body()),
    };

    match dispatcher.submit(req.body().to_vec(), id, context) {
        Ok(id) => Response::ok(&json!({ "job_id": id, "status": "queued" })),
        Err(e) => error_response(&e, dispatcher),
    }
}

/// Handler para GET /jobs/status?id=JOBID
///
/// ```json
/// {"id": "abc", "state": "queued", "variant": "auto", "position": 0}
/// ```
pub fn status_handler(req: &Request, dispatcher: &Dispatcher) -> Response {
    let id = match required(req, "id") {
        Ok(id) => JobId::new(id),
        Err(response) => return response,
    };

    match dispatcher.snapshot(&id) {
        Ok(snapshot) => Response::ok(&snapshot),
        Err(e) => error_response(&e, dispatcher),
    }
}

/// Handler para POST /jobs/variant?id=JOBID&variant=NAME
pub fn variant_handler(req: &Request, dispatcher: &Dispatcher) -> Response {
    let (id, name) = match (required(req, "id"), required(req, "variant")) {
        (Ok(id), Ok(name)) => (JobId::new(id), name),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    let Some(variant) = Variant::from_name(name) else {
        return Response::error(StatusCode::BadRequest, &format!("Unknown variant: {}", name));
    };

    match dispatcher.set_variant(&id, variant) {
        Ok(()) => Response::ok(&json!({
            "job_id": id,
            "variant": variant,
            "model": variant.model_name(),
        })),
        Err(e) => error_response(&e, dispatcher),
    }
}

/// Handler para POST /jobs/cancel?id=JOBID
///
/// Solo cancela jobs en cola; un job corriendo responde 409.
pub fn cancel_handler(req: &Request, dispatcher: &Dispatcher) -> Response {
    let id = match required(req, "id") {
        Ok(id) => JobId::new(id),
        Err(response) => return response,
    };

    match dispatcher.cancel(&id) {
        Ok(()) => Response::ok(&json!({ "job_id": id, "status": "cancelled" })),
        Err(e) => error_response(&e, dispatcher),
    }
}

/// Handler para POST /jobs/callback?data=DATA
///
/// Siempre responde 200: los errores se expresan en el texto de respuesta.
pub fn callback_handler(req: &Request, dispatcher: &Dispatcher) -> Response {
    let data = match required(req, "data") {
        Ok(data) => data,
        Err(response) => return response,
    };

    let reply = interaction::respond(dispatcher, data);
    Response::ok(&json!({ "reply": reply.text, "options": reply.options }))
}

pub fn stats_handler(_req: &Request, dispatcher: &Dispatcher) -> Response {
    Response::ok(&dispatcher.stats())
}

pub fn help_handler(_req: &Request) -> Response {
    Response::ok(&json!({
        "message": texts::START,
        "help": texts::HELP,
        "variants": Variant::ALL
            .iter()
            .map(|v| json!({ "name": v, "model": v.model_name() }))
            .collect::<Vec<_>>(),
        "routes": [
            "POST /jobs/submit?chat=CHAT[&file_id=ID]",
            "GET  /jobs/status?id=JOBID",
            "POST /jobs/variant?id=JOBID&variant=NAME",
            "POST /jobs/cancel?id=JOBID",
            "POST /jobs/callback?data=DATA",
            "GET  /jobs/stats",
            "GET  /notifications?chat=CHAT",
            "GET  /notifications/artifact?message=N",
        ],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotificationDeliveryError, TransformationError};
    use crate::jobs::dispatcher::DispatcherConfig;
    use crate::jobs::notify::NotificationSink;
    use crate::jobs::types::StatusHandle;
    use crate::transform::Transformer;
    use std::sync::{Arc, Condvar, Mutex};

    struct NullSink;

    impl NotificationSink for NullSink {
        fn notify(
            &self,
            _handle: Option<&StatusHandle>,
            _context: &ChatContext,
            _notification: &Notification,
        ) -> Result<StatusHandle, NotificationDeliveryError> {
            Ok(StatusHandle::new("0"))
        }
    }

    /// Bloquea cada transformación hasta que se abre
    #[derive(Default)]
    struct Blocked {
        open: Mutex<bool>,
        signal: Condvar,
    }

    impl Blocked {
        fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.signal.notify_all();
        }
    }

    impl Transformer for Blocked {
        fn transform(&self, payload: &[u8], _variant: Variant) -> Result<Vec<u8>, TransformationError> {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.signal.wait(open).unwrap();
            }
            Ok(payload.to_vec())
        }
    }

    fn dispatcher(max_queued_jobs: usize) -> (Arc<Dispatcher>, Arc<Blocked>) {
        let blocked = Arc::new(Blocked::default());
        let config = DispatcherConfig {
            max_concurrent_jobs: 1,
            max_queued_jobs,
            tick_interval: None,
            ..DispatcherConfig::default()
        };
        let dispatcher = Dispatcher::start(config, blocked.clone(), Arc::new(NullSink)).unwrap();
        (dispatcher, blocked)
    }

    fn submit_request(query: &str, content_type: &str, body: &[u8]) -> Request {
        let mut raw = format!(
            "POST /jobs/submit?{} HTTP/1.0\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
            query,
            content_type,
            body.len()
        )
        .into_bytes();
        raw.extend_from_slice(body);
        Request::parse(&raw).unwrap()
    }

    fn body_json(response: &Response) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[test]
    fn test_submit_missing_chat() {
        let (dispatcher, blocked) = dispatcher(10);
        let req = submit_request("file_id=a", "image/png", b"img");

        assert_eq!(submit_handler(&req, &dispatcher, 100).status(), StatusCode::BadRequest);
        blocked.open();
    }

    #[test]
    fn test_submit_rejects_non_image() {
        let (dispatcher, blocked) = dispatcher(10);

        let req = submit_request("chat=1", "text/plain", b"hello");
        assert_eq!(
            submit_handler(&req, &dispatcher, 100).status(),
            StatusCode::UnsupportedMediaType
        );

        let req = submit_request("chat=1", "image/png", b"");
        assert_eq!(submit_handler(&req, &dispatcher, 100).status(), StatusCode::BadRequest);
        assert_eq!(dispatcher.stats().counters.submitted, 0);
        blocked.open();
    }

    #[test]
    fn test_submit_too_large() {
        let (dispatcher, blocked) = dispatcher(10);
        let req = submit_request("chat=1", "image/png", &[0u8; 16]);

        assert_eq!(submit_handler(&req, &dispatcher, 8).status(), StatusCode::PayloadTooLarge);
        blocked.open();
    }

    #[test]
    fn test_submit_derives_id_from_content() {
        let (dispatcher, blocked) = dispatcher(10);
        let req = submit_request("chat=1", "image/png", b"pixels");

        let response = submit_handler(&req, &dispatcher, 100);
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body_json(&response)["job_id"], JobId::from_content(b"pixels").as_str());
        blocked.open();
    }

    #[test]
    fn test_submit_duplicate_and_queue_full() {
        let (dispatcher, blocked) = dispatcher(1);

        // "a" ocupa el único slot, "b" llena la cola
        let a = submit_request("chat=1&file_id=a", "image/png", b"1");
        let b = submit_request("chat=1&file_id=b", "image/png", b"2");
        let c = submit_request("chat=1&file_id=c", "image/png", b"3");
        assert_eq!(submit_handler(&a, &dispatcher, 100).status(), StatusCode::Ok);
        assert_eq!(submit_handler(&b, &dispatcher, 100).status(), StatusCode::Ok);

        assert_eq!(submit_handler(&b, &dispatcher, 100).status(), StatusCode::Conflict);

        let full = submit_handler(&c, &dispatcher, 100);
        assert_eq!(full.status(), StatusCode::ServiceUnavailable);
        assert_eq!(full.header("Retry-After"), Some("30"));
        blocked.open();
    }

    #[test]
    fn test_status_variant_and_cancel() {
        let (dispatcher, blocked) = dispatcher(10);
        submit_handler(&submit_request("chat=1&file_id=run", "image/png", b"1"), &dispatcher, 100);
        submit_handler(&submit_request("chat=1&file_id=wait", "image/png", b"2"), &dispatcher, 100);

        let req = Request::parse(b"GET /jobs/status?id=wait HTTP/1.0\r\n\r\n").unwrap();
        let status = status_handler(&req, &dispatcher);
        assert_eq!(body_json(&status)["state"], "queued");
        assert_eq!(body_json(&status)["position"], 0);

        let req = Request::parse(b"POST /jobs/variant?id=wait&variant=people HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(variant_handler(&req, &dispatcher).status(), StatusCode::Ok);

        let req = Request::parse(b"POST /jobs/variant?id=wait&variant=cats HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(variant_handler(&req, &dispatcher).status(), StatusCode::BadRequest);

        let req = Request::parse(b"POST /jobs/cancel?id=run HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(cancel_handler(&req, &dispatcher).status(), StatusCode::Conflict);

        let req = Request::parse(b"POST /jobs/cancel?id=wait HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(cancel_handler(&req, &dispatcher).status(), StatusCode::Ok);

        let req = Request::parse(b"GET /jobs/status?id=wait HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(status_handler(&req, &dispatcher).status(), StatusCode::NotFound);
        blocked.open();
    }

    #[test]
    fn test_callback_handler() {
        let (dispatcher, blocked) = dispatcher(10);

        let req = Request::parse(b"POST /jobs/callback?data=bogus HTTP/1.0\r\n\r\n").unwrap();
        let response = callback_handler(&req, &dispatcher);
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body_json(&response)["reply"], texts::INTERACTION_ERROR);

        let req = Request::parse(b"POST /jobs/callback?data=cancel_missing HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(body_json(&callback_handler(&req, &dispatcher))["reply"], texts::NOT_FOUND);
        blocked.open();
    }

    #[test]
    fn test_stats_and_help() {
        let (dispatcher, blocked) = dispatcher(10);
        let req = Request::parse(b"GET /jobs/stats HTTP/1.0\r\n\r\n").unwrap();

        let stats = body_json(&stats_handler(&req, &dispatcher));
        assert_eq!(stats["capacity"], 1);
        assert_eq!(stats["submitted"], 0);

        let help = body_json(&help_handler(&req));
        assert_eq!(help["variants"].as_array().unwrap().len(), 4);
        blocked.open();
    }
}
