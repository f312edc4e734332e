//! # Outbox de Notificaciones
//! src/outbox.rs
//!
//! `NotificationSink` en memoria: guarda los mensajes de estado de cada chat
//! para que el cliente los consulte por HTTP.
//!
//! - `GET /notifications?chat=CHAT` - mensajes del chat, en orden
//! - `GET /notifications/artifact?message=N` - imagen adjunta a un mensaje
//!
//! Los handles son el id numérico del mensaje. Editar un mensaje reemplaza
//! su texto y sus opciones; editar un handle desconocido falla con
//! `UnknownHandle` y el `Notifier` cae a un mensaje nuevo.

use crate::error::NotificationDeliveryError;
use crate::http::{Request, Response, StatusCode};
use crate::jobs::{Artifact, ChatContext, InteractiveOption, Notification, NotificationSink, StatusHandle};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Metadatos del artefacto adjunto; los bytes se sirven aparte
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub filename: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboxMessage {
    pub id: u64,
    pub text: String,
    pub options: Vec<InteractiveOption>,
    pub artifact: Option<ArtifactInfo>,
    pub edits: u32,
}

#[derive(Default)]
struct Mailboxes {
    by_chat: HashMap<ChatContext, Vec<OutboxMessage>>,
    artifacts: HashMap<u64, Artifact>,
}

#[derive(Default)]
pub struct OutboxSink {
    next_id: AtomicU64,
    mailboxes: Mutex<Mailboxes>,
}

impl OutboxSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Mailboxes> {
        self.mailboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mensajes de un chat en orden de envío
    pub fn messages(&self, context: &ChatContext) -> Vec<OutboxMessage> {
        self.lock().by_chat.get(context).cloned().unwrap_or_default()
    }

    pub fn artifact(&self, message_id: u64) -> Option<Artifact> {
        self.lock().artifacts.get(&message_id).cloned()
    }

    fn parse_handle(handle: &StatusHandle) -> Result<u64, NotificationDeliveryError> {
        handle
            .as_str()
            .parse()
            .map_err(|_| NotificationDeliveryError::UnknownHandle(handle.as_str().to_string()))
    }
}

impl NotificationSink for OutboxSink {
    fn notify(
        &self,
        handle: Option<&StatusHandle>,
        context: &ChatContext,
        notification: &Notification,
    ) -> Result<StatusHandle, NotificationDeliveryError> {
        let artifact_info = notification.artifact.as_ref().map(|artifact| ArtifactInfo {
            filename: artifact.filename.clone(),
            size: artifact.bytes.len(),
        });
        let mut mailboxes = self.lock();

        let id = match handle {
            Some(handle) => {
                let id = Self::parse_handle(handle)?;
                let message = mailboxes
                    .by_chat
                    .get_mut(context)
                    .and_then(|messages| messages.iter_mut().find(|m| m.id == id))
                    .ok_or_else(|| NotificationDeliveryError::UnknownHandle(handle.as_str().to_string()))?;

                message.text = notification.text.clone();
                message.options = notification.options.clone();
                message.edits += 1;
                if artifact_info.is_some() {
                    message.artifact = artifact_info;
                }
                id
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                mailboxes
                    .by_chat
                    .entry(context.clone())
                    .or_default()
                    .push(OutboxMessage {
                        id,
                        text: notification.text.clone(),
                        options: notification.options.clone(),
                        artifact: artifact_info,
                        edits: 0,
                    });
                id
            }
        };

        if let Some(artifact) = &notification.artifact {
            mailboxes.artifacts.insert(id, artifact.clone());
        }
        tracing::debug!(chat = %context, message = id, "notificación almacenada");

        Ok(StatusHandle::new(id.to_string()))
    }
}

/// Handler para /notifications?chat=CHAT
pub fn notifications_handler(req: &Request, outbox: &OutboxSink) -> Response {
    let Some(chat) = req.query_param("chat") else {
        return Response::error(StatusCode::BadRequest, "Missing required parameter: chat");
    };
    let context = ChatContext::new(chat);
    Response::ok(&serde_json::json!({
        "chat": chat,
        "messages": outbox.messages(&context),
    }))
}

/// Handler para /notifications/artifact?message=N
pub fn artifact_handler(req: &Request, outbox: &OutboxSink) -> Response {
    let Some(raw) = req.query_param("message") else {
        return Response::error(StatusCode::BadRequest, "Missing required parameter: message");
    };
    let Ok(message_id) = raw.parse::<u64>() else {
        return Response::error(StatusCode::BadRequest, &format!("Invalid message id: {}", raw));
    };

    match outbox.artifact(message_id) {
        Some(artifact) => Response::new(StatusCode::Ok)
            .with_header("Content-Type", "image/png")
            .with_header(
                "Content-Disposition",
                &format!("attachment; filename=\"{}\"", artifact.filename),
            )
            .with_body_bytes(artifact.bytes),
        None => Response::error(StatusCode::NotFound, "No artifact for this message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> ChatContext {
        ChatContext::new("42")
    }

    #[test]
    fn test_new_messages_get_increasing_handles() {
        let outbox = OutboxSink::new();
        let first = outbox.notify(None, &chat(), &Notification::text("a")).unwrap();
        let second = outbox.notify(None, &chat(), &Notification::text("b")).unwrap();

        assert_eq!(first.as_str(), "1");
        assert_eq!(second.as_str(), "2");
        let texts: Vec<_> = outbox.messages(&chat()).into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_edit_replaces_text_and_options() {
        let outbox = OutboxSink::new();
        let notification = Notification::text("queued")
            .with_options(vec![InteractiveOption::new("Cancel", "cancel_x")]);
        let handle = outbox.notify(None, &chat(), &notification).unwrap();

        let edited = outbox
            .notify(Some(&handle), &chat(), &Notification::text("processing"))
            .unwrap();

        assert_eq!(edited, handle);
        let messages = outbox.messages(&chat());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "processing");
        assert!(messages[0].options.is_empty());
        assert_eq!(messages[0].edits, 1);
    }

    #[test]
    fn test_edit_unknown_handle() {
        let outbox = OutboxSink::new();
        let result = outbox.notify(Some(&StatusHandle::new("99")), &chat(), &Notification::text("x"));
        assert!(matches!(result, Err(NotificationDeliveryError::UnknownHandle(_))));

        let result = outbox.notify(Some(&StatusHandle::new("nope")), &chat(), &Notification::text("x"));
        assert!(matches!(result, Err(NotificationDeliveryError::UnknownHandle(_))));
    }

    #[test]
    fn test_handles_are_scoped_to_chat() {
        let outbox = OutboxSink::new();
        let handle = outbox.notify(None, &chat(), &Notification::text("a")).unwrap();

        let other = ChatContext::new("7");
        let result = outbox.notify(Some(&handle), &other, &Notification::text("b"));
        assert!(matches!(result, Err(NotificationDeliveryError::UnknownHandle(_))));
    }

    #[test]
    fn test_artifact_is_stored() {
        let outbox = OutboxSink::new();
        let artifact = Artifact {
            filename: "no_background_abc.png".to_string(),
            bytes: vec![1, 2, 3],
        };
        let handle = outbox
            .notify(None, &chat(), &Notification::text("done").with_artifact(artifact.clone()))
            .unwrap();

        let id: u64 = handle.as_str().parse().unwrap();
        assert_eq!(outbox.artifact(id), Some(artifact));
        let info = outbox.messages(&chat())[0].artifact.clone().unwrap();
        assert_eq!(info.size, 3);
    }

    #[test]
    fn test_notifications_handler() {
        let outbox = OutboxSink::new();
        outbox.notify(None, &chat(), &Notification::text("hello")).unwrap();

        let req = Request::parse(b"GET /notifications?chat=42 HTTP/1.0\r\n\r\n").unwrap();
        let response = notifications_handler(&req, &outbox);
        assert_eq!(response.status(), StatusCode::Ok);

        let value: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(value["messages"][0]["text"], "hello");
    }

    #[test]
    fn test_artifact_handler_errors() {
        let outbox = OutboxSink::new();

        let req = Request::parse(b"GET /notifications/artifact HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(artifact_handler(&req, &outbox).status(), StatusCode::BadRequest);

        let req = Request::parse(b"GET /notifications/artifact?message=x HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(artifact_handler(&req, &outbox).status(), StatusCode::BadRequest);

        let req = Request::parse(b"GET /notifications/artifact?message=5 HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(artifact_handler(&req, &outbox).status(), StatusCode::NotFound);
    }
}
