//! # Sistema de Jobs
//!
//! Núcleo de admisión y despacho: una cola FIFO alimenta un conjunto fijo
//! de slots de ejecución.
//!
//! ```text
//! submit → Job (Queued) → AdmissionQueue + JobStore → aviso de posición
//!        → Dispatcher admite (Running) mientras haya slots
//!        → worker → Succeeded | Failed → slot liberado → re-admisión
//! ```
//!
//! ## Endpoints
//!
//! - `/jobs/submit?chat=CHAT[&file_id=ID]` - Encolar una imagen
//! - `/jobs/status?id=JOBID` - Consultar estado
//! - `/jobs/variant?id=JOBID&variant=NAME` - Cambiar variante
//! - `/jobs/cancel?id=JOBID` - Cancelar job en cola
//! - `/jobs/callback?data=DATA` - Callback de una opción interactiva
//! - `/jobs/stats` - Estadísticas

pub mod dispatcher;
pub mod handlers;
pub mod interaction;
pub mod job;
pub mod notify;
pub mod queue;
pub mod state;
pub mod store;
pub mod types;
pub mod worker;

pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherStats};
pub use job::Job;
pub use notify::{Artifact, InteractiveOption, Notification, NotificationSink, Notifier};
pub use types::{ChatContext, JobId, JobState, Outcome, StatusHandle, Variant};
