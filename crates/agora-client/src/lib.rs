//! Client for streamed agent runs.
//!
//! [`send::send_message`] drives one turn: it opens a run through a
//! [`transport::RunService`], folds the event stream into a
//! [`reconcile::ReconciliationResult`], and recovers from lost sessions.

pub mod audit;
pub mod error;
pub mod event;
pub mod reconcile;
pub mod send;
pub mod session;
pub mod sink;
pub mod transport;

pub use audit::StreamAuditLog;
pub use error::RunError;
pub use event::{StreamEvent, StreamEventKind};
pub use reconcile::{ReconciliationResult, Reconciler};
pub use send::{Attempt, SendOptions, send_message};
pub use session::SessionManager;
pub use sink::{NullSink, StreamSink};
pub use transport::{CreatedSession, EventStream, HttpRunService, RunRequest, RunService};
