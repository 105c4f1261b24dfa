//! Shared types for OCE components.
//!
//! Wire types for the daemon API, request hints, the run summary,
//! and the session notes store.

pub mod error;
pub mod hints;
pub mod notes;
pub mod rpc;
pub mod summary;

pub use error::OceError;
pub use hints::Hints;
pub use notes::{JsonlNoteStore, MemoryNoteStore, NoteStore, SessionNote};
pub use rpc::{
    ErrorBody, ErrorDetail, NoteWrite, NotesResponse, PurgeResponse, RunRequest, RunResponse,
    Telemetry,
};
pub use summary::{ModuleKind, ModuleOutput, ModuleResult, Summary};

/// Default daemon address
pub const DEFAULT_BIND: &str = "127.0.0.1:7870";
