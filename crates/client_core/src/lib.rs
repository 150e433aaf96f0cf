//! Client-side state synchronization for a server-authoritative quiz.
//!
//! The authority owns every session fact. This crate keeps a local view
//! converged with it by polling and deadline-aligned fetches, gates stale
//! snapshots by revision, and drives a countdown into each question that
//! ends at the authority's own timestamp.

pub mod clock;
pub mod config;
pub mod countdown;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod gate;
pub mod rematch;
pub mod remote;
mod retry;
pub mod session;
pub mod ticker;
pub mod timers;
pub mod view;

pub use clock::{Clock, MonotonicClock, SystemClock};
pub use config::{EngineConfig, RetryPolicy};
pub use engine::{EngineCommand, SyncEngine};
pub use error::SyncError;
pub use gate::FetchMode;
pub use remote::{Connectivity, HttpImageLoader, HttpQuizApi, QuizApi};
pub use ticker::Progress;
pub use view::{Background, ImageLoader, RematchPanel, Screen, SessionView};
