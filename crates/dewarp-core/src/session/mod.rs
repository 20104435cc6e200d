//! Session state and transform jobs.
//!
//! A [`Session`] is the single owner of all mutable state. The only slow
//! step, resampling, can be detached as a [`TransformJob`] and its
//! [`TransformOutcome`] handed back through [`Session::accept`], which keeps
//! only the newest generation.

mod job;
mod state;

pub use job::{TransformJob, TransformOutcome};
pub use state::{ImageTarget, Session, SessionState};
