//! Background Tasks Module
//!
//! Contains background tasks that run periodically during daemon operation.
//!
//! # Tasks
//! - Autosave: Persists both caches at a configured interval

mod autosave;

pub use autosave::spawn_autosave_task;
