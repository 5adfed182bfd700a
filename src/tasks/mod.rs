//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache Cleanup: Runs the memory backend maintenance pass at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
