//! Background Tasks Module
//!
//! Threads and tasks that run alongside the cache engine.
//!
//! # Tasks
//! - Worker pool: runs population work and the start-up load
//! - Stale purge: removes stale entries from memory at configured intervals

mod pool;
mod purge;

pub use pool::WorkerPool;
pub use purge::spawn_purge_task;
