//! Database Backend Abstractions
//!
//! The engine only needs to run select statements. [`StatementExecutor`] is
//! that seam; [`MemoryDatabase`] and [`PostgresExecutor`] implement it.

pub mod core;
pub mod memory;
pub mod postgres;

// Re-export core traits and types
pub use core::*;
pub use memory::MemoryDatabase;
pub use postgres::PostgresExecutor;
