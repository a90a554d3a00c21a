//! Deterministic, pure logic shared by the edit pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod decorations;
pub mod diagnostics;
pub mod messages;
pub mod mistakes;
pub mod text;
pub mod types;
