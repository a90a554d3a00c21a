//! Collaborator seams and side-effecting adapters for the edit pipeline.

pub mod access;
pub mod approval;
pub mod channel;
pub mod config;
pub mod diagnostics;
pub mod fs;
pub mod strategy;
pub mod surface;
pub mod timeout;
pub mod tracker;
