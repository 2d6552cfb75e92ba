//! Command implementations.

pub mod build;
pub mod files;
pub mod validate;
