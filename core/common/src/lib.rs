//! Common utilities and types shared across the crypto-shredding crates.
//!
//! This module provides foundational types that are used throughout the codebase,
//! ensuring consistency and type safety.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{SensitiveBytes, SubjectId};
