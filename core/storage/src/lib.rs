//! Key repository abstraction for crypto-shredding.
//!
//! This module provides a trait-based interface for storing per-subject keys
//! and two implementations: an in-memory repository and a local filesystem
//! repository.
//!
//! # Design Principles
//! - Single-flight creation: at most one key per (subject, algorithm, size)
//! - Absence is not an error: a missing key means the subject was shredded
//! - Erasure is out-of-band: the mapper never deletes keys, operators do

pub mod local;
pub mod memory;
pub mod repository;

pub use local::LocalKeyRepository;
pub use memory::MemoryKeyRepository;
pub use repository::{KeyId, KeyRepository};
