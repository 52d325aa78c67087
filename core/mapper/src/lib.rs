//! Crypto-aware mapper for crypto-shredding.
//!
//! This module provides:
//! - Encrypted containers for individual record fields
//! - The mapper that wraps values into containers and resolves them back
//! - Pluggable value codecs and metrics collaborators
//!
//! # Architecture
//! Writes fail loudly: serialization or key creation errors reach the caller.
//! Reads fail softly: a shredded or corrupted field resolves to `None` and is
//! reported to the metrics collaborator, so one erased field never aborts
//! loading the record around it.

pub mod codec;
pub mod config;
pub mod container;
pub mod mapper;
pub mod metrics;

pub use codec::{JsonCodec, ValueCodec};
pub use config::MapperConfig;
pub use container::{Container, ContainerState};
pub use mapper::{CryptoMapper, CryptoMapperBuilder, ResolveOutcome};
pub use metrics::{CountingMetrics, CryptoMetrics, MetricsSnapshot, NopMetrics, TracingMetrics};
