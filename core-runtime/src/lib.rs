//! # Core Runtime Module
//!
//! Provides the ambient runtime infrastructure of the assembly engine:
//! - Logging and tracing infrastructure, including per sector job spans
//! - Configuration with fail-fast validation of collaborators
//! - Event bus broadcasting job progress
//! - Prometheus metrics for job timings and outcomes
//!
//! ## Overview
//!
//! Nothing in here knows how sectors are synced. The scheduler in
//! `core-assembly` is configured through [`config::AssemblyConfig`], reports
//! through [`events::EventBus`] and [`metrics::AssemblyMetrics`], and logs
//! inside [`logging::sector_span`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;

pub use config::{AssemblyConfig, AssemblyConfigBuilder};
pub use error::{Error, Result};
pub use events::{AssemblyEvent, EventBus, EventSeverity, EventStream};
pub use metrics::AssemblyMetrics;
