//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! store + remote + form produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms through the metrics facade)
//!
//! Consumers:
//!     → stderr via tracing-subscriber (CLI)
//!     → whatever metrics recorder the embedding process installs
//! ```

pub mod logging;
pub mod metrics;
