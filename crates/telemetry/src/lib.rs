//! Engine health tracking and request auditing for simulai.
//!
//! Two halves:
//! - [`health`]: the per-engine metrics fold and the stateless selection
//!   policy that reads it to pick a primary and a fallback engine.
//! - [`logger`]: the request logger, which appends one audit row per request
//!   and folds every provider attempt into that engine's metrics.
//!
//! Both work only through the `MetricsStore` / `RequestLogStore` seams, so
//! concurrent requests race on read-then-write and the last write wins.

pub mod health;
pub mod logger;

pub use health::{EngineSelection, HealthRegistry, apply_attempt, select_engines};
pub use logger::RequestLogger;
