//! # ratewatch
//!
//! Retention, pattern analysis and exchange recommendations for a single
//! exchange-rate time series (USD quoted in CNY).
//!
//! ## Architecture
//!
//! ```text
//!   poller (external) ──▶ exchange_rates ──┬──▶ RetentionEngine ──▶ hourly_rates / daily_rates
//!                                          │
//!                                          ├──▶ PatternAnalyzer ──▶ RecommendationEngine
//!                                          │
//!                                          └──▶ DailyHistory / alerts
//! ```
//!
//! All engines reach storage through [`store::SampleStore`] and take their
//! time zones and clock by injection.

pub mod alerts;
pub mod analytics;
pub mod clock;
pub mod config;
pub mod error;
pub mod persistence;
pub mod recommender;
pub mod retention;
pub mod sqlite_pragma;
pub mod stats;
pub mod store;

pub use error::{RateWatchError, Result};
