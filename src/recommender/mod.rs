//! Explainable "exchange now / wait / neutral" recommendations
//!
//! Everything is recomputed from the sample store on each call:
//! percentile → 30-day context → next-hour predictions → optimal window →
//! weighted score → action, risk/reward and next check time.

pub mod engine;
pub mod scoring;
pub mod types;

pub use engine::{RecommendationEngine, RecommenderSettings};
pub use types::{
    Action, Confidence, HistoricalContext, HourPrediction, RateRanking, Recommendation,
    RiskLevel, RiskReward, TimeWindow,
};
