//! Descriptive analytics over the sample store
//!
//! - [`patterns`]: hour-of-day and day-of-week profiles (feed the recommender)
//! - [`history`]: per-date statistics, comparisons and the latest move

pub mod history;
pub mod patterns;

pub use history::{compare_days, DailyComparison, DailyHistory, DailyStats, RateChange, Trend};
pub use patterns::{
    hourly_insights, weekly_insights, DayOfWeekPattern, HourlyInsights, HourlyPattern,
    PatternAnalyzer, WeeklyInsights,
};
