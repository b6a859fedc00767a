//! RecommendationEngine: percentile, context, predictions, decision

use super::scoring::{
    assess_risk_reward, build_context, decide, find_optimal_window, next_check_time,
    predict_next_hours, score,
};
use super::types::{RateRanking, Recommendation};
use crate::analytics::PatternAnalyzer;
use crate::clock::{system_clock, Clock, OperatingHours, TimeZones};
use crate::error::{RateWatchError, Result};
use crate::stats::percentile_rank;
use crate::store::{Sample, SampleStore};
use std::sync::Arc;

const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommenderSettings {
    pub operating_hours: OperatingHours,
    /// From this reference hour on, a window already behind us moves to tomorrow
    pub rollover_hour: u32,
    pub history_days: u32,
    pub min_samples: usize,
    pub hourly_lookback_days: u32,
    pub weekday_lookback_weeks: u32,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            operating_hours: OperatingHours::default(),
            rollover_hour: 20,
            history_days: 30,
            min_samples: 100,
            hourly_lookback_days: 30,
            weekday_lookback_weeks: 4,
        }
    }
}

pub struct RecommendationEngine {
    store: Arc<dyn SampleStore>,
    patterns: PatternAnalyzer,
    zones: TimeZones,
    settings: RecommenderSettings,
    now_fn: Clock,
}

impl RecommendationEngine {
    pub fn new(store: Arc<dyn SampleStore>, zones: TimeZones, settings: RecommenderSettings) -> Self {
        Self::new_with_timestamp_fn(store, zones, settings, system_clock())
    }

    pub fn new_with_timestamp_fn(
        store: Arc<dyn SampleStore>,
        zones: TimeZones,
        settings: RecommenderSettings,
        now_fn: Clock,
    ) -> Self {
        let patterns = PatternAnalyzer::new_with_timestamp_fn(store.clone(), zones, now_fn.clone());
        Self {
            store,
            patterns,
            zones,
            settings,
            now_fn,
        }
    }

    fn history(&self, days: u32) -> Result<Vec<Sample>> {
        let now = (self.now_fn)();
        self.store
            .by_time_range(now - i64::from(days) * SECS_PER_DAY, now)
    }

    /// Build a fresh recommendation. `amount` is in USD; pass 0 to skip the
    /// risk/reward estimate.
    pub fn recommend(&self, amount: f64) -> Result<Recommendation> {
        let latest = self
            .store
            .latest()?
            .ok_or_else(|| RateWatchError::NoData("no data available".to_string()))?;
        let current_rate = latest.value;

        let history = self.history(self.settings.history_days)?;
        if history.len() < self.settings.min_samples {
            return Err(RateWatchError::InsufficientData {
                required: self.settings.min_samples,
                available: history.len(),
            });
        }
        let values: Vec<f64> = history.iter().map(|s| s.value).collect();

        let now = self.zones.reference_time((self.now_fn)());
        let hourly = self
            .patterns
            .hourly_patterns(self.settings.hourly_lookback_days)?;
        let weekday = self
            .patterns
            .day_of_week_patterns(self.settings.weekday_lookback_weeks)?;

        let percentile = percentile_rank(current_rate, &values);
        let context = build_context(&values, &hourly, &weekday, &now);
        let predictions = predict_next_hours(
            context.current_hour,
            current_rate,
            context.hourly_avg_rate,
            &hourly,
            &self.settings.operating_hours,
            self.settings.hourly_lookback_days,
        );
        let window = find_optimal_window(
            &now,
            &predictions,
            &self.settings.operating_hours,
            self.settings.rollover_hour,
        );

        let scored = score(
            current_rate,
            percentile,
            context.hourly_avg_rate,
            window.as_ref(),
            &now,
        );
        let (action, confidence) = decide(scored.total);
        let risk_reward = assess_risk_reward(amount, current_rate, window.as_ref(), &context);
        let next_check_time = next_check_time(&now, action, window.as_ref());

        log::debug!(
            "🎯 Recommendation: {} ({}) score={:.0} percentile={:.1} rate={:.4}",
            action.as_str(),
            confidence.as_str(),
            scored.total,
            percentile,
            current_rate
        );

        Ok(Recommendation {
            action,
            confidence,
            confidence_score: scored.total.clamp(0.0, 100.0),
            current_rate,
            percentile_rank: percentile,
            amount: amount.max(0.0),
            converted_amount: amount.max(0.0) * current_rate,
            predictions,
            optimal_window: window,
            reasoning: scored.reasoning,
            risk_reward,
            next_check_time,
            context,
        })
    }

    /// Percentile (0-100) of `rate` among the samples of the last `days`
    pub fn percentile_rank(&self, rate: f64, days: u32) -> Result<f64> {
        let values: Vec<f64> = self.history(days)?.iter().map(|s| s.value).collect();
        if values.is_empty() {
            return Err(RateWatchError::NoData("no historical data available".to_string()));
        }
        Ok(percentile_rank(rate, &values))
    }

    pub fn ranking(&self, rate: f64, days: u32) -> Result<RateRanking> {
        Ok(RateRanking::from_percentile(self.percentile_rank(rate, days)?))
    }
}
