//! ratewatch - operator commands over the rate database
//!
//! Usage:
//!   ratewatch retention [--dry-run]      Run one retention pass
//!   ratewatch retention-daemon           Run retention every RATEWATCH_RETENTION_INTERVAL_SECS
//!   ratewatch stats                      Row counts and oldest date per tier
//!   ratewatch patterns [--days N] [--weeks N]
//!   ratewatch recommend [--amount USD]
//!   ratewatch rank --rate R [--days N]
//!   ratewatch daily [--days N]
//!   ratewatch alerts                     Check the latest sample against alert rules
//!
//! Results are written to stdout as JSON; logs go to stderr.
//! Configuration comes from RATEWATCH_* environment variables (see config.rs).

use log::{error, info, warn};
use ratewatch::{
    alerts::{check, dispatch, LogNotifier, Notifier},
    analytics::{compare_days, hourly_insights, weekly_insights, DailyHistory, PatternAnalyzer},
    config::RateWatchConfig,
    persistence::{load_alert_state, save_alert_state},
    recommender::RecommendationEngine,
    retention::RetentionEngine,
    store::{SampleStore, SqliteSampleStore},
    RateWatchError,
};
use serde::Serialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{interval, Duration};

fn flag_value<T: FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|idx| args.get(idx + 1))
        .and_then(|v| v.parse().ok())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: ratewatch <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  retention [--dry-run]");
    eprintln!("  retention-daemon");
    eprintln!("  stats");
    eprintln!("  patterns [--days N] [--weeks N]");
    eprintln!("  recommend [--amount USD]");
    eprintln!("  rank --rate R [--days N]");
    eprintln!("  daily [--days N]");
    eprintln!("  alerts");
}

fn open_store(db_path: &str) -> Result<Arc<SqliteSampleStore>, Box<dyn std::error::Error>> {
    if let Some(parent) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Arc::new(SqliteSampleStore::open(db_path)?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = match args.first() {
        Some(c) => c.as_str(),
        None => {
            print_usage();
            std::process::exit(2);
        }
    };

    let config = RateWatchConfig::from_env();
    let zones = config.time_zones()?;

    info!("🚀 ratewatch {}", command);
    info!("   ├─ Database: {}", config.db_path);
    info!(
        "   └─ Zones: partition {} / reference {}",
        zones.partition, zones.reference
    );

    let store = open_store(&config.db_path)?;

    match command {
        "retention" => {
            let engine = RetentionEngine::new(store, zones);
            let dry_run = args.iter().any(|a| a == "--dry-run");
            let summary = engine.run_policy(
                config.raw_retention_days,
                config.hourly_retention_days,
                dry_run,
            )?;
            if !summary.failed_dates.is_empty() {
                warn!("⚠️  Failed partitions: {:?}", summary.failed_dates);
            }
            print_json(&summary)?;
        }
        "retention-daemon" => {
            let engine = Arc::new(RetentionEngine::new(store, zones));
            run_retention_daemon(engine, &config).await;
        }
        "stats" => {
            let engine = RetentionEngine::new(store, zones);
            print_json(&engine.stats()?)?;
        }
        "patterns" => {
            let days = flag_value(&args, "--days").unwrap_or(30);
            let weeks = flag_value(&args, "--weeks").unwrap_or(4);
            let analyzer = PatternAnalyzer::new(store, zones);
            let hourly = analyzer.hourly_patterns(days)?;
            let weekly = analyzer.day_of_week_patterns(weeks)?;
            print_json(&serde_json::json!({
                "lookback_days": days,
                "lookback_weeks": weeks,
                "hourly_insights": hourly_insights(&hourly),
                "weekly_insights": weekly_insights(&weekly),
                "hourly": hourly,
                "weekly": weekly,
            }))?;
        }
        "recommend" => {
            let amount = flag_value(&args, "--amount").unwrap_or(0.0);
            let engine = RecommendationEngine::new(store, zones, config.recommender_settings()?);
            let recommendation = engine.recommend(amount)?;
            info!(
                "🎯 {} ({}), score {:.0}",
                recommendation.action.as_str(),
                recommendation.confidence.as_str(),
                recommendation.confidence_score
            );
            print_json(&recommendation)?;
        }
        "rank" => {
            let rate: f64 = match flag_value(&args, "--rate") {
                Some(r) => r,
                None => {
                    print_usage();
                    std::process::exit(2);
                }
            };
            let days = flag_value(&args, "--days").unwrap_or(30);
            let engine = RecommendationEngine::new(store, zones, config.recommender_settings()?);
            let percentile = engine.percentile_rank(rate, days)?;
            let ranking = engine.ranking(rate, days)?;
            print_json(&serde_json::json!({
                "rate": rate,
                "days": days,
                "percentile": percentile,
                "ranking": ranking,
                "label": ranking.label(),
            }))?;
        }
        "daily" => {
            let days = flag_value(&args, "--days").unwrap_or(7);
            let history = DailyHistory::new(store, zones);
            let stats = history.recent_stats(days)?;
            print_json(&serde_json::json!({
                "days": stats,
                "comparison": compare_days(&stats),
                "latest_change": history.latest_change()?,
            }))?;
        }
        "alerts" => {
            run_alert_check(store, &config).await?;
        }
        other => {
            error!("❌ Unknown command: {}", other);
            print_usage();
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn run_retention_daemon(engine: Arc<RetentionEngine>, config: &RateWatchConfig) {
    let raw_days = config.raw_retention_days;
    let hourly_days = config.hourly_retention_days;

    info!(
        "⏱️  Retention daemon: every {}s (raw {}d, hourly {}d)",
        config.retention_interval_secs, raw_days, hourly_days
    );

    let mut ticker = interval(Duration::from_secs(config.retention_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let engine = engine.clone();
                let result = tokio::task::spawn_blocking(move || {
                    engine.run_policy(raw_days, hourly_days, false)
                })
                .await;

                match result {
                    Ok(Ok(summary)) => {
                        if !summary.failed_dates.is_empty() {
                            warn!("⚠️  {} partitions left for the next pass", summary.failed_dates.len());
                        }
                    }
                    Ok(Err(e)) => error!("❌ Retention pass failed: {}", e),
                    Err(e) => error!("❌ Retention task panicked: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Shutdown signal received, stopping retention daemon");
                break;
            }
        }
    }
}

async fn run_alert_check(
    store: Arc<SqliteSampleStore>,
    config: &RateWatchConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let zones = config.time_zones()?;
    let latest = store
        .latest()?
        .ok_or_else(|| RateWatchError::NoData("no data available".to_string()))?;

    let state = load_alert_state(&config.alert_state_path)?;
    if state.last_rate.map(|l| l.at) == Some(latest.collected_at) {
        info!("✅ Latest sample already checked, nothing to do");
        print_json(&Vec::<ratewatch::alerts::Alert>::new())?;
        return Ok(());
    }

    let hour = zones.reference_hour(latest.collected_at);
    let patterns = PatternAnalyzer::new(store.clone(), zones).hourly_patterns(30)?;
    let hour_pattern = patterns.iter().find(|p| p.hour == hour);

    let (alerts, state) = check(
        &config.alert_config(),
        state,
        latest.value,
        latest.collected_at,
        hour_pattern,
    );

    let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
    let failures = dispatch(&notifiers, &alerts).await;
    if failures > 0 {
        warn!("⚠️  {} notifications failed", failures);
    }

    save_alert_state(&state, &config.alert_state_path)?;
    info!("✅ {} alerts raised", alerts.len());
    print_json(&alerts)?;
    Ok(())
}
