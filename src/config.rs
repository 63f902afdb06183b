use std::env;

use chrono::NaiveTime;
use dotenvy::dotenv;

use crate::recon::ReconPolicy;
use crate::scheduler::SchedulerConfig;

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub database_url: String,

    // Reconciliation policy
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub grace_minutes: i64,
    pub full_day_minutes: i64,
    pub half_day_minutes: i64,

    // Scheduler windows
    pub lookback_minutes: i64,
    pub forced_lookback_days: i64,
    pub sweep_interval_secs: u64,

    // Rate limiting
    pub rate_sync_per_min: u32,

    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            shift_start: env_time("SHIFT_START", "09:00"),
            shift_end: env_time("SHIFT_END", "17:00"),
            grace_minutes: env_num("GRACE_MINUTES", 15),
            full_day_minutes: env_num("FULL_DAY_MINUTES", 480),
            half_day_minutes: env_num("HALF_DAY_MINUTES", 240),

            lookback_minutes: env_num("LOOKBACK_MINUTES", 10),
            forced_lookback_days: env_num("FORCED_LOOKBACK_DAYS", 7),
            sweep_interval_secs: env_num("SWEEP_INTERVAL_SECS", 300),

            rate_sync_per_min: env_num("RATE_SYNC_PER_MIN", 30),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
        }
    }

    pub fn recon_policy(&self) -> ReconPolicy {
        ReconPolicy {
            shift_start: self.shift_start,
            shift_end: self.shift_end,
            grace_minutes: self.grace_minutes,
            full_day_minutes: self.full_day_minutes,
            half_day_minutes: self.half_day_minutes,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            narrow_lookback: chrono::Duration::minutes(self.lookback_minutes),
            wide_lookback: chrono::Duration::days(self.forced_lookback_days),
            sweep_interval: std::time::Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_time(key: &str, default: &str) -> NaiveTime {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .unwrap_or_else(|_| panic!("{key} must be HH:MM, got {raw}"))
}
