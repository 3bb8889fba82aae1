//! Default tier records seeded into a fresh strategy configuration.
//!
//! Backup and maintenance windows are configured as a start time; the
//! provider wants a one-hour range in its own notation:
//!
//! ```text
//! backup      "03:01"     -> "03:01-04:01"
//! maintenance "Thu 02:00" -> "thu:02:00-thu:03:00"
//! ```

use serde::Serialize;

use cloudkeep_core::ResourceKind;

use crate::document::{StrategyDocument, StrategyField, TierStrategy};
use crate::error::{StrategyError, StrategyResult};

const DAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Start times for the daily backup and weekly maintenance windows.
#[derive(Debug, Clone)]
pub struct StrategyTimeConfig {
    /// `HH:MM`, UTC.
    pub backup_start_time: String,
    /// `Ddd HH:MM`, UTC.
    pub maintenance_start_time: String,
}

#[derive(Serialize)]
struct PostgresCreateStrategy {
    #[serde(rename = "PreferredBackupWindow")]
    backup_window: String,
    #[serde(rename = "PreferredMaintenanceWindow")]
    maintenance_window: String,
}

#[derive(Serialize)]
struct RedisCreateStrategy {
    #[serde(rename = "SnapshotWindow")]
    snapshot_window: String,
    #[serde(rename = "PreferredMaintenanceWindow")]
    maintenance_window: String,
}

#[derive(Serialize)]
struct EmptyStrategy {}

impl StrategyTimeConfig {
    /// One-hour backup window starting at `backup_start_time`.
    pub fn backup_window(&self) -> StrategyResult<String> {
        let (hour, minute) = parse_hh_mm(&self.backup_start_time)?;
        Ok(format!(
            "{hour:02}:{minute:02}-{:02}:{minute:02}",
            (hour + 1) % 24
        ))
    }

    /// One-hour maintenance window starting at `maintenance_start_time`.
    pub fn maintenance_window(&self) -> StrategyResult<String> {
        let value = &self.maintenance_start_time;
        let (day, time) = value
            .split_once(' ')
            .ok_or_else(|| invalid(value, "expected `Ddd HH:MM`"))?;
        let day = day.to_ascii_lowercase();
        let day_index = DAYS
            .iter()
            .position(|d| *d == day)
            .ok_or_else(|| invalid(value, "unknown weekday"))?;
        let (hour, minute) = parse_hh_mm(time)?;

        let (end_day, end_hour) = if hour == 23 {
            (DAYS[(day_index + 1) % DAYS.len()], 0)
        } else {
            (DAYS[day_index], hour + 1)
        };
        Ok(format!(
            "{day}:{hour:02}:{minute:02}-{end_day}:{end_hour:02}:{minute:02}"
        ))
    }

    /// Default tier record for `kind`.
    pub fn default_tier(&self, kind: ResourceKind) -> StrategyResult<TierStrategy> {
        let mut tier = TierStrategy::default();
        match kind {
            ResourceKind::Postgres => tier.set(
                StrategyField::CreateStrategy,
                &PostgresCreateStrategy {
                    backup_window: self.backup_window()?,
                    maintenance_window: self.maintenance_window()?,
                },
            )?,
            ResourceKind::Redis => tier.set(
                StrategyField::CreateStrategy,
                &RedisCreateStrategy {
                    snapshot_window: self.backup_window()?,
                    maintenance_window: self.maintenance_window()?,
                },
            )?,
            ResourceKind::BlobStorage => tier.set(StrategyField::CreateStrategy, &EmptyStrategy {})?,
        }
        tier.set(StrategyField::DeleteStrategy, &EmptyStrategy {})?;
        tier.set(StrategyField::ServiceUpdates, &Vec::<String>::new())?;
        Ok(tier)
    }
}

/// Insert the default record for `tier` unless the document already has one.
/// Returns true if a record was inserted.
pub fn ensure_default_tier(
    document: &mut StrategyDocument,
    kind: ResourceKind,
    tier: &str,
    times: &StrategyTimeConfig,
) -> StrategyResult<bool> {
    if document.tier(tier).is_some() {
        return Ok(false);
    }
    document.insert_tier(tier, times.default_tier(kind)?);
    Ok(true)
}

fn parse_hh_mm(value: &str) -> StrategyResult<(u32, u32)> {
    let (hour, minute) = value
        .split_once(':')
        .ok_or_else(|| invalid(value, "expected `HH:MM`"))?;
    let hour: u32 = hour.parse().map_err(|_| invalid(value, "hour is not a number"))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| invalid(value, "minute is not a number"))?;
    if hour > 23 || minute > 59 {
        return Err(invalid(value, "time out of range"));
    }
    Ok((hour, minute))
}

fn invalid(value: &str, reason: &'static str) -> StrategyError {
    StrategyError::InvalidTimeWindow {
        value: value.to_string(),
        reason,
    }
}
