use derive_new::new;
use serde::{Deserialize, Serialize};

use super::Timestamp;

/// Running aggregate of every rating recorded for one user.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct UserStats {
    pub user_id: String,
    /// The most recently seen username for this user.
    pub username: String,
    pub total_checks: i64,
    pub avg_percentage: f64,
    pub max_percentage: u8,
    pub last_check: Timestamp,
}

/// Aggregate over the whole rating log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize, new)]
pub struct GlobalStats {
    pub total_checks: i64,
    pub unique_users: i64,
    pub average_percentage: f64,
}

impl GlobalStats {
    /// Builds the aggregate from raw query output, rounding the mean to two decimals.
    /// An empty log has no mean, which is reported as zero.
    pub fn from_log(total_checks: i64, unique_users: i64, average: Option<f64>) -> Self {
        let average_percentage = average
            .map(|avg| (avg * 100.0).round() / 100.0)
            .unwrap_or_default();

        Self::new(total_checks, unique_users, average_percentage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, new)]
pub struct GlobalStatsReport {
    #[serde(flatten)]
    pub stats: GlobalStats,
    pub storage_available: bool,
}
