use std::ops::RangeInclusive;

use derive_new::new;
use serde::{Deserialize, Serialize};

use super::Timestamp;

/// A single scoring event. Ratings are append-only and never change once written.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Rating {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub percentage: u8,
    pub created_at: Timestamp,
}

impl Rating {
    pub const PERCENTAGE_RANGE: RangeInclusive<u8> = 1..=100;
}
