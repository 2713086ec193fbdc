//! Per-role submission statistics over calendar windows.
//!
//! Windows are calendar-aligned in one reference zone: the same local day,
//! the same ISO week (week number and week-year), or the same month of the
//! same year as "now".

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;

use crate::error::LeadError;
use crate::scope::{scoped_duplicates, visible_customers};
use crate::store::LeadStore;
use crate::types::{StatsRange, StatsSummary, User};

/// True when `at` falls in the same `range` window as `now`, both read in `tz`.
pub fn in_window(range: StatsRange, at: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> bool {
    let at = at.with_timezone(&tz);
    let now = now.with_timezone(&tz);
    match range {
        StatsRange::Daily => at.date_naive() == now.date_naive(),
        StatsRange::Weekly => at.iso_week() == now.iso_week(),
        StatsRange::Monthly => at.year() == now.year() && at.month() == now.month(),
    }
}

pub struct StatsAggregator {
    store: Arc<dyn LeadStore>,
    tz: Tz,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn LeadStore>, tz: Tz) -> Self {
        Self { store, tz }
    }

    pub fn stats(&self, user: &User, range: StatsRange) -> Result<StatsSummary, LeadError> {
        self.stats_at(user, range, Utc::now())
    }

    /// Counts for the window containing `now`.
    pub fn stats_at(
        &self,
        user: &User,
        range: StatsRange,
        now: DateTime<Utc>,
    ) -> Result<StatsSummary, LeadError> {
        let customers: Vec<_> = visible_customers(self.store.as_ref(), user)?
            .into_iter()
            .filter(|c| in_window(range, c.created_at, now, self.tz))
            .collect();
        let duplicate_count = scoped_duplicates(self.store.as_ref(), user)?
            .iter()
            .filter(|d| in_window(range, d.duplicate_at, now, self.tz))
            .count();

        let valid_count = customers
            .iter()
            .map(|c| c.phone_hash.as_str())
            .collect::<HashSet<_>>()
            .len();

        Ok(StatsSummary {
            total_input: customers.len() + duplicate_count,
            duplicate_count,
            valid_count,
        })
    }
}
