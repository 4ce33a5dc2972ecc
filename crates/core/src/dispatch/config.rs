//! Dispatch configuration.

use chrono::{
    DateTime, Days, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Configuration for the dispatch engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchConfig {
    /// How many leading characters of a flight number name the company.
    #[serde(default = "default_company_code_length")]
    pub company_code_length: usize,

    /// Fixed UTC offset defining the calendar day for queue numbering.
    /// When unset, the server's local time zone is used.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,

    /// IANA zone (e.g. "Europe/Paris") defining the calendar day. Takes
    /// precedence over `utc_offset_minutes`.
    #[serde(default)]
    pub time_zone: Option<Tz>,
}

fn default_company_code_length() -> usize {
    2
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            company_code_length: default_company_code_length(),
            utc_offset_minutes: None,
            time_zone: None,
        }
    }
}

impl DispatchConfig {
    pub fn day_boundary(&self) -> DayBoundary {
        if let Some(zone) = self.time_zone {
            return DayBoundary::Zone(zone);
        }
        match self.utc_offset_minutes {
            Some(minutes) => DayBoundary::Fixed(
                FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix()),
            ),
            None => DayBoundary::Local,
        }
    }
}

/// Where one numbering day ends and the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBoundary {
    Local,
    Fixed(FixedOffset),
    Zone(Tz),
}

impl DayBoundary {
    /// The `[start, end)` UTC window of the calendar day containing `now`.
    ///
    /// Both ends are local midnights resolved in the zone itself, so a day
    /// with a DST change is 23 or 25 hours long.
    pub fn day_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            DayBoundary::Local => window_in(&Local, now),
            DayBoundary::Fixed(offset) => window_in(offset, now),
            DayBoundary::Zone(zone) => window_in(zone, now),
        }
    }
}

fn window_in<Z: TimeZone>(zone: &Z, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = now.with_timezone(zone).date_naive();
    let next = day.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
    (start_of_day(zone, day), start_of_day(zone, next))
}

/// First instant of `day` in `zone`.
///
/// When midnight falls in a forward gap the day starts at the first local
/// time that exists, searched in 15 minute steps.
fn start_of_day<Z: TimeZone>(zone: &Z, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    (0..=16)
        .map(|step| midnight + Duration::minutes(15 * step))
        .find_map(|local| zone.from_local_datetime(&local).earliest())
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| {
            let offset = zone.offset_from_utc_datetime(&midnight).fix();
            Utc.from_utc_datetime(
                &(midnight - Duration::seconds(i64::from(offset.local_minus_utc()))),
            )
        })
}
