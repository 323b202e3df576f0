//! Image cadences and the timestamp sequence they produce.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MerraError, MerraResult};

/// Temporal sampling pattern of the source images.
///
/// Sub-daily cadences sample the 24 hourly images of a day file at every
/// n-th hour, starting at midnight: hourly gives 00:30, 01:30, ..., 23:30 and
/// six-hourly gives 00:30, 06:30, 12:30 and 18:30.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cadence {
    Hourly,
    SixHourly,
    /// Every n hours for the other divisors of 24 below 24
    Hours(HourStep),
    /// One image per day, at 00:30
    Daily,
    /// One image per calendar month, anchored to the first day
    Monthly,
}

/// Sub-daily sampling step that divides 24 and is not 1, 6 or 24.
///
/// Only [`Cadence::every_hours`] creates one, so every `Hours` cadence has a
/// single spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct HourStep(u32);

impl HourStep {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for HourStep {
    type Error = MerraError;

    fn try_from(hours: u32) -> Result<Self, Self::Error> {
        match Cadence::every_hours(hours)? {
            Cadence::Hours(step) => Ok(step),
            other => Err(MerraError::InvalidCadence(format!(
                "{} hours is the {} cadence",
                hours, other
            ))),
        }
    }
}

impl From<HourStep> for u32 {
    fn from(step: HourStep) -> Self {
        step.0
    }
}

impl Cadence {
    /// Create a sub-daily cadence sampling every `hours` hours.
    ///
    /// `hours` must divide 24 so that every day samples the same hours.
    pub fn every_hours(hours: u32) -> MerraResult<Self> {
        match hours {
            1 => Ok(Cadence::Hourly),
            6 => Ok(Cadence::SixHourly),
            24 => Ok(Cadence::Daily),
            n if n > 0 && 24 % n == 0 => Ok(Cadence::Hours(HourStep(n))),
            _ => Err(MerraError::InvalidCadence(format!(
                "sampling interval must divide 24 hours, got {}",
                hours
            ))),
        }
    }

    /// Sampling step in hours, `None` for the monthly cadence.
    pub fn step_hours(&self) -> Option<u32> {
        match self {
            Cadence::Hourly => Some(1),
            Cadence::SixHourly => Some(6),
            Cadence::Hours(step) => Some(step.get()),
            Cadence::Daily => Some(24),
            Cadence::Monthly => None,
        }
    }

    /// Offsets from midnight of the images sampled in one day.
    fn daily_offsets(step: u32) -> Vec<Duration> {
        (0..24)
            .step_by(step.max(1) as usize)
            .map(|h| Duration::hours(h as i64) + Duration::minutes(30))
            .collect()
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Hourly => write!(f, "hourly"),
            Cadence::SixHourly => write!(f, "6h"),
            Cadence::Hours(step) => write!(f, "{}h", step.get()),
            Cadence::Daily => write!(f, "daily"),
            Cadence::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for Cadence {
    type Err = MerraError;

    /// Accepts `hourly`, `6-hourly`, `daily`, `monthly` and `<n>h`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "hourly" | "1h" => Ok(Cadence::Hourly),
            "6-hourly" | "6hourly" | "6h" => Ok(Cadence::SixHourly),
            "daily" => Ok(Cadence::Daily),
            "monthly" => Ok(Cadence::Monthly),
            other => other
                .strip_suffix('h')
                .and_then(|n| n.parse::<u32>().ok())
                .ok_or_else(|| MerraError::InvalidCadence(s.to_string()))
                .and_then(Cadence::every_hours),
        }
    }
}

/// Inclusive upper bound of a range ending at `end`.
///
/// An end at midnight stands for its whole day, as a date given without a
/// time of day does on the command line.
pub fn inclusive_end(end: DateTime<Utc>) -> DateTime<Utc> {
    if end.time() == NaiveTime::MIN {
        end + Duration::days(1) - Duration::nanoseconds(1)
    } else {
        end
    }
}

/// Lazy, ascending sequence of the image timestamps expected in a date range.
///
/// Sub-daily timestamps stay anchored to midnight; those before `start` or
/// after [`inclusive_end`]`(end)` are skipped, so a range can resume right
/// after a given image. The monthly cadence works on calendar months. The
/// sequence holds no state beyond its cursor; cloning or rebuilding it
/// restarts from the beginning.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    lower: DateTime<Utc>,
    upper: DateTime<Utc>,
    cadence: Cadence,
    offsets: Vec<Duration>,
    /// Day (sub-daily) or first of month (monthly) being emitted
    current: Option<NaiveDate>,
    offset_index: usize,
}

impl ImageSequence {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, cadence: Cadence) -> Self {
        let bounds = match cadence {
            Cadence::Monthly => first_of_month(start.date_naive())
                .zip(first_of_month(end.date_naive()))
                .and_then(|(first, last)| Some((midnight(first)?, midnight(last)?))),
            _ => Some((start, inclusive_end(end))),
        };
        let offsets = cadence
            .step_hours()
            .map(Cadence::daily_offsets)
            .unwrap_or_default();

        let (lower, upper, current) = match bounds {
            Some((lower, upper)) if lower <= upper => (lower, upper, Some(lower.date_naive())),
            _ => (start, end, None),
        };

        Self {
            lower,
            upper,
            cadence,
            offsets,
            current,
            offset_index: 0,
        }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Next anchored timestamp, ignoring the bounds.
    fn step(&mut self) -> Option<DateTime<Utc>> {
        let day = self.current?;
        let midnight = midnight(day)?;
        let last_day = self.upper.date_naive();

        match self.cadence {
            Cadence::Monthly => {
                self.current = next_month(day).filter(|next| *next <= last_day);
                Some(midnight)
            }
            _ => {
                let offset = *self.offsets.get(self.offset_index)?;
                self.offset_index += 1;
                if self.offset_index >= self.offsets.len() {
                    self.offset_index = 0;
                    self.current = day.succ_opt().filter(|next| *next <= last_day);
                }
                Some(midnight + offset)
            }
        }
    }
}

impl Iterator for ImageSequence {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let timestamp = self.step()?;
            if timestamp > self.upper {
                self.current = None;
                return None;
            }
            if timestamp >= self.lower {
                return Some(timestamp);
            }
        }
    }
}

fn midnight(day: NaiveDate) -> Option<DateTime<Utc>> {
    Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?))
}

fn first_of_month(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
}

fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Parse a command line date: `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM`, as UTC.
pub fn parse_cli_date(s: &str) -> MerraResult<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }
    if let Some(ndt) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&ndt));
    }
    Err(MerraError::InvalidDate(format!(
        "'{}' (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM)",
        s
    )))
}
