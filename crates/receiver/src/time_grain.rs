//! ISO-8601 time grains as used by Azure Monitor (`PT1M`, `PT1H`, `P1D`, ...)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Minimum sampling interval a metric supports, ordered by length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeGrain {
    secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time grain '{input}': {reason}")]
pub struct TimeGrainError {
    input: String,
    reason: &'static str,
}

impl TimeGrain {
    pub const ONE_MINUTE: TimeGrain = TimeGrain { secs: SECS_PER_MINUTE };
    pub const FIVE_MINUTES: TimeGrain = TimeGrain { secs: 5 * SECS_PER_MINUTE };
    pub const ONE_HOUR: TimeGrain = TimeGrain { secs: SECS_PER_HOUR };
    pub const ONE_DAY: TimeGrain = TimeGrain { secs: SECS_PER_DAY };

    /// Build a grain from whole seconds; zero is rejected
    pub fn from_secs(secs: u64) -> Option<Self> {
        (secs > 0).then_some(Self { secs })
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.secs
    }
}

impl FromStr for TimeGrain {
    type Err = TimeGrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| TimeGrainError {
            input: s.to_string(),
            reason,
        };

        let upper = s.trim().to_ascii_uppercase();
        let rest = upper.strip_prefix('P').ok_or_else(|| err("missing 'P' designator"))?;
        let (date_part, time_part) = match rest.split_once('T') {
            Some((date, time)) => {
                if time.is_empty() {
                    return Err(err("empty time component"));
                }
                (date, Some(time))
            }
            None => (rest, None),
        };

        let mut secs = parse_components(date_part, &[('D', SECS_PER_DAY)]).map_err(err)?;
        if let Some(time) = time_part {
            let time_secs = parse_components(
                time,
                &[('H', SECS_PER_HOUR), ('M', SECS_PER_MINUTE), ('S', 1)],
            )
            .map_err(err)?;
            secs = secs
                .checked_add(time_secs)
                .ok_or_else(|| err("value out of range"))?;
        }

        TimeGrain::from_secs(secs).ok_or_else(|| err("duration must be greater than zero"))
    }
}

/// Sum `<n><unit>` components, requiring units in the given order
fn parse_components(input: &str, units: &[(char, u64)]) -> Result<u64, &'static str> {
    let mut total = 0u64;
    let mut digits = String::new();
    let mut next_unit = 0;

    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let position = units[next_unit..]
            .iter()
            .position(|(unit, _)| *unit == c)
            .ok_or("unexpected or out-of-order designator")?;
        if digits.is_empty() {
            return Err("designator without a value");
        }

        let value: u64 = digits.parse().map_err(|_| "value out of range")?;
        let (_, scale) = units[next_unit + position];
        total = value
            .checked_mul(scale)
            .and_then(|v| total.checked_add(v))
            .ok_or("value out of range")?;

        digits.clear();
        next_unit += position + 1;
    }

    if !digits.is_empty() {
        return Err("trailing value without designator");
    }

    Ok(total)
}

impl fmt::Display for TimeGrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = self.secs / SECS_PER_DAY;
        let hours = (self.secs % SECS_PER_DAY) / SECS_PER_HOUR;
        let minutes = (self.secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
        let seconds = self.secs % SECS_PER_MINUTE;

        f.write_str("P")?;
        if days > 0 {
            write!(f, "{}D", days)?;
        }
        if hours > 0 || minutes > 0 || seconds > 0 {
            f.write_str("T")?;
            if hours > 0 {
                write!(f, "{}H", hours)?;
            }
            if minutes > 0 {
                write!(f, "{}M", minutes)?;
            }
            if seconds > 0 {
                write!(f, "{}S", seconds)?;
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for TimeGrain {
    type Error = TimeGrainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeGrain> for String {
    fn from(grain: TimeGrain) -> Self {
        grain.to_string()
    }
}
