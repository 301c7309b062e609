use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;

use super::wiener_linien_api_model::ApiDeparture;
use crate::utils::{ParseError, parse_local};

/// Departures per line, keyed by `"<line> <towards>"`. Sorted by key, each list soonest first.
pub type DepartureInfos = BTreeMap<String, Vec<Departure>>;

/// Below this many minutes a departure is shown as `m:ss`, above as whole minutes
const EXACT_THRESHOLD_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// Time left until the live departure estimate. `None` if the vehicle isn't tracked.
    pub exact: Option<TimeDelta>,
    /// Server side approximation in minutes
    pub countdown: i64,
}

impl Departure {
    pub fn new(exact: Option<TimeDelta>, countdown: i64) -> Self {
        Self { exact, countdown }
    }

    /// `now` has to be sampled in Vienna, same as the real departure time
    pub fn from_api(value: &ApiDeparture, now: DateTime<Tz>) -> Result<Self, ParseError> {
        let departure_time = &value.departure_time;

        let exact = departure_time
            .time_real
            .as_deref()
            .map(parse_local)
            .transpose()?
            .map(|time_real| time_real - now);

        Ok(Self::new(exact, departure_time.countdown))
    }
}

impl fmt::Display for Departure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(exact) = self.exact else {
            return write!(f, "{}", self.countdown);
        };

        let seconds = exact.max(TimeDelta::zero()).num_seconds();

        if exact < TimeDelta::minutes(EXACT_THRESHOLD_MINUTES) {
            write!(f, "{}:{:02}", seconds / 60, seconds % 60)
        } else {
            write!(f, "{}", round_half_even_minutes(seconds))
        }
    }
}

/// Same as Python's `round(seconds / 60)`
fn round_half_even_minutes(seconds: i64) -> i64 {
    let (minutes, rest) = (seconds / 60, seconds % 60);

    match rest {
        31.. => minutes + 1,
        30 if minutes % 2 == 1 => minutes + 1,
        _ => minutes,
    }
}
