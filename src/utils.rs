use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, Offset};
use chrono_tz::{Europe::Vienna, Tz};

/// Current wall-clock time in Vienna
pub fn local_now() -> DateTime<Tz> {
    chrono::Utc::now().with_timezone(&Vienna)
}

/// Parses a timestamp from the API as Vienna local time.
///
/// The API sends local wall time, sometimes with an offset attached
/// (`2020-01-25T20:49:00.000+0100`). The wall time is localized to Europe/Vienna. The offset only decides which of the two instants
/// is meant when the clocks go back and an hour happens twice; without one the earlier is taken.
pub fn parse_local(time: &str) -> Result<DateTime<Tz>, ParseError> {
    let (wall_time, offset) = split_offset(time);

    let naive = NaiveDateTime::parse_from_str(wall_time, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|source| ParseError::Malformed {
            time: time.to_string(),
            source,
        })?;
    let offset = if offset.is_empty() {
        None
    } else {
        let fixed = parse_offset(offset)
            .ok_or_else(|| ParseError::BadOffset(time.to_string()))?;
        Some(fixed)
    };

    match naive.and_local_timezone(Vienna) {
        LocalResult::Single(local) => Ok(local),
        LocalResult::Ambiguous(earlier, later) => match offset {
            Some(offset) if later.offset().fix() == offset => Ok(later),
            _ => Ok(earlier),
        },
        LocalResult::None => Err(ParseError::NonExistent(time.to_string())),
    }
}

/// Splits a trailing `Z`, `+hhmm`, `+hh:mm` or `-hhmm` off an ISO-8601 timestamp
fn split_offset(time: &str) -> (&str, &str) {
    let time = time.trim();
    let Some(t) = time.find('T') else {
        return (time, "");
    };

    match time[t..].find(['+', '-', 'Z']) {
        Some(offset) => time.split_at(t + offset),
        None => (time, ""),
    }
}

fn parse_offset(offset: &str) -> Option<FixedOffset> {
    if offset == "Z" {
        return FixedOffset::east_opt(0);
    }

    let sign = match offset.chars().next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let digits = offset[1..].replace(':', "");
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("unparsable timestamp {time:?}: {source}")]
    Malformed {
        time: String,
        source: chrono::ParseError,
    },

    #[error("timestamp {0:?} has an unreadable UTC offset")]
    BadOffset(String),

    #[error("timestamp {0:?} doesn't exist in Europe/Vienna")]
    NonExistent(String),
}

/// The character display only knows ASCII
pub fn replace_umlaute(s: &str) -> String {
    s.replace('Ä', "Ae")
        .replace('Ö', "Oe")
        .replace('Ü', "Ue")
        .replace('ä', "ae")
        .replace('ö', "oe")
        .replace('ü', "ue")
        .replace('ß', "ss")
}
