use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

const STAMP_PREFIX: &str = "script_";
const STAMP_SUFFIX: &str = ".json";
const STAMP_DIGITS: usize = 12;

/// A past version of the script, named `script_YYMMDDHHMMSS.json` by the backend.
///
/// The content is fetched on demand, see [crate::service::revision::RevisionHistoryManager::preview].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionSnapshot {
    pub filename: String,
    pub timestamp: Option<NaiveDateTime>,
    pub date_label: String,
}

impl RevisionSnapshot {
    pub fn from_filename(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let timestamp = parse_revision_timestamp(&filename);
        let date_label = timestamp
            .map(date_label)
            .unwrap_or_else(|| filename.clone());

        Self {
            filename,
            timestamp,
            date_label,
        }
    }

    pub fn age(&self, now: NaiveDateTime) -> RelativeAge {
        self.timestamp
            .map_or(RelativeAge::JustNow, |timestamp| RelativeAge::between(timestamp, now))
    }
}

/// Orders revisions newest first. Names without a timestamp go last, in their original order.
pub fn sort_newest_first(revisions: &mut [RevisionSnapshot]) {
    revisions.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Extracts the `YYMMDDHHMMSS` stamp out of a revision filename.
pub fn parse_revision_timestamp(filename: &str) -> Option<NaiveDateTime> {
    filename
        .match_indices(STAMP_PREFIX)
        .find_map(|(index, _)| {
            let rest = &filename[index + STAMP_PREFIX.len()..];
            let digits = rest.get(..STAMP_DIGITS)?;

            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }

            rest[STAMP_DIGITS..]
                .starts_with(STAMP_SUFFIX)
                .then_some(digits)
        })
        .and_then(stamp_to_datetime)
}

fn stamp_to_datetime(digits: &str) -> Option<NaiveDateTime> {
    let field = |range: std::ops::Range<usize>| digits[range].parse::<u32>().ok();

    let year = 2000 + field(0..2)? as i32;
    let date = NaiveDate::from_ymd_opt(year, field(2..4)?, field(4..6)?)?;
    date.and_hms_opt(field(6..8)?, field(8..10)?, field(10..12)?)
}

/// `2025.01.02. AM 9:00`
fn date_label(timestamp: NaiveDateTime) -> String {
    let hour = timestamp.hour();
    let period = if hour < 12 { "AM" } else { "PM" };
    let display_hour = match hour {
        0 => 12,
        1..=12 => hour,
        _ => hour - 12,
    };

    format!(
        "{}. {period} {display_hour}:{:02}",
        timestamp.format("%Y.%m.%d"),
        timestamp.minute()
    )
}

/// How long ago a revision was written, in the coarsest unit that applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeAge {
    JustNow,
    Minutes(i64),
    Hours(i64),
    Days(i64),
    Months(i64),
    Years(i64),
}

impl RelativeAge {
    /// Years and months follow the calendar, shorter units the elapsed time.
    pub fn between(then: NaiveDateTime, now: NaiveDateTime) -> Self {
        let elapsed = (now - then).max(chrono::Duration::zero());

        let mut years = (now.year() - then.year()) as i64;
        if (now.month(), now.day()) < (then.month(), then.day()) {
            years -= 1;
        }
        if years >= 1 {
            return RelativeAge::Years(years);
        }

        let mut months = years_to_months(now, then);
        if now.day() < then.day() {
            months -= 1;
        }
        if months >= 1 {
            return RelativeAge::Months(months);
        }

        match (elapsed.num_days(), elapsed.num_hours(), elapsed.num_minutes()) {
            (days, _, _) if days >= 1 => RelativeAge::Days(days),
            (_, hours, _) if hours >= 1 => RelativeAge::Hours(hours),
            (_, _, minutes) if minutes >= 1 => RelativeAge::Minutes(minutes),
            _ => RelativeAge::JustNow,
        }
    }
}

fn years_to_months(now: NaiveDateTime, then: NaiveDateTime) -> i64 {
    (now.year() - then.year()) as i64 * 12 + now.month() as i64 - then.month() as i64
}

impl std::fmt::Display for RelativeAge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (count, unit) = match *self {
            RelativeAge::JustNow => return f.write_str("modified just now"),
            RelativeAge::Minutes(n) => (n, "minute"),
            RelativeAge::Hours(n) => (n, "hour"),
            RelativeAge::Days(n) => (n, "day"),
            RelativeAge::Months(n) => (n, "month"),
            RelativeAge::Years(n) => (n, "year"),
        };
        let plural = if count == 1 { "" } else { "s" };

        write!(f, "modified {count} {unit}{plural} ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(stamp: &str) -> NaiveDateTime {
        stamp_to_datetime(stamp).unwrap()
    }

    #[test]
    fn parse_timestamp_from_filename() {
        let timestamp = parse_revision_timestamp("script_251011231436.json").unwrap();
        assert_eq!(timestamp, at("251011231436"));
        assert_eq!(timestamp.year(), 2025);
        assert_eq!(timestamp.hour(), 23);
    }

    #[test]
    fn reject_malformed_filenames() {
        assert_eq!(parse_revision_timestamp("script_2510112314.json"), None);
        assert_eq!(parse_revision_timestamp("script_251011231436.txt"), None);
        assert_eq!(parse_revision_timestamp("script_251399231436.json"), None);
        assert_eq!(parse_revision_timestamp("notes.json"), None);
    }

    #[test]
    fn newest_revision_comes_first() {
        let mut revisions = vec![
            RevisionSnapshot::from_filename("script_250101120000.json"),
            RevisionSnapshot::from_filename("legacy.json"),
            RevisionSnapshot::from_filename("script_250102090000.json"),
        ];

        sort_newest_first(&mut revisions);

        let names: Vec<_> = revisions.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "script_250102090000.json",
                "script_250101120000.json",
                "legacy.json"
            ]
        );
    }

    #[test]
    fn date_label_uses_twelve_hour_clock() {
        let label = |name: &str| RevisionSnapshot::from_filename(name).date_label;

        assert_eq!(label("script_250102090500.json"), "2025.01.02. AM 9:05");
        assert_eq!(label("script_250102000000.json"), "2025.01.02. AM 12:00");
        assert_eq!(label("script_250102120000.json"), "2025.01.02. PM 12:00");
        assert_eq!(label("script_251011231436.json"), "2025.10.11. PM 11:14");
        assert_eq!(label("legacy.json"), "legacy.json");
    }

    #[test]
    fn relative_age_picks_the_coarsest_unit() {
        let then = at("250115100000");

        assert_eq!(RelativeAge::between(then, at("250115100030")), RelativeAge::JustNow);
        assert_eq!(RelativeAge::between(then, at("250115104500")), RelativeAge::Minutes(45));
        assert_eq!(RelativeAge::between(then, at("250115220000")), RelativeAge::Hours(12));
        assert_eq!(RelativeAge::between(then, at("250212090000")), RelativeAge::Days(27));
        assert_eq!(RelativeAge::between(then, at("250315100000")), RelativeAge::Months(2));
        assert_eq!(RelativeAge::between(then, at("270116000000")), RelativeAge::Years(2));
    }

    #[test]
    fn future_revisions_read_as_just_now() {
        let then = at("250115100000");
        assert_eq!(RelativeAge::between(then, at("250114100000")), RelativeAge::JustNow);
    }

    #[test]
    fn relative_age_wording() {
        assert_eq!(RelativeAge::Days(1).to_string(), "modified 1 day ago");
        assert_eq!(RelativeAge::Hours(3).to_string(), "modified 3 hours ago");
        assert_eq!(RelativeAge::JustNow.to_string(), "modified just now");
    }
}
