use std::str::FromStr;

use snafu::ensure;

use super::*;

/// Keeps `minutes * 60 + seconds` within `u64`.
const MAX_MINUTES: u64 = u64::MAX / 60 - 1;

/// Minutes and seconds spent on a slide (or on the whole deck).
///
/// This is a view of a whole number of seconds, `seconds` is always below 60.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PageTime {
    minutes: u64,
    seconds: u64,
}

impl PageTime {
    pub const ZERO: PageTime = PageTime {
        minutes: 0,
        seconds: 0,
    };

    pub fn new(minutes: u64, seconds: u64) -> Result<Self, ValidationError> {
        ensure!(seconds < 60, SecondsOutOfRangeSnafu { seconds });
        ensure!(minutes <= MAX_MINUTES, TooLongSnafu { minutes });
        Ok(Self { minutes, seconds })
    }

    pub fn from_seconds(total: u64) -> Self {
        Self {
            minutes: total / 60,
            seconds: total % 60,
        }
    }

    pub fn minutes(self) -> u64 {
        self.minutes
    }

    pub fn seconds(self) -> u64 {
        self.seconds
    }

    pub fn total_seconds(self) -> u64 {
        self.minutes * 60 + self.seconds
    }
}

impl std::fmt::Display for PageTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

impl FromStr for PageTime {
    type Err = ValidationError;

    /// Reads `MM:SS`, or a bare number of seconds.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let text = input.trim();
        let malformed = || ValidationError::MalformedTime {
            text: text.to_string(),
        };

        match text.split_once(':') {
            Some((minutes, seconds)) => {
                let minutes = minutes.trim().parse().map_err(|_| malformed())?;
                let seconds = seconds.trim().parse().map_err(|_| malformed())?;
                Self::new(minutes, seconds)
            }
            None => text.parse().map(Self::from_seconds).map_err(|_| malformed()),
        }
    }
}
