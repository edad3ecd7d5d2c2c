//! Weekly FX trading window.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

const MINUTES_PER_DAY: u32 = 24 * 60;

fn minute_of_week(weekday: Weekday, hour: u32, minute: u32) -> u32 {
    weekday.num_days_from_monday() * MINUTES_PER_DAY + hour * 60 + minute
}

/// Weekly closed interval `[close, open)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    close: u32,
    open: u32,
}

impl MarketHours {
    pub fn new(close: (Weekday, u32), open: (Weekday, u32)) -> Self {
        Self {
            close: minute_of_week(close.0, close.1, 0),
            open: minute_of_week(open.0, open.1, 0),
        }
    }

    /// Closed from Friday 22:00 UTC to Sunday 22:00 UTC.
    pub fn fx() -> Self {
        Self::new((Weekday::Fri, 22), (Weekday::Sun, 22))
    }

    pub fn is_open(&self, at: DateTime<Utc>) -> bool {
        let now = minute_of_week(at.weekday(), at.hour(), at.minute());
        let closed = if self.close <= self.open {
            self.close <= now && now < self.open
        } else {
            now >= self.close || now < self.open
        };
        !closed
    }
}

impl Default for MarketHours {
    fn default() -> Self {
        Self::fx()
    }
}
