use chrono::{Days, NaiveDate};

use super::error::ValidationError;

pub const DEFAULT_EDIT_WINDOW_DAYS: u32 = 3;

/// Legal editing window: `[now - back_days, now]`, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    back_days: u32,
}

impl Default for DateWindow {
    fn default() -> Self {
        Self::new(DEFAULT_EDIT_WINDOW_DAYS)
    }
}

impl DateWindow {
    pub fn new(back_days: u32) -> Self {
        Self { back_days }
    }

    pub fn back_days(&self) -> u32 {
        self.back_days
    }

    pub fn min_date(&self, now: NaiveDate) -> NaiveDate {
        now.checked_sub_days(Days::new(u64::from(self.back_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn max_date(&self, now: NaiveDate) -> NaiveDate {
        now
    }

    pub fn is_editable(&self, date: NaiveDate, now: NaiveDate) -> bool {
        date >= self.min_date(now) && date <= self.max_date(now)
    }

    pub fn check(&self, date: NaiveDate, now: NaiveDate) -> Result<(), ValidationError> {
        if self.is_editable(date, now) {
            return Ok(());
        }
        Err(ValidationError::OutsideWindow {
            date,
            min: self.min_date(now),
            max: self.max_date(now),
        })
    }
}
