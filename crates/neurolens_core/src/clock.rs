//! Wall-clock source for date keys and save timestamps.
//!
//! # Responsibility
//! - Resolve "today" in the user's local timezone.
//! - Keep time injectable so date-boundary behavior is testable.

use crate::model::daily_log::DateKey;
use chrono::{Local, NaiveDate};
use std::cell::Cell;

/// Time source used by the log manager.
pub trait Clock {
    /// Today's calendar day in the user's local timezone.
    fn today(&self) -> DateKey;
    /// Current time in Unix epoch milliseconds.
    fn now_epoch_ms(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn today(&self) -> DateKey {
        (**self).today()
    }

    fn now_epoch_ms(&self) -> i64 {
        (**self).now_epoch_ms()
    }
}

/// Reads the host's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> DateKey {
        DateKey::from_date(Local::now().date_naive())
    }

    fn now_epoch_ms(&self) -> i64 {
        Local::now().timestamp_millis()
    }
}

/// Settable clock for hosts that drive time explicitly.
#[derive(Debug)]
pub struct ManualClock {
    today: Cell<NaiveDate>,
    now_epoch_ms: Cell<i64>,
}

impl ManualClock {
    pub fn new(today: DateKey, now_epoch_ms: i64) -> Self {
        Self {
            today: Cell::new(today.date()),
            now_epoch_ms: Cell::new(now_epoch_ms),
        }
    }

    pub fn set_today(&self, today: DateKey) {
        self.today.set(today.date());
    }

    /// Moves the timestamp forward without changing the day.
    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_epoch_ms.set(self.now_epoch_ms.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn today(&self) -> DateKey {
        DateKey::from_date(self.today.get())
    }

    fn now_epoch_ms(&self) -> i64 {
        self.now_epoch_ms.get()
    }
}
