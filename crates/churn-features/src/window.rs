//! Lookback window definition.
//!
//! Every entity is described by six consecutive 28-day windows counted
//! backwards from its own reference date. Window `i` covers the half-open day
//! range `[anchor - (i+1)*28 - offset, anchor - i*28 - offset)`, so window 1
//! (`LAST`) is the one closest to the anchor and the windows tile the history
//! without gaps or overlaps.

use crate::{FeatureError, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Width of a single lookback window in days.
pub const WINDOW_DAYS: u32 = 28;

/// Number of lookback windows produced for every entity.
pub const WINDOW_COUNT: usize = 6;

/// Largest accepted offset, in days.
pub const MAX_OFFSET_DAYS: u32 = 36_500;

/// Reject offsets that would push a window bound out of the day range.
pub fn check_offset(offset: u32) -> Result<u32> {
    if offset > MAX_OFFSET_DAYS {
        return Err(FeatureError::InvalidOffset {
            offset,
            max: MAX_OFFSET_DAYS,
        });
    }
    Ok(offset)
}

/// Name of a lookback window, from the most recent to the oldest.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    /// Window 1, closest to the anchor
    #[display("last")]
    Last,
    /// Window 2
    #[display("second_last")]
    SecondLast,
    /// Window 3
    #[display("third_last")]
    ThirdLast,
    /// Window 4
    #[display("fourth_last")]
    FourthLast,
    /// Window 5
    #[display("fifth_last")]
    FifthLast,
    /// Window 6, furthest from the anchor
    #[display("sixth_last")]
    SixthLast,
}

impl Period {
    /// All periods, most recent first.
    pub const ALL: [Self; WINDOW_COUNT] = [
        Self::Last,
        Self::SecondLast,
        Self::ThirdLast,
        Self::FourthLast,
        Self::FifthLast,
        Self::SixthLast,
    ];

    /// Period for a 1-based window index.
    pub const fn from_index(index: usize) -> Option<Self> {
        if index >= 1 && index <= WINDOW_COUNT {
            Some(Self::ALL[index - 1])
        } else {
            None
        }
    }

    /// 1-based window index.
    pub const fn index(self) -> usize {
        self as usize + 1
    }

    /// Periods that feed the trend estimator (windows 2 through 6).
    ///
    /// Window 1 is excluded from the final features, so trends are fitted on
    /// the remaining five.
    pub fn trend_periods() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().skip(1)
    }

    /// Column name for a metric in this period, e.g. `net_paid_second_last`.
    pub fn column(self, metric: &str) -> String {
        format!("{metric}_{self}")
    }
}

/// A single lookback window expressed as day offsets from an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookbackWindow {
    period: Period,
    lower_days: i32,
    upper_days: i32,
}

impl LookbackWindow {
    /// Window `period` for the given global offset.
    pub fn new(period: Period, offset: u32) -> Result<Self> {
        Ok(Self::at(period, check_offset(offset)?))
    }

    // `offset` must have passed `check_offset`.
    const fn at(period: Period, offset: u32) -> Self {
        let index = period.index() as i32;
        let width = WINDOW_DAYS as i32;
        let offset = offset as i32;
        Self {
            period,
            lower_days: (index + 1) * width + offset,
            upper_days: index * width + offset,
        }
    }

    /// Period name of this window.
    pub const fn period(&self) -> Period {
        self.period
    }

    /// Days between the anchor and the inclusive lower bound.
    pub const fn lower_days(&self) -> i32 {
        self.lower_days
    }

    /// Days between the anchor and the exclusive upper bound.
    pub const fn upper_days(&self) -> i32 {
        self.upper_days
    }

    /// Inclusive lower bound for an anchor day.
    pub const fn lower_bound(&self, anchor_day: i32) -> i32 {
        anchor_day - self.lower_days
    }

    /// Exclusive upper bound for an anchor day.
    pub const fn upper_bound(&self, anchor_day: i32) -> i32 {
        anchor_day - self.upper_days
    }

    /// Whether `day` falls in this window for the given anchor.
    pub const fn contains(&self, anchor_day: i32, day: i32) -> bool {
        day >= self.lower_bound(anchor_day) && day < self.upper_bound(anchor_day)
    }

    /// Column name for a metric aggregated over this window.
    pub fn column(&self, metric: &str) -> String {
        self.period.column(metric)
    }
}

/// Generator over the lookback windows for one offset.
///
/// Stateless apart from its cursor; a clone walks the same sequence
/// independently and [`windows`] can be called again to restart.
#[derive(Debug, Clone)]
pub struct Windows {
    offset: u32,
    next: usize,
}

impl Iterator for Windows {
    type Item = LookbackWindow;

    fn next(&mut self) -> Option<Self::Item> {
        let period = Period::from_index(self.next)?;
        self.next += 1;
        Some(LookbackWindow::at(period, self.offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (WINDOW_COUNT + 1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}

/// All lookback windows for `offset`, most recent first.
///
/// Fails with [`FeatureError::InvalidOffset`] above [`MAX_OFFSET_DAYS`].
pub fn windows(offset: u32) -> Result<Windows> {
    let offset = check_offset(offset)?;
    Ok(Windows { offset, next: 1 })
}
