//! Calendar month grid with navigation, and the rotating slide index used by carousels.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::CalendarEvent;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// One cell of a month grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GridCell {
    /// Padding before the first weekday of the month
    Empty,
    #[serde(rename_all = "camelCase")]
    Day {
        day_number: u32,
        /// ISO `YYYY-MM-DD` of this cell
        date: String,
        is_today: bool,
        events: Vec<CalendarEvent>,
    },
}

/// A rendered month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    /// Zero-based month
    pub month: u32,
    pub year: i32,
    pub title: String,
    pub cells: Vec<GridCell>,
}

/// Number of days in a zero-based month, or `None` for an out-of-range month.
pub fn days_in_month(month: u32, year: i32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month + 1, 1)?;
    let next = if month == 11 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 2, 1)?
    };
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// Lay out a zero-based month: Sunday-first padding, then one cell per day holding the
/// events dated that day in their source order. An invalid month yields no cells.
pub fn build_month_grid(
    month: u32,
    year: i32,
    events: &[CalendarEvent],
    today: NaiveDate,
) -> Vec<GridCell> {
    let (Some(first), Some(days)) = (
        NaiveDate::from_ymd_opt(year, month + 1, 1),
        days_in_month(month, year),
    ) else {
        return Vec::new();
    };

    let mut by_date: HashMap<&str, Vec<&CalendarEvent>> = HashMap::new();
    for event in events {
        by_date.entry(event.date.trim()).or_default().push(event);
    }

    let padding = first.weekday().num_days_from_sunday() as usize;
    let mut cells = Vec::with_capacity(padding + days as usize);
    cells.extend(std::iter::repeat(GridCell::Empty).take(padding));

    for (offset, date) in first.iter_days().take(days as usize).enumerate() {
        let iso = date.format("%Y-%m-%d").to_string();
        let events = by_date
            .get(iso.as_str())
            .map(|evs| evs.iter().map(|e| (*e).clone()).collect())
            .unwrap_or_default();
        cells.push(GridCell::Day {
            day_number: offset as u32 + 1,
            date: iso,
            is_today: date == today,
            events,
        });
    }
    cells
}

/// Events dated `date`, in source order.
pub fn events_on(events: &[CalendarEvent], date: NaiveDate) -> Vec<CalendarEvent> {
    events
        .iter()
        .filter(|e| e.parsed_date() == Some(date))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthDirection {
    Prev,
    Next,
}

/// The month a calendar instance is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarEngine {
    month: u32,
    year: i32,
}

impl CalendarEngine {
    /// Start at the month containing `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            month: today.month0(),
            year: today.year(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn navigate(&mut self, direction: MonthDirection) {
        match direction {
            MonthDirection::Prev if self.month == 0 => {
                self.month = 11;
                self.year -= 1;
            }
            MonthDirection::Prev => self.month -= 1,
            MonthDirection::Next if self.month == 11 => {
                self.month = 0;
                self.year += 1;
            }
            MonthDirection::Next => self.month += 1,
        }
    }

    pub fn render(&self, events: &[CalendarEvent], today: NaiveDate) -> MonthView {
        MonthView {
            month: self.month,
            year: self.year,
            title: format!("{} {}", MONTH_NAMES[self.month as usize], self.year),
            cells: build_month_grid(self.month, self.year, events, today),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideDirection {
    Forward,
    Backward,
    /// Timer-driven; moves like `Forward`
    Auto,
}

/// Rotating index over an ordered list of slides. The index is always `< len`, or 0 when
/// there are no slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Carousel {
    index: usize,
    len: usize,
}

impl Carousel {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn advance(&mut self, direction: SlideDirection) -> usize {
        if self.len == 0 {
            self.index = 0;
            return 0;
        }
        self.index = match direction {
            SlideDirection::Forward | SlideDirection::Auto => (self.index + 1) % self.len,
            SlideDirection::Backward => (self.index + self.len - 1) % self.len,
        };
        self.index
    }

    /// Adopt a new slide count, folding the index back into range.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        self.index = if len == 0 { 0 } else { self.index % len };
    }
}
