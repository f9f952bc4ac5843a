//! Month grid projection of the console cache.

use aquabear_shared::{Reservation, ReservationStatus};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dates;

/// Chips rendered inside a day cell before the overflow counter kicks in.
pub const MAX_CHIPS: usize = 2;

/// A displayed month. Navigation is unbounded in practice; it stops only at
/// the edges of the representable date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
}

impl CalendarMonth {
    /// `None` for a month outside 1..=12 or a year outside the date range.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(&self) -> Option<Self> {
        if self.month == 12 {
            Self::new(self.year.checked_add(1)?, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    pub fn previous(&self) -> Option<Self> {
        if self.month == 1 {
            Self::new(self.year.checked_sub(1)?, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    pub fn days_in_month(&self) -> u32 {
        match self.month {
            4 | 6 | 9 | 11 => 30,
            2 if is_leap_year(self.year) => 29,
            2 => 28,
            _ => 31,
        }
    }

    /// Weekday of day 1, Sunday = 0.
    pub fn leading_blanks(&self) -> u32 {
        self.date(1)
            .map(|first| first.weekday().num_days_from_sunday())
            .unwrap_or(0)
    }

    pub fn date(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    /// ISO key of `day`, built the same way records store their date.
    pub fn iso_key(&self, day: u32) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, day)
    }

    pub fn title(&self) -> String {
        format!(
            "{} {}",
            dates::month_title(self.month).unwrap_or_default(),
            self.year
        )
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CalendarChip {
    pub id: Uuid,
    pub name: String,
    pub time: String,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayCell {
    pub day: u32,
    pub date: String,
    pub is_today: bool,
    pub total: usize,
    pub has_pending: bool,
    pub chips: Vec<CalendarChip>,
    /// Reservations beyond the rendered chips. Informational only.
    pub overflow: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CalendarView {
    pub month: CalendarMonth,
    pub title: String,
    pub day_names: [&'static str; 7],
    pub leading_blanks: u32,
    pub days: Vec<DayCell>,
    /// `None` only at the edge of the date range.
    pub previous: Option<CalendarMonth>,
    pub next: Option<CalendarMonth>,
}

/// Reservations whose date string equals `date` exactly.
pub fn bucket<'a>(reservations: &'a [Reservation], date: &str) -> Vec<&'a Reservation> {
    reservations
        .iter()
        .filter(|r| r.reservation_date == date)
        .collect()
}

pub fn project(month: CalendarMonth, reservations: &[Reservation], today: NaiveDate) -> CalendarView {
    let days = (1..=month.days_in_month())
        .map(|day| {
            let key = month.iso_key(day);
            let on_day = bucket(reservations, &key);
            let chips = on_day
                .iter()
                .take(MAX_CHIPS)
                .map(|r| CalendarChip {
                    id: r.id,
                    name: r.name.clone(),
                    time: r.reservation_time.chars().take(5).collect(),
                    status: r.status,
                })
                .collect();

            DayCell {
                day,
                is_today: month.date(day) == Some(today),
                total: on_day.len(),
                has_pending: on_day.iter().any(|r| r.status == ReservationStatus::Pending),
                chips,
                overflow: on_day.len().saturating_sub(MAX_CHIPS),
                date: key,
            }
        })
        .collect();

    CalendarView {
        month,
        title: month.title(),
        day_names: dates::DAY_NAMES,
        leading_blanks: month.leading_blanks(),
        days,
        previous: month.previous(),
        next: month.next(),
    }
}

/// Selecting a day opens the detail view only when exactly one reservation
/// falls on it.
pub fn select_day(reservations: &[Reservation], date: &str) -> Option<Reservation> {
    match bucket(reservations, date).as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    }
}
