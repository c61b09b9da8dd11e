//! Time slot enumeration
//!
//! GDELT publishes archives on a fixed grid, so the set of files to mirror is
//! fully determined by the calendar. [`SlotSchedule`] holds the calendar
//! filters (valid weekdays, business hours, step interval) and [`SlotIter`]
//! walks the grid lazily from a start slot up to and including an end date.

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use tracing::debug;

use crate::TimeSlot;

/// Minutes in a calendar day.
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Errors raised while building a schedule
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// Hour range is not a valid `[start, end]` window within a day
    #[error("invalid hour range: {start}..={end} (hours must be 0-23 and start <= end)")]
    InvalidHourRange {
        /// First hour of the window
        start: u32,
        /// Last hour of the window
        end: u32,
    },

    /// Interval does not tile a day
    #[error("invalid interval: {0} minutes (must be 1-1440 and divide a day evenly)")]
    InvalidInterval(u32),

    /// No weekday selected
    #[error("at least one valid weekday is required")]
    NoWeekdays,

    /// Weekday list could not be parsed
    #[error("invalid weekday: {0}")]
    InvalidWeekday(String),
}

/// Calendar filters and step size for slot enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSchedule {
    hour_start: u32,
    hour_end: u32,
    interval_minutes: u32,
    weekdays: HashSet<Weekday>,
    day_start: NaiveTime,
}

impl SlotSchedule {
    /// Create a schedule, validating the hour window, interval and weekday set.
    pub fn new(
        hour_start: u32,
        hour_end: u32,
        interval_minutes: u32,
        weekdays: impl IntoIterator<Item = Weekday>,
    ) -> Result<Self, ScheduleError> {
        if hour_start > hour_end || hour_end > 23 {
            return Err(ScheduleError::InvalidHourRange {
                start: hour_start,
                end: hour_end,
            });
        }

        if interval_minutes == 0
            || interval_minutes > MINUTES_PER_DAY
            || MINUTES_PER_DAY % interval_minutes != 0
        {
            return Err(ScheduleError::InvalidInterval(interval_minutes));
        }

        let weekdays: HashSet<Weekday> = weekdays.into_iter().collect();
        if weekdays.is_empty() {
            return Err(ScheduleError::NoWeekdays);
        }

        let day_start = NaiveTime::from_hms_opt(hour_start, 0, 0).ok_or(
            ScheduleError::InvalidHourRange {
                start: hour_start,
                end: hour_end,
            },
        )?;

        Ok(Self {
            hour_start,
            hour_end,
            interval_minutes,
            weekdays,
            day_start,
        })
    }

    /// First hour of the daily window
    pub fn hour_start(&self) -> u32 {
        self.hour_start
    }

    /// Last hour of the daily window (inclusive)
    pub fn hour_end(&self) -> u32 {
        self.hour_end
    }

    /// Step between consecutive slots
    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    /// Whether slots on `weekday` are downloaded
    pub fn is_valid_weekday(&self, weekday: Weekday) -> bool {
        self.weekdays.contains(&weekday)
    }

    /// The default first slot of a run: `date` at the start hour.
    pub fn first_slot(&self, date: NaiveDate) -> TimeSlot {
        date.and_time(self.day_start)
    }

    /// Enumerate slots from `start` (inclusive) until the date passes `end_date`.
    pub fn slots(&self, start: TimeSlot, end_date: NaiveDate) -> SlotIter {
        SlotIter {
            schedule: self.clone(),
            current: Some(start),
            end_date,
        }
    }

    /// Start hour of the day after `slot`, or `None` past the calendar's end.
    fn next_day(&self, slot: TimeSlot) -> Option<TimeSlot> {
        slot.date().succ_opt().map(|date| self.first_slot(date))
    }
}

impl Default for SlotSchedule {
    /// Business hours 08:00-20:00, hourly, Monday to Friday.
    fn default() -> Self {
        Self {
            hour_start: 8,
            hour_end: 20,
            interval_minutes: 60,
            weekdays: [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ]
            .into_iter()
            .collect(),
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Lazy, restartable sequence of admissible slots
///
/// Restarting is a matter of seeding [`SlotSchedule::slots`] with the last
/// persisted slot; the seed itself is the first slot yielded.
#[derive(Debug, Clone)]
pub struct SlotIter {
    schedule: SlotSchedule,
    current: Option<NaiveDateTime>,
    end_date: NaiveDate,
}

impl SlotIter {
    /// The next candidate the iterator will examine, if any.
    pub fn peek_current(&self) -> Option<TimeSlot> {
        self.current
    }
}

impl Iterator for SlotIter {
    type Item = TimeSlot;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let current = self.current?;

            if current.date() > self.end_date {
                self.current = None;
                return None;
            }

            if !self.schedule.is_valid_weekday(current.weekday()) {
                debug!(date = %current.date(), "Invalid day (skipped)");
                self.current = self.schedule.next_day(current);
                continue;
            }

            if current.hour() > self.schedule.hour_end {
                self.current = self.schedule.next_day(current);
                continue;
            }

            self.current = current.checked_add_signed(Duration::minutes(i64::from(
                self.schedule.interval_minutes,
            )));
            return Some(current);
        }
    }
}

/// Parse a weekday list such as `mon,tue,fri` or `mon-fri`.
///
/// Ranges wrap around the week, so `fri-mon` selects Friday through Monday.
pub fn parse_weekdays(input: &str) -> Result<Vec<Weekday>, ScheduleError> {
    let mut days = Vec::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((from, to)) => {
                let mut day = parse_weekday(from)?;
                let last = parse_weekday(to)?;
                loop {
                    days.push(day);
                    if day == last {
                        break;
                    }
                    day = day.succ();
                }
            }
            None => days.push(parse_weekday(part)?),
        }
    }

    if days.is_empty() {
        return Err(ScheduleError::NoWeekdays);
    }
    Ok(days)
}

fn parse_weekday(input: &str) -> Result<Weekday, ScheduleError> {
    input
        .trim()
        .parse::<Weekday>()
        .map_err(|_| ScheduleError::InvalidWeekday(input.trim().to_string()))
}
