//! Schedule windows and focus mode evaluation
//!
//! Computes whether blocking should currently be on, given the stored
//! settings and a wall-clock time. Pure: the caller supplies `now`.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};

use crate::types::{Schedule, Settings};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Error type for schedule validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("Invalid day {0}, expected 0 (Sunday) to 6 (Saturday)")]
    InvalidDay(u8),
    #[error("Schedule needs at least one day")]
    NoDays,
}

// =============================================================================
// Day Masks
// =============================================================================

bitflags::bitflags! {
    /// Days of the week a schedule applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DayMask: u8 {
        const SUNDAY = 1 << 0;
        const MONDAY = 1 << 1;
        const TUESDAY = 1 << 2;
        const WEDNESDAY = 1 << 3;
        const THURSDAY = 1 << 4;
        const FRIDAY = 1 << 5;
        const SATURDAY = 1 << 6;

        const WEEKDAYS = Self::MONDAY.bits()
            | Self::TUESDAY.bits()
            | Self::WEDNESDAY.bits()
            | Self::THURSDAY.bits()
            | Self::FRIDAY.bits();
        const WEEKEND = Self::SATURDAY.bits() | Self::SUNDAY.bits();
        const ALL = Self::WEEKDAYS.bits() | Self::WEEKEND.bits();
    }
}

impl DayMask {
    /// Build from day numbers, 0 = Sunday .. 6 = Saturday.
    pub fn from_days(days: &[u8]) -> Result<Self, ScheduleError> {
        let mut mask = Self::empty();
        for &day in days {
            if day > 6 {
                return Err(ScheduleError::InvalidDay(day));
            }
            mask |= Self::from_bits_retain(1 << day);
        }
        Ok(mask)
    }

    #[inline]
    pub fn from_weekday(day: Weekday) -> Self {
        Self::from_bits_retain(1 << day.num_days_from_sunday())
    }

    #[inline]
    pub fn has(&self, day: Weekday) -> bool {
        self.contains(Self::from_weekday(day))
    }

    /// Back to sorted day numbers.
    pub fn to_days(&self) -> Vec<u8> {
        (0..7u8).filter(|d| self.bits() & (1 << d) != 0).collect()
    }
}

// =============================================================================
// Schedule Window
// =============================================================================

/// Parse "HH:MM" into minutes since midnight.
pub fn parse_clock_time(text: &str) -> Result<u16, ScheduleError> {
    let invalid = || ScheduleError::InvalidTime(text.to_string());

    let (hours, minutes) = text.trim().split_once(':').ok_or_else(invalid)?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: u16 = hours.parse().map_err(|_| invalid())?;
    let minutes: u16 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// Format minutes since midnight as "HH:MM".
pub fn format_clock_time(minutes: u16) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Validated form of a [`Schedule`].
///
/// `start` is inclusive and `end` exclusive. When `start > end` the window
/// wraps past midnight and its early-morning part belongs to the previous
/// day. `start == end` describes an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start: u16,
    pub end: u16,
    pub days: DayMask,
}

impl ScheduleWindow {
    /// Whether `minute` (since midnight) on `day` falls inside the window.
    pub fn contains(&self, day: Weekday, minute: u16) -> bool {
        if self.start < self.end {
            self.days.has(day) && (self.start..self.end).contains(&minute)
        } else if self.start > self.end {
            (self.days.has(day) && minute >= self.start) || (self.days.has(day.pred()) && minute < self.end)
        } else {
            false
        }
    }

    pub fn is_active_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        let minute = (now.hour() * 60 + now.minute()) as u16;
        self.contains(now.weekday(), minute)
    }
}

impl Schedule {
    /// Validate into a window.
    pub fn window(&self) -> Result<ScheduleWindow, ScheduleError> {
        Ok(ScheduleWindow {
            start: parse_clock_time(&self.start_time)?,
            end: parse_clock_time(&self.end_time)?,
            days: DayMask::from_days(&self.days)?,
        })
    }

    /// Validate a schedule about to be stored.
    pub fn validate(&self) -> Result<ScheduleWindow, ScheduleError> {
        if self.days.is_empty() {
            return Err(ScheduleError::NoDays);
        }
        self.window()
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Blocking state computed for a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Effective state, including a running focus session.
    pub blocking_enabled: bool,
    /// Stored flag the schedule asks for. None without a usable schedule.
    pub scheduled: Option<bool>,
    /// Focus mode is still flagged active but its end time has passed.
    pub focus_expired: bool,
}

impl Evaluation {
    /// Settings with this evaluation applied, or None if nothing changes.
    ///
    /// Only the schedule writes the stored flag. A focus session is carried
    /// by `focus_mode` alone, so the flag is back to its own value once the
    /// session ends.
    pub fn apply(&self, settings: &Settings) -> Option<Settings> {
        let flag = self.scheduled.unwrap_or(settings.is_blocking_enabled);
        if settings.is_blocking_enabled == flag && !self.focus_expired {
            return None;
        }
        let mut updated = settings.clone();
        updated.is_blocking_enabled = flag;
        if self.focus_expired {
            updated.focus_mode.is_active = false;
        }
        Some(updated)
    }
}

/// Decide whether blocking should be on at `now`.
///
/// A running focus session forces blocking on. Otherwise a configured
/// schedule decides, and without one the stored flag is kept.
pub fn evaluate<Tz: TimeZone>(settings: &Settings, now: &DateTime<Tz>) -> Evaluation {
    let now_ms = now.timestamp_millis();
    let focus = &settings.focus_mode;

    let scheduled = match settings.active_schedule().map(Schedule::window) {
        Some(Ok(window)) => Some(window.is_active_at(now)),
        Some(Err(err)) => {
            log::warn!("ignoring invalid schedule: {err}");
            None
        }
        None => None,
    };

    Evaluation {
        blocking_enabled: focus.is_running_at(now_ms) || scheduled.unwrap_or(settings.is_blocking_enabled),
        scheduled,
        focus_expired: focus.is_expired_at(now_ms),
    }
}
