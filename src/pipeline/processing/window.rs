//! Eligibility-window calculation.
//!
//! All month arithmetic works on explicit `(year, month)` pairs: add the month
//! offset, carry into the year modulo 12, then take the last day of the target
//! month from a leap-aware length table. No date-mutation primitive is used, so
//! an incident ending on the 31st can never roll into the following month.

use chrono::{Datelike, NaiveDate};

use crate::constants::{ENDED_WINDOW_MONTHS, EXPIRING_SOON_DAYS, ONGOING_MAX_MONTHS};
use crate::domain::{Declaration, Status, Window};
use crate::error::{CompilerError, Result};

const MONTH_LENGTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let base = MONTH_LENGTHS[(month as usize - 1) % 12];
    if month == 2 && is_leap_year(year) {
        base + 1
    } else {
        base
    }
}

/// `(year, month)` shifted forward by `months`, carrying into the year.
pub fn add_months(year: i32, month: u32, months: u32) -> (i32, u32) {
    let zero_based = month as i64 - 1 + months as i64;
    let year = year as i64 + zero_based.div_euclid(12);
    let month = zero_based.rem_euclid(12) as u32 + 1;
    (year as i32, month)
}

/// Last calendar day of the month `months` after the month containing `date`.
/// The day-of-month of `date` is ignored.
pub fn month_end_after(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    let (year, month) = add_months(date.year(), date.month(), months);
    NaiveDate::from_ymd_opt(year, month, days_in_month(year, month)).ok_or_else(|| {
        CompilerError::DateOutOfRange(format!("{} + {} months", date, months))
    })
}

/// The dates a window depends on, detached from any particular record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDates {
    pub declaration_date: NaiveDate,
    pub incident_start: NaiveDate,
    pub incident_end: Option<NaiveDate>,
    pub latest_renewal: Option<NaiveDate>,
}

impl WindowDates {
    pub fn of(declaration: &Declaration) -> Self {
        Self {
            declaration_date: declaration.declaration_date,
            incident_start: declaration.incident_start,
            incident_end: declaration.incident_end,
            latest_renewal: declaration.renewal_dates.iter().next_back().copied(),
        }
    }

    /// `min(declarationDate, incidentStart)`.
    pub fn start(&self) -> NaiveDate {
        self.declaration_date.min(self.incident_start)
    }

    /// Last usable day of the window.
    ///
    /// Ended incidents close at the end of the second month after the
    /// incident-end month. Ongoing ones close 14 months after the later of the
    /// window start and the most recent renewal; a renewal restarts the clock
    /// rather than adding to it.
    pub fn end(&self) -> Result<NaiveDate> {
        match self.incident_end {
            Some(end) => month_end_after(end, ENDED_WINDOW_MONTHS),
            None => {
                let start = self.start();
                let base = self.latest_renewal.map_or(start, |latest| start.max(latest));
                month_end_after(base, ONGOING_MAX_MONTHS)
            }
        }
    }

    pub fn compute(&self, today: NaiveDate) -> Result<Window> {
        let start = self.start();
        let end = self.end()?;
        let status = derive_status(end, self.incident_end.is_none(), today);
        let days_remaining = match status {
            Status::Ongoing => None,
            _ => Some((end - today).num_days()),
        };

        Ok(Window {
            status,
            window_start: start,
            window_end: end,
            days_remaining,
        })
    }
}

pub fn window_start(declaration: &Declaration) -> NaiveDate {
    WindowDates::of(declaration).start()
}

pub fn window_end(declaration: &Declaration) -> Result<NaiveDate> {
    WindowDates::of(declaration).end()
}

/// Status as a pure function of the window end, incident-end presence and today.
pub fn derive_status(window_end: NaiveDate, ongoing: bool, today: NaiveDate) -> Status {
    if today > window_end {
        Status::Expired
    } else if ongoing {
        Status::Ongoing
    } else if (window_end - today).num_days() <= EXPIRING_SOON_DAYS {
        Status::ExpiringSoon
    } else {
        Status::Active
    }
}

/// Compute the full eligibility window of a declaration as of `today`.
pub fn compute_window(declaration: &Declaration, today: NaiveDate) -> Result<Window> {
    WindowDates::of(declaration).compute(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AffectedAreas, ConfidenceLevel, Source};
    use chrono::{TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn declaration(decl: NaiveDate, start: NaiveDate, end: Option<NaiveDate>) -> Declaration {
        Declaration {
            id: "STATE-2024-001-TX".to_string(),
            source: Source::State,
            jurisdiction: "TX".to_string(),
            title: "Test".to_string(),
            incident_category: "Severe Storm".to_string(),
            declaration_date: decl,
            incident_start: start,
            incident_end: end,
            renewal_dates: Default::default(),
            affected_areas: AffectedAreas::Entire,
            official_url: "https://gov.texas.gov/news/post/1".to_string(),
            confidence_level: ConfidenceLevel::Curated,
            last_updated: Utc.with_ymd_and_hms(2026, 2, 7, 0, 0, 0).unwrap(),
            last_verified: None,
            event_key: None,
        }
    }

    #[test]
    fn test_ended_incident_month_table() {
        let cases = [
            (d(2026, 1, 15), d(2026, 3, 31)),
            (d(2026, 1, 31), d(2026, 3, 31)),
            (d(2026, 2, 28), d(2026, 4, 30)),
            (d(2026, 3, 31), d(2026, 5, 31)),
            (d(2025, 11, 15), d(2026, 1, 31)),
            (d(2025, 11, 30), d(2026, 1, 31)),
            (d(2025, 12, 31), d(2026, 2, 28)),
            (d(2023, 12, 31), d(2024, 2, 29)),
        ];
        for (incident_end, expected) in cases {
            assert_eq!(
                month_end_after(incident_end, ENDED_WINDOW_MONTHS).unwrap(),
                expected,
                "incident end {}",
                incident_end
            );
        }
    }

    #[test]
    fn test_day_of_month_is_ignored() {
        let first = month_end_after(d(2025, 7, 1), 2).unwrap();
        let last = month_end_after(d(2025, 7, 31), 2).unwrap();
        assert_eq!(first, last);
        assert_eq!(first, d(2025, 9, 30));
    }

    #[test]
    fn test_leap_table() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(add_months(2024, 12, 14), (2026, 2));
        assert_eq!(add_months(2024, 11, 2), (2025, 1));
    }

    #[test]
    fn test_window_start_is_earlier_date() {
        let decl = declaration(d(2026, 1, 22), d(2026, 1, 20), None);
        assert_eq!(window_start(&decl), d(2026, 1, 20));
        let decl = declaration(d(2026, 1, 18), d(2026, 1, 20), None);
        assert_eq!(window_start(&decl), d(2026, 1, 18));
    }

    #[test]
    fn test_ongoing_without_renewal_expires_after_fourteen_months() {
        let decl = declaration(d(2024, 12, 1), d(2024, 12, 1), None);
        let window = compute_window(&decl, d(2026, 2, 7)).unwrap();
        assert_eq!(window.window_end, d(2026, 2, 28));
        assert_eq!(window.status, Status::Ongoing);

        let window = compute_window(&decl, d(2026, 3, 1)).unwrap();
        assert_eq!(window.status, Status::Expired);
    }

    #[test]
    fn test_renewal_restarts_the_clock() {
        let mut decl = declaration(d(2024, 12, 1), d(2024, 12, 1), None);
        decl.renewal_dates.insert(d(2025, 3, 1));
        decl.renewal_dates.insert(d(2025, 7, 1));
        let window = compute_window(&decl, d(2026, 2, 7)).unwrap();
        assert_eq!(window.window_end, d(2026, 9, 30));
        assert_eq!(window.status, Status::Ongoing);
        assert_eq!(window.days_remaining, None);
    }

    #[test]
    fn test_renewal_before_start_does_not_move_base() {
        let mut decl = declaration(d(2025, 6, 10), d(2025, 6, 1), None);
        decl.renewal_dates.insert(d(2025, 5, 1));
        assert_eq!(window_end(&decl).unwrap(), d(2026, 8, 31));
    }

    #[test]
    fn test_status_ordering() {
        let end = d(2026, 3, 31);
        assert_eq!(derive_status(end, false, d(2026, 4, 1)), Status::Expired);
        assert_eq!(derive_status(end, true, d(2026, 4, 1)), Status::Expired);
        assert_eq!(derive_status(end, true, d(2026, 3, 30)), Status::Ongoing);
        assert_eq!(derive_status(end, false, d(2026, 3, 1)), Status::ExpiringSoon);
        assert_eq!(derive_status(end, false, d(2026, 2, 28)), Status::Active);
        assert_eq!(derive_status(end, false, end), Status::ExpiringSoon);
    }

    #[test]
    fn test_detached_dates_match_record_computation() {
        let dates = WindowDates {
            declaration_date: d(2026, 1, 22),
            incident_start: d(2026, 1, 20),
            incident_end: None,
            latest_renewal: None,
        };
        let decl = declaration(d(2026, 1, 22), d(2026, 1, 20), None);
        assert_eq!(dates.compute(d(2026, 2, 11)).unwrap(), compute_window(&decl, d(2026, 2, 11)).unwrap());
        assert_eq!(dates.end().unwrap(), d(2027, 3, 31));
    }

    #[test]
    fn test_ended_window_reports_days_remaining() {
        let decl = declaration(d(2026, 1, 22), d(2026, 1, 22), Some(d(2026, 1, 29)));
        let window = compute_window(&decl, d(2026, 2, 11)).unwrap();
        assert_eq!(window.window_end, d(2026, 3, 31));
        assert_eq!(window.days_remaining, Some(48));
        assert_eq!(window.status, Status::Active);
    }
}
