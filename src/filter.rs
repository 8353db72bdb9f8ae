//! Pure view filtering over the appointment collection. Everything here is a
//! function of its inputs; "now" is always a parameter so the calendar logic
//! tests without a clock.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::models::{Appointment, Status};

/* -------------------------
   Queries
--------------------------*/

/// Date-range lens applied to the list before display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    Today,
    /// Sunday through Saturday of the week containing "now".
    Week,
    Month,
    /// Inclusive range. Both bounds are required; while either is missing no
    /// narrowing is applied.
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(Status),
}

impl StatusFilter {
    /// Select values from the UI: "all" or an empty string disables the filter.
    pub fn parse(value: &str) -> StatusFilter {
        match value {
            "" | "all" => StatusFilter::All,
            v => StatusFilter::Only(Status::from_internal(v)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewQuery {
    pub view: ViewMode,
    pub status: StatusFilter,
    pub search: String,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            view: ViewMode::Today,
            status: StatusFilter::All,
            search: String::new(),
        }
    }
}

/* -------------------------
   Visible subset
--------------------------*/

/// Visible, ordered subset for the current query.
///
/// The three predicates are independent; they apply in a fixed order (search,
/// view, status) and the final sort is ascending by start time. The sort is
/// stable, so identical timestamps keep their input order.
pub fn visible<'a>(
    items: &'a [Appointment],
    query: &ViewQuery,
    now: NaiveDateTime,
) -> Vec<&'a Appointment> {
    let term = query.search.to_lowercase();

    let mut out: Vec<&Appointment> = items
        .iter()
        .filter(|a| matches_search(a, &term))
        .filter(|a| matches_view(a.scheduled_at, &query.view, now))
        .filter(|a| match &query.status {
            StatusFilter::All => true,
            StatusFilter::Only(s) => a.status == *s,
        })
        .collect();

    out.sort_by_key(|a| a.scheduled_at);
    out
}

/// Case-insensitive substring match over first name, last name, or reason.
fn matches_search(apt: &Appointment, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    apt.patient_first_name.to_lowercase().contains(term)
        || apt.patient_last_name.to_lowercase().contains(term)
        || apt.reason.to_lowercase().contains(term)
}

fn matches_view(at: NaiveDateTime, view: &ViewMode, now: NaiveDateTime) -> bool {
    match view {
        ViewMode::Today => same_day(at, now),
        ViewMode::Week => same_week(at, now),
        ViewMode::Month => same_month(at, now),
        ViewMode::Custom {
            start: Some(start),
            end: Some(end),
        } => {
            let lo = start.and_hms_opt(0, 0, 0).unwrap();
            let hi = end.and_hms_milli_opt(23, 59, 59, 999).unwrap();
            at >= lo && at <= hi
        }
        ViewMode::Custom { .. } => true,
    }
}

/* -------------------------
   Calendar buckets
--------------------------*/

fn same_day(at: NaiveDateTime, now: NaiveDateTime) -> bool {
    at.date() == now.date()
}

/// Week bucket of "now": Sunday 00:00:00.000 through Saturday 23:59:59.999,
/// Sunday as day zero. The bounds always come from "now", never from the
/// appointment's own week.
fn week_bounds(now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let sunday = now.date() - Duration::days(now.weekday().num_days_from_sunday() as i64);
    let start = sunday.and_hms_opt(0, 0, 0).unwrap();
    let end = (sunday + Duration::days(6))
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap();
    (start, end)
}

fn same_week(at: NaiveDateTime, now: NaiveDateTime) -> bool {
    let (start, end) = week_bounds(now);
    at >= start && at <= end
}

fn same_month(at: NaiveDateTime, now: NaiveDateTime) -> bool {
    at.year() == now.year() && at.month() == now.month()
}

/* -------------------------
   Aggregates
--------------------------*/

/// Dashboard stat tiles. Always computed against the full collection,
/// independent of the selected view and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgendaStats {
    pub today: usize,
    pub week: usize,
    pub month: usize,
    /// Cancelled-status appointments falling in the current month.
    pub cancelled_this_month: usize,
}

pub fn stats(items: &[Appointment], now: NaiveDateTime) -> AgendaStats {
    AgendaStats {
        today: items
            .iter()
            .filter(|a| same_day(a.scheduled_at, now))
            .count(),
        week: items
            .iter()
            .filter(|a| same_week(a.scheduled_at, now))
            .count(),
        month: items
            .iter()
            .filter(|a| same_month(a.scheduled_at, now))
            .count(),
        cancelled_this_month: items
            .iter()
            .filter(|a| a.status == Status::Cancelled && same_month(a.scheduled_at, now))
            .count(),
    }
}

/// Confirmed appointments starting within the next `minutes`, soonest first,
/// for the upcoming-appointment reminder.
pub fn upcoming_within(
    items: &[Appointment],
    now: NaiveDateTime,
    minutes: i64,
) -> Vec<&Appointment> {
    let horizon = now + Duration::minutes(minutes);
    let mut out: Vec<&Appointment> = items
        .iter()
        .filter(|a| {
            a.status == Status::Confirmed && a.scheduled_at > now && a.scheduled_at <= horizon
        })
        .collect();
    out.sort_by_key(|a| a.scheduled_at);
    out
}
