use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::AgendaError;

/* -------------------------
   Wire DTOs
--------------------------*/

/// Appointment row as the backend sends it, for both the list and the
/// range-bounded schedule endpoints. The detail endpoint uses the same shape
/// with `notes` and `date_of_birth` filled in.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRecord {
    pub booking_id: i64,
    pub patient_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    /// ISO date, sometimes a full timestamp. Only the date part is used.
    pub booking_date: String,
    /// Time of day, `HH:MM:SS` or `HH:MM`.
    pub booking_time: String,
    #[serde(default)]
    pub reason_for_visit: Option<String>,
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBooking {
    pub patient_id: i64,
    pub booking_date: String,
    pub booking_time: String,
    pub end_time: String,
    pub duration: i64,
    pub status: String,
    pub payment_method: String,
    pub reason_for_visit: String,
}

impl NewBooking {
    /// `end_time` is derived from the start time plus the duration, wrapping
    /// past midnight like a plain time-of-day clock.
    pub fn new(
        patient_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        duration: i64,
        status: Status,
        payment_method: &str,
        reason_for_visit: &str,
    ) -> Self {
        let end = time + Duration::minutes(duration);
        Self {
            patient_id,
            booking_date: date.format("%Y-%m-%d").to_string(),
            booking_time: time.format("%H:%M:%S").to_string(),
            end_time: end.format("%H:%M:%S").to_string(),
            duration,
            status: status.backend_name().to_string(),
            payment_method: payment_method.to_string(),
            reason_for_visit: reason_for_visit.to_string(),
        }
    }
}

/* -------------------------
   Status vocabulary
--------------------------*/

/// Appointment lifecycle state. The backend speaks human-readable strings
/// (`"Pending"`, `"In Progress"`, ...); unrecognized strings are carried
/// through lower-cased instead of failing the whole load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Other(String),
}

impl Status {
    pub fn from_backend(raw: &str) -> Status {
        match raw {
            "Pending" => Status::Pending,
            "Confirmed" => Status::Confirmed,
            "In Progress" => Status::InProgress,
            "Completed" => Status::Completed,
            "Cancelled" => Status::Cancelled,
            other => Status::Other(other.to_lowercase()),
        }
    }

    /// Inverse of [`Status::from_backend`] for outbound writes. Unrecognized
    /// statuses fall back to `"Pending"`; no transition ever produces one.
    pub fn backend_name(&self) -> &str {
        match self {
            Status::Pending => "Pending",
            Status::Confirmed => "Confirmed",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::Cancelled => "Cancelled",
            Status::Other(_) => "Pending",
        }
    }

    /// Snake-case value as used by filter controls.
    pub fn from_internal(value: &str) -> Status {
        match value {
            "pending" => Status::Pending,
            "confirmed" => Status::Confirmed,
            "in_progress" => Status::InProgress,
            "completed" => Status::Completed,
            "cancelled" => Status::Cancelled,
            other => Status::Other(other.to_lowercase()),
        }
    }

    /// Human label for badges and list rows.
    pub fn label(&self) -> &str {
        match self {
            Status::Pending => "Pending",
            Status::Confirmed => "Confirmed",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::Cancelled => "Cancelled",
            Status::Other(_) => "Unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Pending => "pending",
            Status::Confirmed => "confirmed",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
            Status::Other(s) => s,
        };
        f.write_str(name)
    }
}

/* -------------------------
   Normalized appointment
--------------------------*/

#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    pub id: i64,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub patient_dob: String,
    /// Local wall-clock start. Built from the backend's separate date and
    /// time fields without any timezone conversion; converting through UTC
    /// here shifts appointments across day boundaries.
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
    pub duration_minutes: i64,
    pub status: Status,
    pub notes: String,
}

impl Appointment {
    pub fn from_record(rec: BookingRecord) -> Result<Self, AgendaError> {
        let scheduled_at = combine_local(&rec.booking_date, &rec.booking_time)?;
        let (first, last) = split_patient_name(&rec.patient_name);

        Ok(Self {
            id: rec.booking_id,
            patient_first_name: first,
            patient_last_name: last,
            patient_email: or_na(rec.email),
            patient_phone: or_na(rec.phone_number),
            patient_dob: or_na(rec.date_of_birth),
            scheduled_at,
            reason: rec
                .reason_for_visit
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "No reason specified".to_string()),
            duration_minutes: rec.duration.unwrap_or(30),
            status: Status::from_backend(&rec.status),
            notes: rec.notes.unwrap_or_default(),
        })
    }
}

fn or_na(value: Option<String>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Best-effort split on the first space: first token is the first name, the
/// remainder is the last name. Single-token names repeat the token so both
/// halves are always populated. Lossy for multi-part surnames.
pub fn split_patient_name(name: &str) -> (String, String) {
    match name.split_once(' ') {
        Some((first, rest)) if !rest.is_empty() => (first.to_string(), rest.to_string()),
        Some((first, _)) => (first.to_string(), first.to_string()),
        None => (name.to_string(), name.to_string()),
    }
}

/// Combine the date component (ISO date truncated at `T`) with the time of
/// day into a local timestamp. No timezone math happens here; the backend
/// already sends the doctor's local calendar date and clock time.
pub fn combine_local(booking_date: &str, booking_time: &str) -> Result<NaiveDateTime, AgendaError> {
    let date_part = match booking_date.split_once('T') {
        Some((date, _)) => date,
        None => booking_date,
    };

    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| AgendaError::InvalidDateTime(booking_date.to_string()))?;
    let time = NaiveTime::parse_from_str(booking_time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(booking_time, "%H:%M"))
        .map_err(|_| AgendaError::InvalidDateTime(booking_time.to_string()))?;

    Ok(date.and_time(time))
}

/// Parse user-entered `YYYY-MM-DDTHH:MM` (seconds optional) as local time.
pub fn parse_local_datetime(value: &str) -> Result<NaiveDateTime, AgendaError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .map_err(|_| AgendaError::InvalidDateTime(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: &str) -> BookingRecord {
        BookingRecord {
            booking_id: 7,
            patient_name: "John Smith".to_string(),
            email: None,
            phone_number: Some("555-0100".to_string()),
            date_of_birth: None,
            booking_date: "2024-03-01T16:00:00.000Z".to_string(),
            booking_time: "09:30:00".to_string(),
            reason_for_visit: Some("".to_string()),
            status: status.to_string(),
            notes: None,
            duration: None,
        }
    }

    #[test]
    fn test_status_normalization() {
        assert_eq!(Status::from_backend("Pending"), Status::Pending);
        assert_eq!(Status::from_backend("Confirmed"), Status::Confirmed);
        assert_eq!(Status::from_backend("In Progress"), Status::InProgress);
        assert_eq!(Status::from_backend("Completed"), Status::Completed);
        assert_eq!(Status::from_backend("Cancelled"), Status::Cancelled);

        // Unknown strings degrade to a lower-cased pass-through
        assert_eq!(
            Status::from_backend("No-Show"),
            Status::Other("no-show".to_string())
        );
    }

    #[test]
    fn test_status_round_trip() {
        for raw in ["Pending", "Confirmed", "Completed", "Cancelled"] {
            assert_eq!(Status::from_backend(raw).backend_name(), raw);
        }
    }

    #[test]
    fn test_split_patient_name() {
        assert_eq!(
            split_patient_name("John Smith"),
            ("John".to_string(), "Smith".to_string())
        );
        assert_eq!(
            split_patient_name("Mary Anne van Dyke"),
            ("Mary".to_string(), "Anne van Dyke".to_string())
        );
        // Single token repeats as the last name
        assert_eq!(
            split_patient_name("Cher"),
            ("Cher".to_string(), "Cher".to_string())
        );
        assert_eq!(
            split_patient_name("Cher "),
            ("Cher".to_string(), "Cher".to_string())
        );
    }

    #[test]
    fn test_combine_local_truncates_at_t() {
        let at = combine_local("2024-03-01T16:00:00.000Z", "09:30:00").unwrap();
        assert_eq!(
            at,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );

        // Plain date and short time also parse
        let at = combine_local("2024-03-01", "14:05").unwrap();
        assert_eq!(
            at,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(14, 5, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_combine_local_rejects_garbage() {
        assert!(matches!(
            combine_local("not-a-date", "09:00:00"),
            Err(AgendaError::InvalidDateTime(_))
        ));
        assert!(matches!(
            combine_local("2024-03-01", "not-a-time"),
            Err(AgendaError::InvalidDateTime(_))
        ));
    }

    #[test]
    fn test_from_record_defaults() {
        let apt = Appointment::from_record(record("Confirmed")).unwrap();
        assert_eq!(apt.id, 7);
        assert_eq!(apt.patient_first_name, "John");
        assert_eq!(apt.patient_last_name, "Smith");
        assert_eq!(apt.patient_email, "N/A");
        assert_eq!(apt.patient_phone, "555-0100");
        assert_eq!(apt.patient_dob, "N/A");
        assert_eq!(apt.reason, "No reason specified");
        assert_eq!(apt.duration_minutes, 30);
        assert_eq!(apt.status, Status::Confirmed);
        assert_eq!(apt.notes, "");
    }

    #[test]
    fn test_parse_local_datetime() {
        let at = parse_local_datetime("2024-05-01T10:30").unwrap();
        assert_eq!(
            at,
            NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap()
        );
        assert!(parse_local_datetime("2024-05-01T10:30:15").is_ok());
        assert!(matches!(
            parse_local_datetime("next tuesday"),
            Err(AgendaError::InvalidDateTime(_))
        ));
    }

    #[test]
    fn test_new_booking_end_time() {
        let booking = NewBooking::new(
            3,
            NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            NaiveTime::from_hms_opt(11, 45, 0).unwrap(),
            30,
            Status::Pending,
            "Cash",
            "Checkup",
        );
        assert_eq!(booking.booking_date, "2024-04-02");
        assert_eq!(booking.booking_time, "11:45:00");
        assert_eq!(booking.end_time, "12:15:00");
        assert_eq!(booking.status, "Pending");
    }
}
