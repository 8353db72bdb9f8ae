use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::api::ScheduleBackend;
use crate::error::AgendaError;
use crate::models::{Appointment, BookingRecord, Status};

/// In-memory collection of the doctor's appointments for the current view.
///
/// The collection is a cache of backend state, never the source of truth:
/// every mutation lands here only after the backend confirmed the
/// corresponding call, so a failed call leaves the prior state intact.
pub struct AppointmentStore {
    backend: Arc<dyn ScheduleBackend>,
    items: Vec<Appointment>,
}

impl AppointmentStore {
    pub fn new(backend: Arc<dyn ScheduleBackend>) -> Self {
        Self {
            backend,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[Appointment] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace the whole collection with the backend's current list.
    /// On failure the existing items stay untouched; a stale list beats a
    /// blank screen.
    pub async fn load_all(&mut self) -> Result<usize, AgendaError> {
        let records = self.backend.fetch_appointments().await?;
        self.items = normalize_records(records);
        Ok(self.items.len())
    }

    /// Range-bounded load over the schedule endpoint, both bounds inclusive.
    pub async fn load_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize, AgendaError> {
        let records = self.backend.fetch_schedule(start, end).await?;
        self.items = normalize_records(records);
        Ok(self.items.len())
    }

    /// O(n); per-doctor collections stay well under a few hundred records.
    pub fn find_by_id(&self, id: i64) -> Option<&Appointment> {
        self.items.iter().find(|a| a.id == id)
    }

    /// In-place status change, a no-op when the id is not present.
    pub fn apply_status(&mut self, id: i64, status: Status) {
        if let Some(apt) = self.items.iter_mut().find(|a| a.id == id) {
            apt.status = status;
        }
    }

    pub fn update_notes(&mut self, id: i64, notes: &str) {
        if let Some(apt) = self.items.iter_mut().find(|a| a.id == id) {
            apt.notes = notes.to_string();
        }
    }

    /// Move the appointment to a new local start and mark it confirmed.
    pub fn apply_reschedule(&mut self, id: i64, at: NaiveDateTime) {
        if let Some(apt) = self.items.iter_mut().find(|a| a.id == id) {
            apt.scheduled_at = at;
            apt.status = Status::Confirmed;
        }
    }

    pub fn remove(&mut self, id: i64) {
        self.items.retain(|a| a.id != id);
    }

    /// Fetch the detail record and fold in the fields the list view lacks
    /// (date of birth, notes).
    pub async fn refresh_detail(&mut self, id: i64) -> Result<&Appointment, AgendaError> {
        let detail = self.backend.fetch_appointment(id).await?;

        let Some(apt) = self.items.iter_mut().find(|a| a.id == id) else {
            return Err(AgendaError::NotFound);
        };
        if let Some(dob) = detail.date_of_birth.filter(|v| !v.is_empty()) {
            apt.patient_dob = dob;
        }
        if let Some(notes) = detail.notes.filter(|v| !v.is_empty()) {
            apt.notes = notes;
        }
        Ok(apt)
    }
}

/// A record whose date and time cannot be combined into a valid local
/// timestamp is skipped rather than poisoning the whole load.
fn normalize_records(records: Vec<BookingRecord>) -> Vec<Appointment> {
    records
        .into_iter()
        .filter_map(|rec| {
            let id = rec.booking_id;
            match Appointment::from_record(rec) {
                Ok(apt) => Some(apt),
                Err(e) => {
                    warn!("skipping malformed booking {id}: {e}");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockBackend {
        records: Vec<BookingRecord>,
        detail: Option<BookingRecord>,
        fail: bool,
    }

    impl MockBackend {
        fn with_records(records: Vec<BookingRecord>) -> Self {
            Self {
                records,
                detail: None,
                fail: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl ScheduleBackend for MockBackend {
        async fn fetch_appointments(&self) -> Result<Vec<BookingRecord>, AgendaError> {
            if self.fail {
                return Err(AgendaError::Http {
                    status: 500,
                    message: "db down".to_string(),
                });
            }
            Ok(self.records.clone())
        }

        async fn fetch_schedule(
            &self,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<BookingRecord>, AgendaError> {
            self.fetch_appointments().await
        }

        async fn fetch_appointment(&self, _id: i64) -> Result<BookingRecord, AgendaError> {
            self.detail.clone().ok_or(AgendaError::NotFound)
        }

        async fn create_appointment(
            &self,
            _booking: &crate::models::NewBooking,
        ) -> Result<BookingRecord, AgendaError> {
            Err(AgendaError::NotFound)
        }

        async fn update_status(&self, _id: i64, _status: &str) -> Result<(), AgendaError> {
            Ok(())
        }

        async fn update_notes(&self, _id: i64, _notes: &str) -> Result<(), AgendaError> {
            Ok(())
        }

        async fn reschedule(
            &self,
            _id: i64,
            _date: NaiveDate,
            _time: chrono::NaiveTime,
        ) -> Result<(), AgendaError> {
            Ok(())
        }

        async fn delete_appointment(&self, _id: i64) -> Result<(), AgendaError> {
            Ok(())
        }
    }

    fn record(id: i64, date: &str, time: &str) -> BookingRecord {
        BookingRecord {
            booking_id: id,
            patient_name: "Ada Lovelace".to_string(),
            email: None,
            phone_number: None,
            date_of_birth: None,
            booking_date: date.to_string(),
            booking_time: time.to_string(),
            reason_for_visit: Some("Checkup".to_string()),
            status: "Pending".to_string(),
            notes: None,
            duration: None,
        }
    }

    #[tokio::test]
    async fn test_load_all_replaces_collection() {
        let backend = Arc::new(MockBackend::with_records(vec![
            record(1, "2024-03-01", "09:00:00"),
            record(2, "2024-03-02", "10:00:00"),
        ]));
        let mut store = AppointmentStore::new(backend);

        assert_eq!(store.load_all().await.unwrap(), 2);
        assert_eq!(store.len(), 2);
        assert!(store.find_by_id(1).is_some());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_stale_data() {
        let ok = Arc::new(MockBackend::with_records(vec![record(
            1,
            "2024-03-01",
            "09:00:00",
        )]));
        let mut store = AppointmentStore::new(ok);
        store.load_all().await.unwrap();

        store.backend = Arc::new(MockBackend {
            records: vec![],
            detail: None,
            fail: true,
        });
        assert!(store.load_all().await.is_err());
        // The earlier list is still there
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let backend = Arc::new(MockBackend::with_records(vec![
            record(1, "2024-03-01", "09:00:00"),
            record(2, "garbage", "10:00:00"),
        ]));
        let mut store = AppointmentStore::new(backend);

        assert_eq!(store.load_all().await.unwrap(), 1);
        assert!(store.find_by_id(2).is_none());
    }

    #[tokio::test]
    async fn test_local_mutations() {
        let backend = Arc::new(MockBackend::with_records(vec![record(
            5,
            "2024-03-01",
            "09:00:00",
        )]));
        let mut store = AppointmentStore::new(backend);
        store.load_all().await.unwrap();

        store.apply_status(5, Status::Confirmed);
        assert_eq!(store.find_by_id(5).unwrap().status, Status::Confirmed);

        // Missing ids are a no-op
        store.apply_status(99, Status::Cancelled);
        assert_eq!(store.len(), 1);

        store.update_notes(5, "bring x-rays");
        assert_eq!(store.find_by_id(5).unwrap().notes, "bring x-rays");

        let at = chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        store.apply_status(5, Status::Cancelled);
        store.apply_reschedule(5, at);
        let apt = store.find_by_id(5).unwrap();
        assert_eq!(apt.scheduled_at, at);
        assert_eq!(apt.status, Status::Confirmed);

        store.remove(5);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_detail_merges_fields() {
        let mut detail = record(5, "2024-03-01", "09:00:00");
        detail.date_of_birth = Some("1990-01-15".to_string());
        detail.notes = Some("allergic to penicillin".to_string());

        let backend = Arc::new(MockBackend {
            records: vec![record(5, "2024-03-01", "09:00:00")],
            detail: Some(detail),
            fail: false,
        });
        let mut store = AppointmentStore::new(backend);
        store.load_all().await.unwrap();

        let apt = store.refresh_detail(5).await.unwrap();
        assert_eq!(apt.patient_dob, "1990-01-15");
        assert_eq!(apt.notes, "allergic to penicillin");
    }
}
