use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::Config;
use crate::error::AgendaError;
use crate::models::{BookingRecord, NewBooking};

/// REST surface of the clinic backend consumed by the agenda. A trait so the
/// store and the transition controller can run against a mock.
#[async_trait]
pub trait ScheduleBackend: Send + Sync {
    async fn fetch_appointments(&self) -> Result<Vec<BookingRecord>, AgendaError>;
    async fn fetch_schedule(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BookingRecord>, AgendaError>;
    async fn fetch_appointment(&self, id: i64) -> Result<BookingRecord, AgendaError>;
    async fn create_appointment(
        &self,
        booking: &NewBooking,
    ) -> Result<BookingRecord, AgendaError>;
    async fn update_status(&self, id: i64, status: &str) -> Result<(), AgendaError>;
    async fn update_notes(&self, id: i64, notes: &str) -> Result<(), AgendaError>;
    async fn reschedule(
        &self,
        id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<(), AgendaError>;
    async fn delete_appointment(&self, id: i64) -> Result<(), AgendaError>;
}

/* -------------------------
   HTTP client
--------------------------*/

/// JSON-over-HTTPS client for the doctor endpoints. Authentication rides on
/// the session cookie, so the cookie store is enabled.
pub struct DoctorApi {
    base_url: String,
    http: reqwest::Client,
}

impl DoctorApi {
    pub fn new(cfg: &Config) -> Result<Self, AgendaError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and apply the shared response policy: 401 means the
    /// session is gone, 404 surfaces as not-found, any other non-2xx carries
    /// the backend's error message.
    async fn execute(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AgendaError> {
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            return Err(status_error(status.as_u16(), &body));
        }

        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AgendaError> {
        let resp = self
            .execute(self.http.get(self.url(path)).query(query))
            .await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ScheduleBackend for DoctorApi {
    async fn fetch_appointments(&self) -> Result<Vec<BookingRecord>, AgendaError> {
        self.get_json("/api/doctor/appointments", &[]).await
    }

    async fn fetch_schedule(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BookingRecord>, AgendaError> {
        let query = [
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
        ];
        self.get_json("/api/doctor/schedule", &query).await
    }

    async fn fetch_appointment(&self, id: i64) -> Result<BookingRecord, AgendaError> {
        self.get_json(&format!("/api/doctor/appointments/{id}"), &[])
            .await
    }

    async fn create_appointment(
        &self,
        booking: &NewBooking,
    ) -> Result<BookingRecord, AgendaError> {
        let resp = self
            .execute(self.http.post(self.url("/api/doctor/appointments")).json(booking))
            .await?;
        Ok(resp.json().await?)
    }

    async fn update_status(&self, id: i64, status: &str) -> Result<(), AgendaError> {
        self.execute(
            self.http
                .put(self.url(&format!("/api/doctor/appointments/{id}/status")))
                .json(&json!({ "status": status })),
        )
        .await?;
        Ok(())
    }

    async fn update_notes(&self, id: i64, notes: &str) -> Result<(), AgendaError> {
        self.execute(
            self.http
                .put(self.url(&format!("/api/doctor/appointments/{id}/notes")))
                .json(&json!({ "notes": notes })),
        )
        .await?;
        Ok(())
    }

    async fn reschedule(
        &self,
        id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<(), AgendaError> {
        self.execute(
            self.http
                .put(self.url(&format!("/api/doctor/appointments/{id}/reschedule")))
                .json(&json!({
                    "booking_date": date.format("%Y-%m-%d").to_string(),
                    "booking_time": time.format("%H:%M:%S").to_string(),
                })),
        )
        .await?;
        Ok(())
    }

    async fn delete_appointment(&self, id: i64) -> Result<(), AgendaError> {
        self.execute(
            self.http
                .delete(self.url(&format!("/api/doctor/appointments/{id}"))),
        )
        .await?;
        Ok(())
    }
}

/* -------------------------
   Response policy helpers
--------------------------*/

fn status_error(status: u16, body: &Value) -> AgendaError {
    match status {
        401 => AgendaError::SessionExpired,
        404 => AgendaError::NotFound,
        s => AgendaError::Http {
            status: s,
            message: error_message(body),
        },
    }
}

/// Backend error payloads carry either an `error` or a `message` field.
fn error_message(body: &Value) -> String {
    body.get("error")
        .and_then(Value::as_str)
        .or_else(|| body.get("message").and_then(Value::as_str))
        .unwrap_or("API request failed")
        .to_string()
}
