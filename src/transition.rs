use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::ScheduleBackend;
use crate::error::AgendaError;
use crate::models::{Appointment, Status, parse_local_datetime};
use crate::store::AppointmentStore;

/* -------------------------
   Transition table
--------------------------*/

/// User-triggered lifecycle actions. Reschedule is handled separately
/// because it also carries a new date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    Confirm,
    Cancel,
    Complete,
    Reopen,
}

impl TransitionAction {
    /// Status the appointment ends up in when the action succeeds.
    pub fn target(self) -> Status {
        match self {
            TransitionAction::Confirm | TransitionAction::Reopen => Status::Confirmed,
            TransitionAction::Cancel => Status::Cancelled,
            TransitionAction::Complete => Status::Completed,
        }
    }
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionAction::Confirm => "confirm",
            TransitionAction::Cancel => "cancel",
            TransitionAction::Complete => "complete",
            TransitionAction::Reopen => "reopen",
        };
        f.write_str(name)
    }
}

/// Legal actions per current status, in one table. The UI derives its action
/// menus from this, and the controller re-checks it before any network call.
pub fn allowed_actions(status: &Status) -> &'static [TransitionAction] {
    use TransitionAction::*;
    match status {
        Status::Pending => &[Confirm, Cancel],
        Status::Confirmed => &[Complete, Cancel],
        Status::Completed => &[Reopen],
        Status::Cancelled | Status::InProgress | Status::Other(_) => &[],
    }
}

/// The reschedule affordance applies to cancelled appointments only; on
/// success the appointment comes back as confirmed at the new time.
pub fn can_reschedule(status: &Status) -> bool {
    *status == Status::Cancelled
}

/* -------------------------
   Controller
--------------------------*/

/// Applies lifecycle changes transactionally: validate locally, call the
/// backend, then mirror into the store. A failed call leaves the store
/// untouched, so retrying is safe.
pub struct StatusTransitionController {
    backend: Arc<dyn ScheduleBackend>,
    in_flight: Mutex<HashSet<i64>>,
}

impl StatusTransitionController {
    pub fn new(backend: Arc<dyn ScheduleBackend>) -> Self {
        Self {
            backend,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Apply a status action. Illegal actions for the current status fail
    /// with `InvalidTransition` before any network traffic.
    pub async fn transition(
        &self,
        store: &mut AppointmentStore,
        id: i64,
        action: TransitionAction,
    ) -> Result<Appointment, AgendaError> {
        let from = store
            .find_by_id(id)
            .ok_or(AgendaError::NotFound)?
            .status
            .clone();
        if !allowed_actions(&from).contains(&action) {
            return Err(AgendaError::InvalidTransition {
                from,
                action: action.to_string(),
            });
        }

        let target = action.target();
        let _guard = self.begin(id)?;
        self.backend
            .update_status(id, target.backend_name())
            .await
            .map_err(remote)?;

        store.apply_status(id, target);
        store.find_by_id(id).cloned().ok_or(AgendaError::NotFound)
    }

    /// Move a cancelled appointment to a new local date and time. The new
    /// value must parse as `YYYY-MM-DDTHH:MM` (seconds optional).
    pub async fn reschedule(
        &self,
        store: &mut AppointmentStore,
        id: i64,
        new_datetime: &str,
    ) -> Result<Appointment, AgendaError> {
        let at = parse_local_datetime(new_datetime)?;

        let from = store
            .find_by_id(id)
            .ok_or(AgendaError::NotFound)?
            .status
            .clone();
        if !can_reschedule(&from) {
            return Err(AgendaError::InvalidTransition {
                from,
                action: "reschedule".to_string(),
            });
        }

        let _guard = self.begin(id)?;
        self.backend
            .reschedule(id, at.date(), at.time())
            .await
            .map_err(remote)?;

        store.apply_reschedule(id, at);
        store.find_by_id(id).cloned().ok_or(AgendaError::NotFound)
    }

    /// Backend-confirmed notes update, then the local mirror.
    pub async fn update_notes(
        &self,
        store: &mut AppointmentStore,
        id: i64,
        notes: &str,
    ) -> Result<Appointment, AgendaError> {
        store.find_by_id(id).ok_or(AgendaError::NotFound)?;

        let _guard = self.begin(id)?;
        self.backend.update_notes(id, notes).await.map_err(remote)?;

        store.update_notes(id, notes);
        store.find_by_id(id).cloned().ok_or(AgendaError::NotFound)
    }

    /// Delete on the backend, then drop the record from the store.
    pub async fn remove(
        &self,
        store: &mut AppointmentStore,
        id: i64,
    ) -> Result<(), AgendaError> {
        store.find_by_id(id).ok_or(AgendaError::NotFound)?;

        let _guard = self.begin(id)?;
        self.backend
            .delete_appointment(id)
            .await
            .map_err(remote)?;

        store.remove(id);
        Ok(())
    }

    /// Reserve the id for the duration of one mutation. A second mutating
    /// call on the same id while the first is unresolved is rejected, so a
    /// slow response can never overwrite a newer confirmed state.
    fn begin(&self, id: i64) -> Result<InFlightGuard<'_>, AgendaError> {
        let mut set = lock(&self.in_flight);
        if !set.insert(id) {
            return Err(AgendaError::UpdateInFlight(id));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            id,
        })
    }
}

/// Releases the per-id reservation on every exit path.
#[derive(Debug)]
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<i64>>,
    id: i64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.id);
    }
}

fn lock(set: &Mutex<HashSet<i64>>) -> MutexGuard<'_, HashSet<i64>> {
    set.lock().unwrap_or_else(|e| e.into_inner())
}

/// Session expiry keeps its identity so the caller redirects instead of
/// toasting; every other backend failure becomes a remote-update rejection.
fn remote(e: AgendaError) -> AgendaError {
    match e {
        AgendaError::SessionExpired => e,
        other => AgendaError::RemoteUpdate(Box::new(other)),
    }
}
