//! The staff-side Reservation Console.
//!
//! Holds a write-through mirror of the reservation store. Status changes and
//! deletions are reflected locally only after the store confirms them;
//! realtime inserts are prepended as they arrive and raise a transient notice.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use aquabear_shared::{ConsoleEvent, Reservation, ReservationStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::calendar::{self, CalendarMonth, CalendarView};
use crate::notice::{AlertSink, TransientNotice};
use crate::outbound::{self, OutboundMessage, DEFAULT_CLUB_NAME};
use crate::repository::{InsertSubscription, ReservationStore};
use crate::workflow::{self, StaffAction, WorkflowError};
use crate::{StoreError, StoreResult};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    /// How long a realtime arrival stays on the notice banner.
    pub notice_delay: Duration,
    /// Upper bound on every store call made by the console.
    pub store_timeout: Duration,
    pub club_name: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            notice_delay: Duration::from_secs(10),
            store_timeout: Duration::from_secs(10),
            club_name: DEFAULT_CLUB_NAME.to_string(),
        }
    }
}

/// Session-scoped collaborators handed to the console on construction.
#[derive(Clone)]
pub struct ConsoleContext {
    pub store: Arc<dyn ReservationStore>,
    pub alerts: Arc<dyn AlertSink>,
    pub settings: ConsoleSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Reservation not found: {0}")]
    NotFound(Uuid),

    #[error("Reservation {0} already has an operation in flight")]
    Busy(Uuid),

    #[error(transparent)]
    Transition(#[from] WorkflowError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Per-status totals, always derived from the cache on demand.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub all: usize,
}

impl StatusCounts {
    pub fn tally(reservations: &[Reservation]) -> Self {
        reservations.iter().fold(
            StatusCounts {
                all: reservations.len(),
                ..Default::default()
            },
            |mut counts, r| {
                match r.status {
                    ReservationStatus::Pending => counts.pending += 1,
                    ReservationStatus::Confirmed => counts.confirmed += 1,
                    ReservationStatus::Cancelled => counts.cancelled += 1,
                }
                counts
            },
        )
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Confirmed,
    Cancelled,
}

impl StatusFilter {
    pub fn matches(&self, status: ReservationStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == ReservationStatus::Pending,
            StatusFilter::Confirmed => status == ReservationStatus::Confirmed,
            StatusFilter::Cancelled => status == ReservationStatus::Cancelled,
        }
    }
}

/// What the console renders: filtered records plus unfiltered counts.
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleView {
    pub reservations: Vec<Reservation>,
    pub counts: StatusCounts,
    pub notice: Option<TransientNotice>,
    pub loading: bool,
}

/// Result of a confirmed status change.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub reservation: Reservation,
    pub message: OutboundMessage,
}

#[derive(Default)]
struct ConsoleState {
    reservations: Vec<Reservation>,
    notice: Option<TransientNotice>,
    notice_timer: Option<JoinHandle<()>>,
}

/// Ids that arrived through the insert feed while at least one fetch was in
/// flight. A fetch snapshot may predate them, so they are merged back in.
#[derive(Default)]
struct FetchWindow {
    open: usize,
    arrivals: Vec<Uuid>,
}

struct Shared {
    state: RwLock<ConsoleState>,
    busy: Mutex<HashSet<Uuid>>,
    loading: AtomicUsize,
    fetches: Mutex<FetchWindow>,
    events: broadcast::Sender<ConsoleEvent>,
    alerts: Arc<dyn AlertSink>,
    notice_delay: Duration,
}

impl Shared {
    fn publish(&self, event: ConsoleEvent) {
        // No attached staff streams is fine.
        let _ = self.events.send(event);
    }

    async fn on_insert(self: &Arc<Self>, record: Reservation) {
        let id = record.id;
        {
            let mut state = self.state.write().await;
            if state.reservations.iter().any(|r| r.id == id) {
                tracing::debug!(reservation_id = %id, "Duplicate insert event ignored");
                return;
            }
            state.reservations.insert(0, record.clone());
            self.note_arrival(id);
            if let Some(timer) = state.notice_timer.take() {
                timer.abort();
            }
            state.notice = Some(TransientNotice::new(record.clone(), self.notice_delay));
        }

        tracing::info!(reservation_id = %id, client = %record.name, "New reservation received");
        self.publish(ConsoleEvent::Inserted {
            reservation: record.clone(),
        });

        self.publish(ConsoleEvent::Alert { id });
        if let Err(e) = self.alerts.play(&record).await {
            tracing::debug!(reservation_id = %id, error = %e, "Alert not played");
        }

        let mut state = self.state.write().await;
        if state.notice.as_ref().map(TransientNotice::reservation_id) == Some(id) {
            state.notice_timer = Some(self.schedule_dismissal(id));
        }
    }

    fn schedule_dismissal(self: &Arc<Self>, id: Uuid) -> JoinHandle<()> {
        let shared: Weak<Shared> = Arc::downgrade(self);
        let delay = self.notice_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                shared.expire_notice(id).await;
            }
        })
    }

    async fn expire_notice(&self, id: Uuid) {
        {
            let mut state = self.state.write().await;
            if state.notice.as_ref().map(TransientNotice::reservation_id) != Some(id) {
                return;
            }
            state.notice = None;
            // This task is the timer; let its handle go without aborting it.
            state.notice_timer = None;
        }
        self.publish(ConsoleEvent::NoticeCleared { id });
    }

    fn note_arrival(&self, id: Uuid) {
        let mut window = self.fetches.lock().unwrap_or_else(PoisonError::into_inner);
        if window.open > 0 {
            window.arrivals.push(id);
        }
    }

    fn forget_arrival(&self, id: Uuid) {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .arrivals
            .retain(|a| *a != id);
    }

    /// Cached records that arrived during the fetch but are missing from
    /// `fetched`, newest first, followed by the fetched set.
    fn merge_arrivals(&self, cached: &[Reservation], fetched: Vec<Reservation>) -> Vec<Reservation> {
        let arrivals = self
            .fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .arrivals
            .clone();

        let mut merged: Vec<Reservation> = arrivals
            .iter()
            .rev()
            .filter(|id| !fetched.iter().any(|r| r.id == **id))
            .filter_map(|id| cached.iter().find(|r| r.id == *id).cloned())
            .collect();
        if !merged.is_empty() {
            tracing::debug!(kept = merged.len(), "Kept inserts newer than the fetched snapshot");
        }
        merged.extend(fetched);
        merged
    }

    fn is_busy(&self, id: Uuid) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }
}

/// Marks one id busy for as long as it lives. Dropping it (including when the
/// owning future is cancelled) clears the mark.
struct BusyGuard {
    shared: Arc<Shared>,
    id: Uuid,
}

impl BusyGuard {
    fn acquire(shared: &Arc<Shared>, id: Uuid) -> Option<Self> {
        let mut busy = shared.busy.lock().unwrap_or_else(PoisonError::into_inner);
        busy.insert(id).then(|| BusyGuard {
            shared: shared.clone(),
            id,
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.shared
            .busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        LoadingGuard(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Keeps the fetch window open while a fetch is in flight.
struct FetchGuard<'a>(&'a Mutex<FetchWindow>);

impl<'a> FetchGuard<'a> {
    fn open(window: &'a Mutex<FetchWindow>) -> Self {
        window.lock().unwrap_or_else(PoisonError::into_inner).open += 1;
        FetchGuard(window)
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        let mut window = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        window.open -= 1;
        if window.open == 0 {
            window.arrivals.clear();
        }
    }
}

pub struct ReservationConsole {
    shared: Arc<Shared>,
    store: Arc<dyn ReservationStore>,
    store_timeout: Duration,
    club_name: String,
    ingest: Mutex<Option<JoinHandle<()>>>,
}

impl ReservationConsole {
    pub fn new(ctx: ConsoleContext) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(ConsoleState::default()),
                busy: Mutex::new(HashSet::new()),
                loading: AtomicUsize::new(0),
                fetches: Mutex::new(FetchWindow::default()),
                events,
                alerts: ctx.alerts,
                notice_delay: ctx.settings.notice_delay,
            }),
            store: ctx.store,
            store_timeout: ctx.settings.store_timeout,
            club_name: ctx.settings.club_name,
            ingest: Mutex::new(None),
        }
    }

    /// Open the insert feed, then fetch the full record set. Subscribing
    /// first means nothing inserted during the initial fetch is missed: the
    /// duplicate check absorbs overlap and `load_all` keeps arrivals the
    /// snapshot predates. Failures are logged and leave an empty or stale
    /// console rather than aborting.
    pub async fn mount(&self) {
        match self.call_store(self.store.subscribe_inserts()).await {
            Ok(subscription) => {
                let handle = tokio::spawn(run_ingest(self.shared.clone(), subscription));
                let previous = self
                    .ingest
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .replace(handle);
                if let Some(previous) = previous {
                    previous.abort();
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to subscribe to new reservations");
            }
        }

        // load_all logs its own failure
        let _ = self.load_all().await;
    }

    /// Replace the cache with a fresh fetch, newest first. On failure the
    /// previous cache is kept. Realtime inserts that land while the fetch is
    /// in flight survive it. Concurrent status changes may be overwritten by
    /// a fetch that started before them (last fetch wins).
    pub async fn load_all(&self) -> Result<usize, ConsoleError> {
        let _loading = LoadingGuard::enter(&self.shared.loading);
        let _window = FetchGuard::open(&self.shared.fetches);

        let records = match self.call_store(self.store.list_all()).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load reservations");
                return Err(e);
            }
        };

        let count = {
            let mut state = self.shared.state.write().await;
            let merged = self.shared.merge_arrivals(&state.reservations, records);
            state.reservations = merged;
            state.reservations.len()
        };

        tracing::debug!(count, "Reservation cache refreshed");
        self.shared.publish(ConsoleEvent::Refreshed { count });
        Ok(count)
    }

    /// Move a pending reservation to `confirmed` or `cancelled`. The cache is
    /// touched only after the store accepts the update; the outbound message
    /// is composed from the record as it was before the change.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<StatusChange, ConsoleError> {
        let action = StaffAction::for_status(status).ok_or(WorkflowError::NotSettable(status))?;
        let (_busy, before) = self.begin(id, action).await?;

        if let Err(e) = self.call_store(self.store.update_status(id, status)).await {
            tracing::error!(reservation_id = %id, %status, error = %e, "Failed to update reservation status");
            return Err(e);
        }

        let message = outbound::compose(&before, status == ReservationStatus::Confirmed, &self.club_name);

        let reservation = {
            let mut state = self.shared.state.write().await;
            match state.reservations.iter_mut().find(|r| r.id == id) {
                Some(entry) => {
                    entry.status = status;
                    entry.clone()
                }
                None => Reservation { status, ..before },
            }
        };

        tracing::info!(reservation_id = %id, %status, "Reservation status updated");
        self.shared.publish(ConsoleEvent::StatusChanged { id, status });

        Ok(StatusChange {
            reservation,
            message,
        })
    }

    /// Delete a resolved reservation. Pending records are refused.
    pub async fn remove(&self, id: Uuid) -> Result<Reservation, ConsoleError> {
        let (_busy, before) = self.begin(id, StaffAction::Delete).await?;

        if let Err(e) = self.call_store(self.store.delete(id)).await {
            tracing::error!(reservation_id = %id, error = %e, "Failed to delete reservation");
            return Err(e);
        }

        self.shared
            .state
            .write()
            .await
            .reservations
            .retain(|r| r.id != id);
        self.shared.forget_arrival(id);

        tracing::info!(reservation_id = %id, "Reservation removed");
        self.shared.publish(ConsoleEvent::Removed { id });
        Ok(before)
    }

    async fn begin(
        &self,
        id: Uuid,
        action: StaffAction,
    ) -> Result<(BusyGuard, Reservation), ConsoleError> {
        let state = self.shared.state.read().await;
        let record = state
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(ConsoleError::NotFound(id))?;

        workflow::authorize(record.status, action)?;
        let guard = BusyGuard::acquire(&self.shared, id).ok_or(ConsoleError::Busy(id))?;
        Ok((guard, record))
    }

    async fn call_store<T>(
        &self,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, ConsoleError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(ConsoleError::from),
            Err(_) => Err(ConsoleError::Timeout(self.store_timeout)),
        }
    }

    pub async fn snapshot(&self, filter: StatusFilter) -> Vec<Reservation> {
        self.shared
            .state
            .read()
            .await
            .reservations
            .iter()
            .filter(|r| filter.matches(r.status))
            .cloned()
            .collect()
    }

    pub async fn view(&self, filter: StatusFilter) -> ConsoleView {
        let state = self.shared.state.read().await;
        ConsoleView {
            reservations: state
                .reservations
                .iter()
                .filter(|r| filter.matches(r.status))
                .cloned()
                .collect(),
            counts: StatusCounts::tally(&state.reservations),
            notice: state.notice.clone(),
            loading: self.is_loading(),
        }
    }

    pub async fn counts(&self) -> StatusCounts {
        StatusCounts::tally(&self.shared.state.read().await.reservations)
    }

    pub async fn get(&self, id: Uuid) -> Option<Reservation> {
        self.shared
            .state
            .read()
            .await
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub async fn calendar(&self, month: CalendarMonth, today: NaiveDate) -> CalendarView {
        calendar::project(month, &self.shared.state.read().await.reservations, today)
    }

    pub async fn select_day(&self, date: &str) -> Option<Reservation> {
        calendar::select_day(&self.shared.state.read().await.reservations, date)
    }

    pub async fn active_notice(&self) -> Option<TransientNotice> {
        self.shared.state.read().await.notice.clone()
    }

    /// Close the notice banner now. Returns the id it was showing.
    pub async fn dismiss_notice(&self) -> Option<Uuid> {
        let id = {
            let mut state = self.shared.state.write().await;
            if let Some(timer) = state.notice_timer.take() {
                timer.abort();
            }
            state.notice.take().map(|n| n.reservation_id())
        }?;
        self.shared.publish(ConsoleEvent::NoticeCleared { id });
        Some(id)
    }

    pub fn is_busy(&self, id: Uuid) -> bool {
        self.shared.is_busy(id)
    }

    pub fn is_loading(&self) -> bool {
        self.shared.loading.load(Ordering::SeqCst) > 0
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.shared.events.subscribe()
    }

    pub fn club_name(&self) -> &str {
        &self.club_name
    }

    /// Stop realtime ingestion and the notice timer. The insert subscription
    /// is released before this returns.
    pub async fn shutdown(&self) {
        let ingest = self
            .ingest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = ingest {
            handle.abort();
            let _ = handle.await;
        }

        if let Some(timer) = self.shared.state.write().await.notice_timer.take() {
            timer.abort();
        }
        tracing::info!("Reservation console shut down");
    }
}

impl Drop for ReservationConsole {
    fn drop(&mut self) {
        let ingest = self
            .ingest
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = ingest {
            handle.abort();
        }
        if let Ok(mut state) = self.shared.state.try_write() {
            if let Some(timer) = state.notice_timer.take() {
                timer.abort();
            }
        }
    }
}

async fn run_ingest(shared: Arc<Shared>, mut subscription: InsertSubscription) {
    tracing::info!(channel = subscription.channel(), "Listening for new reservations");
    while let Some(event) = subscription.recv().await {
        shared.on_insert(event.record).await;
    }
    tracing::warn!(channel = subscription.channel(), "Insert feed closed");
}
