pub mod booking;
pub mod calendar;
pub mod console;
pub mod dates;
pub mod dispatch;
pub mod notice;
pub mod outbound;
pub mod repository;
pub mod session;
pub mod workflow;

pub use booking::{BookingError, BookingIntake, BookingRequest};
pub use console::{
    ConsoleContext, ConsoleError, ConsoleSettings, ConsoleView, ReservationConsole, StatusChange,
    StatusCounts, StatusFilter,
};
pub use dispatch::{BookingNotification, DispatchError, NotificationDispatcher};
pub use notice::{AlertSink, TransientNotice};
pub use repository::{InsertSubscription, ReservationStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Reservation not found: {0}")]
    NotFound(uuid::Uuid),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed record: {0}")]
    Malformed(String),
    #[error("Store error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
