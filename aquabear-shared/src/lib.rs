pub mod models;
pub mod pii;

pub use models::events::{ConsoleEvent, InsertEvent};
pub use models::reservation::{NewReservation, Reservation, ReservationStatus, ServiceType};
pub use pii::Masked;
