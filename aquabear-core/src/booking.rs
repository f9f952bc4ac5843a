//! Public booking intake: validation, slot availability and the single
//! pending insert.

use std::sync::Arc;

use aquabear_shared::{Masked, NewReservation, Reservation, ServiceType};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::dispatch::{BookingNotification, NotificationDispatcher};
use crate::repository::ReservationStore;
use crate::StoreError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub value: &'static str,
    pub label: &'static str,
    #[serde(skip)]
    pub hour: u32,
}

const fn slot(value: &'static str, label: &'static str, hour: u32) -> TimeSlot {
    TimeSlot { value, label, hour }
}

/// Hourly slots offered by the club, 06:00 through 21:00.
pub const TIME_SLOTS: [TimeSlot; 16] = [
    slot("06:00", "6:00 AM", 6),
    slot("07:00", "7:00 AM", 7),
    slot("08:00", "8:00 AM", 8),
    slot("09:00", "9:00 AM", 9),
    slot("10:00", "10:00 AM", 10),
    slot("11:00", "11:00 AM", 11),
    slot("12:00", "12:00 PM", 12),
    slot("13:00", "1:00 PM", 13),
    slot("14:00", "2:00 PM", 14),
    slot("15:00", "3:00 PM", 15),
    slot("16:00", "4:00 PM", 16),
    slot("17:00", "5:00 PM", 17),
    slot("18:00", "6:00 PM", 18),
    slot("19:00", "7:00 PM", 19),
    slot("20:00", "8:00 PM", 20),
    slot("21:00", "9:00 PM", 21),
];

/// Not in the past, and the club is closed on Sundays.
pub fn is_date_bookable(date: NaiveDate, today: NaiveDate) -> bool {
    date >= today && date.weekday() != Weekday::Sun
}

/// Slots still open on `date` as seen at `now`. Same-day bookings only get
/// slots whose hour is strictly after the current one.
pub fn available_slots(date: NaiveDate, now: NaiveDateTime) -> Vec<TimeSlot> {
    let today = now.date();
    if !is_date_bookable(date, today) {
        return Vec::new();
    }
    if date == today {
        TIME_SLOTS
            .iter()
            .filter(|s| s.hour > now.hour())
            .copied()
            .collect()
    } else {
        TIME_SLOTS.to_vec()
    }
}

/// Raw form submission from the public site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default = "default_participants")]
    pub participants: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_participants() -> i32 {
    1
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Por favor selecciona una fecha")]
    MissingDate,
    #[error("Por favor selecciona un horario")]
    MissingTime,
    #[error("Por favor selecciona un tipo de servicio")]
    MissingService,
    #[error("Por favor completa el campo {0}")]
    MissingField(&'static str),
    #[error("El campo {field} admite como máximo {max} caracteres")]
    TooLong { field: &'static str, max: usize },
    #[error("El número de participantes debe ser al menos 1")]
    InvalidParticipants,
    #[error("Servicio no disponible: {0}")]
    UnknownService(String),
    #[error("Fecha inválida: {0}")]
    InvalidDate(String),
    #[error("La fecha seleccionada no está disponible")]
    DateUnavailable,
    #[error("El horario seleccionado no está disponible")]
    SlotUnavailable,
    #[error("Hubo un error al procesar tu reserva. Por favor intenta de nuevo.")]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Input problems the visitor can fix, as opposed to a store failure.
    pub fn is_validation(&self) -> bool {
        !matches!(self, BookingError::Store(_))
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub const MAX_NAME_CHARS: usize = 120;
pub const MAX_EMAIL_CHARS: usize = 254;
pub const MAX_PHONE_CHARS: usize = 40;
pub const MAX_NOTES_CHARS: usize = 1000;

fn within(value: &str, field: &'static str, max: usize) -> Result<(), BookingError> {
    if value.chars().count() > max {
        Err(BookingError::TooLong { field, max })
    } else {
        Ok(())
    }
}

fn required(value: &str, field: &'static str, max: usize) -> Result<String, BookingError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BookingError::MissingField(field));
    }
    within(value, field, max)?;
    Ok(value.to_string())
}

impl BookingRequest {
    /// Check the submission against the form rules, in the order the form
    /// reports them, and produce the insert shape.
    pub fn validate(&self, now: NaiveDateTime) -> Result<NewReservation, BookingError> {
        let raw_date = present(self.date.as_deref()).ok_or(BookingError::MissingDate)?;
        let time = present(self.time.as_deref()).ok_or(BookingError::MissingTime)?;
        let service = present(self.service.as_deref()).ok_or(BookingError::MissingService)?;

        let name = required(&self.name, "nombre", MAX_NAME_CHARS)?;
        let email = required(&self.email, "correo", MAX_EMAIL_CHARS)?;
        let phone = required(&self.phone, "teléfono", MAX_PHONE_CHARS)?;
        let notes = present(self.notes.as_deref());
        if let Some(notes) = notes {
            within(notes, "notas", MAX_NOTES_CHARS)?;
        }

        if self.participants < 1 {
            return Err(BookingError::InvalidParticipants);
        }

        let service_type = ServiceType::from_code(service);
        if !service_type.is_known() {
            return Err(BookingError::UnknownService(service.to_string()));
        }

        let date = dates::parse_iso(raw_date)
            .ok_or_else(|| BookingError::InvalidDate(raw_date.to_string()))?;
        if !is_date_bookable(date, now.date()) {
            return Err(BookingError::DateUnavailable);
        }
        if !available_slots(date, now).iter().any(|s| s.value == time) {
            return Err(BookingError::SlotUnavailable);
        }

        Ok(NewReservation {
            name,
            email: Masked::new(email),
            phone: Masked::new(phone),
            service_type,
            reservation_date: dates::to_iso(date),
            reservation_time: time.to_string(),
            participants: self.participants,
            notes: notes.map(str::to_string),
        })
    }
}

/// Writes validated bookings and notifies staff.
pub struct BookingIntake {
    store: Arc<dyn ReservationStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl BookingIntake {
    pub fn new(store: Arc<dyn ReservationStore>, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Insert one pending record, then notify staff. A failed notification is
    /// logged and never fails the booking.
    pub async fn submit(
        &self,
        request: &BookingRequest,
        now: NaiveDateTime,
    ) -> Result<Reservation, BookingError> {
        let new_reservation = request.validate(now)?;

        let reservation = self.store.insert(&new_reservation).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to store reservation");
            BookingError::Store(e)
        })?;

        tracing::info!(
            reservation_id = %reservation.id,
            service = %reservation.service_type.code(),
            date = %reservation.reservation_date,
            "Reservation created"
        );

        let notification = BookingNotification::for_reservation(&reservation);
        if let Err(e) = self.dispatcher.dispatch(&notification).await {
            tracing::warn!(
                reservation_id = %reservation.id,
                error = %e,
                "Staff notification failed, reservation kept"
            );
        }

        Ok(reservation)
    }
}
