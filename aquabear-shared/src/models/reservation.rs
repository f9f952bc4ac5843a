use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::pii::Masked;

/// Reservation workflow status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 3] = [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    /// Label shown on the staff console badges.
    pub fn label(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "Pendiente",
            ReservationStatus::Confirmed => "Confirmada",
            ReservationStatus::Cancelled => "Cancelada",
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown reservation status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

/// Service requested by the visitor. Codes the club does not know about are
/// kept verbatim in `Other` so they can still be listed and displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceType {
    Baby,
    Kids,
    Adult,
    Competitive,
    Membership,
    Aquagym,
    Other(String),
}

impl ServiceType {
    pub fn known() -> [ServiceType; 6] {
        [
            ServiceType::Baby,
            ServiceType::Kids,
            ServiceType::Adult,
            ServiceType::Competitive,
            ServiceType::Membership,
            ServiceType::Aquagym,
        ]
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "baby" => ServiceType::Baby,
            "kids" => ServiceType::Kids,
            "adult" => ServiceType::Adult,
            "competitive" => ServiceType::Competitive,
            "membership" => ServiceType::Membership,
            "aquagym" => ServiceType::Aquagym,
            other => ServiceType::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ServiceType::Baby => "baby",
            ServiceType::Kids => "kids",
            ServiceType::Adult => "adult",
            ServiceType::Competitive => "competitive",
            ServiceType::Membership => "membership",
            ServiceType::Aquagym => "aquagym",
            ServiceType::Other(code) => code,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ServiceType::Other(_))
    }

    /// Name used on the console and in staff notifications. Unknown codes
    /// render as the raw code.
    pub fn display_name(&self) -> &str {
        match self {
            ServiceType::Baby => "Clases para Bebés",
            ServiceType::Kids => "Clases Infantiles",
            ServiceType::Adult => "Clases para Adultos",
            ServiceType::Competitive => "Entrenamiento Competitivo",
            ServiceType::Membership => "Membresía",
            ServiceType::Aquagym => "Aquagym / Rehabilitación",
            ServiceType::Other(code) => code,
        }
    }

    /// Longer label used by the public booking form.
    pub fn form_label(&self) -> Option<&'static str> {
        match self {
            ServiceType::Baby => Some("Clases para Bebés (6m - 3 años)"),
            ServiceType::Kids => Some("Clases Infantiles (4 - 12 años)"),
            ServiceType::Adult => Some("Clases para Adultos"),
            ServiceType::Competitive => Some("Entrenamiento Competitivo"),
            ServiceType::Membership => Some("Membresía - Acceso a Piscina"),
            ServiceType::Aquagym => Some("Aquagym / Rehabilitación"),
            ServiceType::Other(_) => None,
        }
    }
}

impl From<String> for ServiceType {
    fn from(code: String) -> Self {
        ServiceType::from_code(&code)
    }
}

impl From<ServiceType> for String {
    fn from(service: ServiceType) -> Self {
        match service {
            ServiceType::Other(code) => code,
            known => known.code().to_string(),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A booking request as stored by the reservation store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub service_type: ServiceType,
    /// ISO calendar date (`YYYY-MM-DD`), no time component.
    pub reservation_date: String,
    /// Time of day, `HH:MM`.
    pub reservation_time: String,
    pub participants: i32,
    pub notes: Option<String>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert shape written by booking intake. The store assigns `id` and
/// `created_at` and always starts the record as `pending`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewReservation {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub service_type: ServiceType,
    pub reservation_date: String,
    pub reservation_time: String,
    pub participants: i32,
    pub notes: Option<String>,
}

impl NewReservation {
    pub fn into_reservation(self, id: Uuid, created_at: DateTime<Utc>) -> Reservation {
        Reservation {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            service_type: self.service_type,
            reservation_date: self.reservation_date,
            reservation_time: self.reservation_time,
            participants: self.participants,
            notes: self.notes,
            status: ReservationStatus::Pending,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_service_codes_round_trip() {
        let service: ServiceType = serde_json::from_str("\"snorkel\"").unwrap();
        assert_eq!(service, ServiceType::Other("snorkel".to_string()));
        assert_eq!(service.display_name(), "snorkel");
        assert!(service.form_label().is_none());
        assert_eq!(serde_json::to_string(&service).unwrap(), "\"snorkel\"");
    }

    #[test]
    fn known_service_display_names() {
        assert_eq!(ServiceType::from_code("kids").display_name(), "Clases Infantiles");
        assert_eq!(
            ServiceType::from_code("aquagym").display_name(),
            "Aquagym / Rehabilitación"
        );
        assert!(ServiceType::known().iter().all(|s| s.is_known()));
    }

    #[test]
    fn status_parses_and_labels() {
        assert_eq!("confirmed".parse::<ReservationStatus>().unwrap(), ReservationStatus::Confirmed);
        assert!("archived".parse::<ReservationStatus>().is_err());
        assert_eq!(ReservationStatus::Cancelled.label(), "Cancelada");
        assert!(!ReservationStatus::Pending.is_resolved());
    }

    #[test]
    fn reservation_deserializes_from_row_json() {
        let json = serde_json::json!({
            "id": "3f2b8a4e-8a43-4a57-9a0e-1b2c3d4e5f60",
            "name": "Ana",
            "email": "ana@example.com",
            "phone": "+52 1 55 1234 5678",
            "service_type": "kids",
            "reservation_date": "2026-10-24",
            "reservation_time": "10:00",
            "participants": 2,
            "notes": null,
            "status": "pending",
            "created_at": "2026-10-19T15:04:05.123456+00:00"
        });

        let reservation: Reservation = serde_json::from_value(json).unwrap();
        assert_eq!(reservation.service_type, ServiceType::Kids);
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.phone.expose(), "+52 1 55 1234 5678");
        assert!(!format!("{:?}", reservation).contains("ana@example.com"));
    }
}
