//! WhatsApp deep links sent to the client after staff resolve a reservation.

use aquabear_shared::Reservation;
use serde::Serialize;

use crate::dates;

pub const WHATSAPP_BASE_URL: &str = "https://wa.me/";
pub const DEFAULT_CLUB_NAME: &str = "Aqua Bear Swim Club";

const DATE_PLACEHOLDER: &str = "Fecha por confirmar";
const TIME_PLACEHOLDER: &str = "Hora por confirmar";
const SERVICE_PLACEHOLDER: &str = "Clase";

/// A composed message plus the link that opens it in the messaging app.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutboundMessage {
    pub phone: String,
    pub body: String,
    pub deep_link: String,
    pub confirmed: bool,
}

/// Build the confirmation (or rejection) message for `reservation`.
pub fn compose(reservation: &Reservation, confirmed: bool, club_name: &str) -> OutboundMessage {
    let phone = digits_only(reservation.phone.expose());
    let date = display_date(&reservation.reservation_date);
    let time = display_time(&reservation.reservation_time);
    let service = display_service(reservation);

    let body = if confirmed {
        format!(
            "Hola {name}!\n\nTu reserva en *{club}* ha sido *CONFIRMADA*.\n\n\
             *Fecha:* {date}\n*Hora:* {time}\n*Servicio:* {service}\n*Participantes:* {participants}\n\n\
             Te esperamos! Si tienes alguna pregunta, no dudes en contactarnos.",
            name = reservation.name,
            club = club_name,
            participants = reservation.participants,
        )
    } else {
        format!(
            "Hola {name},\n\nLamentamos informarte que tu reserva en *{club}* no pudo ser confirmada.\n\n\
             *Fecha solicitada:* {date}\n*Hora:* {time}\n*Servicio:* {service}\n\n\
             Por favor contactanos para reprogramar o si tienes alguna pregunta.",
            name = reservation.name,
            club = club_name,
        )
    };

    let deep_link = format!("{WHATSAPP_BASE_URL}{phone}?text={}", encode_component(&body));

    OutboundMessage {
        phone,
        body,
        deep_link,
        confirmed,
    }
}

fn digits_only(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

fn display_date(raw: &str) -> String {
    if raw.trim().is_empty() {
        return DATE_PLACEHOLDER.to_string();
    }
    match dates::parse_iso(raw) {
        Some(date) => dates::format_long(date),
        None => raw.to_string(),
    }
}

fn display_time(raw: &str) -> &str {
    if raw.trim().is_empty() {
        TIME_PLACEHOLDER
    } else {
        raw
    }
}

fn display_service(reservation: &Reservation) -> &str {
    let name = reservation.service_type.display_name();
    if name.is_empty() {
        SERVICE_PLACEHOLDER
    } else {
        name
    }
}

/// Percent-encode everything outside the unreserved set that
/// `encodeURIComponent` leaves alone.
fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
