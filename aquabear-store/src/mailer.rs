//! Staff notification email over the Resend HTTP API.

use std::borrow::Cow;
use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use aquabear_core::dispatch::{BookingNotification, DispatchError, NotificationDispatcher};
use serde::Serialize;

use crate::app_config::NotificationConfig;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct ResendDispatcher {
    api_base: String,
    api_key: String,
    from: String,
    to: String,
    site_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    html: String,
}

impl ResendDispatcher {
    pub fn new(config: &NotificationConfig, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_base: config.api_base.clone(),
            api_key: api_key.into(),
            from: config.from.clone(),
            to: config.to.clone(),
            site_url: config.site_url.clone(),
            client,
        }
    }

    fn emails_url(&self) -> String {
        format!("{}/emails", self.api_base.trim_end_matches('/'))
    }

    fn request<'a>(
        &'a self,
        notification: &BookingNotification,
    ) -> Result<EmailRequest<'a>, DispatchError> {
        Ok(EmailRequest {
            from: &self.from,
            to: [&self.to],
            subject: format!("Nueva Reserva - {}", notification.name),
            html: render_html(notification, &self.site_url)?,
        })
    }
}

#[async_trait]
impl NotificationDispatcher for ResendDispatcher {
    async fn dispatch(&self, notification: &BookingNotification) -> Result<(), DispatchError> {
        let request = self.request(notification)?;
        let response = self
            .client
            .post(self.emails_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(format!("email request failed: {e}")))?;

        if response.status().is_success() {
            tracing::info!(client = %notification.name, "Staff notification sent");
            return Ok(());
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(DispatchError::Rejected { status, body })
    }
}

struct EmailRow<'a> {
    label: &'static str,
    value: Cow<'a, str>,
}

/// Staff email body. Values are HTML-escaped by the template engine.
#[derive(Template)]
#[template(path = "booking_notification.html")]
struct BookingEmail<'a> {
    rows: Vec<EmailRow<'a>>,
    admin_url: String,
}

impl<'a> BookingEmail<'a> {
    fn new(n: &'a BookingNotification, site_url: &str) -> Self {
        let email = if n.email.trim().is_empty() {
            "No proporcionado"
        } else {
            n.email.as_str()
        };

        let mut rows = vec![
            EmailRow { label: "Nombre", value: Cow::Borrowed(&n.name) },
            EmailRow { label: "Telefono", value: Cow::Borrowed(&n.phone) },
            EmailRow { label: "Correo", value: Cow::Borrowed(email) },
            EmailRow { label: "Servicio", value: Cow::Borrowed(&n.service) },
            EmailRow { label: "Fecha", value: Cow::Borrowed(&n.date) },
            EmailRow { label: "Hora", value: Cow::Borrowed(&n.time) },
            EmailRow { label: "Participantes", value: Cow::Owned(n.participants.to_string()) },
        ];
        if let Some(notes) = n.notes.as_deref().filter(|s| !s.trim().is_empty()) {
            rows.push(EmailRow { label: "Notas", value: Cow::Borrowed(notes) });
        }

        Self {
            rows,
            admin_url: format!("{}/admin", site_url.trim_end_matches('/')),
        }
    }
}

fn render_html(n: &BookingNotification, site_url: &str) -> Result<String, DispatchError> {
    BookingEmail::new(n, site_url)
        .render()
        .map_err(|e| DispatchError::Render(e.to_string()))
}
