use std::convert::Infallible;

use aquabear_shared::ConsoleEvent;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::state::AppState;

/// Live console updates for one staff browser.
pub async fn console_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.console.subscribe_events();

    let stream = BroadcastStream::new(rx)
        .filter_map(|result| async move { to_sse(result).map(Ok) });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(result: Result<ConsoleEvent, BroadcastStreamRecvError>) -> Option<Event> {
    let event = match result {
        Ok(event) => event,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "Console stream lagged, asking the client to resync");
            ConsoleEvent::Resync { skipped }
        }
    };

    match Event::default().event(event.name()).json_data(&event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode console event");
            None
        }
    }
}
