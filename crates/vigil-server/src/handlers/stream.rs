//! Server-sent alert events

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use tracing::debug;

use crate::{current_user, AppError, AppState};

/// GET /api/alerts/stream - Live alert events for the caller
///
/// Each event is named after its kind (`alert.new`, `alert.acknowledged`, ...)
/// and carries the alert as JSON. Events for other users are never sent.
/// Delivery is best-effort: a client that falls behind is disconnected.
pub async fn stream_alerts(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let user_id = current_user(&state, request.headers())?;
    let subscription = state.service.publisher().subscribe();
    debug!(user_id, subscriber = subscription.id, "Alert stream opened");

    let events = stream::unfold(subscription, move |mut subscription| async move {
        loop {
            let event = subscription.recv().await?;
            if event.user_id != user_id {
                continue;
            }
            let sse = Event::default().event(event.name()).json_data(&event.alert);
            return Some((sse, subscription));
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
