use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_core::Stream;
use tokio_stream::StreamExt;

use crate::{registry::Subscription, state::AppState};

use super::ApiError;

/// GET /subscribe-transfer/{identity} - Per-identity push stream; `transfer`
/// events carry the credential for moving to a support room.
pub async fn subscribe_transfer(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = state.subscribe_identity(&identity)?;
    Ok(sse_response(subscription, state.sse_keepalive()))
}

/// GET /subscribe-room/{room} - Room-level push stream; a transfer already in
/// flight is replayed to the new subscriber immediately.
pub async fn subscribe_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = state.subscribe_room(&room)?;
    Ok(sse_response(subscription, state.sse_keepalive()))
}

fn sse_response(
    subscription: Subscription,
    keepalive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = subscription.map(|event| {
        let (name, data) = event.as_named_json();
        Ok(Event::default().event(name).data(data))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(keepalive))
}
