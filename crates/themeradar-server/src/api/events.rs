use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use super::AppState;

/// SSE stream of every hub event.
///
/// Each event is emitted with its kind as the SSE event name and the
/// serialized [`themeradar_broadcast::BroadcastEvent`] as its data. A
/// subscriber that falls behind the hub buffer skips the lagged events
/// and keeps the stream instead of erroring out.
pub(super) async fn subscribe_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.hub.subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = Event::default()
                        .event(event.kind.as_str())
                        .json_data(&event);
                    match sse {
                        Ok(sse) => return Some((Ok(sse), rx)),
                        Err(error) => {
                            tracing::error!(error = %error, "failed to serialize hub event");
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "sse subscriber lagged behind the hub");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
