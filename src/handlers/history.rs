use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::Stream;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::dto::{HistoryItem, HISTORY_LIMIT};
use crate::error::AppResult;
use crate::AppState;

pub async fn list_history(State(state): State<AppState>) -> AppResult<Json<Vec<HistoryItem>>> {
    let entries = state.store.list_recent(HISTORY_LIMIT).await?;
    Ok(Json(entries.into_iter().map(HistoryItem::from).collect()))
}

/// GET /history/stream: emits `updated` whenever refined guidance lands.
///
/// Updates that arrive within the coalescing window of the first one are
/// folded into a single event. Clients re-fetch `/history` on each event.
pub async fn stream_history(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.notifier.subscribe();
    let window = state.config.stream_coalesce_window();
    let shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = rx.recv() => received,
            };
            match received {
                Ok(update) => tracing::debug!(entry_id = update.entry_id, "History update observed"),
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "History stream lagged"),
                Err(RecvError::Closed) => break,
            }

            if !window.is_zero() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(window) => {}
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }

            yield Ok(Event::default().data("updated"));
        }
        tracing::debug!("History stream closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use chrono::NaiveDate;
    use http_body_util::BodyExt;

    use crate::config::Config;
    use crate::handlers::test_support::{body_json, get, memory_state, unavailable_state};
    use crate::models::daily_entry::NewEntry;

    fn entry(minutes: i32) -> NewEntry {
        NewEntry {
            age: 7,
            screen_minutes: minutes,
            evening_usage: false,
            guidance: "canned".into(),
        }
    }

    #[tokio::test]
    async fn test_history_empty() {
        let (state, _) = memory_state();
        let response = get(state, "/history").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_history_caps_at_seven_newest_first() {
        let (state, store) = memory_state();
        for day in 1..=10 {
            let date = NaiveDate::from_ymd_opt(2026, 4, day).unwrap();
            store.create_on(entry(day as i32), date).await;
        }

        let json = body_json(get(state, "/history").await).await;
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 7);

        let dates: Vec<&str> = items
            .iter()
            .map(|i| i["entry_date"].as_str().unwrap())
            .collect();
        assert_eq!(dates.first(), Some(&"2026-04-10"));
        assert_eq!(dates.last(), Some(&"2026-04-04"));
        assert!(dates.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn test_history_storage_failure_is_server_error() {
        let response = get(unavailable_state(), "/history").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn next_chunk(body: &mut axum::body::Body, wait: Duration) -> Option<String> {
        let frame = tokio::time::timeout(wait, body.frame()).await.ok()??.ok()?;
        let data = frame.into_data().ok()?;
        Some(String::from_utf8_lossy(&data).into_owned())
    }

    #[tokio::test]
    async fn test_stream_coalesces_burst_into_one_event() {
        let (state, _) = memory_state();
        let notifier = state.notifier.clone();

        let response = get(state, "/history/stream").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        notifier.notify(1);
        notifier.notify(2);

        let mut body = response.into_body();
        let chunk = next_chunk(&mut body, Duration::from_secs(2)).await.unwrap();
        assert_eq!(chunk, "data: updated\n\n");

        assert!(next_chunk(&mut body, Duration::from_millis(300)).await.is_none());
    }

    #[tokio::test]
    async fn test_every_stream_client_sees_the_update() {
        let (state, _) = memory_state();
        let notifier = state.notifier.clone();

        let first = get(state.clone(), "/history/stream").await;
        let second = get(state, "/history/stream").await;
        notifier.notify(3);

        for response in [first, second] {
            let mut body = response.into_body();
            let chunk = next_chunk(&mut body, Duration::from_secs(2)).await.unwrap();
            assert!(chunk.contains("updated"));
        }
    }

    #[tokio::test]
    async fn test_stream_ends_on_shutdown() {
        let (state, _) = memory_state();
        let shutdown = state.shutdown.clone();

        let response = get(state, "/history/stream").await;
        shutdown.cancel();

        let mut body = response.into_body();
        let end = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_lagged_stream_emits_single_event() {
        let (state, _) = memory_state();
        let notifier = state.notifier.clone();

        let response = get(state, "/history/stream").await;
        // More than the channel holds, before the stream is first polled.
        for id in 0..300 {
            notifier.notify(id);
        }

        let mut body = response.into_body();
        let chunk = next_chunk(&mut body, Duration::from_secs(2)).await.unwrap();
        assert_eq!(chunk, "data: updated\n\n");

        assert!(next_chunk(&mut body, Duration::from_millis(300)).await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_coalescing_window() {
        let (mut state, _) = memory_state();
        state.config = Arc::new(Config {
            history_stream_coalesce_ms: 5_000,
            ..Config::default()
        });
        let notifier = state.notifier.clone();
        let shutdown = state.shutdown.clone();

        let response = get(state, "/history/stream").await;
        let mut body = response.into_body();
        let reader = tokio::spawn(async move { body.frame().await.is_none() });

        notifier.notify(1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();

        let ended_without_event = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("stream kept running through the coalescing window")
            .unwrap();
        assert!(ended_without_event);
    }
}
