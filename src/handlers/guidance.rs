use axum::{extract::State, Json};
use validator::Validate;

use crate::dto::{DailyGuidanceRequest, DailyGuidanceResponse};
use crate::error::AppResult;
use crate::services::policy::{self, Decision, CANNED_GUIDANCE};
use crate::services::refinement::RefinementJob;
use crate::AppState;

/// Stores the submission with canned guidance and answers right away.
/// Qualifying submissions are queued for AI refinement afterwards.
pub async fn submit_daily_guidance(
    State(state): State<AppState>,
    Json(body): Json<DailyGuidanceRequest>,
) -> AppResult<Json<DailyGuidanceResponse>> {
    body.validate()?;

    let request = body.guidance_request();
    let entry = state
        .store
        .create(body.into_new_entry(CANNED_GUIDANCE))
        .await?;

    match policy::decide(entry.age, entry.screen_minutes) {
        Decision::SkipAi => {
            tracing::debug!(entry_id = entry.id, "Below refinement thresholds, keeping canned guidance");
        }
        Decision::RunAi => match &state.refinement {
            Some(refinement) => {
                refinement.dispatch(RefinementJob {
                    entry_id: entry.id,
                    request,
                });
            }
            None => {
                tracing::debug!(entry_id = entry.id, "AI refinement disabled");
            }
        },
    }

    Ok(Json(DailyGuidanceResponse {
        guidance: entry.guidance,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::db::MemoryEntryStore;
    use crate::dto::HistoryItem;
    use crate::handlers::test_support::{
        body_json, get, memory_state, post_json, state_with_model, unavailable_state,
    };
    use crate::services::llm::fakes::{FailingModel, ScriptedModel};
    use crate::services::policy::CANNED_GUIDANCE;

    #[tokio::test]
    async fn test_submission_returns_canned_and_persists_one_entry() {
        let (state, store) = memory_state();

        let cases = [(5, 50, false), (8, 50, true), (10, 20, false), (4, 65, true)];
        for (i, (age, minutes, evening)) in cases.into_iter().enumerate() {
            let response = post_json(
                state.clone(),
                "/daily-guidance",
                json!({ "age": age, "screen_minutes": minutes, "evening_usage": evening }),
            )
            .await;

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await["guidance"], CANNED_GUIDANCE);
            assert_eq!(store.count().await, i + 1);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_submission_is_rejected() {
        let (state, store) = memory_state();
        let response = post_json(
            state,
            "/daily-guidance",
            json!({ "age": -2, "screen_minutes": 30, "evening_usage": false }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_field_is_client_error() {
        let (state, store) = memory_state();
        let response = post_json(state, "/daily-guidance", json!({ "age": 5 })).await;

        assert!(response.status().is_client_error());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_refinement_updates_only_its_entry() {
        let store = Arc::new(MemoryEntryStore::new());
        let model = Arc::new(ScriptedModel::new("Tonight, try a screen-free story."));
        let (state, pool) = state_with_model(store.clone(), model.clone());

        // below thresholds
        post_json(
            state.clone(),
            "/daily-guidance",
            json!({ "age": 5, "screen_minutes": 50, "evening_usage": false }),
        )
        .await;
        // qualifies
        let response = post_json(
            state.clone(),
            "/daily-guidance",
            json!({ "age": 8, "screen_minutes": 90, "evening_usage": true }),
        )
        .await;
        assert_eq!(body_json(response).await["guidance"], CANNED_GUIDANCE);

        pool.shutdown().await;
        assert_eq!(model.calls(), 1);

        let history: Vec<HistoryItem> =
            serde_json::from_value(body_json(get(state, "/history").await).await).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].screen_minutes, 90);
        assert_eq!(history[0].guidance, "Tonight, try a screen-free story.");
        assert_eq!(history[1].screen_minutes, 50);
        assert_eq!(history[1].guidance, CANNED_GUIDANCE);
    }

    #[tokio::test]
    async fn test_failed_refinement_is_invisible_to_client() {
        let store = Arc::new(MemoryEntryStore::new());
        let (state, pool) = state_with_model(store.clone(), Arc::new(FailingModel));

        let response = post_json(
            state.clone(),
            "/daily-guidance",
            json!({ "age": 12, "screen_minutes": 180, "evening_usage": true }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["guidance"], CANNED_GUIDANCE);

        pool.shutdown().await;

        let history = body_json(get(state, "/history").await).await;
        assert_eq!(history[0]["guidance"], CANNED_GUIDANCE);
    }

    #[tokio::test]
    async fn test_storage_failure_is_server_error() {
        let response = post_json(
            unavailable_state(),
            "/daily-guidance",
            json!({ "age": 8, "screen_minutes": 90, "evening_usage": false }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "Internal server error"
        );
    }
}
