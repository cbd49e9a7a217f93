use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Html,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::{self};
use crate::errors::AppError;
use crate::identity::identity_hash;
use crate::models::{Feature, Vote};
use crate::oauth::TokenManager;
use crate::roadmap::{self, Roadmap, StatusFilter};
use crate::AppState;

/// Cached copy of the public feature list.
const FEATURES_CACHE_KEY: &str = "features";
const FEATURES_CACHE_TTL: Duration = Duration::from_secs(60);

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct SubmitFeatureRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub comment: Option<String>,
    pub timestamp: Option<i64>,
}

#[derive(Serialize)]
pub struct SubmitFeatureResponse {
    pub message: String,
    pub feature: Feature,
}

#[derive(Deserialize, Default)]
pub struct VoteRequest {
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct VoteResponse {
    pub vote: Vote,
}

#[derive(Deserialize)]
pub struct RoadmapQuery {
    pub filter: Option<StatusFilter>,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /api/feature — record a new feature request plus the submitter's
/// own endorsement vote.
pub async fn submit_feature(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SubmitFeatureRequest>,
) -> Result<Json<SubmitFeatureResponse>, AppError> {
    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("title".into()));
    }
    if payload.description.trim().is_empty() {
        return Err(AppError::Validation("description".into()));
    }
    let timestamp = payload
        .timestamp
        .ok_or_else(|| AppError::Validation("timestamp".into()))?;

    let (origin, agent) = client_identity(&headers);
    let hash = identity_hash(&origin, &agent);

    let feature = Feature::new(payload.title, payload.description, timestamp);
    let vote = Vote::new(hash, feature.uuid, timestamp, payload.comment);

    let tokens = TokenManager::new(&state.config, state.kv.clone())?;
    let access_token = tokens.acquire_access_token().await?;

    state.sheet.append_feature(&feature, &access_token).await?;
    state.kv.delete(FEATURES_CACHE_KEY).await?;
    tracing::info!(uuid = %feature.uuid, "feature recorded");

    // The initiating vote is best-effort: if it fails the feature stays
    // recorded and the inconsistency is logged, not compensated.
    match persist_vote(&state, &vote, &access_token).await {
        Ok(()) => {}
        Err(e) => tracing::warn!(uuid = %feature.uuid, "initiating vote was not recorded: {}", e),
    }

    Ok(Json(SubmitFeatureResponse {
        message: "Feature request processed successfully".into(),
        feature,
    }))
}

/// GET /api/feature — feature list, served from the cache when fresh.
pub async fn list_features(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Feature>>, AppError> {
    if let Some(cached) =
        cache::get_json::<Vec<Feature>>(state.kv.as_ref(), FEATURES_CACHE_KEY).await?
    {
        return Ok(Json(cached));
    }

    let features = state.sheet.fetch_features().await?;
    cache::put_json(
        state.kv.as_ref(),
        FEATURES_CACHE_KEY,
        &features,
        Some(FEATURES_CACHE_TTL),
    )
    .await?;
    Ok(Json(features))
}

/// POST /api/feature/:uuid/vote — one vote per identity per feature.
pub async fn record_vote(
    State(state): State<Arc<AppState>>,
    Path(feature_uuid): Path<Uuid>,
    headers: HeaderMap,
    payload: Option<Json<VoteRequest>>,
) -> Result<Json<VoteResponse>, AppError> {
    let comment = payload.and_then(|Json(p)| p.comment);
    let (origin, agent) = client_identity(&headers);
    let hash = identity_hash(&origin, &agent);

    // Advisory check-then-act: two racing duplicates can both pass. The
    // window is accepted; closing it needs a distributed lock.
    let dedup_key = Vote::cache_key_for(&hash, &feature_uuid);
    if state.kv.get(&dedup_key).await?.is_some() {
        return Err(AppError::DuplicateVote);
    }

    let vote = Vote::new(hash, feature_uuid, Utc::now().timestamp_millis(), comment);

    let tokens = TokenManager::new(&state.config, state.kv.clone())?;
    let access_token = tokens.acquire_access_token().await?;
    persist_vote(&state, &vote, &access_token).await?;
    tracing::info!(feature = %feature_uuid, "vote recorded");

    Ok(Json(VoteResponse { vote }))
}

/// GET /api/roadmap — the full public view: all features plus all votes.
pub async fn get_roadmap(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoadmapQuery>,
) -> Result<Json<Roadmap>, AppError> {
    let roadmap = roadmap::list_roadmap(&state.sheet, state.kv.as_ref(), query.filter).await?;
    Ok(Json(roadmap))
}

/// GET /oauth/callback — provider redirects here after the consent
/// screen; exchanges the code and caches the resulting tokens.
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Html<&'static str>, AppError> {
    if let Some(error) = query.error {
        tracing::warn!("provider returned an authorization error: {}", error);
        return Err(AppError::Provider(error));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::Validation("code".into()))?;
    let callback_state = query
        .state
        .ok_or_else(|| AppError::Validation("state".into()))?;

    let tokens = TokenManager::new(&state.config, state.kv.clone())?;
    tokens.complete_authorization(&code, &callback_state).await?;

    Ok(Html(
        "Authentication successful! Access token has been stored. You can now close this page.",
    ))
}

// ── Shared plumbing ──────────────────────────────────────────

/// Append the vote to the sheet, then mirror it into the cache so the
/// dedup check and the roadmap read see it immediately.
async fn persist_vote(state: &AppState, vote: &Vote, access_token: &str) -> Result<(), AppError> {
    state.sheet.append_vote(vote, access_token).await?;
    state
        .kv
        .put(&vote.cache_key(), &serde_json::to_string(vote).map_err(anyhow::Error::from)?, None)
        .await?;
    Ok(())
}

/// Network origin + agent string for the identity hash. Shared NAT and
/// identical agent builds collide; that is the accepted trade-off.
fn client_identity(headers: &HeaderMap) -> (String, String) {
    let origin = headers
        .get("cf-connecting-ip")
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown-ip")
        .to_string();
    let agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown-user-agent")
        .to_string();
    (origin, agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_identity_prefers_cf_header() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.4"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));
        assert_eq!(
            client_identity(&headers),
            ("198.51.100.4".to_string(), "curl/8.0".to_string())
        );
    }

    #[test]
    fn client_identity_falls_back_to_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(
            client_identity(&headers),
            ("unknown-ip".to_string(), "unknown-user-agent".to_string())
        );
    }
}
