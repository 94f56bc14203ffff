use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::matching::boolean::{ResumeText, SearchHit};
use crate::matching::normalization::Term;
use crate::matching::pipeline::{JobText, MatchOutcome, RankedJob, Session};
use crate::matching::scoring::ScoringConfig;
use crate::matching::self_check::{self_check, SelfCheckReport};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MatchRequest {
    pub resume_text: String,
    pub job_text: String,
}

/// POST /api/v1/match
pub async fn handle_match(
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> Result<Json<MatchOutcome>, AppError> {
    let outcome = state
        .session
        .snapshot()
        .match_texts(&req.resume_text, &req.job_text)?;
    tracing::info!(
        composite = outcome.report.composite_score,
        requirements = outcome.requirements.len(),
        "Matched résumé against job"
    );
    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct RankRequest {
    pub resume_text: String,
    pub jobs: Vec<JobText>,
}

#[derive(Serialize)]
pub struct RankResponse {
    pub ranked: Vec<RankedJob>,
}

/// POST /api/v1/match/rank
pub async fn handle_rank(
    State(state): State<AppState>,
    Json(req): Json<RankRequest>,
) -> Result<Json<RankResponse>, AppError> {
    if req.jobs.is_empty() {
        return Err(AppError::Validation("jobs must not be empty".to_string()));
    }
    let ranked = state.session.snapshot().rank_jobs(&req.resume_text, &req.jobs)?;
    Ok(Json(RankResponse { ranked }))
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub resumes: Vec<ResumeText>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    /// The query as understood, after canonicalization.
    pub query: String,
    pub hits: Vec<SearchHit>,
}

/// POST /api/v1/search
pub async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let (query, hits) = state.session.snapshot().search(&req.query, &req.resumes)?;
    Ok(Json(SearchResponse {
        query: query.to_string(),
        hits,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Normalization map management
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct VariantGroup {
    pub term: Term,
    pub variants: Vec<String>,
}

#[derive(Serialize)]
pub struct NormalizationResponse {
    pub terms: Vec<VariantGroup>,
}

/// GET /api/v1/normalization
pub async fn handle_get_normalization(State(state): State<AppState>) -> Json<NormalizationResponse> {
    let terms = state
        .session
        .map()
        .variant_groups()
        .into_iter()
        .map(|(term, variants)| VariantGroup { term, variants })
        .collect();
    Json(NormalizationResponse { terms })
}

#[derive(Deserialize)]
pub struct VariantRequest {
    pub variant: String,
    pub term: String,
    #[serde(default, rename = "override")]
    pub override_existing: bool,
}

#[derive(Serialize)]
pub struct VariantResponse {
    pub variant: String,
    pub term: Term,
}

/// POST /api/v1/normalization/variants
pub async fn handle_add_variant(
    State(state): State<AppState>,
    Json(req): Json<VariantRequest>,
) -> Result<(StatusCode, Json<VariantResponse>), AppError> {
    let VariantRequest {
        variant,
        term,
        override_existing,
    } = req;
    let (variant, term) = edit_session(&state, move |session| {
        let canonical = session.add_variant(&variant, &term, override_existing)?;
        Ok((variant, canonical))
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(VariantResponse {
            variant: variant.trim().to_string(),
            term,
        }),
    ))
}

/// DELETE /api/v1/normalization/variants/:variant
pub async fn handle_remove_variant(
    State(state): State<AppState>,
    Path(variant): Path<String>,
) -> Result<Json<VariantResponse>, AppError> {
    let (variant, term) = edit_session(&state, move |session| {
        let previous = session.remove_variant(&variant)?;
        Ok((variant, previous))
    })
    .await?;
    Ok(Json(VariantResponse { variant, term }))
}

#[derive(Deserialize)]
pub struct TermRequest {
    pub term: String,
}

/// POST /api/v1/normalization/terms
pub async fn handle_add_term(
    State(state): State<AppState>,
    Json(req): Json<TermRequest>,
) -> Result<(StatusCode, Json<Term>), AppError> {
    let term = edit_session(&state, move |session| session.add_term(&req.term)).await?;
    Ok((StatusCode::CREATED, Json(term)))
}

/// Runs a map edit on the blocking pool: edits may write the map file.
async fn edit_session<T, F>(state: &AppState, edit: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&Session) -> Result<T, AppError> + Send + 'static,
{
    let session = Arc::clone(&state.session);
    tokio::task::spawn_blocking(move || edit(&session))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Map edit task failed: {e}")))?
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring config & diagnostics
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/config
pub async fn handle_get_config(State(state): State<AppState>) -> Json<ScoringConfig> {
    Json(ScoringConfig::clone(&state.session.config()))
}

/// PUT /api/v1/config
pub async fn handle_put_config(
    State(state): State<AppState>,
    Json(config): Json<ScoringConfig>,
) -> Result<Json<ScoringConfig>, AppError> {
    state.session.set_config(config.clone())?;
    Ok(Json(config))
}

/// GET /api/v1/self-check
pub async fn handle_self_check() -> Json<SelfCheckReport> {
    let report = self_check();
    if !report.passed {
        tracing::warn!("Self-check reported failing cases");
    }
    Json(report)
}
