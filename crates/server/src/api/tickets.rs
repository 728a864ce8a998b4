//! Ticket API handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use codenews_core::{
    DailyStats, ErrorKind, HistoryFilter, IssueTicketRequest, ProcedureType, ProfessionalProfile,
    Ticket, TicketError,
};

use super::middleware::AuthIdentity;
use crate::state::AppState;

/// Largest page the waiting endpoint returns.
const MAX_LIMIT: usize = 1000;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for the waiting list
#[derive(Debug, Deserialize)]
pub struct WaitingParams {
    /// Role or function label scoping the list; defaults to the caller's profile
    pub profile: Option<String>,
    /// Maximum number of tickets to return
    pub limit: Option<usize>,
}

/// Query parameters for the history
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Procedure type
    #[serde(rename = "type")]
    pub procedure: Option<String>,
    /// First day, `YYYY-MM-DD`
    pub from: Option<String>,
    /// Last day, `YYYY-MM-DD`
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub date: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TicketErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

type ApiError = (StatusCode, Json<TicketErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ticket_error(e: TicketError) -> ApiError {
    let kind = e.kind();
    (
        status_for(kind),
        Json(TicketErrorResponse {
            error: e.to_string(),
            kind: kind.as_str(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ticket_error(TicketError::Validation(message.into()))
}

fn parse_date(field: &str, value: Option<&str>) -> ApiResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| bad_request(format!("{} must be a YYYY-MM-DD date, got '{}'", field, raw))),
        None => Ok(None),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Issue a new ticket
pub async fn issue_ticket(
    State(state): State<Arc<AppState>>,
    AuthIdentity(identity): AuthIdentity,
    body: Result<Json<IssueTicketRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;

    let ticket = state.queue().issue(request).map_err(ticket_error)?;
    info!(
        ticket_id = ticket.id,
        issued_by = %identity.user_id,
        "Ticket {} issued via API",
        ticket.sequence_code
    );
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Json<Ticket>> {
    let Path(id) = id.map_err(|e| bad_request(e.body_text()))?;
    state.queue().get(id).map(Json).map_err(ticket_error)
}

/// The ticket being called, or `null`
pub async fn current_ticket(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Option<Ticket>>> {
    state.queue().current_ticket().map(Json).map_err(ticket_error)
}

/// Waiting tickets in call order, optionally scoped to a professional profile
pub async fn waiting_tickets(
    State(state): State<Arc<AppState>>,
    AuthIdentity(identity): AuthIdentity,
    params: Result<Query<WaitingParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Ticket>>> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;

    let profile = match params.profile {
        Some(label) => Some(ProfessionalProfile::new(Some(label), None)),
        None => identity.profile,
    };
    let limit = params.limit.map(|l| l.min(MAX_LIMIT));
    debug!(?profile, ?limit, "Listing waiting tickets");

    state
        .queue()
        .upcoming(profile.as_ref(), limit)
        .map(Json)
        .map_err(ticket_error)
}

/// Finish the current ticket and call the next one
pub async fn call_next(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Option<Ticket>>> {
    state.queue().call_next().map(Json).map_err(ticket_error)
}

/// Finalize a ticket by ID
pub async fn finalize_ticket(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Json<Ticket>> {
    let Path(id) = id.map_err(|e| bad_request(e.body_text()))?;
    state.queue().finalize(id).map(Json).map_err(ticket_error)
}

/// Finalize whichever ticket is being called
pub async fn finalize_current(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Option<Ticket>>> {
    state
        .queue()
        .finalize_current()
        .map(Json)
        .map_err(ticket_error)
}

/// Finished tickets, most recently closed first
pub async fn history(
    State(state): State<Arc<AppState>>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Ticket>>> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;

    let from = parse_date("from", params.from.as_deref())?;
    let to = parse_date("to", params.to.as_deref())?;

    let mut filter = HistoryFilter::new().with_range(from, to);
    if let Some(procedure) = params
        .procedure
        .as_deref()
        .map(ProcedureType::parse)
        .filter(|p| !p.is_blank())
    {
        filter = filter.with_procedure(procedure);
    }

    state.queue().history(&filter).map(Json).map_err(ticket_error)
}

/// Counters for one day (today by default)
pub async fn daily_stats(
    State(state): State<Arc<AppState>>,
    params: Result<Query<StatsParams>, QueryRejection>,
) -> ApiResult<Json<DailyStats>> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;

    let date = parse_date("date", params.date.as_deref())?.unwrap_or_else(|| state.queue().today());

    state
        .queue()
        .daily_stats(date)
        .map(Json)
        .map_err(ticket_error)
}
