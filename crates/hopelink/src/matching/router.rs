use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{DonationId, RequestId, UserId, UserRole};
use super::parameters::{
    validate, validate_weights, weight_sum_report, FactorWeights, MatchingContext,
    MatchingParameters, ParameterRepository, ParameterUpdate,
};
use super::repository::{MatchNotifier, MatchingRepository};
use super::service::{MatchingError, MatchingService};

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub user_id: String,
    pub role: String,
    pub limit: Option<usize>,
}

/// Recommendations to recompute when a submitted match turns out to be stale.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTarget {
    pub user_id: UserId,
    pub role: UserRole,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MatchSubmission {
    pub request_id: RequestId,
    pub donation_id: DonationId,
    #[serde(default)]
    pub volunteer_id: Option<UserId>,
    #[serde(default)]
    pub refresh_for: Option<RefreshTarget>,
}

#[derive(Debug, Deserialize)]
pub struct ParameterUpdateRequest {
    #[serde(default)]
    pub updates: ParameterUpdate,
    pub admin_user_id: UserId,
}

/// Advisory validation: either bare weights or a full parameter set.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ValidationRequest {
    Parameters { parameters: MatchingParameters },
    Weights { weights: FactorWeights },
}

/// Router exposing recommendation, match creation, and parameter administration endpoints.
pub fn matching_router<R, P, N>(service: Arc<MatchingService<R, P, N>>) -> Router
where
    R: MatchingRepository + 'static,
    P: ParameterRepository + 'static,
    N: MatchNotifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/matching/recommendations",
            get(recommendations_handler::<R, P, N>),
        )
        .route("/api/v1/matching/matches", post(create_match_handler::<R, P, N>))
        .route(
            "/api/v1/matching/parameters",
            get(parameters_handler::<R, P, N>),
        )
        .route(
            "/api/v1/matching/parameters/validate",
            post(validate_handler),
        )
        .route(
            "/api/v1/matching/parameters/:context",
            put(update_parameters_handler::<R, P, N>),
        )
        .with_state(service)
}

fn error_response(error: &MatchingError) -> Response {
    let status = match error {
        MatchingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MatchingError::StaleCandidate { .. } | MatchingError::Conflict(_) | MatchingError::InFlight => {
            StatusCode::CONFLICT
        }
        MatchingError::NotFound(_) => StatusCode::NOT_FOUND,
        MatchingError::InvalidLimit { .. } => StatusCode::BAD_REQUEST,
        MatchingError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        MatchingError::Transition(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = if error.is_retryable() {
        json!({ "error": error.to_string(), "retryable": true })
    } else {
        json!({ "error": error.to_string() })
    };
    (status, axum::Json(payload)).into_response()
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({ "error": message })),
    )
        .into_response()
}

pub(crate) async fn recommendations_handler<R, P, N>(
    State(service): State<Arc<MatchingService<R, P, N>>>,
    Query(query): Query<RecommendationQuery>,
) -> Response
where
    R: MatchingRepository + 'static,
    P: ParameterRepository + 'static,
    N: MatchNotifier + 'static,
{
    let role = match query.role.parse::<UserRole>() {
        Ok(role) => role,
        Err(message) => return bad_request(message),
    };
    let user_id = UserId(query.user_id);

    match service.get_matching_recommendations(&user_id, role, query.limit) {
        Ok(set) => (StatusCode::OK, axum::Json(set)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn create_match_handler<R, P, N>(
    State(service): State<Arc<MatchingService<R, P, N>>>,
    axum::Json(submission): axum::Json<MatchSubmission>,
) -> Response
where
    R: MatchingRepository + 'static,
    P: ParameterRepository + 'static,
    N: MatchNotifier + 'static,
{
    let outcome = service.create_smart_match(
        &submission.request_id,
        &submission.donation_id,
        submission.volunteer_id.as_ref(),
    );

    match outcome {
        Ok(outcome) => {
            let status = if outcome.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, axum::Json(outcome)).into_response()
        }
        Err(MatchingError::StaleCandidate { reason }) => {
            let mut payload = json!({
                "success": false,
                "error": format!("candidate is no longer available: {reason}"),
                "refreshed": null,
            });
            if let Some(target) = submission.refresh_for {
                match service.get_matching_recommendations(
                    &target.user_id,
                    target.role,
                    target.limit,
                ) {
                    Ok(refreshed) => payload["refreshed"] = json!(refreshed),
                    Err(err) => {
                        warn!(
                            user_id = %target.user_id,
                            error = %err,
                            "refresh after stale candidate failed"
                        );
                        payload["refresh_error"] = json!(err.to_string());
                        payload["retryable"] = json!(true);
                    }
                }
            }
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn parameters_handler<R, P, N>(
    State(service): State<Arc<MatchingService<R, P, N>>>,
) -> Response
where
    R: MatchingRepository + 'static,
    P: ParameterRepository + 'static,
    N: MatchNotifier + 'static,
{
    match service.get_matching_parameters() {
        Ok(parameters) => (StatusCode::OK, axum::Json(parameters)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn update_parameters_handler<R, P, N>(
    State(service): State<Arc<MatchingService<R, P, N>>>,
    Path(context): Path<String>,
    axum::Json(request): axum::Json<ParameterUpdateRequest>,
) -> Response
where
    R: MatchingRepository + 'static,
    P: ParameterRepository + 'static,
    N: MatchNotifier + 'static,
{
    let context = match context.parse::<MatchingContext>() {
        Ok(context) => context,
        Err(message) => return bad_request(message),
    };

    match service.update_matching_parameters(context, request.updates, request.admin_user_id) {
        Ok(stored) => (StatusCode::OK, axum::Json(stored)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn validate_handler(
    axum::Json(request): axum::Json<ValidationRequest>,
) -> Response {
    let (weights, outcome) = match &request {
        ValidationRequest::Parameters { parameters } => (parameters.weights, validate(parameters)),
        ValidationRequest::Weights { weights } => (*weights, validate_weights(weights)),
    };
    let report = weight_sum_report(&weights);

    let payload = json!({
        "valid": outcome.is_ok(),
        "sum": report.sum,
        "percentage": report.percentage,
        "error": outcome.err().map(|err| err.to_string()),
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}
