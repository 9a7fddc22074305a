use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::AuthUser,
    error::ApiError,
    purchases::{dto::CreatePurchaseRequest, repo::Purchase},
    state::AppState,
};

pub fn purchases_routes() -> Router<AppState> {
    Router::new()
        .route("/purchases", post(create_purchase))
        .route("/purchases/user", get(list_user_purchases))
}

#[instrument(skip(state, payload))]
pub async fn create_purchase(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePurchaseRequest>,
) -> Result<(StatusCode, Json<Purchase>), ApiError> {
    payload.validate()?;

    let purchase =
        Purchase::create(&state.db, user_id, payload.product_id, payload.quantity).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

#[instrument(skip(state))]
pub async fn list_user_purchases(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Purchase>>, ApiError> {
    let purchases = Purchase::find_by_user(&state.db, user_id).await?;
    Ok(Json(purchases))
}
