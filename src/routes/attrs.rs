use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::errors::{ApiError, FieldErrors};
use crate::models::attr::{AttrKind, RecipeAttr};
use crate::routes::auth::Claims;
use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct AttrBody {
    pub id: i64,
    pub name: String,
}

impl From<RecipeAttr> for AttrBody {
    fn from(attr: RecipeAttr) -> Self {
        Self {
            id: attr.id,
            name: attr.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RenamePayload {
    name: Option<String>,
}

async fn list_attrs(
    kind: AttrKind,
    state: AppState,
    claims: Claims,
) -> Result<Json<Vec<AttrBody>>, ApiError> {
    let attrs = state.attr_service.list(kind, claims.user_id()?).await?;
    Ok(Json(attrs.into_iter().map(AttrBody::from).collect()))
}

async fn rename_attr(
    kind: AttrKind,
    state: AppState,
    claims: Claims,
    id: i64,
    payload: RenamePayload,
) -> Result<Json<AttrBody>, ApiError> {
    let Some(name) = payload.name.filter(|n| !n.is_empty()) else {
        return Err(ApiError::Validation(FieldErrors::single(
            "name",
            "This field is required.",
        )));
    };

    let attr = state
        .attr_service
        .rename(kind, claims.user_id()?, id, &name)
        .await?;
    Ok(Json(attr.into()))
}

async fn remove_attr(
    kind: AttrKind,
    state: AppState,
    claims: Claims,
    id: i64,
) -> Result<StatusCode, ApiError> {
    state
        .attr_service
        .remove(kind, claims.user_id()?, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(name = "HTTP: List tags", skip(state, claims))]
pub async fn list_tags(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<AttrBody>>, ApiError> {
    list_attrs(AttrKind::Tag, state, claims).await
}

#[instrument(name = "HTTP: Update tag", skip(state, claims, payload))]
pub async fn update_tag(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(payload): Json<RenamePayload>,
) -> Result<Json<AttrBody>, ApiError> {
    rename_attr(AttrKind::Tag, state, claims, id, payload).await
}

#[instrument(name = "HTTP: Delete tag", skip(state, claims))]
pub async fn delete_tag(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    remove_attr(AttrKind::Tag, state, claims, id).await
}

#[instrument(name = "HTTP: List ingredients", skip(state, claims))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<AttrBody>>, ApiError> {
    list_attrs(AttrKind::Ingredient, state, claims).await
}

#[instrument(name = "HTTP: Update ingredient", skip(state, claims, payload))]
pub async fn update_ingredient(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(payload): Json<RenamePayload>,
) -> Result<Json<AttrBody>, ApiError> {
    rename_attr(AttrKind::Ingredient, state, claims, id, payload).await
}

#[instrument(name = "HTTP: Delete ingredient", skip(state, claims))]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    remove_attr(AttrKind::Ingredient, state, claims, id).await
}
