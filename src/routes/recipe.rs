use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::errors::{ApiError, FieldErrors};
use crate::models::recipe::{NewRecipe, RecipeModel};
use crate::routes::attrs::AttrBody;
use crate::routes::auth::Claims;
use crate::services::recipe::{RecipeChanges, RecipeWithAttrs};
use crate::startup::AppState;
use crate::storage::{self, StorageError};

/// One embedded tag/ingredient record; anything beyond `name` is ignored.
#[derive(Debug, Deserialize)]
pub struct AttrPayload {
    pub name: String,
}

/// Shared write payload for create and update. Every field is optional at
/// the serde level so that an absent key is distinguishable from a present
/// one; which fields are actually required depends on the verb.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePayload {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<AttrPayload>>,
    pub ingredients: Option<Vec<AttrPayload>>,
}

#[derive(Debug, Serialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
}

impl From<RecipeModel> for RecipeSummary {
    fn from(recipe: RecipeModel) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<AttrBody>,
    pub ingredients: Vec<AttrBody>,
    pub image: Option<String>,
}

impl From<RecipeWithAttrs> for RecipeDetail {
    fn from(full: RecipeWithAttrs) -> Self {
        Self {
            id: full.recipe.id,
            title: full.recipe.title,
            time_minutes: full.recipe.time_minutes,
            price: full.recipe.price,
            link: full.recipe.link,
            description: full.recipe.description,
            tags: full.tags.into_iter().map(AttrBody::from).collect(),
            ingredients: full.ingredients.into_iter().map(AttrBody::from).collect(),
            image: full.recipe.image.map(media_url),
        }
    }
}

fn media_url(path: String) -> String {
    format!("/media/{path}")
}

fn names(list: Option<Vec<AttrPayload>>) -> Option<Vec<String>> {
    list.map(|attrs| attrs.into_iter().map(|a| a.name).collect())
}

fn check_time_minutes(time_minutes: Option<i32>, errors: &mut FieldErrors) {
    if let Some(m) = time_minutes {
        if m < 0 {
            errors.push(
                "time_minutes",
                "Ensure this value is greater than or equal to 0.",
            );
        }
    }
}

#[allow(clippy::type_complexity)]
fn validate_create(
    payload: RecipePayload,
) -> Result<(NewRecipe, Option<Vec<String>>, Option<Vec<String>>), ApiError> {
    let mut errors = FieldErrors::new();
    if payload.title.as_deref().is_none_or(str::is_empty) {
        errors.push("title", "This field is required.");
    }
    if payload.time_minutes.is_none() {
        errors.push("time_minutes", "This field is required.");
    }
    check_time_minutes(payload.time_minutes, &mut errors);
    if payload.price.is_none() {
        errors.push("price", "This field is required.");
    }

    match (payload.title, payload.time_minutes, payload.price) {
        (Some(title), Some(time_minutes), Some(price)) if errors.is_empty() => Ok((
            NewRecipe {
                title,
                time_minutes,
                price,
                link: payload.link,
                description: payload.description,
            },
            names(payload.tags),
            names(payload.ingredients),
        )),
        _ => Err(ApiError::Validation(errors)),
    }
}

fn validate_update(payload: RecipePayload, require_all: bool) -> Result<RecipeChanges, ApiError> {
    let mut errors = FieldErrors::new();
    if require_all {
        if payload.title.is_none() {
            errors.push("title", "This field is required.");
        }
        if payload.time_minutes.is_none() {
            errors.push("time_minutes", "This field is required.");
        }
        if payload.price.is_none() {
            errors.push("price", "This field is required.");
        }
    }
    if payload.title.as_deref() == Some("") {
        errors.push("title", "This field may not be blank.");
    }
    check_time_minutes(payload.time_minutes, &mut errors);
    errors.into_result()?;

    Ok(RecipeChanges {
        title: payload.title,
        time_minutes: payload.time_minutes,
        price: payload.price,
        link: payload.link,
        description: payload.description,
        tags: names(payload.tags),
        ingredients: names(payload.ingredients),
    })
}

#[instrument(name = "HTTP: List recipes", skip(state, claims))]
pub async fn list_recipes(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<RecipeSummary>>, ApiError> {
    let recipes = state.recipe_service.list(claims.user_id()?).await?;
    Ok(Json(recipes.into_iter().map(RecipeSummary::from).collect()))
}

#[instrument(name = "HTTP: Create recipe", skip(state, claims, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<RecipePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = claims.user_id()?;
    let (new, tags, ingredients) = validate_create(payload)?;

    let created = state
        .recipe_service
        .create(owner, new, tags, ingredients)
        .await?;
    Ok((StatusCode::CREATED, Json(RecipeDetail::from(created))))
}

#[instrument(name = "HTTP: Retrieve recipe", skip(state, claims))]
pub async fn get_recipe(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, ApiError> {
    let found = state
        .recipe_service
        .get(claims.user_id()?, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(found.into()))
}

#[instrument(name = "HTTP: Replace recipe", skip(state, claims, payload))]
pub async fn put_recipe(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(payload): Json<RecipePayload>,
) -> Result<Json<RecipeDetail>, ApiError> {
    update_recipe(state, claims, id, payload, true).await
}

#[instrument(name = "HTTP: Patch recipe", skip(state, claims, payload))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(payload): Json<RecipePayload>,
) -> Result<Json<RecipeDetail>, ApiError> {
    update_recipe(state, claims, id, payload, false).await
}

async fn update_recipe(
    state: AppState,
    claims: Claims,
    id: i64,
    payload: RecipePayload,
    require_all: bool,
) -> Result<Json<RecipeDetail>, ApiError> {
    let owner = claims.user_id()?;
    let changes = validate_update(payload, require_all)?;

    let updated = state
        .recipe_service
        .update(owner, id, changes)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated.into()))
}

#[instrument(name = "HTTP: Delete recipe", skip(state, claims))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.recipe_service.remove(claims.user_id()?, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

#[instrument(name = "HTTP: Upload recipe image", skip(state, claims, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = claims.user_id()?;

    // 404 before reading the body: the upload target has to exist.
    state
        .recipe_service
        .get(owner, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|_| {
        ApiError::Validation(FieldErrors::single("image", "Invalid multipart payload."))
    })? {
        if field.name() == Some("image") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(|_| {
                ApiError::Validation(FieldErrors::single("image", "Invalid multipart payload."))
            })?;
            upload = Some((file_name, data.to_vec()));
        }
    }

    let Some((file_name, data)) = upload else {
        return Err(ApiError::Validation(FieldErrors::single(
            "image",
            "No file was submitted.",
        )));
    };

    let relative = storage::save_recipe_image(&state.media_root, &file_name, &data)
        .await
        .map_err(|e| match e {
            StorageError::UnsupportedExtension => {
                ApiError::Validation(FieldErrors::single("image", "Upload a valid image."))
            }
            StorageError::Io(e) => ApiError::Internal(e.into()),
        })?;

    let recipe = state
        .recipe_service
        .attach_image(owner, id, &relative)
        .await?
        .ok_or(ApiError::NotFound)?;

    tracing::info!("Image stored for recipe");
    Ok(Json(json!({
        "id": recipe.id,
        "image": recipe.image.map(media_url),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attr::RecipeAttr;
    use serde_json::json;
    use uuid::Uuid;

    fn payload_from(value: serde_json::Value) -> RecipePayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn absent_relation_keys_deserialize_to_none() {
        let payload = payload_from(json!({ "title": "New Recipe Title" }));
        assert!(payload.tags.is_none());
        assert!(payload.ingredients.is_none());
    }

    #[test]
    fn empty_relation_lists_stay_distinct_from_absent_ones() {
        let payload = payload_from(json!({ "tags": [] }));
        assert_eq!(payload.tags.map(|t| t.len()), Some(0));
        assert!(payload.ingredients.is_none());
    }

    #[test]
    fn duplicate_names_are_kept_in_submission_order() {
        let payload = payload_from(json!({
            "tags": [{ "name": "Thai" }, { "name": "Dinner" }, { "name": "Thai" }],
        }));
        assert_eq!(
            names(payload.tags),
            Some(vec![
                "Thai".to_string(),
                "Dinner".to_string(),
                "Thai".to_string(),
            ])
        );
    }

    #[test]
    fn create_requires_title_minutes_and_price() {
        let err = validate_create(RecipePayload::default()).unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected a validation error");
        };
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value["title"], json!(["This field is required."]));
        assert_eq!(value["time_minutes"], json!(["This field is required."]));
        assert_eq!(value["price"], json!(["This field is required."]));
    }

    #[test]
    fn create_rejects_negative_minutes() {
        let err = validate_create(payload_from(json!({
            "title": "Sample Title",
            "time_minutes": -1,
            "price": "5.99",
        })))
        .unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected a validation error");
        };
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            value,
            json!({ "time_minutes": ["Ensure this value is greater than or equal to 0."] })
        );
    }

    #[test]
    fn create_accepts_a_minimal_payload() {
        let (new, tags, ingredients) = validate_create(payload_from(json!({
            "title": "Sample Title",
            "time_minutes": 30,
            "price": "5.99",
        })))
        .unwrap();

        assert_eq!(new.title, "Sample Title");
        assert_eq!(new.time_minutes, 30);
        assert_eq!(new.price, "5.99".parse().unwrap());
        assert!(new.link.is_none());
        assert!(tags.is_none());
        assert!(ingredients.is_none());
    }

    #[test]
    fn full_update_requires_the_same_fields_as_create() {
        let err = validate_update(payload_from(json!({ "title": "x" })), true).unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected a validation error");
        };
        let value = serde_json::to_value(&errors).unwrap();
        assert!(value.get("time_minutes").is_some());
        assert!(value.get("price").is_some());
        assert!(value.get("title").is_none());
    }

    #[test]
    fn partial_update_accepts_a_single_field() {
        let changes = validate_update(payload_from(json!({ "title": "New" })), false).unwrap();
        assert_eq!(changes.title.as_deref(), Some("New"));
        assert!(changes.time_minutes.is_none());
        assert!(changes.tags.is_none());
    }

    #[test]
    fn partial_update_passes_empty_tag_lists_through() {
        let changes = validate_update(payload_from(json!({ "tags": [] })), false).unwrap();
        assert_eq!(changes.tags, Some(vec![]));
        assert!(changes.ingredients.is_none());
    }

    fn sample_detail() -> RecipeDetail {
        let owner = Uuid::new_v4();
        RecipeDetail {
            id: 7,
            title: "Sample recipe title".to_string(),
            time_minutes: 22,
            price: "5.23".parse().unwrap(),
            link: Some("http://example.com/recipe.pdf".to_string()),
            description: Some("Sample recipe description".to_string()),
            tags: vec![
                AttrBody::from(RecipeAttr {
                    id: 1,
                    user_id: owner,
                    name: "Thai".to_string(),
                }),
                AttrBody::from(RecipeAttr {
                    id: 2,
                    user_id: owner,
                    name: "Dinner".to_string(),
                }),
            ],
            ingredients: vec![],
            image: Some("/media/recipes/abc.png".to_string()),
        }
    }

    #[test]
    fn detail_serializes_price_as_a_decimal_string() {
        let value = serde_json::to_value(sample_detail()).unwrap();
        assert_eq!(value["price"], json!("5.23"));
        assert_eq!(value["description"], json!("Sample recipe description"));
        assert_eq!(value["tags"][0]["name"], json!("Thai"));
        assert_eq!(value["image"], json!("/media/recipes/abc.png"));
    }

    #[test]
    fn summary_omits_detail_only_fields() {
        let recipe = RecipeModel {
            id: 7,
            user_id: Uuid::new_v4(),
            title: "Sample recipe title".to_string(),
            time_minutes: 22,
            price: "5.23".parse().unwrap(),
            link: None,
            description: Some("hidden in lists".to_string()),
            image: None,
            created_at: chrono::Utc::now(),
        };

        let value = serde_json::to_value(RecipeSummary::from(recipe)).unwrap();
        assert!(value.get("description").is_none());
        assert!(value.get("tags").is_none());
        assert!(value.get("ingredients").is_none());
        assert_eq!(value["title"], json!("Sample recipe title"));
    }
}
