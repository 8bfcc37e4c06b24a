use crate::models::recipe::{NewRecipe, RecipeModel};
use sqlx::{Pool, Postgres};
use tracing::instrument;
use uuid::Uuid;

const RECIPE_COLUMNS: &str =
    "id, user_id, title, time_minutes, price, link, description, image, created_at";

#[derive(Clone, Debug)]
pub struct RecipeRepository {
    pool: Pool<Postgres>,
}

impl RecipeRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(name = "Saving new recipe to database", skip(self, new))]
    pub async fn insert(&self, owner: Uuid, new: &NewRecipe) -> anyhow::Result<RecipeModel> {
        let sql = format!(
            "INSERT INTO recipes (user_id, title, time_minutes, price, link, description) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {RECIPE_COLUMNS}"
        );
        let recipe = sqlx::query_as::<_, RecipeModel>(&sql)
            .bind(owner)
            .bind(&new.title)
            .bind(new.time_minutes)
            .bind(new.price)
            .bind(&new.link)
            .bind(&new.description)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute query: {:?}", e);
                e
            })?;
        Ok(recipe)
    }

    #[instrument(name = "Fetching recipe from database", skip(self))]
    pub async fn find(&self, owner: Uuid, id: i64) -> anyhow::Result<Option<RecipeModel>> {
        let sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2");
        let recipe = sqlx::query_as::<_, RecipeModel>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(recipe)
    }

    /// All recipes owned by `owner`, newest first.
    #[instrument(name = "Listing recipes from database", skip(self))]
    pub async fn list_by_user(&self, owner: Uuid) -> anyhow::Result<Vec<RecipeModel>> {
        let sql =
            format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE user_id = $1 ORDER BY id DESC");
        let recipes = sqlx::query_as::<_, RecipeModel>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(recipes)
    }

    #[instrument(name = "Updating recipe in database", skip(self, recipe))]
    pub async fn update(&self, recipe: &RecipeModel) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE recipes SET title = $2, time_minutes = $3, price = $4, link = $5, \
             description = $6, image = $7 WHERE id = $1",
        )
        .bind(recipe.id)
        .bind(&recipe.title)
        .bind(recipe.time_minutes)
        .bind(recipe.price)
        .bind(&recipe.link)
        .bind(&recipe.description)
        .bind(&recipe.image)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(name = "Deleting recipe from database", skip(self))]
    pub async fn delete(&self, owner: Uuid, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
