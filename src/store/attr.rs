use crate::models::attr::{AttrKind, RecipeAttr};
use sqlx::{Pool, Postgres};
use tracing::instrument;
use uuid::Uuid;

/// One repository for both tag and ingredient tables; `kind` picks the
/// tables at query-build time.
#[derive(Clone, Debug)]
pub struct AttrRepository {
    pool: Pool<Postgres>,
}

impl AttrRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Find-or-create scoped to `(owner, name)`. The insert races safely:
    /// the unique constraint makes concurrent duplicate submissions
    /// converge on a single row, and the follow-up select always sees it.
    #[instrument(name = "Get-or-create recipe attribute", skip(self))]
    pub async fn get_or_create(
        &self,
        kind: AttrKind,
        owner: Uuid,
        name: &str,
    ) -> anyhow::Result<RecipeAttr> {
        let insert = format!(
            "INSERT INTO {} (user_id, name) VALUES ($1, $2) \
             ON CONFLICT (user_id, name) DO NOTHING",
            kind.table()
        );
        sqlx::query(&insert)
            .bind(owner)
            .bind(name)
            .execute(&self.pool)
            .await?;

        let select = format!(
            "SELECT id, user_id, name FROM {} WHERE user_id = $1 AND name = $2",
            kind.table()
        );
        let attr = sqlx::query_as::<_, RecipeAttr>(&select)
            .bind(owner)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch {} after upsert: {:?}", kind, e);
                e
            })?;
        Ok(attr)
    }

    /// All attributes of `kind` owned by `owner`, name descending.
    #[instrument(name = "Listing recipe attributes", skip(self))]
    pub async fn list_by_user(&self, kind: AttrKind, owner: Uuid) -> anyhow::Result<Vec<RecipeAttr>> {
        let sql = format!(
            "SELECT id, user_id, name FROM {} WHERE user_id = $1 ORDER BY name DESC",
            kind.table()
        );
        let attrs = sqlx::query_as::<_, RecipeAttr>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(attrs)
    }

    #[instrument(name = "Renaming recipe attribute", skip(self))]
    pub async fn rename(
        &self,
        kind: AttrKind,
        owner: Uuid,
        id: i64,
        name: &str,
    ) -> anyhow::Result<Option<RecipeAttr>> {
        let sql = format!(
            "UPDATE {} SET name = $3 WHERE id = $1 AND user_id = $2 \
             RETURNING id, user_id, name",
            kind.table()
        );
        let attr = sqlx::query_as::<_, RecipeAttr>(&sql)
            .bind(id)
            .bind(owner)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attr)
    }

    #[instrument(name = "Deleting recipe attribute", skip(self))]
    pub async fn delete(&self, kind: AttrKind, owner: Uuid, id: i64) -> anyhow::Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", kind.table());
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Membership is a set: linking twice is a no-op.
    #[instrument(name = "Linking attribute to recipe", skip(self))]
    pub async fn link(&self, kind: AttrKind, recipe_id: i64, attr_id: i64) -> anyhow::Result<()> {
        let sql = format!(
            "INSERT INTO {} (recipe_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.link_table(),
            kind.link_column()
        );
        sqlx::query(&sql)
            .bind(recipe_id)
            .bind(attr_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(name = "Clearing recipe attribute links", skip(self))]
    pub async fn clear_links(&self, kind: AttrKind, recipe_id: i64) -> anyhow::Result<()> {
        let sql = format!("DELETE FROM {} WHERE recipe_id = $1", kind.link_table());
        sqlx::query(&sql).bind(recipe_id).execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(name = "Listing attributes linked to recipe", skip(self))]
    pub async fn list_for_recipe(
        &self,
        kind: AttrKind,
        recipe_id: i64,
    ) -> anyhow::Result<Vec<RecipeAttr>> {
        let sql = format!(
            "SELECT a.id, a.user_id, a.name FROM {} a \
             JOIN {} l ON l.{} = a.id WHERE l.recipe_id = $1 ORDER BY a.id",
            kind.table(),
            kind.link_table(),
            kind.link_column()
        );
        let attrs = sqlx::query_as::<_, RecipeAttr>(&sql)
            .bind(recipe_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_address_disjoint_tables() {
        assert_ne!(AttrKind::Tag.table(), AttrKind::Ingredient.table());
        assert_ne!(AttrKind::Tag.link_table(), AttrKind::Ingredient.link_table());
        assert_ne!(
            AttrKind::Tag.link_column(),
            AttrKind::Ingredient.link_column()
        );
    }
}
