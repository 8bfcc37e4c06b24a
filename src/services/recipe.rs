use crate::models::attr::{AttrKind, RecipeAttr};
use crate::models::recipe::{NewRecipe, RecipeModel};
use crate::store::{AttrRepository, RecipeRepository};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

/// A recipe update payload after validation. Each field distinguishes
/// "absent" from "present": an absent relation key leaves the stored set
/// untouched, a present one (even an empty list) replaces it.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct RecipeWithAttrs {
    pub recipe: RecipeModel,
    pub tags: Vec<RecipeAttr>,
    pub ingredients: Vec<RecipeAttr>,
}

#[derive(Clone, Debug)]
pub struct RecipeService {
    recipes: RecipeRepository,
    attrs: AttrRepository,
}

impl RecipeService {
    pub fn new(recipes: RecipeRepository, attrs: AttrRepository) -> Self {
        Self { recipes, attrs }
    }

    #[instrument(name = "Service: Create recipe", skip(self, new, tags, ingredients))]
    pub async fn create(
        &self,
        owner: Uuid,
        new: NewRecipe,
        tags: Option<Vec<String>>,
        ingredients: Option<Vec<String>>,
    ) -> anyhow::Result<RecipeWithAttrs> {
        // The recipe row has to exist before anything can be linked to it.
        let recipe = self.recipes.insert(owner, &new).await?;

        if let Some(names) = &tags {
            self.upsert_and_attach(recipe.id, AttrKind::Tag, names, owner)
                .await?;
        }
        if let Some(names) = &ingredients {
            self.upsert_and_attach(recipe.id, AttrKind::Ingredient, names, owner)
                .await?;
        }

        self.assemble(recipe).await
    }

    /// For each name in order: find the owner's attribute of that name or
    /// create it, then link it to the recipe. Duplicate names collapse onto
    /// the same row and membership is idempotent.
    async fn upsert_and_attach(
        &self,
        recipe_id: i64,
        kind: AttrKind,
        names: &[String],
        owner: Uuid,
    ) -> anyhow::Result<()> {
        for name in names {
            let attr = self.attrs.get_or_create(kind, owner, name).await?;
            self.attrs.link(kind, recipe_id, attr.id).await?;
        }
        Ok(())
    }

    #[instrument(name = "Service: Update recipe", skip(self, changes))]
    pub async fn update(
        &self,
        owner: Uuid,
        id: i64,
        changes: RecipeChanges,
    ) -> anyhow::Result<Option<RecipeWithAttrs>> {
        let Some(mut recipe) = self.recipes.find(owner, id).await? else {
            return Ok(None);
        };

        // Relations first: a present key replaces the whole set for that
        // kind, an absent key leaves it untouched.
        if let Some(names) = &changes.tags {
            self.attrs.clear_links(AttrKind::Tag, recipe.id).await?;
            self.upsert_and_attach(recipe.id, AttrKind::Tag, names, owner)
                .await?;
        }
        if let Some(names) = &changes.ingredients {
            self.attrs.clear_links(AttrKind::Ingredient, recipe.id).await?;
            self.upsert_and_attach(recipe.id, AttrKind::Ingredient, names, owner)
                .await?;
        }

        apply_changes(&mut recipe, &changes);
        self.recipes.update(&recipe).await?;

        self.assemble(recipe).await.map(Some)
    }

    #[instrument(name = "Service: Fetch recipe", skip(self))]
    pub async fn get(&self, owner: Uuid, id: i64) -> anyhow::Result<Option<RecipeWithAttrs>> {
        match self.recipes.find(owner, id).await? {
            Some(recipe) => self.assemble(recipe).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn list(&self, owner: Uuid) -> anyhow::Result<Vec<RecipeModel>> {
        self.recipes.list_by_user(owner).await
    }

    #[instrument(name = "Service: Delete recipe", skip(self))]
    pub async fn remove(&self, owner: Uuid, id: i64) -> anyhow::Result<bool> {
        self.recipes.delete(owner, id).await
    }

    #[instrument(name = "Service: Attach recipe image", skip(self, path))]
    pub async fn attach_image(
        &self,
        owner: Uuid,
        id: i64,
        path: &str,
    ) -> anyhow::Result<Option<RecipeModel>> {
        let Some(mut recipe) = self.recipes.find(owner, id).await? else {
            return Ok(None);
        };
        recipe.image = Some(path.to_string());
        self.recipes.update(&recipe).await?;
        Ok(Some(recipe))
    }

    async fn assemble(&self, recipe: RecipeModel) -> anyhow::Result<RecipeWithAttrs> {
        let tags = self.attrs.list_for_recipe(AttrKind::Tag, recipe.id).await?;
        let ingredients = self
            .attrs
            .list_for_recipe(AttrKind::Ingredient, recipe.id)
            .await?;
        Ok(RecipeWithAttrs {
            recipe,
            tags,
            ingredients,
        })
    }
}

/// Direct field-by-field assignment of the provided scalars; fields absent
/// from the payload keep their stored value.
fn apply_changes(recipe: &mut RecipeModel, changes: &RecipeChanges) {
    if let Some(title) = &changes.title {
        recipe.title = title.clone();
    }
    if let Some(time_minutes) = changes.time_minutes {
        recipe.time_minutes = time_minutes;
    }
    if let Some(price) = changes.price {
        recipe.price = price;
    }
    if let Some(link) = &changes.link {
        recipe.link = Some(link.clone());
    }
    if let Some(description) = &changes.description {
        recipe.description = Some(description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_recipe() -> RecipeModel {
        RecipeModel {
            id: 1,
            user_id: Uuid::new_v4(),
            title: "Sample recipe title".to_string(),
            time_minutes: 22,
            price: "5.23".parse().unwrap(),
            link: Some("http://example.com/recipe.pdf".to_string()),
            description: Some("Sample recipe description".to_string()),
            image: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn partial_change_only_touches_provided_fields() {
        let mut recipe = sample_recipe();
        let original_link = recipe.link.clone();

        apply_changes(
            &mut recipe,
            &RecipeChanges {
                title: Some("New Recipe Title".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(recipe.title, "New Recipe Title");
        assert_eq!(recipe.link, original_link);
        assert_eq!(recipe.time_minutes, 22);
        assert_eq!(recipe.price, "5.23".parse().unwrap());
    }

    #[test]
    fn full_change_replaces_every_scalar() {
        let mut recipe = sample_recipe();

        apply_changes(
            &mut recipe,
            &RecipeChanges {
                title: Some("New recipe title".to_string()),
                time_minutes: Some(10),
                price: Some("2.50".parse().unwrap()),
                link: Some("https://example.com/new-recipe.pdf".to_string()),
                description: Some("New recipe description".to_string()),
                tags: None,
                ingredients: None,
            },
        );

        assert_eq!(recipe.title, "New recipe title");
        assert_eq!(recipe.time_minutes, 10);
        assert_eq!(recipe.price, "2.50".parse().unwrap());
        assert_eq!(
            recipe.link.as_deref(),
            Some("https://example.com/new-recipe.pdf")
        );
        assert_eq!(
            recipe.description.as_deref(),
            Some("New recipe description")
        );
    }

    #[test]
    fn empty_change_set_is_a_no_op() {
        let mut recipe = sample_recipe();
        let before = recipe.clone();

        apply_changes(&mut recipe, &RecipeChanges::default());

        assert_eq!(recipe.title, before.title);
        assert_eq!(recipe.time_minutes, before.time_minutes);
        assert_eq!(recipe.price, before.price);
        assert_eq!(recipe.link, before.link);
        assert_eq!(recipe.description, before.description);
    }
}
