use crate::errors::{ApiError, FieldErrors};
use crate::models::attr::{AttrKind, RecipeAttr};
use crate::store::{self, AttrRepository};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AttrError {
    #[error("not found")]
    NotFound,

    #[error("name already in use")]
    NameTaken,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<AttrError> for ApiError {
    fn from(e: AttrError) -> Self {
        match e {
            AttrError::NotFound => ApiError::NotFound,
            AttrError::NameTaken => {
                ApiError::Validation(FieldErrors::single("name", "This name is already in use."))
            }
            AttrError::Other(e) => ApiError::Internal(e),
        }
    }
}

/// List/rename/remove shared by the tag and ingredient endpoints; the kind
/// is the only thing that differs between them.
#[derive(Clone, Debug)]
pub struct AttrService {
    attrs: AttrRepository,
}

impl AttrService {
    pub fn new(attrs: AttrRepository) -> Self {
        Self { attrs }
    }

    pub async fn list(&self, kind: AttrKind, owner: Uuid) -> anyhow::Result<Vec<RecipeAttr>> {
        self.attrs.list_by_user(kind, owner).await
    }

    #[instrument(name = "Service: Rename attribute", skip(self))]
    pub async fn rename(
        &self,
        kind: AttrKind,
        owner: Uuid,
        id: i64,
        name: &str,
    ) -> Result<RecipeAttr, AttrError> {
        match self.attrs.rename(kind, owner, id, name).await {
            Ok(Some(attr)) => Ok(attr),
            Ok(None) => Err(AttrError::NotFound),
            Err(e) if store::is_unique_violation(&e) => {
                tracing::warn!("Rename failed: {} name already in use", kind);
                Err(AttrError::NameTaken)
            }
            Err(e) => Err(AttrError::Other(e)),
        }
    }

    #[instrument(name = "Service: Remove attribute", skip(self))]
    pub async fn remove(&self, kind: AttrKind, owner: Uuid, id: i64) -> Result<(), AttrError> {
        if self.attrs.delete(kind, owner, id).await? {
            Ok(())
        } else {
            Err(AttrError::NotFound)
        }
    }
}
