pub mod attr;
pub mod recipe;
pub mod user;

pub use attr::AttrRepository;
pub use recipe::RecipeRepository;
pub use user::UserRepository;

/// True when the error chain bottoms out in a Postgres unique violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}
