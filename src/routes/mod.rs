pub mod attrs;
pub mod auth;
pub mod recipe;
