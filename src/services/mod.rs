pub mod attr;
pub mod auth;
pub mod recipe;
