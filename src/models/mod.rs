pub mod attr;
pub mod recipe;
pub mod user;

pub use attr::{AttrKind, RecipeAttr};
pub use recipe::RecipeModel;
pub use user::UserModel;
