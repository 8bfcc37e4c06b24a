use std::path::PathBuf;

use axum::{
    Router,
    routing::{get, post, put},
};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tower_http::services::ServeDir;

use crate::configuration::get_configuration;
use crate::routes::attrs::{
    delete_ingredient, delete_tag, list_ingredients, list_tags, update_ingredient, update_tag,
};
use crate::routes::auth::{
    authorize_handler, install_keys, me_handler, register_handler, update_me_handler,
};
use crate::routes::recipe::{
    create_recipe, delete_recipe, get_recipe, list_recipes, patch_recipe, put_recipe, upload_image,
};
use crate::services::attr::AttrService;
use crate::services::auth::AuthService;
use crate::services::recipe::RecipeService;
use crate::store::user::UserRepository;
use crate::store::{AttrRepository, RecipeRepository};

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth_service: AuthService,
    pub recipe_service: RecipeService,
    pub attr_service: AttrService,
    pub media_root: PathBuf,
}

pub async fn run() {
    let cfg = get_configuration().expect("could not get config");

    install_keys(cfg.auth.jwt_secret.expose_secret().as_bytes());

    let pg_pool = PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(cfg.database.with_db());

    wait_for_db(&pg_pool).await;

    sqlx::migrate!()
        .run(&pg_pool)
        .await
        .expect("could not run database migrations");

    let user_repo = UserRepository::new(pg_pool.clone());
    let auth_service = AuthService::new(user_repo);

    let recipe_repo = RecipeRepository::new(pg_pool.clone());
    let attr_repo = AttrRepository::new(pg_pool.clone());
    let recipe_service = RecipeService::new(recipe_repo, attr_repo.clone());
    let attr_service = AttrService::new(attr_repo);

    let media_root = PathBuf::from(&cfg.application.media_root);
    let app_state = AppState {
        auth_service,
        recipe_service,
        attr_service,
        media_root: media_root.clone(),
    };

    let app = Router::new()
        .route("/api/user/create", post(register_handler))
        .route("/api/user/token", post(authorize_handler))
        .route("/api/user/me", get(me_handler).patch(update_me_handler))
        .route(
            "/api/recipe/recipes",
            get(list_recipes).post(create_recipe),
        )
        .route(
            "/api/recipe/recipes/{id}",
            get(get_recipe)
                .put(put_recipe)
                .patch(patch_recipe)
                .delete(delete_recipe),
        )
        .route("/api/recipe/recipes/{id}/upload-image", post(upload_image))
        .route("/api/recipe/tags", get(list_tags))
        .route(
            "/api/recipe/tags/{id}",
            put(update_tag).patch(update_tag).delete(delete_tag),
        )
        .route("/api/recipe/ingredients", get(list_ingredients))
        .route(
            "/api/recipe/ingredients/{id}",
            put(update_ingredient)
                .patch(update_ingredient)
                .delete(delete_ingredient),
        )
        .nest_service("/media", ServeDir::new(media_root))
        .with_state(app_state);

    let address = format!("{}:{}", cfg.application.host, cfg.application.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .expect("could not bind listener");
    tracing::info!("Listening on {}", address);
    axum::serve(listener, app)
        .await
        .expect("could not start server");
}

/// Blocks until the database accepts queries. Deployments routinely start
/// the app before the database container is ready.
async fn wait_for_db(pool: &Pool<Postgres>) {
    loop {
        match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => break,
            Err(e) => {
                tracing::warn!("Database unavailable ({e}), waiting one second");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
    tracing::info!("Database available");
}
