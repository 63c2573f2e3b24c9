pub mod error;
pub mod feed;
pub mod middleware;
pub mod phemes;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, put},
};

use pheme_db::Database;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub type AppState = Arc<AppStateInner>;

/// Builds the full `/api/v1` router. Split out of the binary so integration
/// tests drive the exact routes the server mounts.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/v1/user/{id}", get(users::get_user))
        .route("/api/v1/users", get(users::search_users))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/api/v1/pheme",
            get(phemes::get_feed).post(phemes::create_pheme),
        )
        .route("/api/v1/pheme/mine", get(phemes::get_my_phemes))
        .route("/api/v1/pheme/user/{id}", get(phemes::get_user_phemes))
        .route(
            "/api/v1/pheme/{id}",
            get(phemes::get_pheme)
                .put(phemes::update_pheme)
                .delete(phemes::delete_pheme),
        )
        .route("/api/v1/user/friend", get(users::get_friends))
        .route(
            "/api/v1/user/friend/{id}",
            put(users::add_friend).delete(users::remove_friend),
        )
        .route(
            "/api/v1/user/follower/{id}",
            get(users::get_followers)
                .put(users::add_follower)
                .delete(users::remove_follower),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    public_routes.merge(protected_routes)
}
