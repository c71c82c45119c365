pub mod auth;
pub mod config;
pub mod extract;
pub mod likes;
pub mod messages;
pub mod pages;
pub mod session;
pub mod state;
pub mod users;

use axum::{
    Router,
    http::{HeaderValue, header},
    middleware,
    response::Response,
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::session::require_login;
use crate::state::AppState;

/// Most messages shown on the home feed and profile pages.
pub const FEED_LIMIT: u32 = 100;

/// All Warbler routes, `/static` included. Tracing is layered on by the server.
pub fn app(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    let public_routes = Router::new()
        .route("/", get(messages::homepage))
        .route("/signup", get(auth::signup_form).post(auth::signup))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/users", get(users::list_users))
        .route("/users/{user_id}", get(users::show_user))
        .route("/messages/{message_id}", get(messages::show_message))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users/{user_id}/following", get(users::show_following))
        .route("/users/{user_id}/followers", get(users::show_followers))
        .route("/users/{user_id}/likes", get(users::show_likes))
        .route("/users/follow/{follow_id}", post(users::follow))
        .route("/users/stop-following/{follow_id}", post(users::stop_following))
        .route("/users/profile", get(users::profile_form).post(users::update_profile))
        .route("/users/delete", post(users::delete_user))
        .route("/users/add_like/{message_id}", post(likes::toggle_like))
        .route("/messages/new", get(messages::new_message_form).post(messages::create_message))
        .route("/messages/{message_id}/delete", post(messages::delete_message))
        .layer(middleware::from_fn_with_state(state.clone(), require_login))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/static", ServeDir::new(&static_dir))
        .fallback(not_found)
        .layer(middleware::map_response(no_cache))
}

async fn not_found() -> Response {
    pages::not_found()
}

async fn no_cache(mut res: Response) -> Response {
    let headers = res.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    res
}
