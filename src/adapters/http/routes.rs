//! Route table.

use super::auth::{auth_middleware, optional_auth_middleware};
use super::handlers;
use super::state::AppState;
use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

/// Build the application router with all `/api/v1` routes.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/integrations", get(handlers::list_integrations))
        .route("/integrations/{name}", get(handlers::get_integration));

    // Web-public streams can be read anonymously.
    let optional_auth_routes = Router::new()
        .route("/users/me/{stream_id}/topics", get(handlers::get_topics))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let protected_routes = Router::new()
        .route("/streams", get(handlers::get_streams))
        .route(
            "/streams/{stream_id}",
            get(handlers::get_stream)
                .patch(handlers::update_stream)
                .delete(handlers::deactivate_stream),
        )
        .route("/streams/{stream_id}/members", get(handlers::get_subscribers))
        .route(
            "/streams/{stream_id}/email_address",
            get(handlers::get_stream_email_address),
        )
        .route("/streams/{stream_id}/delete_topic", post(handlers::delete_topic))
        .route("/get_stream_id", get(handlers::get_stream_id))
        .route(
            "/users/me/subscriptions",
            get(handlers::list_subscriptions)
                .post(handlers::add_subscriptions)
                .delete(handlers::remove_subscriptions)
                .patch(handlers::update_subscriptions),
        )
        .route(
            "/users/me/subscriptions/properties",
            post(handlers::update_subscription_properties),
        )
        .route(
            "/users/me/subscriptions/{stream_id}",
            post(handlers::update_subscription_property),
        )
        .route(
            "/default_streams",
            post(handlers::add_default_stream).delete(handlers::remove_default_stream),
        )
        .route(
            "/default_stream_groups",
            get(handlers::list_default_stream_groups),
        )
        .route(
            "/default_stream_groups/create",
            post(handlers::create_default_stream_group),
        )
        .route(
            "/default_stream_groups/{group_id}",
            patch(handlers::update_default_stream_group_info)
                .delete(handlers::remove_default_stream_group),
        )
        .route(
            "/default_stream_groups/{group_id}/streams",
            patch(handlers::update_default_stream_group_streams),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new()
        .merge(public_routes)
        .merge(optional_auth_routes)
        .merge(protected_routes);

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
