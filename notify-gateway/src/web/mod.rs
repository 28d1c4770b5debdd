//! Web server module for the WeChat Pay notify endpoint.
//!
//! This module provides the HTTP surface of the gateway:
//! - `POST /notify`: verify, resolve, forward, acknowledge
//! - `GET /health`: liveness probe

pub mod handlers;
pub mod response;

use axum::{
    handler::Handler,
    http::Method,
    routing::{get, post, MethodRouter},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, notify, AppState, HealthResponse};
pub use response::{FailureResponse, RelayError};

/// One entry of the route table.
pub struct Route {
    method: Method,
    path: &'static str,
    handler: MethodRouter<AppState>,
}

impl Route {
    fn get<H, T>(path: &'static str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self {
            method: Method::GET,
            path,
            handler: get(handler),
        }
    }

    fn post<H, T>(path: &'static str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self {
            method: Method::POST,
            path,
            handler: post(handler),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

/// Every route the gateway serves. [`router`] is built from this table.
pub fn routes() -> Vec<Route> {
    vec![
        Route::post("/notify", notify),
        Route::get("/health", health),
    ]
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    routes()
        .into_iter()
        .fold(Router::new(), |router, route| {
            router.route(route.path, route.handler)
        })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
