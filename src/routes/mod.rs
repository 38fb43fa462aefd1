use crate::state::AppState;
use axum::Router;

pub mod analysis;
pub mod utility;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(utility::router())
        .merge(analysis::router())
}
