use axum::Router;

use crate::state::AppState;

pub mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod services;
pub mod status;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
