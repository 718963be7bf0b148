//! HTTP surface for the scoring gateway.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::ScoringAppState;
pub use routes::scoring_router;
