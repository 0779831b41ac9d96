/// API routes and handlers
pub mod caller;
pub mod health;
pub mod larkm;
pub mod resolver;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
///
/// ARK resolution is not listed here; it is the router fallback.
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(larkm::routes())
}
