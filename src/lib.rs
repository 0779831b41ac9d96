/// larkm - ARK registry and resolver
///
/// Mints, stores, updates and resolves Archival Resource Keys. The HTTP
/// surface lives in `api` and `server`; everything underneath is usable on its
/// own, which is how the `larkm-index` batch binary reuses the store.

pub mod api;
pub mod ark;
pub mod audit;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod logging;
pub mod policy;
pub mod registry;
pub mod search;
pub mod server;

pub use config::LarkmConfig;
pub use context::AppContext;
pub use error::{LarkmError, LarkmResult};
