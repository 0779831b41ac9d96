/// larkm server
///
/// Loads configuration, opens the ARK database and serves the resolver and
/// the /larkm management API.

use larkm::{logging, server, AppContext, LarkmConfig, LarkmResult};

#[tokio::main]
async fn main() -> LarkmResult<()> {
    // Logging first, so configuration warnings are visible
    logging::init();

    let config = LarkmConfig::from_env()?;
    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}
