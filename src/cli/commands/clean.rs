//! Clean Command
//!
//! Clears the persisted page cache.

use crate::cache::ResponseCache;
use crate::cli::ui::output::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

pub async fn run() -> Result<()> {
    let out = Output::new();
    let config = ConfigLoader::load()?;

    let Some(dir) = config.cache.dir.clone() else {
        out.info("Page cache is memory-only, nothing to clean");
        return Ok(());
    };

    let cache = ResponseCache::new(config.cache.cache_config())?;
    let removed = cache.clear().await?;
    out.success(&format!(
        "Removed {} cached pages from {}",
        removed,
        dir.display()
    ));
    Ok(())
}
