use std::path::Path;

use anyhow::{anyhow, Result};
use herd_daemon::DaemonRunner;

pub async fn daemon(config: &Path, system: &Path) -> Result<()> {
    let config = herd_config::load_or_default(config)?;
    tracing::debug!("Loaded configuration: {config:?}");

    DaemonRunner::new(system.to_path_buf())
        .start(&config)
        .await
        .map_err(|err| anyhow!(err))
}
