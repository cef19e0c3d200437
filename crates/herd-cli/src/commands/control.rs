use std::path::Path;

use anyhow::Result;

use crate::logger::Logger;

use super::connect_existing;

pub async fn ping(system: &Path) -> Result<()> {
    let mut logger = Logger::default();

    let alive = match connect_existing(system).await? {
        Some(mut client) => client.ping().await,
        None => false,
    };

    if alive {
        logger.system("Daemon is running");
        Ok(())
    } else {
        anyhow::bail!("daemon is not running")
    }
}

pub async fn shutdown(system: &Path) -> Result<()> {
    let mut logger = Logger::default();

    let Some(mut client) = connect_existing(system).await? else {
        logger.system("Daemon is not running");
        return Ok(());
    };

    client.shutdown().await?;
    logger.system("Daemon stopped");
    Ok(())
}
