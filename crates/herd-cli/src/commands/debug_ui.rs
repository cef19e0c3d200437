use std::path::Path;

use anyhow::Result;

use crate::{config::DebugUiAction, logger::Logger};

use super::{connect, connect_existing};

pub async fn debug_ui(config: &Path, system: &Path, action: DebugUiAction) -> Result<()> {
    let mut logger = Logger::default();

    match action {
        DebugUiAction::Start => {
            connect(config, system).await?.debug_ui_start().await?;
            logger.system("Debug server started");
        }
        DebugUiAction::Stop => {
            if let Some(mut client) = connect_existing(system).await? {
                client.debug_ui_stop().await?;
            }
            logger.system("Debug server stopped");
        }
    }

    Ok(())
}
