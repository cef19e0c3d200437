use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use herd_types::{ServiceId, ServiceStatus, ServiceView};

use crate::logger::Logger;

use super::connect;

fn format_view(view: &ServiceView) -> String {
    let status = match view.status {
        ServiceStatus::Running => "running".green(),
        ServiceStatus::Stopped => "stopped".dimmed(),
    };
    let port = view
        .debug_port
        .map_or_else(|| "-".to_owned(), |port| port.to_string());
    let start = view
        .start
        .map_or_else(|| "-".to_owned(), |ts| ts.0.to_string());
    let kill = view
        .kill
        .map_or_else(|| "-".to_owned(), |ts| ts.0.to_string());

    format!(
        "{:<6} {status:<8} port={port:<6} start={start:<14} kill={kill:<14} {}",
        view.id.to_string(),
        view.entry_point
    )
}

pub async fn register(config: &Path, system: &Path, entry_point: String) -> Result<()> {
    let id = connect(config, system).await?.register(entry_point).await?;
    Logger::default().plain(&id.0.to_string());
    Ok(())
}

pub async fn list(config: &Path, system: &Path) -> Result<()> {
    let services = connect(config, system).await?.list().await?;
    let mut logger = Logger::default();

    if services.is_empty() {
        logger.system("No services registered");
    }
    for view in services.values() {
        logger.plain(&format_view(view));
    }

    Ok(())
}

pub async fn inspect(config: &Path, system: &Path, id: ServiceId) -> Result<()> {
    let logs = connect(config, system).await?.inspect(id).await?;
    let mut logger = Logger::default();

    logger.plain(&format_view(&logs.service));
    logger.log("stdout", &logs.stdout);
    logger.log("stderr", &logs.stderr);

    Ok(())
}

pub async fn start(config: &Path, system: &Path, id: ServiceId) -> Result<()> {
    connect(config, system).await?.start(id).await?;
    Logger::default().system(&format!("Service {id} started"));
    Ok(())
}

pub async fn stop(config: &Path, system: &Path, id: ServiceId) -> Result<()> {
    connect(config, system).await?.stop(id).await?;
    Logger::default().system(&format!("Service {id} stopped"));
    Ok(())
}

pub async fn deregister(config: &Path, system: &Path, id: ServiceId) -> Result<()> {
    connect(config, system).await?.deregister(id).await?;
    Logger::default().system(&format!("Service {id} deregistered"));
    Ok(())
}
