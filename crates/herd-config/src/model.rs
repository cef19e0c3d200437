use std::path::PathBuf;

use crate::{
    raw::{RawConfig, RawInspector},
    ConfigError,
};

pub const DEFAULT_SERVICES_ROOT: &str = "./services";
pub const DEFAULT_LOGS_ROOT: &str = "./logs";
pub const DEFAULT_DEBUG_PORT_BASE: u16 = 5000;
pub const DEFAULT_INTERPRETER: &str = "node";
pub const DEFAULT_DEBUG_FLAG: &str = "--inspect";
pub const DEFAULT_INSPECTOR_PROGRAM: &str = "./node_modules/node-inspector/bin/inspector.js";
pub const DEFAULT_INSPECTOR_WEB_PORT: u16 = 8080;
pub const DEFAULT_INSPECTOR_MAX_RESTARTS: u32 = 100;

/// Resolved manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory entry points are resolved against.
    pub services_root: PathBuf,
    /// Directory holding one `{id}/stdout.log` + `{id}/stderr.log` pair per service.
    pub logs_root: PathBuf,
    /// First debug port handed out.
    pub debug_port_base: u16,
    pub interpreter: String,
    pub debug_flag: String,
    pub inspector: InspectorConfig,
}

/// Auxiliary web inspector settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorConfig {
    pub program: PathBuf,
    pub web_port: u16,
    pub save_live_edit: bool,
    pub max_restarts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services_root: PathBuf::from(DEFAULT_SERVICES_ROOT),
            logs_root: PathBuf::from(DEFAULT_LOGS_ROOT),
            debug_port_base: DEFAULT_DEBUG_PORT_BASE,
            interpreter: DEFAULT_INTERPRETER.to_owned(),
            debug_flag: DEFAULT_DEBUG_FLAG.to_owned(),
            inspector: InspectorConfig::default(),
        }
    }
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_INSPECTOR_PROGRAM),
            web_port: DEFAULT_INSPECTOR_WEB_PORT,
            save_live_edit: true,
            max_restarts: DEFAULT_INSPECTOR_MAX_RESTARTS,
        }
    }
}

fn non_empty(field: &str, value: Option<String>, default: &str) -> Result<String, ConfigError> {
    match value {
        Some(value) if value.trim().is_empty() => {
            Err(ConfigError::Validation(format!("`{field}` is empty")))
        }
        Some(value) => Ok(value),
        None => Ok(default.to_owned()),
    }
}

impl TryFrom<RawInspector> for InspectorConfig {
    type Error = ConfigError;

    fn try_from(raw: RawInspector) -> Result<Self, Self::Error> {
        let web_port = raw.web_port.unwrap_or(DEFAULT_INSPECTOR_WEB_PORT);
        if web_port == 0 {
            return Err(ConfigError::Validation(
                "`inspector.web_port` must be non-zero".into(),
            ));
        }

        Ok(Self {
            program: non_empty(
                "inspector.program",
                raw.program,
                DEFAULT_INSPECTOR_PROGRAM,
            )?
            .into(),
            web_port,
            save_live_edit: raw.save_live_edit.unwrap_or(true),
            max_restarts: raw.max_restarts.unwrap_or(DEFAULT_INSPECTOR_MAX_RESTARTS),
        })
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let debug_port_base = raw.debug_port_base.unwrap_or(DEFAULT_DEBUG_PORT_BASE);
        if debug_port_base == 0 {
            return Err(ConfigError::Validation(
                "`debug_port_base` must be non-zero".into(),
            ));
        }

        Ok(Config {
            services_root: non_empty("services_root", raw.services_root, DEFAULT_SERVICES_ROOT)?
                .into(),
            logs_root: non_empty("logs_root", raw.logs_root, DEFAULT_LOGS_ROOT)?.into(),
            debug_port_base,
            interpreter: non_empty("interpreter", raw.interpreter, DEFAULT_INTERPRETER)?,
            debug_flag: non_empty("debug_flag", raw.debug_flag, DEFAULT_DEBUG_FLAG)?,
            inspector: raw.inspector.unwrap_or_default().try_into()?,
        })
    }
}
