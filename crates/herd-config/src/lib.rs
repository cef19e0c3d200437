mod model;
mod raw;

use std::path::Path;

pub use model::{Config, InspectorConfig};

/// Error type for configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "toml")]
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error(s): {0}")]
    Validation(String),
}

/// Load the configuration from a file path.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration file cannot be read or parsed.
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_auto(&text, path)
}

/// Load the configuration from `path`, or fall back to the defaults when the
/// file does not exist.
///
/// # Errors
///
/// Returns a `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if std::fs::exists(path)? {
        load_from_path(path)
    } else {
        Ok(Config::default())
    }
}

/// Parse the configuration from a string, picking the format by extension.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
pub fn parse_auto(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml")]
        "toml" => parse_toml(text),
        _ => Err(ConfigError::Validation("unknown config extension".into())),
    }
}

/// Parse the configuration from a TOML string.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
#[cfg(feature = "toml")]
pub fn parse_toml(config: &str) -> Result<Config, ConfigError> {
    let raw_config = toml::from_str::<raw::RawConfig>(config)?;
    raw_config.try_into()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn parse_toml_ok() {
        let txt = r#"
            services_root = "./svc"
            logs_root = "./out"
            debug_port_base = 6000

            [inspector]
            web_port = 8181
            max_restarts = 5
        "#;
        let config = parse_toml(txt).unwrap();
        assert_eq!(config.services_root, PathBuf::from("./svc"));
        assert_eq!(config.logs_root, PathBuf::from("./out"));
        assert_eq!(config.debug_port_base, 6000);
        assert_eq!(config.interpreter, "node");
        assert_eq!(config.inspector.web_port, 8181);
        assert_eq!(config.inspector.max_restarts, 5);
        assert!(config.inspector.save_live_edit);
    }

    #[test]
    fn parse_toml_unknown_field() {
        assert!(matches!(
            parse_toml("service_root = \"typo\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn parse_auto_unknown_extension() {
        let result = parse_auto("", Path::new("herd.yaml"));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(&dir.path().join("herd.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herd.toml");
        std::fs::write(&path, "debug_port_base = 7000\n").unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.debug_port_base, 7000);
    }
}
