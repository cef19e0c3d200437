use serde::Deserialize;

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawConfig {
    pub services_root: Option<String>,
    pub logs_root: Option<String>,
    pub debug_port_base: Option<u16>,
    pub interpreter: Option<String>,
    pub debug_flag: Option<String>,
    pub inspector: Option<RawInspector>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawInspector {
    pub program: Option<String>,
    pub web_port: Option<u16>,
    pub save_live_edit: Option<bool>,
    pub max_restarts: Option<u32>,
}
