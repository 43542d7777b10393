use {
    crate::utils::errorfmt::ErrorFmt,
    ahash::AHashMap,
    std::num::ParseIntError,
    thiserror::Error,
};

pub const DISABLE_EXPLICIT_SYNC_VAR: &str = "WL_PRESENT_DISABLE_EXPLICIT_SYNC";
pub const DISABLE_IMPLICIT_SYNC_VAR: &str = "WL_PRESENT_DISABLE_IMPLICIT_SYNC";
pub const PROTOCOL_VERSIONS_VAR: &str = "WL_PRESENT_PROTOCOL_VERSIONS";
pub const RENDER_OFFLOAD_PROVIDER_VAR: &str = "__NV_PRIME_RENDER_OFFLOAD_PROVIDER";
pub const RENDER_OFFLOAD_VAR: &str = "__NV_PRIME_RENDER_OFFLOAD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Protocol version entry `{0}` is not of the form name=version")]
    MissingSeparator(String),
    #[error("Protocol version entry `{0}` has an invalid version")]
    InvalidVersion(String, #[source] ParseIntError),
}

/// Settings of a display. Built once when the display is created.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PresentConfig {
    pub disable_explicit_sync: bool,
    /// Only useful for testing.
    pub disable_implicit_sync: bool,
    /// Upper bounds for the versions of bound globals, by interface name.
    pub protocol_versions: AHashMap<String, u32>,
    /// The device node that should be rendered on.
    pub render_offload_provider: Option<String>,
    /// Whether rendering may happen on a device other than the one the
    /// compositor uses.
    pub enable_alt_device: bool,
}

impl PresentConfig {
    pub fn from_env() -> Self {
        Self::parse(|name| std::env::var(name).ok())
    }

    pub fn parse(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str| lookup(name).is_some_and(|v| parse_flag(&v));
        let mut config = Self {
            disable_explicit_sync: flag(DISABLE_EXPLICIT_SYNC_VAR),
            disable_implicit_sync: flag(DISABLE_IMPLICIT_SYNC_VAR),
            ..Default::default()
        };
        if let Some(versions) = lookup(PROTOCOL_VERSIONS_VAR) {
            for entry in versions.split(',') {
                match parse_version_entry(entry) {
                    Ok(Some((name, version))) => {
                        config.protocol_versions.insert(name, version);
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("Ignoring protocol version cap: {}", ErrorFmt(e)),
                }
            }
        }
        match lookup(RENDER_OFFLOAD_PROVIDER_VAR) {
            Some(provider) => {
                config.render_offload_provider = Some(provider);
                config.enable_alt_device = true;
            }
            None => config.enable_alt_device = flag(RENDER_OFFLOAD_VAR),
        }
        config
    }

    /// Returns the version to bind for an interface.
    pub fn version(&self, interface: &str, supported: u32, advertised: u32) -> u32 {
        let mut version = supported.min(advertised);
        if let Some(cap) = self.protocol_versions.get(interface) {
            version = version.min(*cap);
        }
        version
    }
}

/// Interprets a variable as a number where any non-zero value enables the
/// flag.
fn parse_flag(v: &str) -> bool {
    v.trim().parse::<i64>().is_ok_and(|v| v != 0)
}

fn parse_version_entry(entry: &str) -> Result<Option<(String, u32)>, ConfigError> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Ok(None);
    }
    let Some((name, version)) = entry.split_once('=') else {
        return Err(ConfigError::MissingSeparator(entry.to_string()));
    };
    let version = version
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidVersion(entry.to_string(), e))?;
    Ok(Some((name.trim().to_string(), version)))
}
