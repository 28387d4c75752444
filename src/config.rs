use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CompileError, Result};
use crate::types::SourceId;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const WORLD_MORTALITY_URL: &str =
    "https://raw.githubusercontent.com/akarlinsky/world_mortality/main/world_mortality.csv";
const CDC_PROVISIONAL_URL: &str =
    "https://data.cdc.gov/api/views/r8kw-7aab/rows.csv?accessType=DOWNLOAD";
const ARCHIVED_NCHS_URL: &str = "https://web.archive.org/web/20211107014901/https://data.cdc.gov/api/views/mr8w-325u/rows.csv?accessType=DOWNLOAD";
const LOCAL_2019_PATH: &str = "data/all_state_deaths_2019.csv";

/// Where a source's payload comes from. Pointing a source at a local file is
/// how tests (and offline runs) replace the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Http(String),
    File(PathBuf),
}

/// Run configuration. Every field has a built-in default matching the public
/// endpoints, so the compiler runs with no config file present; `config.toml`
/// exists to pin mirrors, point sources at fixtures, or adjust ranks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retry: RetryConfig,
    pub output: OutputConfig,
    pub validation: ValidationConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, not retries after the first.
    pub max_attempts: u32,
    /// First backoff delay; doubles on each subsequent failure.
    pub base_delay_ms: u64,
    /// Pause before every HTTP request, out of politeness to public hosts.
    pub politeness_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1000,
            politeness_delay_ms: 1000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Year-over-year national total change (as a fraction) above which the
    /// run summary prints a warning.
    pub yoy_swing_threshold: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            yoy_swing_threshold: 0.15,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub world_mortality: SourceSpec,
    pub cdc_provisional: SourceSpec,
    pub archived_nchs: SourceSpec,
    pub local_2019: SourceSpec,
}

/// Per-source overrides. Unset fields fall back to the built-in defaults for
/// that source, so a section can override just one knob.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSpec {
    pub enabled: bool,
    pub url: Option<String>,
    pub path: Option<PathBuf>,
    pub completeness_rank: Option<u8>,
    pub provisional_undercount: Option<bool>,
}

impl Default for SourceSpec {
    fn default() -> Self {
        SourceSpec {
            enabled: true,
            url: None,
            path: None,
            completeness_rank: None,
            provisional_undercount: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            CompileError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Loads an explicit config path (which must exist), or `config.toml`
    /// from the working directory if present, or the built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    pub fn source(&self, id: SourceId) -> &SourceSpec {
        match id {
            SourceId::WorldMortality => &self.sources.world_mortality,
            SourceId::CdcProvisional => &self.sources.cdc_provisional,
            SourceId::ArchivedNchs => &self.sources.archived_nchs,
            SourceId::Local2019 => &self.sources.local_2019,
        }
    }

    /// Resolved payload location for a source: explicit path override first,
    /// then explicit URL, then the built-in endpoint.
    pub fn location(&self, id: SourceId) -> SourceLocation {
        let spec = self.source(id);
        if let Some(path) = &spec.path {
            return SourceLocation::File(path.clone());
        }
        if let Some(url) = &spec.url {
            return SourceLocation::Http(url.clone());
        }
        default_location(id)
    }

    /// Priority used by the reconciler; higher wins.
    pub fn completeness_rank(&self, id: SourceId) -> u8 {
        self.source(id)
            .completeness_rank
            .unwrap_or_else(|| default_rank(id))
    }

    /// Whether this source is known to undercount recent weeks, making a
    /// tied record from another source preferable.
    pub fn provisional_undercount(&self, id: SourceId) -> bool {
        self.source(id)
            .provisional_undercount
            .unwrap_or_else(|| default_undercount(id))
    }

    pub fn enabled_sources(&self) -> Vec<SourceId> {
        SourceId::all()
            .into_iter()
            .filter(|id| self.source(*id).enabled)
            .collect()
    }
}

fn default_location(id: SourceId) -> SourceLocation {
    match id {
        SourceId::WorldMortality => SourceLocation::Http(WORLD_MORTALITY_URL.to_string()),
        SourceId::CdcProvisional => SourceLocation::Http(CDC_PROVISIONAL_URL.to_string()),
        SourceId::ArchivedNchs => SourceLocation::Http(ARCHIVED_NCHS_URL.to_string()),
        SourceId::Local2019 => SourceLocation::File(PathBuf::from(LOCAL_2019_PATH)),
    }
}

fn default_rank(id: SourceId) -> u8 {
    match id {
        SourceId::Local2019 => 4,
        SourceId::CdcProvisional => 3,
        SourceId::ArchivedNchs => 2,
        SourceId::WorldMortality => 1,
    }
}

fn default_undercount(id: SourceId) -> bool {
    matches!(id, SourceId::CdcProvisional)
}
