//! Client configuration
//!
//! Settings come from an optional TOML file, then environment variables
//! override individual values. Credentials for the document archive are
//! never compiled in; they have to come from one of the two.
//!
//! ```toml
//! api_base_url = "https://signer.example.ec/signer/api/"
//! timeout_secs = 60
//!
//! [placement]
//! page_height = 796.0
//!
//! [archive]
//! base_url = "https://archive.example.ec/dwapi2/"
//! user = "firmador"
//! password = "..."
//! platform_uri = "https://archive.example.ec/DocuWare/Platform/"
//! cabinet_id = "6e3dfea0-..."
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use firmador_core::coords::{DEFAULT_PAGE_HEIGHT, MappingConstants};
use firmador_core::pagination::DEFAULT_PAGE_SIZE;
use firmador_core::PlacementMapping;

use crate::error::{ClientError, Result};

pub const ENV_API_URL: &str = "FIRMADOR_API_URL";
pub const ENV_ARCHIVE_URL: &str = "FIRMADOR_ARCHIVE_URL";
pub const ENV_ARCHIVE_USER: &str = "FIRMADOR_ARCHIVE_USER";
pub const ENV_ARCHIVE_PASSWORD: &str = "FIRMADOR_ARCHIVE_PASSWORD";
pub const ENV_ARCHIVE_PLATFORM_URI: &str = "FIRMADOR_ARCHIVE_PLATFORM_URI";
pub const ENV_ARCHIVE_CABINET_ID: &str = "FIRMADOR_ARCHIVE_CABINET_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmadorConfig {
    /// Base URL of the signing REST API
    #[serde(default)]
    pub api_base_url: String,
    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Rows per page in document listings (default: 20)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Where the signed-in session is kept between runs
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    #[serde(default)]
    pub placement: PlacementConfig,
    /// Document archive that receives signed PDFs. When absent, only
    /// gateways that store the result themselves can complete a signature.
    #[serde(default)]
    pub archive: Option<ArchiveConfig>,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for FirmadorConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
            state_path: None,
            placement: PlacementConfig::default(),
            archive: None,
        }
    }
}

/// Viewer-to-gateway coordinate settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    #[serde(default = "default_page_height")]
    pub page_height: f64,
    #[serde(default)]
    pub margin_x: f64,
    /// Flip around each page's own MediaBox instead of `page_height`
    #[serde(default)]
    pub page_geometry: bool,
}

fn default_page_height() -> f64 {
    DEFAULT_PAGE_HEIGHT
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            page_height: DEFAULT_PAGE_HEIGHT,
            margin_x: 0.0,
            page_geometry: false,
        }
    }
}

impl PlacementConfig {
    pub fn mapping(&self) -> PlacementMapping {
        if self.page_geometry {
            PlacementMapping::PageGeometry {
                margin_x: self.margin_x,
            }
        } else {
            PlacementMapping::Fixed(MappingConstants::new(self.page_height, self.margin_x))
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub base_url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Platform URI the archive API authenticates against
    #[serde(default)]
    pub platform_uri: String,
    /// File cabinet holding the documents
    #[serde(default)]
    pub cabinet_id: String,
    /// Pause between replacing the file and updating its index (default: 5000)
    #[serde(default = "default_index_settle_delay_ms")]
    pub index_settle_delay_ms: u64,
}

fn default_index_settle_delay_ms() -> u64 {
    5000
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user: String::new(),
            password: String::new(),
            platform_uri: String::new(),
            cabinet_id: String::new(),
            index_settle_delay_ms: default_index_settle_delay_ms(),
        }
    }
}

impl ArchiveConfig {
    pub fn index_settle_delay(&self) -> Duration {
        Duration::from_millis(self.index_settle_delay_ms)
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("platform_uri", &self.platform_uri)
            .field("cabinet_id", &self.cabinet_id)
            .field("index_settle_delay_ms", &self.index_settle_delay_ms)
            .finish_non_exhaustive()
    }
}

impl FirmadorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// File (when given), then process environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading configuration");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override settings from `lookup`, normally the process environment
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            self.api_base_url = url;
        }

        if let Some(url) = get(ENV_ARCHIVE_URL) {
            self.archive.get_or_insert_with(ArchiveConfig::default).base_url = url;
        }

        if let Some(archive) = self.archive.as_mut() {
            if let Some(user) = get(ENV_ARCHIVE_USER) {
                archive.user = user;
            }
            if let Some(password) = get(ENV_ARCHIVE_PASSWORD) {
                archive.password = password;
            }
            if let Some(uri) = get(ENV_ARCHIVE_PLATFORM_URI) {
                archive.platform_uri = uri;
            }
            if let Some(id) = get(ENV_ARCHIVE_CABINET_ID) {
                archive.cabinet_id = id;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(ClientError::MissingSetting("api_base_url"));
        }
        if self.timeout_secs == 0 {
            return Err(ClientError::MissingSetting("timeout_secs"));
        }
        if let Some(archive) = &self.archive {
            let required = [
                ("archive.base_url", &archive.base_url),
                ("archive.user", &archive.user),
                ("archive.password", &archive.password),
                ("archive.platform_uri", &archive.platform_uri),
                ("archive.cabinet_id", &archive.cabinet_id),
            ];
            for (name, value) in required {
                if value.trim().is_empty() {
                    return Err(ClientError::MissingSetting(name));
                }
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured state file, or `firmador/session.json` under the user's
    /// local data directory
    pub fn state_path(&self) -> PathBuf {
        self.state_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("firmador")
                .join("session.json")
        })
    }
}
