use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    auto_persisting::PersistentModifiable, dirs::Dirs, tagger::TaggerSettings,
    upload_queue::UploadSettings,
};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("No config directory on this platform")]
    MissingConfigDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub language: Option<String>,
    /// flexi_logger spec, e.g. `info` or `studio_portal=debug`.
    pub log_level: String,
    pub upload: UploadSettings,
    pub tagger: TaggerSettings,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            language: None,
            log_level: "info".to_string(),
            upload: UploadSettings::default(),
            tagger: TaggerSettings::default(),
        }
    }
}

pub enum ConfigModification {
    SetLanguage(Option<String>),
    SetLogLevel(String),
    SetUploadSettings(UploadSettings),
    SetTaggerSettings(TaggerSettings),
}

impl PortalConfig {
    /// Missing files load as the default config.
    pub fn load_from(path: &Path) -> Result<PortalConfig, ConfigError> {
        if !path.exists() {
            return Ok(PortalConfig::default());
        }
        let mut file = File::open(path)?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(toml::from_str(&buf)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(toml::to_string(self)?.as_bytes())?;
        Ok(())
    }

    fn apply(&mut self, modification: ConfigModification) {
        match modification {
            ConfigModification::SetLanguage(language) => self.language = language,
            ConfigModification::SetLogLevel(log_level) => self.log_level = log_level,
            ConfigModification::SetUploadSettings(upload) => self.upload = upload,
            ConfigModification::SetTaggerSettings(tagger) => self.tagger = tagger,
        }
    }
}

impl PersistentModifiable<PortalConfig> for PortalConfig {
    type Error = ConfigError;
    type Modification = ConfigModification;

    fn load() -> Result<PortalConfig, ConfigError> {
        let dir = Dirs::Config.path().ok_or(ConfigError::MissingConfigDir)?;
        PortalConfig::load_from(&dir.join(CONFIG_FILE))
    }

    fn save(&self) -> Result<(), ConfigError> {
        let dir = Dirs::Config.path().ok_or(ConfigError::MissingConfigDir)?;
        self.save_to(&dir.join(CONFIG_FILE))
    }

    fn modify(&mut self, modification: ConfigModification) -> Result<(), ConfigError> {
        self.apply(modification);
        self.save()
    }
}
