use std::path::PathBuf;

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

const SUBDIR: &str = "studio_portal";

#[derive(Debug, EnumIter)]
pub enum Dirs {
    Config,
}

impl Dirs {
    /// `None` when the platform has no such base directory.
    pub fn path(&self) -> Option<PathBuf> {
        match *self {
            Dirs::Config => dirs::config_dir().map(|dir| dir.join(SUBDIR)),
        }
    }
}

impl Dirs {
    pub fn initialize_dirs() -> std::io::Result<()> {
        for path in Dirs::iter().filter_map(|dir| dir.path()) {
            if !path.exists() {
                std::fs::create_dir_all(path)?;
            }
        }
        Ok(())
    }
}
