use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GagyebuError, Result};
use crate::models::AccountType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_account_type")]
    pub default_account_type: String,
}

fn default_account_type() -> String {
    AccountType::default().label().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            default_account_type: default_account_type(),
        }
    }
}

impl Settings {
    /// Falls back to the living account when the stored value is not recognized.
    pub fn account_type(&self) -> AccountType {
        self.default_account_type.parse().unwrap_or_default()
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("gagyebu")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("gagyebu")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| GagyebuError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn db_path() -> PathBuf {
    get_data_dir().join(crate::db::DB_FILE)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.data_dir.ends_with("gagyebu"));
        assert_eq!(s.default_account_type, "생활비 계좌");
        assert_eq!(s.account_type(), AccountType::Living);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let s: Settings = serde_json::from_str(r#"{"data_dir": "/tmp/test", "theme": "dark"}"#).unwrap();
        assert_eq!(s.data_dir, "/tmp/test");
        assert_eq!(s.default_account_type, "생활비 계좌");
    }

    #[test]
    fn test_account_type_from_settings() {
        let s = Settings {
            data_dir: "/tmp/test".to_string(),
            default_account_type: "reservoir".to_string(),
        };
        assert_eq!(s.account_type(), AccountType::Reservoir);

        let bad = Settings {
            data_dir: "/tmp/test".to_string(),
            default_account_type: "savings".to_string(),
        };
        assert_eq!(bad.account_type(), AccountType::Living);
    }

    #[test]
    fn test_written_json_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/books".to_string(),
            default_account_type: "저수지 계좌".to_string(),
        };
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        let loaded: Settings = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/books");
        assert_eq!(loaded.account_type(), AccountType::Reservoir);
    }
}
