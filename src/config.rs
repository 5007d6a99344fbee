use crate::error::{Result, StagerError};
use collection_stager_common::naming::DEFAULT_CONTAINER;
use collection_stager_common::NamingConvention;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 照合の既定しきい値（90%）
pub const DEFAULT_THRESHOLD: f64 = 0.90;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub container: String,
    pub collection: String,
    pub search_dirs: Vec<PathBuf>,
    pub threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            container: DEFAULT_CONTAINER.into(),
            collection: String::new(),
            search_dirs: Vec::new(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| StagerError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("collection-stager").join("config.json"))
    }

    // 環境変数を優先
    fn apply_env(&mut self) {
        if let Ok(container) = std::env::var("CB_STAGE_CONTAINER") {
            if !container.trim().is_empty() {
                self.container = container;
            }
        }
        if let Ok(collection) = std::env::var("CB_STAGE_COLLECTION") {
            self.collection = collection;
        }
    }

    pub fn naming(&self) -> NamingConvention {
        NamingConvention::new(self.container.clone(), self.collection.clone())
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        self.threshold = validate_threshold(threshold)?;
        Ok(())
    }

    /// 検索フォルダを追加（重複は無視）
    pub fn add_search_dir(&mut self, dir: PathBuf) -> bool {
        if self.search_dirs.contains(&dir) {
            return false;
        }
        self.search_dirs.push(dir);
        true
    }
}

pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(StagerError::InvalidThreshold(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.container, "collectionbuilder");
        assert!(config.collection.is_empty());
        assert!((config.threshold - 0.90).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"collection":"letters"}"#).unwrap();
        assert_eq!(config.collection, "letters");
        assert_eq!(config.container, "collectionbuilder");
        assert!(config.search_dirs.is_empty());
    }

    #[test]
    fn test_validate_threshold() {
        assert!(validate_threshold(0.85).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(matches!(validate_threshold(1.5), Err(StagerError::InvalidThreshold(_))));
        assert!(validate_threshold(-0.1).is_err());
    }

    #[test]
    fn test_add_search_dir_dedup() {
        let mut config = Config::default();
        assert!(config.add_search_dir(PathBuf::from("/data/objs")));
        assert!(!config.add_search_dir(PathBuf::from("/data/objs")));
        assert_eq!(config.search_dirs.len(), 1);
    }
}
