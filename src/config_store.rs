//! 插件配置存储
//! 每个插件一个 JSON 文件: <CONFIG_DIR>/<PluginId>.json

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, plugin_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", plugin_id))
    }

    /// 读取插件配置，不存在或无法解析时返回 None
    pub fn get_config(&self, plugin_id: &str) -> Option<Value> {
        let path = self.path_of(plugin_id);
        if !path.exists() {
            return None;
        }
        match load_config_from_file(&path) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("⚠️ 读取插件配置失败 {}: {}", path.display(), e);
                None
            }
        }
    }

    /// 保存插件配置
    pub fn save_config(&self, plugin_id: &str, config: &Value) -> anyhow::Result<()> {
        if !config.is_object() {
            anyhow::bail!("插件配置必须是 JSON 对象");
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.path_of(plugin_id);
        fs::write(&path, serde_json::to_string_pretty(config)?)?;
        info!("💾 保存插件配置: {}", path.display());
        Ok(())
    }
}

fn load_config_from_file(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(store.get_config("JavBus").is_none());
    }

    #[test]
    fn test_save_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested"));
        let config = json!({"enabled": true, "authorization": "abc"});

        store.save_config("BangumiAuthorization", &config).unwrap();
        assert_eq!(store.get_config("BangumiAuthorization"), Some(config));
    }

    #[test]
    fn test_rejects_non_object_and_ignores_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(store.save_config("JavBus", &json!([1])).is_err());

        fs::write(dir.path().join("JavBus.json"), "{broken").unwrap();
        assert!(store.get_config("JavBus").is_none());
    }
}
