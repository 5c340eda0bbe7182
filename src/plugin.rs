//! 插件接口
//! `Plugin` 对应宿主的插件基类，`MediaSource` 对应模块钩子

use crate::config_store::ConfigStore;
use crate::form::FormElement;
use crate::indexer::SiteRegistry;
use crate::types::{DiscoverSourceEvent, MediaInfo, MetaInfo, RecognizeRequest};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("配置无效: {0}")]
    InvalidConfig(#[from] serde_json::Error),
    #[error("配置存储失败: {0}")]
    Store(#[from] anyhow::Error),
    #[error("插件不存在: {0}")]
    NotFound(String),
}

/// 插件基本信息
#[derive(Debug, Clone, Serialize)]
pub struct PluginManifest {
    pub id: &'static str,
    pub name: &'static str,
    pub desc: &'static str,
    pub version: &'static str,
    pub author: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    pub order: i32,
}

/// API 鉴权方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiAuth {
    /// 查询参数 apikey
    Apikey,
    /// Authorization: Bearer
    Bear,
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiRoute {
    pub path: &'static str,
    pub methods: &'static [&'static str],
    pub auth: ApiAuth,
    pub summary: &'static str,
    pub description: &'static str,
}

/// 插件提供的模块钩子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    SearchMedias,
    ScrapeMetadata,
    BangumiInfo,
    RecognizeMedia,
}

pub type ApiParams = HashMap<String, String>;

/// 构造插件时注入的宿主能力
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub store: Arc<ConfigStore>,
    pub sites: Arc<SiteRegistry>,
    pub modules: Arc<ModuleRegistry>,
    pub api_token: String,
}

/// 已加载的插件，供插件调用其他插件提供的模块
#[derive(Default)]
pub struct ModuleRegistry {
    plugins: RwLock<Vec<Weak<dyn Plugin>>>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.plugins.read().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("ModuleRegistry").field("plugins", &count).finish()
    }
}

impl ModuleRegistry {
    pub fn register(&self, plugins: &[Arc<dyn Plugin>]) {
        *self.plugins.write().unwrap_or_else(PoisonError::into_inner) =
            plugins.iter().map(Arc::downgrade).collect();
    }

    /// 启用且声明了该模块的插件，按注册顺序
    fn providers(&self, kind: ModuleKind) -> Vec<Arc<dyn Plugin>> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|p| p.get_state() && p.get_module().contains(&kind))
            .collect()
    }

    /// 第一个返回结果的 BangumiInfo 模块生效
    pub async fn bangumi_info(&self, bangumiid: u64) -> Option<MediaInfo> {
        for plugin in self.providers(ModuleKind::BangumiInfo) {
            let Some(source) = plugin.media_source() else {
                continue;
            };
            if let Some(media) = source.bangumi_info(bangumiid).await {
                debug!("插件 {} 提供 Bangumi 条目 {}", plugin.manifest().id, bangumiid);
                return Some(media);
            }
        }
        None
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn manifest(&self) -> &PluginManifest;

    /// 载入配置
    fn init_plugin(&self, config: &Value) -> Result<(), PluginError>;

    fn get_state(&self) -> bool;

    /// 表单组件树和默认配置
    fn get_form(&self) -> (Vec<FormElement>, Value);

    fn get_page(&self) -> Vec<FormElement> {
        Vec::new()
    }

    fn get_api(&self) -> Vec<ApiRoute> {
        Vec::new()
    }

    /// 调用插件 API，路径未知时返回 None
    async fn call_api(&self, _path: &str, _params: &ApiParams) -> Option<Value> {
        None
    }

    fn get_module(&self) -> &'static [ModuleKind] {
        &[]
    }

    fn media_source(&self) -> Option<&dyn MediaSource> {
        None
    }

    /// 探索数据源收集
    fn discover_source(&self, _event: &mut DiscoverSourceEvent) {}

    fn stop_service(&self) {}
}

/// 媒体数据源
/// 禁用时返回 None；启用但无结果返回空列表
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn search_medias(&self, meta: &MetaInfo) -> Option<Vec<MediaInfo>>;

    async fn scrape_metadata(&self, _meta: &MetaInfo) -> Option<Vec<MediaInfo>> {
        None
    }

    async fn recognize_media(&self, _req: &RecognizeRequest) -> Option<MediaInfo> {
        None
    }

    async fn bangumi_info(&self, _bangumiid: u64) -> Option<MediaInfo> {
        None
    }
}

/// 插件内存中的配置
#[derive(Debug, Default)]
pub struct ConfigCell<T> {
    inner: RwLock<T>,
}

impl<T: Clone + Default + DeserializeOwned> ConfigCell<T> {
    /// 解析并替换，null 视为保持不变
    pub fn load(&self, config: &Value) -> Result<(), PluginError> {
        if config.is_null() {
            return Ok(());
        }
        let parsed: T = serde_json::from_value(config.clone())?;
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = parsed;
        Ok(())
    }

    pub fn get(&self) -> T {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// 从存储重新读取配置并初始化，返回 {ok, enabled}
pub fn refresh_from_store(plugin: &dyn Plugin, store: &ConfigStore) -> Value {
    let cfg = store
        .get_config(plugin.manifest().id)
        .unwrap_or_else(|| plugin.get_form().1);
    match plugin.init_plugin(&cfg) {
        Ok(()) => json!({"ok": true, "enabled": plugin.get_state()}),
        Err(e) => {
            tracing::warn!("刷新插件 {} 配置失败: {}", plugin.manifest().id, e);
            json!({"ok": false})
        }
    }
}

/// 宽松的开关值，数字非零、字符串非空且不是 false/0/off/no 时为 true
pub fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "false" | "off" | "no"
        ),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    })
}

pub fn param_u32(params: &ApiParams, key: &str, default: u32) -> u32 {
    params
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn param_str<'a>(params: &'a ApiParams, key: &str) -> Option<&'a str> {
    params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}
