//! 插件管理
//! 加载配置、分发模块调用、汇总多个插件的结果

use crate::engine::{search_site, SiteSearchResult};
use crate::indexer::IndexerDescriptor;
use crate::plugin::{
    ApiParams, ApiRoute, MediaSource, ModuleKind, Plugin, PluginContext, PluginError,
    PluginManifest,
};
use crate::plugins::builtin_plugins;
use crate::types::{DiscoverMediaSource, DiscoverSourceEvent, MediaInfo, MetaInfo, RecognizeRequest};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 插件列表项
#[derive(Debug, Clone, Serialize)]
pub struct PluginState {
    #[serde(flatten)]
    pub manifest: PluginManifest,
    pub state: bool,
    pub modules: &'static [ModuleKind],
    pub api: Vec<ApiRoute>,
    pub has_page: bool,
}

pub struct PluginManager {
    ctx: PluginContext,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginManager {
    pub fn new(ctx: PluginContext, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        ctx.modules.register(&plugins);
        Self { ctx, plugins }
    }

    /// 内置插件
    pub fn builtin(ctx: PluginContext) -> Self {
        let plugins = builtin_plugins(&ctx);
        Self::new(ctx, plugins)
    }

    pub fn context(&self) -> &PluginContext {
        &self.ctx
    }

    /// 载入所有插件配置，存储中没有时使用表单默认值
    pub fn init_all(&self) {
        for plugin in &self.plugins {
            let id = plugin.manifest().id;
            let config = self.config(plugin.as_ref());
            match plugin.init_plugin(&config) {
                Ok(()) => info!("🔌 插件 {} 已加载, 启用: {}", id, plugin.get_state()),
                Err(e) => warn!("⚠️ 插件 {} 配置加载失败: {}", id, e),
            }
        }
    }

    fn config(&self, plugin: &dyn Plugin) -> Value {
        self.ctx
            .store
            .get_config(plugin.manifest().id)
            .unwrap_or_else(|| plugin.get_form().1)
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        self.plugins
            .iter()
            .find(|p| p.manifest().id == id)
            .cloned()
            .ok_or_else(|| PluginError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<PluginState> {
        self.plugins
            .iter()
            .map(|p| PluginState {
                manifest: p.manifest().clone(),
                state: p.get_state(),
                modules: p.get_module(),
                api: p.get_api(),
                has_page: !p.get_page().is_empty(),
            })
            .collect()
    }

    /// 当前生效的配置
    pub fn get_config(&self, id: &str) -> Result<Value, PluginError> {
        let plugin = self.get(id)?;
        Ok(self.config(plugin.as_ref()))
    }

    /// 从存储重新载入
    pub fn refresh(&self, id: &str) -> Result<bool, PluginError> {
        let plugin = self.get(id)?;
        plugin.init_plugin(&self.config(plugin.as_ref()))?;
        Ok(plugin.get_state())
    }

    /// 校验、保存并立即生效
    pub fn save_config(&self, id: &str, config: &Value) -> Result<bool, PluginError> {
        let plugin = self.get(id)?;
        plugin.init_plugin(config)?;
        self.ctx.store.save_config(id, config)?;
        Ok(plugin.get_state())
    }

    pub async fn call_api(
        &self,
        id: &str,
        path: &str,
        params: &ApiParams,
    ) -> Result<Option<Value>, PluginError> {
        let plugin = self.get(id)?;
        Ok(plugin.call_api(path, params).await)
    }

    /// 启用且声明了该模块的数据源，按插件顺序
    fn sources(&self, kind: ModuleKind) -> impl Iterator<Item = (&'static str, &dyn MediaSource)> {
        self.plugins
            .iter()
            .filter(move |p| p.get_state() && p.get_module().contains(&kind))
            .filter_map(|p| p.media_source().map(|s| (p.manifest().id, s)))
    }

    pub async fn search_medias(&self, meta: &MetaInfo) -> Vec<MediaInfo> {
        let sources: Vec<_> = self.sources(ModuleKind::SearchMedias).collect();
        let results = join_all(sources.iter().map(|(_, s)| s.search_medias(meta))).await;
        merge_results(&sources, results)
    }

    pub async fn scrape_metadata(&self, meta: &MetaInfo) -> Vec<MediaInfo> {
        let sources: Vec<_> = self.sources(ModuleKind::ScrapeMetadata).collect();
        let results = join_all(sources.iter().map(|(_, s)| s.scrape_metadata(meta))).await;
        merge_results(&sources, results)
    }

    pub async fn recognize_media(&self, req: &RecognizeRequest) -> Option<MediaInfo> {
        for (id, source) in self.sources(ModuleKind::RecognizeMedia) {
            if let Some(media) = source.recognize_media(req).await {
                debug!("插件 {} 识别成功: {}", id, media.title);
                return Some(media);
            }
        }
        None
    }

    pub async fn bangumi_info(&self, bangumiid: u64) -> Option<MediaInfo> {
        self.ctx.modules.bangumi_info(bangumiid).await
    }

    /// 收集启用插件提供的探索数据源
    pub fn discover_sources(&self) -> Vec<DiscoverMediaSource> {
        let mut event = DiscoverSourceEvent::default();
        for plugin in &self.plugins {
            plugin.discover_source(&mut event);
        }
        event.extra_sources.unwrap_or_default()
    }

    pub fn sites(&self) -> Vec<IndexerDescriptor> {
        self.ctx.sites.list()
    }

    /// 在单个已注册站点搜索，站点不存在时返回 None
    pub async fn search_site(
        &self,
        site_id: &str,
        keyword: Option<&str>,
        page: u32,
    ) -> Option<SiteSearchResult> {
        let descriptor = self.ctx.sites.get(site_id)?;
        Some(search_site(&descriptor, keyword, page).await)
    }

    pub fn stop_all(&self) {
        for plugin in &self.plugins {
            plugin.stop_service();
        }
        info!("所有插件已停止");
    }
}

fn merge_results(
    sources: &[(&'static str, &dyn MediaSource)],
    results: Vec<Option<Vec<MediaInfo>>>,
) -> Vec<MediaInfo> {
    let mut merged = Vec::new();
    for ((id, _), result) in sources.iter().zip(results) {
        if let Some(items) = result {
            debug!("插件 {} 返回 {} 个结果", id, items.len());
            merged.extend(items);
        }
    }
    merged
}
