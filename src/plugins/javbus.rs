//! JavBus 媒体数据源

use crate::form::{self, FormElement};
use crate::javbus::JavBusClient;
use crate::plugin::{
    refresh_from_store, truthy, ApiAuth, ApiParams, ApiRoute, ConfigCell, MediaSource, ModuleKind,
    Plugin, PluginContext, PluginError, PluginManifest,
};
use crate::types::{strip_mediaid_prefix, MediaInfo, MetaInfo, RecognizeRequest};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const MANIFEST: PluginManifest = PluginManifest {
    id: "JavBus",
    name: "JavBus",
    desc: "JavBus 媒体数据源",
    version: "1.0.0",
    author: "黄垚淮",
    icon: Some("https://www.javbus.com/favicon.ico"),
    order: 90,
};

const MODULES: &[ModuleKind] = &[
    ModuleKind::SearchMedias,
    ModuleKind::ScrapeMetadata,
    ModuleKind::RecognizeMedia,
];

/// 刮削时最多获取详情的搜索结果数
const SCRAPE_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
struct Config {
    #[serde(default, deserialize_with = "truthy")]
    enabled: bool,
}

pub struct JavBus {
    ctx: PluginContext,
    config: ConfigCell<Config>,
    client: JavBusClient,
}

impl JavBus {
    pub fn new(ctx: PluginContext) -> Self {
        Self {
            ctx,
            config: ConfigCell::default(),
            client: JavBusClient::default(),
        }
    }

    pub fn with_client(mut self, client: JavBusClient) -> Self {
        self.client = client;
        self
    }

    fn enabled(&self) -> bool {
        self.config.get().enabled
    }

    async fn detail(&self, code: &str) -> Option<MediaInfo> {
        match self.client.detail(code).await {
            Ok(detail) => Some(detail.into()),
            Err(e) => {
                debug!("JavBus 详情 {} 获取失败: {}", code, e);
                None
            }
        }
    }
}

#[async_trait]
impl Plugin for JavBus {
    fn manifest(&self) -> &PluginManifest {
        &MANIFEST
    }

    fn init_plugin(&self, config: &Value) -> Result<(), PluginError> {
        self.config.load(config)
    }

    fn get_state(&self) -> bool {
        self.enabled()
    }

    fn get_form(&self) -> (Vec<FormElement>, Value) {
        (vec![form::enable_form(None)], json!({"enabled": false}))
    }

    fn get_api(&self) -> Vec<ApiRoute> {
        vec![ApiRoute {
            path: "/refresh_javbus",
            methods: &["GET"],
            auth: ApiAuth::Apikey,
            summary: "刷新 JavBus 插件配置",
            description: "重新加载并生效插件配置",
        }]
    }

    async fn call_api(&self, path: &str, _params: &ApiParams) -> Option<Value> {
        match path {
            "/refresh_javbus" => Some(refresh_from_store(self, &self.ctx.store)),
            _ => None,
        }
    }

    fn get_module(&self) -> &'static [ModuleKind] {
        MODULES
    }

    fn media_source(&self) -> Option<&dyn MediaSource> {
        Some(self)
    }
}

#[async_trait]
impl MediaSource for JavBus {
    async fn search_medias(&self, meta: &MetaInfo) -> Option<Vec<MediaInfo>> {
        if !self.enabled() {
            return None;
        }
        let Some(name) = meta.name() else {
            return Some(Vec::new());
        };
        match self.client.search(name).await {
            Ok(items) => Some(items.into_iter().map(MediaInfo::from).collect()),
            Err(e) => {
                warn!("JavBus 搜索失败 {}: {}", name, e);
                Some(Vec::new())
            }
        }
    }

    async fn scrape_metadata(&self, meta: &MetaInfo) -> Option<Vec<MediaInfo>> {
        if !self.enabled() {
            return None;
        }

        if let Some(mediaid) = meta.mediaid() {
            let code = strip_mediaid_prefix(mediaid);
            return Some(self.detail(code).await.into_iter().collect());
        }

        let Some(name) = meta.name() else {
            return Some(Vec::new());
        };
        let items = match self.client.search(name).await {
            Ok(items) => items,
            Err(e) => {
                warn!("JavBus 搜索失败 {}: {}", name, e);
                return Some(Vec::new());
            }
        };

        let mut details = Vec::new();
        for item in items.iter().take(SCRAPE_LIMIT) {
            if item.id.is_empty() {
                continue;
            }
            if let Some(media) = self.detail(&item.id).await {
                details.push(media);
            }
        }
        Some(details)
    }

    async fn recognize_media(&self, req: &RecognizeRequest) -> Option<MediaInfo> {
        if !self.enabled() {
            return None;
        }
        let code = req.javbus_code.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        self.detail(code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::javbus::fixtures::{DETAIL_HTML, SEARCH_HTML};
    use crate::plugins::test_context;
    use crate::test_support::{serve, serve_fixed, Hits};
    use crate::types::MediaType;
    use axum::{extract::Path, routing::get, Router};

    async fn mock_javbus(hits: Hits) -> String {
        let detail_hits = hits.clone();
        let app = Router::new()
            .route("/search/{keyword}", get(|| async { SEARCH_HTML }))
            .route(
                "/{code}",
                get(move |Path(code): Path<String>| {
                    let hits = detail_hits.clone();
                    async move {
                        hits.hit();
                        if code == "XYZ-9" {
                            return Err(axum::http::StatusCode::NOT_FOUND);
                        }
                        Ok(DETAIL_HTML)
                    }
                }),
            );
        serve(app).await
    }

    fn enabled_plugin(base: &str) -> JavBus {
        let plugin = JavBus::new(test_context()).with_client(JavBusClient::with_base_url(base));
        plugin.init_plugin(&json!({"enabled": true})).unwrap();
        plugin
    }

    #[tokio::test]
    async fn test_disabled_returns_none() {
        let plugin = JavBus::new(test_context());
        assert!(plugin.search_medias(&MetaInfo::named("ABC")).await.is_none());
        assert!(plugin.scrape_metadata(&MetaInfo::named("ABC")).await.is_none());
        let req = RecognizeRequest {
            javbus_code: Some("ABC-123".into()),
            ..RecognizeRequest::default()
        };
        assert!(plugin.recognize_media(&req).await.is_none());
    }

    #[tokio::test]
    async fn test_search_maps_items() {
        let plugin = enabled_plugin(&mock_javbus(Hits::default()).await);
        let medias = plugin.search_medias(&MetaInfo::named("ABC")).await.unwrap();
        assert_eq!(medias.len(), 2);
        assert_eq!(medias[0].title, "第一部作品");
        assert_eq!(medias[0].media_type, Some(MediaType::Movie));
        assert_eq!(medias[0].mediaid_prefix, "javbus");
    }

    #[tokio::test]
    async fn test_scrape_skips_failed_details() {
        let hits = Hits::default();
        let plugin = enabled_plugin(&mock_javbus(hits.clone()).await);

        let details = plugin.scrape_metadata(&MetaInfo::named("ABC")).await.unwrap();
        assert_eq!(hits.count(), 2);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].media_id, "ABC-123");

        let meta = MetaInfo {
            mediaid: Some("javbus:ABC-123".into()),
            ..MetaInfo::default()
        };
        let details = plugin.scrape_metadata(&meta).await.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].media_id, "ABC-123");
    }

    #[tokio::test]
    async fn test_no_name_and_no_code_skip_network() {
        let hits = Hits::default();
        let plugin = enabled_plugin(&serve_fixed("", hits.clone()).await);
        assert_eq!(plugin.search_medias(&MetaInfo::default()).await, Some(vec![]));
        assert_eq!(plugin.scrape_metadata(&MetaInfo::default()).await, Some(vec![]));
        assert!(plugin.recognize_media(&RecognizeRequest::default()).await.is_none());
        assert_eq!(hits.count(), 0);
    }

    #[tokio::test]
    async fn test_recognize_by_code() {
        let plugin = enabled_plugin(&mock_javbus(Hits::default()).await);
        let req = RecognizeRequest {
            javbus_code: Some(" ABC-123 ".into()),
            ..RecognizeRequest::default()
        };
        let media = plugin.recognize_media(&req).await.unwrap();
        assert_eq!(media.media_id, "ABC-123");
        assert!(media.javbus_info.is_some());
    }

    #[tokio::test]
    async fn test_refresh_defaults_when_store_empty() {
        let plugin = JavBus::new(test_context());
        plugin.init_plugin(&json!({"enabled": true})).unwrap();
        let result = plugin.call_api("/refresh_javbus", &ApiParams::new()).await.unwrap();
        assert_eq!(result, json!({"ok": true, "enabled": false}));
    }
}
