//! Bangumi 里番探索

use crate::bangumi::{BangumiClient, Credential, BANGUMI_API};
use crate::form::{self, FormElement};
use crate::plugin::{
    param_u32, truthy, ApiAuth, ApiParams, ApiRoute, ConfigCell, Plugin, PluginContext,
    PluginError, PluginManifest,
};
use crate::types::{DiscoverMediaSource, DiscoverSourceEvent, MediaInfo};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

const MANIFEST: PluginManifest = PluginManifest {
    id: "BangumiHentai",
    name: "BangumiHentai",
    desc: "在探索的 Bangumi 类别增加 里番",
    version: "1.0.0",
    author: "踏马奔腾",
    icon: Some("https://raw.githubusercontent.com/jxxghp/MoviePilot-Plugins/main/icons/bangumi.png"),
    order: 98,
};

const KEYWORD: &str = "里番";
const PAGE_SIZE: u32 = 25;

#[derive(Debug, Clone, Default, Deserialize)]
struct Config {
    #[serde(default, deserialize_with = "truthy")]
    enabled: bool,
    #[serde(default)]
    authorization: Option<String>,
}

pub struct BangumiHentai {
    ctx: PluginContext,
    config: ConfigCell<Config>,
    api_base: String,
}

impl BangumiHentai {
    pub fn new(ctx: PluginContext) -> Self {
        Self {
            ctx,
            config: ConfigCell::default(),
            api_base: BANGUMI_API.to_string(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// 第 page 页 (从 1 开始) 的里番条目，禁用或失败时为空
    pub async fn bangumi_hentai(&self, page: u32) -> Vec<MediaInfo> {
        let cfg = self.config.get();
        if !cfg.enabled {
            return Vec::new();
        }
        let credential = Credential::from_token(cfg.authorization.as_deref().unwrap_or_default());
        let client = BangumiClient::with_base_url(&self.api_base, credential);
        let start = page.max(1).saturating_sub(1).saturating_mul(PAGE_SIZE);

        match client.search_subject_page(KEYWORD, start, PAGE_SIZE).await {
            Ok(items) => items.into_iter().map(MediaInfo::from_bangumi).collect(),
            Err(e) => {
                warn!("获取 Bangumi 里番失败: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Plugin for BangumiHentai {
    fn manifest(&self) -> &PluginManifest {
        &MANIFEST
    }

    fn init_plugin(&self, config: &Value) -> Result<(), PluginError> {
        self.config.load(config)
    }

    fn get_state(&self) -> bool {
        self.config.get().enabled
    }

    fn get_form(&self) -> (Vec<FormElement>, Value) {
        (
            vec![form::enable_form(Some(form::text_field(
                "authorization",
                "Bangumi Authorization",
            )))],
            json!({"enabled": false, "authorization": ""}),
        )
    }

    fn get_api(&self) -> Vec<ApiRoute> {
        vec![ApiRoute {
            path: "/bangumi_hentai",
            methods: &["GET"],
            auth: ApiAuth::Apikey,
            summary: "Bangumi 里番",
            description: "返回 Bangumi 中含有里番标签的条目",
        }]
    }

    async fn call_api(&self, path: &str, params: &ApiParams) -> Option<Value> {
        match path {
            "/bangumi_hentai" => {
                let medias = self.bangumi_hentai(param_u32(params, "page", 1)).await;
                Some(serde_json::to_value(medias).unwrap_or_else(|_| json!([])))
            }
            _ => None,
        }
    }

    fn discover_source(&self, event: &mut DiscoverSourceEvent) {
        if !self.get_state() {
            return;
        }
        event.push(DiscoverMediaSource {
            name: "Bangumi 里番".to_string(),
            mediaid_prefix: "bangumi".to_string(),
            api_path: format!("plugin/{}/bangumi_hentai?apikey={}", MANIFEST.id, self.ctx.api_token),
            filter_params: Map::new(),
            filter_ui: Vec::new(),
        });
    }
}
