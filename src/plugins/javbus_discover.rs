//! JavBus 探索
//! 在探索中增加 JavBus 标签页

use crate::form::{self, FormElement};
use crate::javbus::JavBusClient;
use crate::plugin::{
    param_u32, truthy, ApiAuth, ApiParams, ApiRoute, ConfigCell, Plugin, PluginContext,
    PluginError, PluginManifest,
};
use crate::types::{DiscoverMediaSource, DiscoverSourceEvent, MediaInfo};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::error;

const MANIFEST: PluginManifest = PluginManifest {
    id: "JavBusDiscover",
    name: "JavBus探索",
    desc: "在探索中增加 JavBus 标签页，浏览站点内容",
    version: "1.0.0",
    author: "DDSRem",
    icon: Some("JavBus.png"),
    order: 99,
};

#[derive(Debug, Clone, Default, Deserialize)]
struct Config {
    #[serde(default, deserialize_with = "truthy")]
    enabled: bool,
}

pub struct JavBusDiscover {
    ctx: PluginContext,
    config: ConfigCell<Config>,
    client: JavBusClient,
}

impl JavBusDiscover {
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

    /// 首页条目分页，page 从 1 开始
    pub async fn javbus_discover(&self, page: u32, count: u32) -> Vec<MediaInfo> {
        if !self.config.get().enabled {
            return Vec::new();
        }
        match self.client.home().await {
            Ok(items) => page_slice(items, page, count),
            Err(e) => {
                error!("获取 JavBus 数据失败: {}", e);
                Vec::new()
            }
        }
    }
}

fn page_slice(items: Vec<MediaInfo>, page: u32, count: u32) -> Vec<MediaInfo> {
    let count = count as usize;
    let start = (page.max(1) as usize - 1).saturating_mul(count);
    items.into_iter().skip(start).take(count).collect()
}

#[async_trait]
impl Plugin for JavBusDiscover {
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
        (vec![form::enable_form(None)], json!({"enabled": false}))
    }

    fn get_api(&self) -> Vec<ApiRoute> {
        vec![ApiRoute {
            path: "/javbus_discover",
            methods: &["GET"],
            auth: ApiAuth::Apikey,
            summary: "JavBus 探索数据源",
            description: "获取 JavBus 首页内容",
        }]
    }

    async fn call_api(&self, path: &str, params: &ApiParams) -> Option<Value> {
        match path {
            "/javbus_discover" => {
                let items = self
                    .javbus_discover(param_u32(params, "page", 1), param_u32(params, "count", 20))
                    .await;
                Some(serde_json::to_value(items).unwrap_or_else(|_| json!([])))
            }
            _ => None,
        }
    }

    fn discover_source(&self, event: &mut DiscoverSourceEvent) {
        if !self.get_state() {
            return;
        }
        event.push(DiscoverMediaSource {
            name: "JavBus".to_string(),
            mediaid_prefix: "javbus".to_string(),
            api_path: format!("plugin/{}/javbus_discover?apikey={}", MANIFEST.id, self.ctx.api_token),
            filter_params: Map::new(),
            filter_ui: Vec::new(),
        });
    }
}
