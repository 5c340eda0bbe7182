//! Bangumi 授权插件
//! 为 Bangumi 搜索、刮削、识别附加 Authorization

use crate::bangumi::{BangumiClient, Credential, BANGUMI_API};
use crate::form::{self, FormElement};
use crate::plugin::{
    refresh_from_store, truthy, ApiAuth, ApiParams, ApiRoute, ConfigCell, MediaSource, ModuleKind,
    Plugin, PluginContext, PluginError, PluginManifest,
};
use crate::season::apply_season;
use crate::types::{strip_mediaid_prefix, MediaInfo, MetaInfo, RecognizeRequest};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const MANIFEST: PluginManifest = PluginManifest {
    id: "BangumiAuthorization",
    name: "BangumiAuthorization",
    desc: "为 Bangumi 搜索附加 Authorization",
    version: "1.1.0",
    author: "踏马奔腾",
    icon: Some("https://raw.githubusercontent.com/jxxghp/MoviePilot-Plugins/main/icons/bangumi.png"),
    order: 99,
};

const MODULES: &[ModuleKind] = &[
    ModuleKind::SearchMedias,
    ModuleKind::ScrapeMetadata,
    ModuleKind::BangumiInfo,
    ModuleKind::RecognizeMedia,
];

#[derive(Debug, Clone, Default, Deserialize)]
struct Config {
    #[serde(default, deserialize_with = "truthy")]
    enabled: bool,
    #[serde(default)]
    authorization: Option<String>,
}

pub struct BangumiAuthorization {
    ctx: PluginContext,
    config: ConfigCell<Config>,
    api_base: String,
}

impl BangumiAuthorization {
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

    /// 启用时返回带授权的客户端
    fn client(&self) -> Option<BangumiClient> {
        let cfg = self.config.get();
        if !cfg.enabled {
            return None;
        }
        let credential = Credential::from_token(cfg.authorization.as_deref().unwrap_or_default());
        Some(BangumiClient::with_base_url(&self.api_base, credential))
    }

    async fn search_list(client: &BangumiClient, name: &str) -> Vec<Value> {
        match client.search_subject(name).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Bangumi 搜索失败 {}: {}", name, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Plugin for BangumiAuthorization {
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

    fn get_page(&self) -> Vec<FormElement> {
        vec![form::row(vec![
            form::col(None, form::alert("需要创建 Bangumi Authorization 令牌")),
            form::col(
                None,
                form::link_button("https://next.bgm.tv/demo/access-token/create", "前往创建令牌"),
            ),
        ])]
    }

    fn get_api(&self) -> Vec<ApiRoute> {
        vec![ApiRoute {
            path: "/refresh_bangumi",
            methods: &["GET"],
            auth: ApiAuth::Apikey,
            summary: "刷新 Bangumi 授权配置",
            description: "重新加载并生效插件配置",
        }]
    }

    async fn call_api(&self, path: &str, _params: &ApiParams) -> Option<Value> {
        match path {
            "/refresh_bangumi" => Some(refresh_from_store(self, &self.ctx.store)),
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
impl MediaSource for BangumiAuthorization {
    async fn search_medias(&self, meta: &MetaInfo) -> Option<Vec<MediaInfo>> {
        let client = self.client()?;
        let Some(name) = meta.name() else {
            return Some(Vec::new());
        };

        let items = Self::search_list(&client, name).await;
        let mut medias: Vec<MediaInfo> = items.into_iter().map(MediaInfo::from_bangumi).collect();
        apply_season(&mut medias, meta.begin_season);
        Some(medias)
    }

    async fn scrape_metadata(&self, meta: &MetaInfo) -> Option<Vec<MediaInfo>> {
        let client = self.client()?;
        let mut details = Vec::new();

        if let Some(mediaid) = meta.mediaid() {
            let sid = strip_mediaid_prefix(mediaid);
            match client.subject(sid).await {
                Ok(info) => details.push(MediaInfo::from_bangumi(info)),
                Err(e) => {
                    warn!("Bangumi 条目 {} 获取失败: {}", sid, e);
                    return Some(Vec::new());
                }
            }
        } else {
            let Some(name) = meta.name() else {
                return Some(Vec::new());
            };
            for info in Self::search_list(&client, name).await {
                let Some(sid) = info.get("id").and_then(Value::as_u64) else {
                    continue;
                };
                match client.subject(&sid.to_string()).await {
                    Ok(detail) => details.push(MediaInfo::from_bangumi(detail)),
                    Err(e) => debug!("跳过条目 {}: {}", sid, e),
                }
            }
        }

        apply_season(&mut details, meta.begin_season);
        Some(details)
    }

    async fn recognize_media(&self, req: &RecognizeRequest) -> Option<MediaInfo> {
        match req.bangumiid {
            Some(id) if id > 0 => self.bangumi_info(id).await,
            _ => None,
        }
    }

    async fn bangumi_info(&self, bangumiid: u64) -> Option<MediaInfo> {
        let client = self.client()?;
        if bangumiid == 0 {
            return None;
        }
        match client.subject_v0(bangumiid).await {
            Ok(info) => Some(MediaInfo::from_bangumi(info)),
            Err(e) => {
                debug!("Bangumi v0 条目 {} 获取失败: {}", bangumiid, e);
                None
            }
        }
    }
}
