//! Bangumi Cookie 插件

use crate::bangumi::{BangumiClient, Credential, BANGUMI_API};
use crate::form::{self, FormElement};
use crate::plugin::{
    truthy, ConfigCell, MediaSource, ModuleKind, Plugin, PluginError, PluginManifest,
};
use crate::season::apply_season;
use crate::types::{MediaInfo, MetaInfo};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

const MANIFEST: PluginManifest = PluginManifest {
    id: "BangumiCookie",
    name: "BangumiCookie",
    desc: "为 Bangumi 搜索附加 Cookie",
    version: "1.0.0",
    author: "User",
    icon: Some("https://raw.githubusercontent.com/jxxghp/MoviePilot-Plugins/main/icons/bangumi.png"),
    order: 99,
};

#[derive(Debug, Clone, Default, Deserialize)]
struct Config {
    #[serde(default, deserialize_with = "truthy")]
    enabled: bool,
    #[serde(default)]
    cookie: Option<String>,
}

pub struct BangumiCookie {
    config: ConfigCell<Config>,
    api_base: String,
}

impl Default for BangumiCookie {
    fn default() -> Self {
        Self::new()
    }
}

impl BangumiCookie {
    pub fn new() -> Self {
        Self {
            config: ConfigCell::default(),
            api_base: BANGUMI_API.to_string(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn client(&self) -> Option<BangumiClient> {
        let cfg = self.config.get();
        cfg.enabled.then(|| {
            let credential = Credential::from_cookie(cfg.cookie.as_deref().unwrap_or_default());
            BangumiClient::with_base_url(&self.api_base, credential)
        })
    }
}

#[async_trait]
impl Plugin for BangumiCookie {
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
            vec![form::enable_form(Some(form::text_field("cookie", "Bangumi Cookie")))],
            json!({"enabled": false, "cookie": ""}),
        )
    }

    fn get_module(&self) -> &'static [ModuleKind] {
        &[ModuleKind::SearchMedias]
    }

    fn media_source(&self) -> Option<&dyn MediaSource> {
        Some(self)
    }
}

#[async_trait]
impl MediaSource for BangumiCookie {
    async fn search_medias(&self, meta: &MetaInfo) -> Option<Vec<MediaInfo>> {
        let client = self.client()?;

        let mut medias = match meta.mediaid().and_then(|id| id.strip_prefix("bangumi:")) {
            Some("") => return Some(Vec::new()),
            Some(sid) => match client.subject(sid).await {
                Ok(info) => vec![MediaInfo::from_bangumi(info)],
                Err(e) => {
                    warn!("Bangumi 条目 {} 获取失败: {}", sid, e);
                    return Some(Vec::new());
                }
            },
            None => {
                let Some(name) = meta.name() else {
                    return Some(Vec::new());
                };
                match client.search_subject(name).await {
                    Ok(items) => items.into_iter().map(MediaInfo::from_bangumi).collect(),
                    Err(e) => {
                        warn!("Bangumi 搜索失败 {}: {}", name, e);
                        return Some(Vec::new());
                    }
                }
            }
        };

        apply_season(&mut medias, meta.begin_season);
        Some(medias)
    }
}
