//! Bangumi 精确搜索
//! 以 BangumiID 识别媒体后检索已注册的索引站点

use crate::bangumi::{BangumiClient, Credential, BANGUMI_API};
use crate::engine::search_site;
use crate::form::{self, FormElement};
use crate::plugin::{
    param_str, param_u32, truthy, ApiAuth, ApiParams, ApiRoute, ConfigCell, Plugin,
    PluginContext, PluginError, PluginManifest,
};
use crate::types::{Context, MediaInfo, MediaType};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, info};

const MANIFEST: PluginManifest = PluginManifest {
    id: "BangumiPreciseSearch",
    name: "Bangumi精确搜索",
    desc: "提供以 BangumiID 为入口的精确站点检索",
    version: "1.0.0",
    author: "User",
    icon: None,
    order: 98,
};

#[derive(Debug, Clone, Default, Deserialize)]
struct Config {
    #[serde(default, deserialize_with = "truthy")]
    enabled: bool,
}

/// 精确搜索参数
#[derive(Debug, Clone, Default)]
pub struct PreciseSearchRequest {
    pub bangumiid: u64,
    pub mtype: Option<String>,
    /// title: 先中文名后原名；其他值优先原名
    pub area: String,
    pub season: Option<u32>,
    pub sites: Option<Vec<String>>,
}

impl PreciseSearchRequest {
    fn from_params(params: &ApiParams) -> Self {
        Self {
            bangumiid: params
                .get("bangumiid")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or_default(),
            mtype: param_str(params, "mtype").map(str::to_string),
            area: param_str(params, "area").unwrap_or("title").to_string(),
            season: Some(param_u32(params, "season", 0)).filter(|s| *s > 0),
            sites: param_str(params, "sites").map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
        }
    }
}

fn failure(message: &str) -> Value {
    json!({"success": false, "message": message})
}

pub struct BangumiPreciseSearch {
    ctx: PluginContext,
    config: ConfigCell<Config>,
    api_base: String,
}

impl BangumiPreciseSearch {
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

    async fn lookup(&self, bangumiid: u64) -> Option<MediaInfo> {
        if bangumiid == 0 {
            return None;
        }
        // 优先交给启用的 BangumiInfo 模块，匿名请求拿不到受限条目
        if let Some(media) = self.ctx.modules.bangumi_info(bangumiid).await {
            return Some(media);
        }
        let client = BangumiClient::with_base_url(&self.api_base, Credential::Anonymous);
        match client.subject_v0(bangumiid).await {
            Ok(info) => Some(MediaInfo::from_bangumi(info)),
            Err(e) => {
                debug!("Bangumi 条目 {} 识别失败: {}", bangumiid, e);
                None
            }
        }
    }

    pub async fn bangumi_search(&self, req: &PreciseSearchRequest) -> Value {
        if !self.get_state() {
            return failure("插件未启用");
        }
        let Some(mut media) = self.lookup(req.bangumiid).await else {
            return failure("未识别到Bangumi媒体信息");
        };

        match req.mtype.as_deref() {
            Some(mtype) => {
                if let Ok(media_type) = mtype.parse::<MediaType>() {
                    media.media_type = Some(media_type);
                }
            }
            None => media.media_type = Some(MediaType::Tv),
        }
        if req.season.is_some() {
            media.season = req.season;
        }

        let keywords = search_keywords(&media, &req.area);
        let sites = self.ctx.sites.select(req.sites.as_deref());
        info!(
            "精确搜索 Bangumi {}: 关键字 {:?}，站点 {} 个",
            req.bangumiid,
            keywords,
            sites.len()
        );

        let tasks = sites.iter().flat_map(|site| {
            keywords
                .iter()
                .map(move |keyword| search_site(site, Some(keyword.as_str()), 0))
        });
        let results = join_all(tasks).await;

        let mut seen = HashSet::new();
        let contexts: Vec<Context> = results
            .into_iter()
            .flat_map(|r| r.items)
            .filter(|t| {
                let key = t.enclosure.clone().unwrap_or_else(|| t.title.clone());
                seen.insert((t.site.clone(), key))
            })
            .map(|torrent_info| Context {
                media_info: media.clone(),
                torrent_info,
            })
            .collect();

        if contexts.is_empty() {
            return failure("未搜索到任何资源");
        }
        json!({"success": true, "data": contexts})
    }
}

/// 检索关键字，去重保序
fn search_keywords(media: &MediaInfo, area: &str) -> Vec<String> {
    let title = Some(media.title.trim()).filter(|t| !t.is_empty());
    let original = media
        .original_title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let ordered = if area == "title" {
        [title, original]
    } else {
        [original, title]
    };

    let mut keywords: Vec<String> = Vec::new();
    for keyword in ordered.into_iter().flatten() {
        if !keywords.iter().any(|k| k == keyword) {
            keywords.push(keyword.to_string());
        }
    }
    keywords
}

#[async_trait]
impl Plugin for BangumiPreciseSearch {
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
            path: "/bangumi_search",
            methods: &["GET"],
            auth: ApiAuth::Bear,
            summary: "Bangumi 精确搜索",
            description: "以 BangumiID 为入口进行站点资源精确检索",
        }]
    }

    async fn call_api(&self, path: &str, params: &ApiParams) -> Option<Value> {
        match path {
            "/bangumi_search" => {
                let req = PreciseSearchRequest::from_params(params);
                Some(self.bangumi_search(&req).await)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::NYAA_HTML;
    use crate::indexer::sukebei_descriptor;
    use crate::plugins::{test_context, BangumiAuthorization};
    use crate::test_support::{serve, serve_fixed, Hits};
    use axum::{extract::Path, http::HeaderMap, routing::get, Json, Router};
    use std::sync::Arc;

    async fn mock_bangumi() -> String {
        let app = Router::new().route(
            "/v0/subjects/{id}",
            get(|Path(id): Path<u64>| async move {
                if id == 404 {
                    return Err(axum::http::StatusCode::NOT_FOUND);
                }
                Ok(Json(json!({
                    "id": id,
                    "name": "Bocchi the Rock!",
                    "name_cn": "孤独摇滚！",
                    "platform": "TV",
                    "date": "2022-10-09"
                })))
            }),
        );
        serve(app).await
    }

    fn params(pairs: &[(&str, &str)]) -> ApiParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn enabled_plugin(ctx: PluginContext, base: &str) -> BangumiPreciseSearch {
        let plugin = BangumiPreciseSearch::new(ctx).with_api_base(base);
        plugin.init_plugin(&json!({"enabled": true})).unwrap();
        plugin
    }

    #[tokio::test]
    async fn test_disabled_message() {
        let plugin = BangumiPreciseSearch::new(test_context());
        let value = plugin
            .call_api("/bangumi_search", &params(&[("bangumiid", "1")]))
            .await
            .unwrap();
        assert_eq!(value, failure("插件未启用"));
    }

    #[tokio::test]
    async fn test_unknown_bangumi_id() {
        let plugin = enabled_plugin(test_context(), &mock_bangumi().await);
        let value = plugin
            .call_api("/bangumi_search", &params(&[("bangumiid", "404")]))
            .await
            .unwrap();
        assert_eq!(value, failure("未识别到Bangumi媒体信息"));

        let value = plugin.call_api("/bangumi_search", &ApiParams::new()).await.unwrap();
        assert_eq!(value, failure("未识别到Bangumi媒体信息"));
    }

    #[tokio::test]
    async fn test_no_sites_means_no_resources() {
        let plugin = enabled_plugin(test_context(), &mock_bangumi().await);
        let value = plugin
            .call_api("/bangumi_search", &params(&[("bangumiid", "328609")]))
            .await
            .unwrap();
        assert_eq!(value, failure("未搜索到任何资源"));
    }

    #[tokio::test]
    async fn test_search_registered_sites() {
        let hits = Hits::default();
        let site_base = serve_fixed(NYAA_HTML, hits.clone()).await;
        let ctx = test_context();
        let mut descriptor = sukebei_descriptor(false);
        descriptor.domain = format!("{}/", site_base);
        ctx.sites.add_indexer(&descriptor.domain.clone(), descriptor);

        let plugin = enabled_plugin(ctx, &mock_bangumi().await);
        let value = plugin
            .call_api(
                "/bangumi_search",
                &params(&[("bangumiid", "328609"), ("mtype", "电影"), ("season", "2")]),
            )
            .await
            .unwrap();

        assert_eq!(value["success"], true);
        let data = value["data"].as_array().unwrap();
        // 中文名和原名各搜一次，结果去重
        assert_eq!(hits.count(), 2);
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["media_info"]["type"], "电影");
        assert_eq!(data[0]["media_info"]["season"], 2);
        assert_eq!(data[0]["torrent_info"]["site"], "sukebeinyaa");
    }

    #[tokio::test]
    async fn test_sites_filter_and_invalid_mtype() {
        let hits = Hits::default();
        let site_base = serve_fixed(NYAA_HTML, hits.clone()).await;
        let ctx = test_context();
        let mut descriptor = sukebei_descriptor(false);
        descriptor.domain = format!("{}/", site_base);
        ctx.sites.add_indexer(&descriptor.domain.clone(), descriptor);

        let plugin = enabled_plugin(ctx, &mock_bangumi().await);
        let value = plugin
            .call_api(
                "/bangumi_search",
                &params(&[("bangumiid", "328609"), ("sites", "other,another")]),
            )
            .await
            .unwrap();
        assert_eq!(value, failure("未搜索到任何资源"));
        assert_eq!(hits.count(), 0);

        let value = plugin
            .call_api(
                "/bangumi_search",
                &params(&[("bangumiid", "328609"), ("mtype", "动画"), ("sites", "sukebeinyaa")]),
            )
            .await
            .unwrap();
        assert_eq!(value["data"][0]["media_info"]["type"], "电视剧");
    }

    #[tokio::test]
    async fn test_lookup_prefers_enabled_bangumi_info_module() {
        // 受限条目只对带授权的请求返回
        let app = Router::new().route(
            "/v0/subjects/{id}",
            get(|Path(id): Path<u64>, headers: HeaderMap| async move {
                if headers.get("authorization").is_none() {
                    return Err(axum::http::StatusCode::NOT_FOUND);
                }
                Ok(Json(json!({"id": id, "name": "Restricted", "name_cn": "受限条目"})))
            }),
        );
        let base = serve(app).await;
        let ctx = test_context();

        let auth = Arc::new(BangumiAuthorization::new(ctx.clone()).with_api_base(base.clone()));
        auth.init_plugin(&json!({"enabled": true, "authorization": "token-1"}))
            .unwrap();
        let precise = Arc::new(enabled_plugin(ctx.clone(), &base));
        let plugins: Vec<Arc<dyn Plugin>> = vec![auth.clone(), precise.clone()];
        ctx.modules.register(&plugins);

        let search = params(&[("bangumiid", "7")]);
        // 识别成功，只是没有注册站点
        let value = precise.call_api("/bangumi_search", &search).await.unwrap();
        assert_eq!(value, failure("未搜索到任何资源"));

        auth.init_plugin(&json!({"enabled": false})).unwrap();
        let value = precise.call_api("/bangumi_search", &search).await.unwrap();
        assert_eq!(value, failure("未识别到Bangumi媒体信息"));
    }

    #[test]
    fn test_search_keywords_order() {
        let media = MediaInfo {
            title: "孤独摇滚！".into(),
            original_title: Some("ぼっち・ざ・ろっく！".into()),
            ..MediaInfo::default()
        };
        assert_eq!(search_keywords(&media, "title"), vec!["孤独摇滚！", "ぼっち・ざ・ろっく！"]);
        assert_eq!(search_keywords(&media, "en_title")[0], "ぼっち・ざ・ろっく！");

        let same = MediaInfo {
            title: "Same".into(),
            original_title: Some("Same".into()),
            ..MediaInfo::default()
        };
        assert_eq!(search_keywords(&same, "title"), vec!["Same"]);
    }
}
