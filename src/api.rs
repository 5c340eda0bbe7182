//! HTTP 接口

use crate::manager::PluginManager;
use crate::plugin::{ApiAuth, ApiParams, PluginError};
use crate::types::{MetaInfo, RecognizeRequest};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub type AppState = Arc<PluginManager>;

pub fn router(manager: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/", get(api_info_handler))
        .route("/health", get(health_handler))
        // 插件管理
        .route("/api/v1/plugin", get(plugin_list_handler))
        .route("/api/v1/plugin/{id}/form", get(plugin_form_handler))
        .route("/api/v1/plugin/{id}/page", get(plugin_page_handler))
        .route(
            "/api/v1/plugin/{id}/config",
            get(plugin_config_handler).put(plugin_save_config_handler),
        )
        .route("/api/v1/plugin/{id}/{*path}", get(plugin_api_handler))
        // 媒体模块
        .route("/api/v1/media/search", get(media_search_handler))
        .route("/api/v1/media/scrape", get(media_scrape_handler))
        .route("/api/v1/media/recognize", get(media_recognize_handler))
        .route("/api/v1/media/bangumi/{id}", get(bangumi_info_handler))
        .route("/api/v1/discover/sources", get(discover_sources_handler))
        // 索引站点
        .route("/api/v1/sites", get(sites_handler))
        .route("/api/v1/sites/{id}/search", get(site_search_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(manager)
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

fn plugin_error(e: PluginError) -> Response {
    let status = match &e {
        PluginError::NotFound(_) => StatusCode::NOT_FOUND,
        PluginError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        PluginError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_json(status, e.to_string())
}

/// Authorization: Bearer <token>
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 未配置 API_TOKEN 时不校验
fn authorized(auth: ApiAuth, token: &str, params: &ApiParams, headers: &HeaderMap) -> bool {
    if token.is_empty() {
        return true;
    }
    match auth {
        ApiAuth::None => true,
        ApiAuth::Apikey => params.get("apikey").map(String::as_str) == Some(token),
        ApiAuth::Bear => bearer_token(headers) == Some(token),
    }
}

/// GET / - API 信息
async fn api_info_handler(State(manager): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": "MoviePilot Plugins",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Bangumi / JavBus / Sukebei Nyaa 扩展数据源",
        "plugins": manager.list().len(),
        "endpoints": {
            "GET /api/v1/plugin": "插件列表",
            "GET /api/v1/plugin/{id}/form": "插件配置表单",
            "GET /api/v1/plugin/{id}/page": "插件详情页",
            "GET|PUT /api/v1/plugin/{id}/config": "读取 / 保存插件配置",
            "GET /api/v1/plugin/{id}/{path}": "插件 API",
            "GET /api/v1/media/search?name=&mediaid=&season=": "搜索媒体",
            "GET /api/v1/media/scrape?name=&mediaid=&season=": "刮削元数据",
            "GET /api/v1/media/recognize?bangumiid=&javbus_code=": "识别媒体",
            "GET /api/v1/media/bangumi/{id}": "Bangumi 条目",
            "GET /api/v1/discover/sources": "探索数据源",
            "GET /api/v1/sites": "已注册索引站点",
            "GET /api/v1/sites/{id}/search?keyword=&page=": "站点搜索"
        }
    }))
}

/// GET /health - 健康检查
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn plugin_list_handler(State(manager): State<AppState>) -> impl IntoResponse {
    Json(manager.list())
}

async fn plugin_form_handler(
    State(manager): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match manager.get(&id) {
        Ok(plugin) => {
            let (form, model) = plugin.get_form();
            Json(json!({"form": form, "model": model})).into_response()
        }
        Err(e) => plugin_error(e),
    }
}

async fn plugin_page_handler(
    State(manager): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match manager.get(&id) {
        Ok(plugin) => Json(plugin.get_page()).into_response(),
        Err(e) => plugin_error(e),
    }
}

async fn plugin_config_handler(
    State(manager): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match manager.get_config(&id) {
        Ok(config) => Json(config).into_response(),
        Err(e) => plugin_error(e),
    }
}

/// PUT /api/v1/plugin/{id}/config - 保存并重新初始化
async fn plugin_save_config_handler(
    State(manager): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ApiParams>,
    headers: HeaderMap,
    Json(config): Json<Value>,
) -> Response {
    let token = &manager.context().api_token;
    if !authorized(ApiAuth::Apikey, token, &params, &headers)
        && !authorized(ApiAuth::Bear, token, &params, &headers)
    {
        return error_json(StatusCode::UNAUTHORIZED, "认证失败");
    }
    match manager.save_config(&id, &config) {
        Ok(enabled) => {
            info!("⚙️ 插件 {} 配置已更新, 启用: {}", id, enabled);
            Json(json!({"success": true, "enabled": enabled})).into_response()
        }
        Err(e) => plugin_error(e),
    }
}

/// GET /api/v1/plugin/{id}/{*path} - 插件 API 分发
async fn plugin_api_handler(
    State(manager): State<AppState>,
    Path((id, path)): Path<(String, String)>,
    Query(params): Query<ApiParams>,
    headers: HeaderMap,
) -> Response {
    let plugin = match manager.get(&id) {
        Ok(plugin) => plugin,
        Err(e) => return plugin_error(e),
    };
    let path = format!("/{}", path.trim_start_matches('/'));
    let Some(route) = plugin.get_api().into_iter().find(|r| r.path == path) else {
        return error_json(StatusCode::NOT_FOUND, format!("接口不存在: {}", path));
    };
    if !authorized(route.auth, &manager.context().api_token, &params, &headers) {
        return error_json(StatusCode::UNAUTHORIZED, "认证失败");
    }

    match plugin.call_api(&path, &params).await {
        Some(value) => Json(value).into_response(),
        None => error_json(StatusCode::NOT_FOUND, format!("接口不存在: {}", path)),
    }
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub name: Option<String>,
    pub mediaid: Option<String>,
    pub season: Option<u32>,
}

impl From<MediaQuery> for MetaInfo {
    fn from(q: MediaQuery) -> Self {
        MetaInfo {
            name: q.name,
            mediaid: q.mediaid,
            begin_season: q.season,
        }
    }
}

async fn media_search_handler(
    State(manager): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> impl IntoResponse {
    Json(manager.search_medias(&query.into()).await)
}

async fn media_scrape_handler(
    State(manager): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> impl IntoResponse {
    Json(manager.scrape_metadata(&query.into()).await)
}

async fn media_recognize_handler(
    State(manager): State<AppState>,
    Query(req): Query<RecognizeRequest>,
) -> Response {
    match manager.recognize_media(&req).await {
        Some(media) => Json(media).into_response(),
        None => error_json(StatusCode::NOT_FOUND, "未识别到媒体信息"),
    }
}

async fn bangumi_info_handler(
    State(manager): State<AppState>,
    Path(id): Path<u64>,
) -> Response {
    match manager.bangumi_info(id).await {
        Some(media) => Json(media).into_response(),
        None => error_json(StatusCode::NOT_FOUND, "未找到 Bangumi 条目"),
    }
}

async fn discover_sources_handler(State(manager): State<AppState>) -> impl IntoResponse {
    Json(manager.discover_sources())
}

async fn sites_handler(State(manager): State<AppState>) -> impl IntoResponse {
    Json(manager.sites())
}

#[derive(Debug, Deserialize)]
pub struct SiteSearchQuery {
    pub keyword: Option<String>,
    pub page: Option<u32>,
}

async fn site_search_handler(
    State(manager): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SiteSearchQuery>,
) -> Response {
    let page = query.page.unwrap_or(0);
    match manager.search_site(&id, query.keyword.as_deref(), page).await {
        Some(result) => Json(result).into_response(),
        None => error_json(StatusCode::NOT_FOUND, format!("站点不存在: {}", id)),
    }
}
