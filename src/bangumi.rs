//! Bangumi (bgm.tv) 客户端
//! 旧版搜索 / 条目接口 + v0 条目接口，结果整形为 MediaInfo

use crate::http_client::{get_text, HttpClientError, RequestOptions};
use crate::types::{MediaInfo, MediaType};
use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const BANGUMI_API: &str = "https://api.bgm.tv";

#[derive(Debug, Error)]
pub enum BangumiError {
    #[error(transparent)]
    Http(#[from] HttpClientError),
    #[error("JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("响应不是 JSON 对象")]
    NotObject,
}

/// 访问凭据
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Credential {
    #[default]
    Anonymous,
    /// 已规范化的 Authorization 头值
    Bearer(String),
    /// 原样发送的 Cookie
    Cookie(String),
}

impl Credential {
    /// 由用户填写的令牌构造，空令牌为匿名
    pub fn from_token(token: &str) -> Self {
        match bearer_header(token) {
            Some(value) => Credential::Bearer(value),
            None => Credential::Anonymous,
        }
    }

    pub fn from_cookie(cookie: &str) -> Self {
        let cookie = cookie.trim();
        if cookie.is_empty() {
            Credential::Anonymous
        } else {
            Credential::Cookie(cookie.to_string())
        }
    }
}

/// 生成 Authorization 头：没有 "bearer " 前缀 (不区分大小写) 时补上 "Bearer "
pub fn bearer_header(token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if token.to_lowercase().starts_with("bearer ") {
        Some(token.to_string())
    } else {
        Some(format!("Bearer {}", token))
    }
}

#[derive(Debug, Clone)]
pub struct BangumiClient {
    base_url: String,
    credential: Credential,
}

impl BangumiClient {
    pub fn new(credential: Credential) -> Self {
        Self::with_base_url(BANGUMI_API, credential)
    }

    pub fn with_base_url(base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        }
    }

    fn options(&self) -> RequestOptions<'_> {
        let opts = RequestOptions::json();
        match &self.credential {
            Credential::Anonymous => opts,
            Credential::Bearer(value) => opts.authorization(Some(value)),
            Credential::Cookie(value) => opts.cookie(Some(value)),
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, BangumiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Bangumi 请求: {}", url);
        let body = get_text(&url, &self.options()).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET /search/subject/{keyword}，返回 list 字段
    pub async fn search_subject(&self, keyword: &str) -> Result<Vec<Value>, BangumiError> {
        let path = format!("/search/subject/{}", urlencoding::encode(keyword));
        let data = self.get_json(&path).await?;
        Ok(take_list(data))
    }

    /// 带分页参数的旧版搜索
    pub async fn search_subject_page(
        &self,
        keyword: &str,
        start: u32,
        max_results: u32,
    ) -> Result<Vec<Value>, BangumiError> {
        let path = format!(
            "/search/subject/{}?start={}&max_results={}",
            urlencoding::encode(keyword),
            start,
            max_results
        );
        let data = self.get_json(&path).await?;
        Ok(take_list(data))
    }

    /// GET /subject/{id}
    pub async fn subject(&self, id: &str) -> Result<Value, BangumiError> {
        let data = self.get_json(&format!("/subject/{}", urlencoding::encode(id))).await?;
        if data.is_object() {
            Ok(data)
        } else {
            Err(BangumiError::NotObject)
        }
    }

    /// GET /v0/subjects/{id}
    pub async fn subject_v0(&self, id: u64) -> Result<Value, BangumiError> {
        let data = self.get_json(&format!("/v0/subjects/{}", id)).await?;
        if data.is_object() {
            Ok(data)
        } else {
            Err(BangumiError::NotObject)
        }
    }
}

/// 取 list 数组，缺失或 null 视为空
fn take_list(data: Value) -> Vec<Value> {
    match data {
        Value::Object(mut map) => match map.remove("list") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn str_field<'a>(info: &'a Value, key: &str) -> Option<&'a str> {
    info.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 剧场版 / Movie 视为电影，其余条目按剧集处理
fn media_type_of(info: &Value) -> MediaType {
    match str_field(info, "platform") {
        Some(p) if p.contains("剧场版") || p.eq_ignore_ascii_case("movie") => MediaType::Movie,
        _ => MediaType::Tv,
    }
}

impl MediaInfo {
    /// 由 Bangumi 条目 JSON (旧版或 v0) 构造
    pub fn from_bangumi(info: Value) -> Self {
        let id = info.get("id").and_then(Value::as_u64);
        let name = str_field(&info, "name").map(str::to_string);
        let title = str_field(&info, "name_cn")
            .map(str::to_string)
            .or_else(|| name.clone())
            .unwrap_or_default();

        let release_date = str_field(&info, "air_date")
            .or_else(|| str_field(&info, "date"))
            .map(str::to_string);
        let year = release_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(|d| d.year().to_string());

        let poster_path = info
            .pointer("/images/large")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let vote_average = info
            .pointer("/rating/score")
            .and_then(Value::as_f64)
            .unwrap_or_default();
        let genres = info
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.get("name").and_then(Value::as_str))
                    .take(5)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            source: "bangumi".to_string(),
            media_type: Some(media_type_of(&info)),
            title,
            original_title: name,
            year,
            mediaid_prefix: "bangumi".to_string(),
            media_id: id.map(|i| i.to_string()).unwrap_or_default(),
            bangumi_id: id,
            release_date,
            poster_path,
            overview: str_field(&info, "summary").map(str::to_string),
            vote_average,
            genres,
            detail_link: id.map(|i| format!("https://bgm.tv/subject/{}", i)),
            bangumi_info: Some(info),
            ..Self::default()
        }
    }
}
