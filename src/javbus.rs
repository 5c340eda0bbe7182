//! JavBus 页面抓取
//! 站点没有 API，搜索页 / 详情页 / 首页都用固定的正则提取

use crate::http_client::{get_text, normalize_url, HttpClientError, RequestOptions};
use crate::types::{MediaInfo, MediaType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

pub const JAVBUS_URL: &str = "https://www.javbus.com/";

static SEARCH_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<a[^>]*class="movie-box"[^>]*href="https?://www\.javbus\.com/([A-Za-z0-9\-]+)"[^>]*>([\s\S]*?)</a>"#)
        .expect("valid regex")
});
static TITLE_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"title="([^"]+)""#).expect("valid regex"));
static IMG_SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]*src="([^"]+)""#).expect("valid regex"));

static DETAIL_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<h3[^>]*>([^<]+)</h3>").expect("valid regex"));
static DETAIL_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"發行日期\s*[:：]?\s*(?:</span>)?\s*([0-9]{4}-[0-9]{2}-[0-9]{2})").expect("valid regex")
});
static DETAIL_POSTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a[^>]*class="bigImage"[^>]*href="([^"]+)""#).expect("valid regex"));
static DETAIL_GENRE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a[^>]*href="[^"]*/genre/[^"]*"[^>]*>([^<]+)</a>"#).expect("valid regex"));
static DETAIL_STAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a[^>]*href="[^"]*/star/[^"]*"[^>]*>([^<]+)</a>"#).expect("valid regex"));
static DETAIL_SAMPLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a[^>]*class="sample-box"[^>]*href="([^"]+)""#).expect("valid regex"));

static HOME_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<a href="(?P<href>[^"]+)"\s+class="movie-box">[\s\S]*?<img\s+src="(?P<img>[^"]+)"[\s\S]*?alt="(?P<alt>[^"]+)""#)
        .expect("valid regex")
});

/// 搜索结果条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JavBusItem {
    pub id: String,
    pub name: String,
    pub image: String,
    pub url: String,
}

/// 详情页信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JavBusDetail {
    pub id: String,
    pub name: String,
    pub date: String,
    pub poster: String,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub screenshots: Vec<String>,
    pub url: String,
}

impl JavBusDetail {
    /// 大图：封面优先，其次第一张截图
    pub fn large_image(&self) -> &str {
        if !self.poster.is_empty() {
            &self.poster
        } else {
            self.screenshots.first().map(String::as_str).unwrap_or("")
        }
    }
}

fn detail_url(code: &str) -> String {
    format!("{}{}", JAVBUS_URL, code)
}

/// 解析搜索页
pub fn parse_search_items(html: &str) -> Vec<JavBusItem> {
    SEARCH_ITEM_RE
        .captures_iter(html)
        .map(|caps| {
            let code = caps[1].to_string();
            let block = &caps[2];
            let name = TITLE_ATTR_RE
                .captures(block)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| code.clone());
            let image = IMG_SRC_RE
                .captures(block)
                .map(|c| normalize_url(&c[1], JAVBUS_URL))
                .unwrap_or_default();
            JavBusItem {
                url: detail_url(&code),
                id: code,
                name,
                image,
            }
        })
        .collect()
}

/// 解析详情页
pub fn parse_detail(html: &str, code: &str) -> JavBusDetail {
    let name = DETAIL_TITLE_RE
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| code.to_string());
    let date = DETAIL_DATE_RE
        .captures(html)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    let poster = DETAIL_POSTER_RE
        .captures(html)
        .map(|c| normalize_url(&c[1], JAVBUS_URL))
        .unwrap_or_default();
    let collect = |re: &Regex| -> Vec<String> {
        re.captures_iter(html).map(|c| c[1].trim().to_string()).collect()
    };

    JavBusDetail {
        id: code.to_string(),
        name,
        date,
        poster,
        genres: collect(&DETAIL_GENRE_RE),
        actors: collect(&DETAIL_STAR_RE),
        screenshots: DETAIL_SAMPLE_RE
            .captures_iter(html)
            .map(|c| normalize_url(&c[1], JAVBUS_URL))
            .collect(),
        url: detail_url(code),
    }
}

/// 解析首页，返回探索用的媒体信息
pub fn parse_home(html: &str) -> Vec<MediaInfo> {
    HOME_ITEM_RE
        .captures_iter(html)
        .map(|caps| {
            let href = &caps["href"];
            let media_id = href.trim_end_matches('/').rsplit('/').next().unwrap_or(href);
            MediaInfo {
                source: "javbus".to_string(),
                media_type: Some(MediaType::Movie),
                title: caps["alt"].to_string(),
                mediaid_prefix: "javbus".to_string(),
                media_id: media_id.to_string(),
                poster_path: Some(normalize_url(&caps["img"], JAVBUS_URL)),
                release_date: Some(String::new()),
                detail_link: Some(normalize_url(href, JAVBUS_URL)),
                ..MediaInfo::default()
            }
        })
        .collect()
}

impl From<JavBusItem> for MediaInfo {
    fn from(item: JavBusItem) -> Self {
        let info = serde_json::json!({
            "id": item.id,
            "name": item.name,
            "images": {"large": item.image, "small": item.image},
            "url": item.url,
        });
        MediaInfo {
            source: "javbus".to_string(),
            media_type: Some(MediaType::Movie),
            title: item.name,
            mediaid_prefix: "javbus".to_string(),
            media_id: item.id,
            poster_path: Some(item.image).filter(|s| !s.is_empty()),
            detail_link: Some(item.url),
            javbus_info: Some(info),
            ..MediaInfo::default()
        }
    }
}

impl From<JavBusDetail> for MediaInfo {
    fn from(detail: JavBusDetail) -> Self {
        let large = detail.large_image().to_string();
        let info = serde_json::json!({
            "id": detail.id,
            "name": detail.name,
            "date": detail.date,
            "images": {"large": large, "small": detail.poster},
            "genres": detail.genres,
            "actors": detail.actors,
            "screenshots": detail.screenshots,
            "url": detail.url,
        });
        let year = detail.date.get(..4).map(str::to_string);
        MediaInfo {
            source: "javbus".to_string(),
            media_type: Some(MediaType::Movie),
            title: detail.name,
            year,
            mediaid_prefix: "javbus".to_string(),
            media_id: detail.id,
            release_date: Some(detail.date).filter(|d| !d.is_empty()),
            poster_path: Some(large).filter(|s| !s.is_empty()),
            genres: detail.genres,
            actors: detail.actors,
            screenshots: detail.screenshots,
            detail_link: Some(detail.url),
            javbus_info: Some(info),
            ..MediaInfo::default()
        }
    }
}

/// JavBus 站点客户端
#[derive(Debug, Clone)]
pub struct JavBusClient {
    base_url: String,
}

impl Default for JavBusClient {
    fn default() -> Self {
        Self::with_base_url(JAVBUS_URL)
    }
}

impl JavBusClient {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, path: &str) -> Result<String, HttpClientError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("JavBus 请求: {}", url);
        get_text(&url, &RequestOptions::default().referer(JAVBUS_URL)).await
    }

    pub async fn search(&self, keyword: &str) -> Result<Vec<JavBusItem>, HttpClientError> {
        let html = self.fetch(&format!("search/{}", urlencoding::encode(keyword))).await?;
        Ok(parse_search_items(&html))
    }

    pub async fn detail(&self, code: &str) -> Result<JavBusDetail, HttpClientError> {
        let html = self.fetch(code).await?;
        Ok(parse_detail(&html, code))
    }

    pub async fn home(&self) -> Result<Vec<MediaInfo>, HttpClientError> {
        let html = self.fetch("").await?;
        Ok(parse_home(&html))
    }
}
