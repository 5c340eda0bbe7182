//! 宿主侧数据结构：媒体信息、识别元数据、资源上下文、探索数据源

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 媒体类型，序列化为宿主使用的中文值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "电影")]
    Movie,
    #[serde(rename = "电视剧")]
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "电影",
            MediaType::Tv => "电视剧",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "电影" | "movie" | "Movie" => Ok(MediaType::Movie),
            "电视剧" | "tv" | "TV" | "Tv" => Ok(MediaType::Tv),
            other => Err(format!("未知媒体类型: {}", other)),
        }
    }
}

/// 媒体信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub source: String,
    #[serde(rename = "type")]
    pub media_type: Option<MediaType>,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<String>,
    pub season: Option<u32>,
    pub mediaid_prefix: String,
    pub media_id: String,
    pub bangumi_id: Option<u64>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
    pub vote_average: f64,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    pub detail_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bangumi_info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javbus_info: Option<Value>,
}

impl MediaInfo {
    pub fn is_tv(&self) -> bool {
        self.media_type == Some(MediaType::Tv)
    }
}

/// 识别元数据 (宿主 MetaBase 的子集)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    pub name: Option<String>,
    /// 形如 `bangumi:12345` / `javbus:ABC-123`
    pub mediaid: Option<String>,
    pub begin_season: Option<u32>,
}

impl MetaInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// 非空名称
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    /// 非空 mediaid
    pub fn mediaid(&self) -> Option<&str> {
        self.mediaid.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// 取 `prefix:id` 中冒号后的部分，没有冒号时原样返回
pub fn strip_mediaid_prefix(mediaid: &str) -> &str {
    mediaid.split_once(':').map(|(_, id)| id).unwrap_or(mediaid)
}

/// 识别请求参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecognizeRequest {
    pub bangumiid: Option<u64>,
    pub javbus_code: Option<String>,
}

/// 站点种子信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TorrentInfo {
    pub site: String,
    pub site_name: String,
    pub torrent_id: Option<String>,
    pub title: String,
    pub enclosure: Option<String>,
    pub page_url: Option<String>,
    pub size: u64,
    pub seeders: u32,
    pub peers: u32,
    pub grabs: u32,
    pub pubdate: Option<String>,
    pub downloadvolumefactor: f64,
    pub uploadvolumefactor: f64,
}

/// 资源上下文
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    pub media_info: MediaInfo,
    pub torrent_info: TorrentInfo,
}

/// 探索数据源
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoverMediaSource {
    pub name: String,
    pub mediaid_prefix: String,
    pub api_path: String,
    pub filter_params: Map<String, Value>,
    pub filter_ui: Vec<Value>,
}

/// 探索数据源收集事件
#[derive(Debug, Default)]
pub struct DiscoverSourceEvent {
    pub extra_sources: Option<Vec<DiscoverMediaSource>>,
}

impl DiscoverSourceEvent {
    pub fn push(&mut self, source: DiscoverMediaSource) {
        self.extra_sources.get_or_insert_with(Vec::new).push(source);
    }
}
