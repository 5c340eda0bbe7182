//! 描述驱动的种子列表抓取
//! 按 IndexerDescriptor 中的 CSS 选择器和字段规则解析站点列表页

use crate::http_client::{get_text, normalize_url, RequestOptions};
use crate::indexer::{FieldFilter, FieldRule, IndexerDescriptor};
use crate::types::TorrentInfo;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// 单个站点的搜索结果
#[derive(Debug, Clone, Serialize)]
pub struct SiteSearchResult {
    pub site: String,
    pub count: usize,
    pub items: Vec<TorrentInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SiteSearchResult {
    fn with_items(site: &str, items: Vec<TorrentInfo>) -> Self {
        Self {
            site: site.to_string(),
            count: items.len(),
            items,
            error: None,
        }
    }

    fn with_error(site: &str, error: String) -> Self {
        Self {
            site: site.to_string(),
            count: 0,
            items: Vec::new(),
            error: Some(error),
        }
    }
}

/// 搜索站点，失败时返回带错误信息的空结果
pub async fn search_site(
    descriptor: &IndexerDescriptor,
    keyword: Option<&str>,
    page: u32,
) -> SiteSearchResult {
    match execute_search(descriptor, keyword, page).await {
        Ok(items) => SiteSearchResult::with_items(&descriptor.id, items),
        Err(e) => {
            warn!("站点 {} 搜索失败: {}", descriptor.name, e);
            SiteSearchResult::with_error(&descriptor.id, e.to_string())
        }
    }
}

/// 关键字为空时浏览列表页，否则依次尝试搜索路径
pub async fn execute_search(
    descriptor: &IndexerDescriptor,
    keyword: Option<&str>,
    page: u32,
) -> anyhow::Result<Vec<TorrentInfo>> {
    let urls = match keyword.map(str::trim).filter(|k| !k.is_empty()) {
        Some(keyword) => search_urls(descriptor, keyword)?,
        None => vec![browse_url(descriptor, page)?],
    };

    let opts = RequestOptions::default()
        .referer(&descriptor.domain)
        .proxy(descriptor.proxy)
        .timeout(Duration::from_secs(descriptor.timeout));

    let mut last_error = None;
    for url in urls {
        debug!("站点 {} 请求: {}", descriptor.name, url);
        match get_text(&url, &opts).await {
            Ok(html) => {
                let items = parse_torrents(descriptor, &html)?;
                debug!("站点 {} 找到 {} 个结果", descriptor.name, items.len());
                return Ok(items);
            }
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(e.into()),
        None => Ok(Vec::new()),
    }
}

fn join_domain(domain: &str, path: &str) -> anyhow::Result<String> {
    let base = url::Url::parse(domain)?;
    Ok(base.join(path)?.to_string())
}

fn search_urls(descriptor: &IndexerDescriptor, keyword: &str) -> anyhow::Result<Vec<String>> {
    let encoded = urlencoding::encode(keyword);
    let mut urls = Vec::new();
    for path in &descriptor.search.paths {
        if !path.method.eq_ignore_ascii_case("get") {
            warn!("站点 {} 不支持的请求方式: {}", descriptor.name, path.method);
            continue;
        }
        urls.push(join_domain(&descriptor.domain, &path.path.replace("{keyword}", &encoded))?);
    }
    if urls.is_empty() {
        anyhow::bail!("站点 {} 没有可用的搜索路径", descriptor.name);
    }
    Ok(urls)
}

/// page 从 0 开始，实际页码加上 browse.start
fn browse_url(descriptor: &IndexerDescriptor, page: u32) -> anyhow::Result<String> {
    match &descriptor.browse {
        Some(browse) => {
            let path = browse.path.replace("{page}", &page.saturating_add(browse.start).to_string());
            join_domain(&descriptor.domain, &path)
        }
        None => Ok(descriptor.domain.clone()),
    }
}

fn parse_selector(selector: &str) -> anyhow::Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow::anyhow!("无效的选择器 {}: {}", selector, e))
}

/// 解析列表页
pub fn parse_torrents(descriptor: &IndexerDescriptor, html: &str) -> anyhow::Result<Vec<TorrentInfo>> {
    let document = Html::parse_document(html);
    let list_selector = parse_selector(&descriptor.torrents.list.selector)?;

    // 选择器只编译一次
    let mut compiled: HashMap<&str, Selector> = HashMap::new();
    for rule in descriptor.torrents.fields.values() {
        if let Some(sel) = &rule.selector {
            compiled.insert(sel.as_str(), parse_selector(sel)?);
        }
        for key in rule.case.iter().flat_map(|c| c.keys()) {
            if key != "*" {
                compiled.insert(key.as_str(), parse_selector(key)?);
            }
        }
    }

    let mut items = Vec::new();
    for row in document.select(&list_selector) {
        let fields: HashMap<&str, Value> = descriptor
            .torrents
            .fields
            .iter()
            .filter_map(|(name, rule)| {
                extract_field(row, rule, &compiled).map(|v| (name.as_str(), v))
            })
            .collect();

        let title = field_str(&fields, "title");
        if title.is_empty() {
            continue;
        }

        let link = |name: &str| {
            let href = field_str(&fields, name);
            (!href.is_empty()).then(|| normalize_url(&href, &descriptor.domain))
        };

        items.push(TorrentInfo {
            site: descriptor.id.clone(),
            site_name: descriptor.name.clone(),
            torrent_id: Some(field_str(&fields, "id")).filter(|s| !s.is_empty()),
            title,
            enclosure: link("download"),
            page_url: link("details"),
            size: parse_size(&field_str(&fields, "size")),
            seeders: parse_count(&field_str(&fields, "seeders")),
            peers: parse_count(&field_str(&fields, "leechers")),
            grabs: parse_count(&field_str(&fields, "grabs")),
            pubdate: Some(field_str(&fields, "date_added")).filter(|s| !s.is_empty()),
            downloadvolumefactor: field_f64(&fields, "downloadvolumefactor").unwrap_or(1.0),
            uploadvolumefactor: field_f64(&fields, "uploadvolumefactor").unwrap_or(1.0),
        });

        if items.len() >= descriptor.result_num {
            break;
        }
    }

    Ok(items)
}

fn field_str(fields: &HashMap<&str, Value>, name: &str) -> String {
    match fields.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn field_f64(fields: &HashMap<&str, Value>, name: &str) -> Option<f64> {
    match fields.get(name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 按规则提取一个字段
fn extract_field(row: ElementRef, rule: &FieldRule, compiled: &HashMap<&str, Selector>) -> Option<Value> {
    if let Some(case) = &rule.case {
        // 具体选择器优先，`*` 兜底
        let hit = case
            .iter()
            .filter(|(key, _)| key.as_str() != "*")
            .find(|(key, _)| {
                compiled
                    .get(key.as_str())
                    .is_some_and(|sel| row.select(sel).next().is_some())
            })
            .or_else(|| case.iter().find(|(key, _)| key.as_str() == "*"));
        return hit.map(|(_, v)| v.clone());
    }

    let element = match &rule.selector {
        Some(sel) => row.select(compiled.get(sel.as_str())?).next()?,
        None => row,
    };

    let raw = match &rule.attribute {
        Some(attr) => element.value().attr(attr)?.to_string(),
        None => element.text().collect::<Vec<_>>().join(" "),
    };
    let mut text = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    for filter in &rule.filters {
        text = apply_filter(&text, filter)?;
    }
    Some(Value::String(text))
}

fn arg_str(filter: &FieldFilter, index: usize) -> Option<String> {
    match filter.args.get(index)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn arg_usize(filter: &FieldFilter, index: usize) -> usize {
    match filter.args.get(index) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// 字段过滤器，无法匹配时返回 None
fn apply_filter(text: &str, filter: &FieldFilter) -> Option<String> {
    match filter.name.as_str() {
        "re_search" => {
            let pattern = arg_str(filter, 0)?;
            let re = match Regex::new(&pattern) {
                Ok(re) => re,
                Err(e) => {
                    warn!("无效的正则 {}: {}", pattern, e);
                    return None;
                }
            };
            let caps = re.captures(text)?;
            caps.get(arg_usize(filter, 1)).map(|m| m.as_str().to_string())
        }
        "replace" => {
            let from = arg_str(filter, 0)?;
            let to = arg_str(filter, 1).unwrap_or_default();
            Some(text.replace(&from, &to))
        }
        "split" => {
            let sep = arg_str(filter, 0)?;
            text.split(sep.as_str())
                .nth(arg_usize(filter, 1))
                .map(|s| s.trim().to_string())
        }
        "strip" => Some(text.trim().to_string()),
        other => {
            debug!("忽略未知过滤器: {}", other);
            Some(text.to_string())
        }
    }
}

/// "1.5 GiB" -> 字节数
pub fn parse_size(text: &str) -> u64 {
    let text = text.trim().replace(',', "");
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: f64 = match number.trim().parse() {
        Ok(n) => n,
        Err(_) => return 0,
    };
    let multiplier: f64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" | "BYTES" => 1.0,
        "KB" | "KIB" | "K" => 1024.0,
        "MB" | "MIB" | "M" => 1024.0 * 1024.0,
        "GB" | "GIB" | "G" => 1024.0 * 1024.0 * 1024.0,
        "TB" | "TIB" | "T" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return 0,
    };
    (number * multiplier).round() as u64
}

fn parse_count(text: &str) -> u32 {
    text.trim().replace(',', "").parse().unwrap_or(0)
}


#[cfg(test)]
mod tests {
    use super::fixtures::NYAA_HTML;
    use super::*;
    use crate::indexer::sukebei_descriptor;
    use crate::test_support::{serve_fixed, Hits};

    #[test]
    fn test_parse_nyaa_listing() {
        let descriptor = sukebei_descriptor(false);
        let items = parse_torrents(&descriptor, NYAA_HTML).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.site, "sukebeinyaa");
        assert_eq!(first.torrent_id.as_deref(), Some("4012345"));
        assert_eq!(first.title, "[FHD] ABC-123 Sample");
        assert_eq!(first.page_url.as_deref(), Some("https://sukebei.nyaa.si/view/4012345"));
        assert_eq!(
            first.enclosure.as_deref(),
            Some("https://sukebei.nyaa.si/download/4012345.torrent")
        );
        assert_eq!(first.size, 1_610_612_736);
        assert_eq!(first.seeders, 12);
        assert_eq!(first.peers, 3);
        assert_eq!(first.grabs, 1024);
        assert_eq!(first.pubdate.as_deref(), Some("2023-11-14 22:13"));
        assert_eq!(first.downloadvolumefactor, 0.0);
        assert_eq!(first.uploadvolumefactor, 1.0);

        assert_eq!(items[1].size, 734_003_200);
    }

    #[test]
    fn test_result_num_truncates() {
        let mut descriptor = sukebei_descriptor(false);
        descriptor.result_num = 1;
        assert_eq!(parse_torrents(&descriptor, NYAA_HTML).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_list_selector_is_error() {
        let mut descriptor = sukebei_descriptor(false);
        descriptor.torrents.list.selector = "table[".to_string();
        assert!(parse_torrents(&descriptor, NYAA_HTML).is_err());
    }

    #[test]
    fn test_urls() {
        let descriptor = sukebei_descriptor(false);
        assert_eq!(
            search_urls(&descriptor, "ABC 123").unwrap(),
            vec!["https://sukebei.nyaa.si/?f=0&c=0_0&q=ABC%20123"]
        );
        assert_eq!(browse_url(&descriptor, 0).unwrap(), "https://sukebei.nyaa.si/?p=1");
        assert_eq!(browse_url(&descriptor, 2).unwrap(), "https://sukebei.nyaa.si/?p=3");
    }

    #[test]
    fn test_browse_url_last_page() {
        let descriptor = sukebei_descriptor(false);
        assert_eq!(
            browse_url(&descriptor, u32::MAX).unwrap(),
            "https://sukebei.nyaa.si/?p=4294967295"
        );
    }

    #[test]
    fn test_filters() {
        let re = FieldFilter {
            name: "re_search".into(),
            args: vec![Value::from(r"(\d+)-(\d+)"), Value::from(2)],
        };
        assert_eq!(apply_filter("a 12-34 b", &re).as_deref(), Some("34"));
        assert_eq!(apply_filter("none", &re), None);

        let split = FieldFilter {
            name: "split".into(),
            args: vec![Value::from("|"), Value::from(1)],
        };
        assert_eq!(apply_filter("a | b | c", &split).as_deref(), Some("b"));

        let replace = FieldFilter {
            name: "replace".into(),
            args: vec![Value::from("GiB"), Value::from("GB")],
        };
        assert_eq!(apply_filter("1 GiB", &replace).as_deref(), Some("1 GB"));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1 KiB"), 1024);
        assert_eq!(parse_size("2.0 MB"), 2 * 1024 * 1024);
        assert_eq!(parse_size("512 Bytes"), 512);
        assert_eq!(parse_size("3 PB"), 0);
        assert_eq!(parse_size("12"), 12);
        assert_eq!(parse_size(""), 0);
    }

    #[tokio::test]
    async fn test_search_site_against_local_listing() {
        let hits = Hits::default();
        let base = serve_fixed(NYAA_HTML, hits.clone()).await;
        let mut descriptor = sukebei_descriptor(false);
        descriptor.domain = format!("{}/", base);

        let result = search_site(&descriptor, Some("ABC-123"), 0).await;
        assert!(result.error.is_none());
        assert_eq!(result.count, 2);
        assert!(result.items[0]
            .enclosure
            .as_deref()
            .unwrap()
            .starts_with(&base));
        assert_eq!(hits.count(), 1);
    }

    #[tokio::test]
    async fn test_search_site_reports_errors() {
        let mut descriptor = sukebei_descriptor(false);
        descriptor.domain = "http://127.0.0.1:9/".to_string();
        descriptor.timeout = 2;

        let result = search_site(&descriptor, None, 0).await;
        assert_eq!(result.count, 0);
        assert!(result.error.is_some());
    }
}
