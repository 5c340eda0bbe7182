//! 索引站点描述
//! 声明式地告诉 engine 如何从种子列表页提取字段

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::info;

pub const SUKEBEI_DOMAIN: &str = "https://sukebei.nyaa.si/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerDescriptor {
    pub id: String,
    pub name: String,
    pub domain: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub proxy: bool,
    #[serde(default = "default_result_num")]
    pub result_num: usize,
    /// 秒
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    pub search: SearchConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browse: Option<BrowseConfig>,
    pub torrents: TorrentsConfig,
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_result_num() -> usize {
    100
}

fn default_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub paths: Vec<SearchPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPath {
    /// 相对 domain 的路径，`{keyword}` 为占位符
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "get".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseConfig {
    /// `{page}` 为占位符
    pub path: String,
    #[serde(default)]
    pub start: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentsConfig {
    pub list: ListConfig,
    pub fields: BTreeMap<String, FieldRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListConfig {
    pub selector: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FieldFilter>,
    /// 选择器 -> 值，`*` 匹配任意行
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<BTreeMap<String, Value>>,
}

impl FieldRule {
    fn select(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            ..Self::default()
        }
    }

    fn attr(selector: &str, attribute: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            attribute: Some(attribute.to_string()),
            ..Self::default()
        }
    }

    fn constant(value: Value) -> Self {
        Self {
            case: Some(BTreeMap::from([("*".to_string(), value)])),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// sukebei.nyaa.si 的描述
pub fn sukebei_descriptor(proxy: bool) -> IndexerDescriptor {
    let title_link = "td:nth-child(2) > a:not(.comments)";
    let fields = BTreeMap::from([
        (
            "id".to_string(),
            FieldRule {
                filters: vec![FieldFilter {
                    name: "re_search".to_string(),
                    args: vec![Value::from(r"\d+"), Value::from(0)],
                }],
                ..FieldRule::attr(r#"a[href*="/view/"]"#, "href")
            },
        ),
        ("title".to_string(), FieldRule::select(title_link)),
        ("details".to_string(), FieldRule::attr(title_link, "href")),
        (
            "download".to_string(),
            FieldRule::attr(r#"td:nth-child(3) > a[href*="/download/"]"#, "href"),
        ),
        ("date_added".to_string(), FieldRule::select("td:nth-child(5)")),
        ("size".to_string(), FieldRule::select("td:nth-child(4)")),
        ("seeders".to_string(), FieldRule::select("td:nth-child(6)")),
        ("leechers".to_string(), FieldRule::select("td:nth-child(7)")),
        ("grabs".to_string(), FieldRule::select("td:nth-child(8)")),
        ("downloadvolumefactor".to_string(), FieldRule::constant(Value::from(0))),
        ("uploadvolumefactor".to_string(), FieldRule::constant(Value::from(1))),
    ]);

    IndexerDescriptor {
        id: "sukebeinyaa".to_string(),
        name: "Sukebei Nyaa".to_string(),
        domain: SUKEBEI_DOMAIN.to_string(),
        encoding: default_encoding(),
        public: true,
        proxy,
        result_num: 100,
        timeout: 30,
        search: SearchConfig {
            paths: vec![SearchPath {
                path: "?f=0&c=0_0&q={keyword}".to_string(),
                method: default_method(),
            }],
        },
        browse: Some(BrowseConfig {
            path: "?p={page}".to_string(),
            start: 1,
        }),
        torrents: TorrentsConfig {
            list: ListConfig {
                selector: "table.torrent-list > tbody > tr".to_string(),
            },
            fields,
        },
    }
}

/// 已注册的索引站点，按 domain 索引
#[derive(Debug, Default)]
pub struct SiteRegistry {
    indexers: RwLock<BTreeMap<String, IndexerDescriptor>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_indexer(&self, domain: &str, descriptor: IndexerDescriptor) {
        info!("📦 注册索引站点: {} ({})", descriptor.name, domain);
        self.indexers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(domain.to_string(), descriptor);
    }

    pub fn remove_indexer(&self, domain: &str) -> Option<IndexerDescriptor> {
        let removed = self
            .indexers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(domain);
        if let Some(d) = &removed {
            info!("移除索引站点: {} ({})", d.name, domain);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<IndexerDescriptor> {
        self.indexers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|d| d.id == id)
            .cloned()
    }

    pub fn list(&self) -> Vec<IndexerDescriptor> {
        self.indexers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// 按 id 过滤，ids 为 None 时返回全部
    pub fn select(&self, ids: Option<&[String]>) -> Vec<IndexerDescriptor> {
        let all = self.list();
        match ids {
            Some(ids) => all.into_iter().filter(|d| ids.contains(&d.id)).collect(),
            None => all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sukebei_descriptor_wire_shape() {
        let value = serde_json::to_value(sukebei_descriptor(true)).unwrap();
        assert_eq!(value["id"], "sukebeinyaa");
        assert_eq!(value["proxy"], true);
        assert_eq!(value["timeout"], 30);
        assert_eq!(value["search"]["paths"][0]["path"], "?f=0&c=0_0&q={keyword}");
        assert_eq!(value["browse"], json!({"path": "?p={page}", "start": 1}));
        assert_eq!(
            value["torrents"]["fields"]["id"]["filters"],
            json!([{"name": "re_search", "args": ["\\d+", 0]}])
        );
        assert_eq!(
            value["torrents"]["fields"]["downloadvolumefactor"],
            json!({"case": {"*": 0}})
        );
    }

    #[test]
    fn test_descriptor_deserializes_with_defaults() {
        let d: IndexerDescriptor = serde_json::from_value(json!({
            "id": "x",
            "name": "X",
            "domain": "https://x.example/",
            "search": {"paths": [{"path": "search?q={keyword}"}]},
            "torrents": {"list": {"selector": "tr"}, "fields": {"title": {"selector": "a"}}}
        }))
        .unwrap();
        assert_eq!(d.encoding, "UTF-8");
        assert_eq!(d.result_num, 100);
        assert_eq!(d.search.paths[0].method, "get");
        assert!(d.browse.is_none());
    }

    #[test]
    fn test_registry_add_select_remove() {
        let registry = SiteRegistry::new();
        registry.add_indexer(SUKEBEI_DOMAIN, sukebei_descriptor(false));

        assert_eq!(registry.list().len(), 1);
        assert!(registry.get("sukebeinyaa").is_some());
        assert_eq!(registry.select(Some(&["other".to_string()])).len(), 0);
        assert_eq!(registry.select(Some(&["sukebeinyaa".to_string()])).len(), 1);

        // 重复注册覆盖
        registry.add_indexer(SUKEBEI_DOMAIN, sukebei_descriptor(true));
        assert_eq!(registry.list().len(), 1);
        assert!(registry.get("sukebeinyaa").unwrap().proxy);

        assert!(registry.remove_indexer(SUKEBEI_DOMAIN).is_some());
        assert!(registry.list().is_empty());
    }
}
