//! 内置插件

mod bangumi_authorization;
mod bangumi_cookie;
mod bangumi_hentai;
mod bangumi_precise_search;
mod javbus;
mod javbus_discover;
mod sukebei_nyaa;

pub use bangumi_authorization::BangumiAuthorization;
pub use bangumi_cookie::BangumiCookie;
pub use bangumi_hentai::BangumiHentai;
pub use bangumi_precise_search::BangumiPreciseSearch;
pub use javbus::JavBus;
pub use javbus_discover::JavBusDiscover;
pub use sukebei_nyaa::SukebeiNyaa;

use crate::plugin::{Plugin, PluginContext};
use std::sync::Arc;

/// 全部内置插件，按 order 升序
pub fn builtin_plugins(ctx: &PluginContext) -> Vec<Arc<dyn Plugin>> {
    let mut plugins: Vec<Arc<dyn Plugin>> = vec![
        Arc::new(BangumiAuthorization::new(ctx.clone())),
        Arc::new(BangumiCookie::new()),
        Arc::new(BangumiHentai::new(ctx.clone())),
        Arc::new(BangumiPreciseSearch::new(ctx.clone())),
        Arc::new(JavBus::new(ctx.clone())),
        Arc::new(JavBusDiscover::new(ctx.clone())),
        Arc::new(SukebeiNyaa::new(ctx.clone())),
    ];
    plugins.sort_by_key(|p| p.manifest().order);
    plugins
}

#[cfg(test)]
pub(crate) fn test_context() -> PluginContext {
    use crate::config_store::ConfigStore;
    use crate::indexer::SiteRegistry;

    let dir = tempfile::tempdir().unwrap().keep();
    PluginContext {
        store: Arc::new(ConfigStore::new(dir)),
        sites: Arc::new(SiteRegistry::new()),
        modules: Arc::new(crate::plugin::ModuleRegistry::default()),
        api_token: "test-token".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_plugins_sorted_and_unique() {
        let plugins = builtin_plugins(&test_context());
        assert_eq!(plugins.len(), 7);

        let orders: Vec<i32> = plugins.iter().map(|p| p.manifest().order).collect();
        let mut sorted = orders.clone();
        sorted.sort();
        assert_eq!(orders, sorted);

        let mut ids: Vec<&str> = plugins.iter().map(|p| p.manifest().id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn test_form_defaults_cover_models() {
        for plugin in builtin_plugins(&test_context()) {
            let (elements, defaults) = plugin.get_form();
            for element in &elements {
                for model in element.models() {
                    assert!(
                        defaults.get(&model).is_some(),
                        "{} 缺少默认值 {}",
                        plugin.manifest().id,
                        model
                    );
                }
            }
            // 默认配置可以直接载入
            plugin.init_plugin(&defaults).unwrap();
            assert!(!plugin.get_state());
        }
    }
}
