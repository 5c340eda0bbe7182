//! Sukebei Nyaa 索引站点扩展

use crate::form::{self, FormElement};
use crate::indexer::{sukebei_descriptor, SUKEBEI_DOMAIN};
use crate::plugin::{
    truthy, ConfigCell, Plugin, PluginContext, PluginError, PluginManifest,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const MANIFEST: PluginManifest = PluginManifest {
    id: "SukebeiNyaa",
    name: "SukebeiNyaa",
    desc: "扩展索引站点 sukebei.nyaa.si",
    version: "1.0.0",
    author: "黄垚淮",
    icon: Some("https://raw.githubusercontent.com/jxxghp/MoviePilot-Plugins/main/icons/nyaa.png"),
    order: 99,
};

#[derive(Debug, Clone, Deserialize)]
struct Config {
    #[serde(default, deserialize_with = "truthy")]
    enabled: bool,
    #[serde(default = "default_proxy", deserialize_with = "truthy")]
    proxy: bool,
}

fn default_proxy() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: false,
            proxy: default_proxy(),
        }
    }
}

pub struct SukebeiNyaa {
    ctx: PluginContext,
    config: ConfigCell<Config>,
}

impl SukebeiNyaa {
    pub fn new(ctx: PluginContext) -> Self {
        Self {
            ctx,
            config: ConfigCell::default(),
        }
    }
}

#[async_trait]
impl Plugin for SukebeiNyaa {
    fn manifest(&self) -> &PluginManifest {
        &MANIFEST
    }

    fn init_plugin(&self, config: &Value) -> Result<(), PluginError> {
        self.config.load(config)?;
        let cfg = self.config.get();
        if cfg.enabled {
            self.ctx
                .sites
                .add_indexer(SUKEBEI_DOMAIN, sukebei_descriptor(cfg.proxy));
        } else {
            self.ctx.sites.remove_indexer(SUKEBEI_DOMAIN);
        }
        Ok(())
    }

    fn get_state(&self) -> bool {
        self.config.get().enabled
    }

    fn get_form(&self) -> (Vec<FormElement>, Value) {
        (
            vec![form::enable_form(Some(form::switch("proxy", "索引请求使用代理")))],
            json!({"enabled": false, "proxy": true}),
        )
    }

    fn stop_service(&self) {
        self.ctx.sites.remove_indexer(SUKEBEI_DOMAIN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::test_context;

    #[test]
    fn test_registers_only_when_enabled() {
        let ctx = test_context();
        let plugin = SukebeiNyaa::new(ctx.clone());

        plugin.init_plugin(&json!({"enabled": false})).unwrap();
        assert!(ctx.sites.list().is_empty());

        plugin.init_plugin(&json!({"enabled": true})).unwrap();
        let site = ctx.sites.get("sukebeinyaa").unwrap();
        assert!(site.proxy);
        assert_eq!(site.domain, SUKEBEI_DOMAIN);

        plugin.init_plugin(&json!({"enabled": true, "proxy": false})).unwrap();
        assert!(!ctx.sites.get("sukebeinyaa").unwrap().proxy);
        assert_eq!(ctx.sites.list().len(), 1);
    }

    #[test]
    fn test_disable_and_stop_remove_site() {
        let ctx = test_context();
        let plugin = SukebeiNyaa::new(ctx.clone());

        plugin.init_plugin(&json!({"enabled": true})).unwrap();
        plugin.init_plugin(&json!({"enabled": false})).unwrap();
        assert!(ctx.sites.get("sukebeinyaa").is_none());

        plugin.init_plugin(&json!({"enabled": true})).unwrap();
        plugin.stop_service();
        assert!(ctx.sites.list().is_empty());
    }

    #[test]
    fn test_switches_accept_truthy_values() {
        let ctx = test_context();
        let plugin = SukebeiNyaa::new(ctx.clone());
        plugin.init_plugin(&json!({"enabled": "on", "proxy": 0})).unwrap();
        assert!(plugin.get_state());
        assert!(!ctx.sites.list()[0].proxy);

        plugin.init_plugin(&json!({"enabled": "false"})).unwrap();
        assert!(!plugin.get_state());
        assert!(ctx.sites.list().is_empty());
    }

    #[test]
    fn test_invalid_config_keeps_registry() {
        let ctx = test_context();
        let plugin = SukebeiNyaa::new(ctx.clone());
        plugin.init_plugin(&json!({"enabled": true})).unwrap();

        assert!(plugin.init_plugin(&json!("broken")).is_err());
        assert!(plugin.get_state());
        assert_eq!(ctx.sites.list().len(), 1);
    }
}
