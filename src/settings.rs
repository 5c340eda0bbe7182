//! 进程级配置
//! 全部来自环境变量，启动后只读

use once_cell::sync::Lazy;
use std::path::PathBuf;

/// 默认浏览器 UA (对应宿主的 NORMAL_USER_AGENT)
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// 全局配置
pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

#[derive(Debug, Clone)]
pub struct Settings {
    /// 监听端口
    pub port: u16,
    /// 插件 API 访问令牌，为空时不校验
    pub api_token: String,
    /// 插件配置目录
    pub config_dir: PathBuf,
    /// 代理地址，例如 http://127.0.0.1:7890
    pub proxy_host: Option<String>,
    /// 请求使用的 UA
    pub user_agent: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            port: non_empty("PORT").and_then(|p| p.parse().ok()).unwrap_or(3001),
            api_token: non_empty("API_TOKEN").unwrap_or_default(),
            config_dir: non_empty("CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config")),
            proxy_host: non_empty("PROXY_HOST"),
            user_agent: non_empty("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        }
    }
}
