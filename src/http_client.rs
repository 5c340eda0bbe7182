use crate::settings::SETTINGS;
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const TIMEOUT_SECONDS: u64 = 20;

/// 直连 HTTP 客户端
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| build_client(None));

/// 走代理的 HTTP 客户端，未配置 PROXY_HOST 时与直连相同
pub static PROXY_CLIENT: Lazy<Client> =
    Lazy::new(|| build_client(SETTINGS.proxy_host.as_deref()));

fn build_client(proxy: Option<&str>) -> Client {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECONDS))
        .user_agent(SETTINGS.user_agent.as_str())
        .gzip(true)
        .brotli(true)
        .no_proxy();

    if let Some(host) = proxy {
        match reqwest::Proxy::all(host) {
            Ok(p) => builder = builder.proxy(p),
            Err(e) => warn!("代理地址无效 {}: {}", host, e),
        }
    }

    builder.build().unwrap_or_else(|e| {
        warn!("HTTP 客户端构建失败，使用默认配置: {}", e);
        Client::new()
    })
}

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("请求超时")]
    Timeout,
    #[error("请求失败: {0}")]
    RequestFailed(String),
    #[error("响应异常状态码: {0}")]
    BadStatus(u16),
}

/// 单次请求的附加选项
#[derive(Debug, Default, Clone)]
pub struct RequestOptions<'a> {
    pub referer: Option<&'a str>,
    /// 完整的 Authorization 头值
    pub authorization: Option<&'a str>,
    /// 原样发送的 Cookie 头值
    pub cookie: Option<&'a str>,
    pub accept_json: bool,
    pub proxy: bool,
    pub timeout: Option<Duration>,
}

impl<'a> RequestOptions<'a> {
    pub fn json() -> Self {
        Self {
            accept_json: true,
            ..Self::default()
        }
    }

    pub fn referer(mut self, referer: &'a str) -> Self {
        self.referer = Some(referer);
        self
    }

    pub fn authorization(mut self, value: Option<&'a str>) -> Self {
        self.authorization = value.filter(|v| !v.is_empty());
        self
    }

    pub fn cookie(mut self, value: Option<&'a str>) -> Self {
        self.cookie = value.filter(|v| !v.is_empty());
        self
    }

    pub fn proxy(mut self, proxy: bool) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// GET 请求
pub async fn get(url: &str, opts: &RequestOptions<'_>) -> Result<Response, HttpClientError> {
    let client = if opts.proxy { &*PROXY_CLIENT } else { &*HTTP_CLIENT };
    let mut req = client.get(url);

    if let Some(ref_url) = opts.referer {
        req = req.header("Referer", ref_url);
    }
    if let Some(auth) = opts.authorization {
        req = req.header("Authorization", auth);
    }
    if let Some(cookie) = opts.cookie {
        req = req.header("Cookie", cookie);
    }
    if let Some(timeout) = opts.timeout {
        req = req.timeout(timeout);
    }

    req = req
        .header(
            "Accept",
            if opts.accept_json {
                "application/json"
            } else {
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
            },
        )
        .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8");

    let response = req.send().await.map_err(|e| {
        if e.is_timeout() {
            HttpClientError::Timeout
        } else {
            HttpClientError::RequestFailed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(HttpClientError::BadStatus(response.status().as_u16()));
    }

    Ok(response)
}

/// GET 请求并返回文本
pub async fn get_text(url: &str, opts: &RequestOptions<'_>) -> Result<String, HttpClientError> {
    let response = get(url, opts).await?;
    response
        .text()
        .await
        .map_err(|e| HttpClientError::RequestFailed(e.to_string()))
}

/// 规范化 URL，相对路径拼接到 base_url
pub fn normalize_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href)
    }
}
