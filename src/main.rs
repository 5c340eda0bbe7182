mod api;
mod bangumi;
#[cfg(test)]
mod blocking;
mod config_store;
mod engine;
mod form;
mod http_client;
mod indexer;
mod javbus;
mod manager;
mod plugin;
mod plugins;
mod season;
mod settings;
#[cfg(test)]
mod test_support;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config_store::ConfigStore;
use crate::indexer::SiteRegistry;
use crate::manager::PluginManager;
use crate::plugin::{ModuleRegistry, PluginContext};
use crate::settings::SETTINGS;

#[tokio::main]
async fn main() {
    // 初始化日志
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let ctx = PluginContext {
        store: Arc::new(ConfigStore::new(&SETTINGS.config_dir)),
        sites: Arc::new(SiteRegistry::new()),
        modules: Arc::new(ModuleRegistry::default()),
        api_token: SETTINGS.api_token.clone(),
    };
    if ctx.api_token.is_empty() {
        info!("⚠️ 未设置 API_TOKEN，插件 API 不做认证");
    }

    let manager = Arc::new(PluginManager::builtin(ctx));
    manager.init_all();

    let app = api::router(manager.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], SETTINGS.port));
    info!("🚀 MoviePilot 插件服务启动在 http://{}", addr);
    info!("📂 插件配置目录: {}", SETTINGS.config_dir.display());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("监听 {} 失败: {}", addr, e);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("服务异常退出: {}", e);
    }

    manager.stop_all();
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("收到退出信号，正在停止插件..."),
        Err(e) => {
            error!("无法监听退出信号: {}", e);
            std::future::pending::<()>().await
        }
    }
}
