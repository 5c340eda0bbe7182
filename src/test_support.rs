//! 测试辅助：本地 axum 服务模拟远端站点

use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// 在随机端口启动服务，返回 http://127.0.0.1:port
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// 请求计数器
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// 任何路径都计数并返回固定文本
pub async fn serve_fixed(body: &'static str, hits: Hits) -> String {
    let app = Router::new().fallback(move || {
        let hits = hits.clone();
        async move {
            hits.hit();
            body
        }
    });
    serve(app).await
}
