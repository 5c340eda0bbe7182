//! 同步调用入口
//! 供不在异步上下文中的调用方使用，服务本身全部走异步路径，目前只在测试中编译

use crate::manager::PluginManager;
use crate::plugin::ApiParams;
use crate::types::{MediaInfo, MetaInfo, RecognizeRequest};
use serde_json::Value;
use std::future::Future;
use std::io;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};

/// 阻塞执行 future
/// 多线程运行时中使用 block_in_place，其余情况在独立的单线程运行时上执行
pub fn block_on<F>(future: F) -> io::Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        // 单线程运行时内不能阻塞当前线程
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| run_local(future))
                .join()
                .map_err(|_| io::Error::other("阻塞任务异常退出"))?
        }),
        Err(_) => run_local(future),
    }
}

fn run_local<F: Future>(future: F) -> io::Result<F::Output> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

impl PluginManager {
    pub fn search_medias_blocking(&self, meta: &MetaInfo) -> io::Result<Vec<MediaInfo>> {
        block_on(self.search_medias(meta))
    }

    pub fn scrape_metadata_blocking(&self, meta: &MetaInfo) -> io::Result<Vec<MediaInfo>> {
        block_on(self.scrape_metadata(meta))
    }

    pub fn recognize_media_blocking(&self, req: &RecognizeRequest) -> io::Result<Option<MediaInfo>> {
        block_on(self.recognize_media(req))
    }

    pub fn bangumi_info_blocking(&self, bangumiid: u64) -> io::Result<Option<MediaInfo>> {
        block_on(self.bangumi_info(bangumiid))
    }

    pub fn call_api_blocking(
        &self,
        id: &str,
        path: &str,
        params: &ApiParams,
    ) -> io::Result<Option<Value>> {
        let result = block_on(self.call_api(id, path, params))?;
        Ok(result.unwrap_or_else(|e| {
            tracing::warn!("插件 API 调用失败: {}", e);
            None
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::test_context;
    use serde_json::json;

    fn manager() -> PluginManager {
        let manager = PluginManager::builtin(test_context());
        manager.init_all();
        manager
    }

    #[test]
    fn test_block_on_without_runtime() {
        assert_eq!(block_on(async { 1 + 1 }).unwrap(), 2);

        let manager = manager();
        assert!(manager.search_medias_blocking(&MetaInfo::named("x")).unwrap().is_empty());
        assert!(manager.bangumi_info_blocking(1).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_block_on_inside_current_thread_runtime() {
        assert_eq!(block_on(async { "ok" }).unwrap(), "ok");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_block_on_inside_multi_thread_runtime() {
        let manager = manager();
        let value = manager
            .call_api_blocking("BangumiPreciseSearch", "/bangumi_search", &ApiParams::new())
            .unwrap();
        assert_eq!(value, Some(json!({"success": false, "message": "插件未启用"})));
        assert!(manager.call_api_blocking("Missing", "/x", &ApiParams::new()).unwrap().is_none());
        assert!(manager
            .recognize_media_blocking(&RecognizeRequest::default())
            .unwrap()
            .is_none());
        assert!(manager.scrape_metadata_blocking(&MetaInfo::default()).unwrap().is_empty());
    }
}
