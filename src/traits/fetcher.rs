use futures::future::LocalBoxFuture;

/// Called with `(bytes_loaded, total_bytes)` as data arrives
pub type ProgressCallback = Box<dyn Fn(u64, Option<u64>)>;

/// Asset transport
pub trait AssetFetcher {
    fn fetch(
        &self,
        url: &str,
        progress: ProgressCallback,
    ) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>>;
}
