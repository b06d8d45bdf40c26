use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::future::LocalBoxFuture;
use futures::StreamExt;

use crate::traits::{AssetFetcher, ProgressCallback};

const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

enum ReadEvent {
    Opened(Option<u64>),
    Chunk(Vec<u8>),
    Failed(anyhow::Error),
}

/// Read `path` on its own thread, streaming chunks back to the caller
fn spawn_reader(path: PathBuf, chunk_size: usize) -> Result<UnboundedReceiver<ReadEvent>> {
    let (events, receiver) = mpsc::unbounded();
    thread::Builder::new()
        .name("asset-reader".to_string())
        .spawn(move || {
            if let Err(e) = read_chunks(&path, chunk_size, &events) {
                let _ = events.unbounded_send(ReadEvent::Failed(e));
            }
        })
        .context("cannot spawn asset reader thread")?;
    Ok(receiver)
}

fn read_chunks(path: &Path, chunk_size: usize, events: &UnboundedSender<ReadEvent>) -> Result<()> {
    let mut file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let total = file.metadata().ok().map(|meta| meta.len());
    if events.unbounded_send(ReadEvent::Opened(total)).is_err() {
        return Ok(());
    }

    loop {
        let mut chunk = vec![0u8; chunk_size];
        let read = file
            .read(&mut chunk)
            .with_context(|| format!("error reading {}", path.display()))?;
        if read == 0 {
            return Ok(());
        }
        chunk.truncate(read);
        // Receiver gone means the load was abandoned
        if events.unbounded_send(ReadEvent::Chunk(chunk)).is_err() {
            return Ok(());
        }
    }
}

/// Reads assets from the local filesystem in chunks, reporting progress.
///
/// File I/O happens on a reader thread; the returned future only receives
/// chunks, so awaiting it never blocks the event loop.
///
/// `file://` URLs are taken as filesystem paths. Other URLs starting with `/`
/// are web-style absolute paths and resolve against the asset root; anything
/// else is relative to the working directory.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    asset_root: PathBuf,
    chunk_size: usize,
}

impl FileFetcher {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        if let Some(path) = url.strip_prefix("file://") {
            PathBuf::from(path)
        } else if let Some(rooted) = url.strip_prefix('/') {
            self.asset_root.join(rooted)
        } else {
            PathBuf::from(url)
        }
    }
}

impl AssetFetcher for FileFetcher {
    fn fetch(&self, url: &str, progress: ProgressCallback) -> LocalBoxFuture<'static, Result<Vec<u8>>> {
        let path = self.resolve(url);
        let chunk_size = self.chunk_size;

        Box::pin(async move {
            let mut events = spawn_reader(path, chunk_size)?;
            let mut total = None;
            let mut bytes = Vec::new();

            while let Some(event) = events.next().await {
                match event {
                    ReadEvent::Opened(len) => {
                        total = len;
                        bytes.reserve(len.unwrap_or(0) as usize);
                    }
                    ReadEvent::Chunk(chunk) => {
                        bytes.extend_from_slice(&chunk);
                        progress(bytes.len() as u64, total);
                    }
                    ReadEvent::Failed(err) => return Err(err),
                }
            }

            if bytes.is_empty() {
                progress(0, total);
            }
            Ok(bytes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("immersive-viewer-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_resolve_rules() {
        let fetcher = FileFetcher::new("public");
        assert_eq!(fetcher.resolve("/models/a.glb"), PathBuf::from("public/models/a.glb"));
        assert_eq!(fetcher.resolve("file:///tmp/a.glb"), PathBuf::from("/tmp/a.glb"));
        assert_eq!(fetcher.resolve("assets/a.glb"), PathBuf::from("assets/a.glb"));
    }

    #[test]
    fn test_fetch_reports_chunked_progress() {
        let data: Vec<u8> = (0..10u8).collect();
        let path = temp_file("chunks.bin", &data);
        let fetcher = FileFetcher::new(".").with_chunk_size(4);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let record = seen.clone();
        let url = format!("file://{}", path.display());
        let bytes = block_on(fetcher.fetch(
            &url,
            Box::new(move |loaded, total| record.borrow_mut().push((loaded, total))),
        ))
        .unwrap();

        assert_eq!(bytes, data);
        assert_eq!(
            *seen.borrow(),
            vec![(4, Some(10)), (8, Some(10)), (10, Some(10))]
        );
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file_is_error_with_path() {
        let fetcher = FileFetcher::new("/nonexistent-root");
        let err = block_on(fetcher.fetch("/models/missing.glb", Box::new(|_, _| {}))).unwrap_err();
        assert!(format!("{:#}", err).contains("missing.glb"));
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_off_the_calling_thread() {
        use futures::executor::LocalPool;
        use futures::task::LocalSpawnExt;
        use std::io::Write;

        let path = std::env::temp_dir().join(format!("immersive-viewer-{}-pipe", std::process::id()));
        std::fs::remove_file(&path).ok();
        let status = std::process::Command::new("mkfifo").arg(&path).status().unwrap();
        assert!(status.success());

        let fetch = FileFetcher::new(".").fetch(&format!("file://{}", path.display()), Box::new(|_, _| {}));
        let result = Rc::new(RefCell::new(None));
        let slot = result.clone();
        let mut pool = LocalPool::new();
        pool.spawner()
            .spawn_local(async move {
                *slot.borrow_mut() = Some(fetch.await);
            })
            .unwrap();

        // Opening a pipe with no writer blocks, yet the executor stays free
        pool.run_until_stalled();
        assert!(result.borrow().is_none());

        let mut writer = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        writer.write_all(b"glTF").unwrap();
        drop(writer);
        pool.run();

        let bytes = result.borrow_mut().take().unwrap().unwrap();
        assert_eq!(bytes, b"glTF");
        std::fs::remove_file(path).ok();
    }
}
