//! サムネイル一覧の生成。
//!
//! ページごとのジョブを FIFO に積み、固定数のワーカーで消化する。
//! ページ単位の完了通知と、全ページ完了の通知の2種類を出す。
//! 完了済みのページは後から登録したハンドラにもその場で一度だけ届く。

pub mod queue;
pub mod store;

pub use queue::WorkQueue;
pub use store::{cache_file_path, Thumbnail};

use crate::config::Settings;
use crate::error::{Result, ViewerError};
use crate::image::loader::MangaFile;
use crate::sync::OneShot;
use std::path::Path;
use std::sync::{Arc, Mutex};

type PageHandler = Arc<dyn Fn(usize, &Thumbnail) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOutcome {
    Completed,
    Cancelled,
}

/// `load_or_generate` がどちらで揃えたか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Cache,
    Generated,
}

#[derive(Debug, Clone, Copy)]
struct ThumbnailOptions {
    size: u32,
    quality: u8,
    workers: usize,
}

struct Progress {
    started: bool,
    // finalize 済み。以後ジョブを始めない
    cancelled: bool,
    data: Vec<Option<Thumbnail>>,
    failed: Vec<usize>,
    finished: usize,
    handlers: Vec<PageHandler>,
}

struct Inner {
    manga_file: Arc<MangaFile>,
    options: ThumbnailOptions,
    queue: WorkQueue,
    progress: Mutex<Progress>,
    loaded: OneShot<LoadOutcome>,
}

pub struct Thumbnails {
    inner: Arc<Inner>,
}

impl Thumbnails {
    pub fn new(manga_file: Arc<MangaFile>, settings: &Settings) -> Self {
        let len = manga_file.len();
        Self {
            inner: Arc::new(Inner {
                manga_file,
                options: ThumbnailOptions {
                    size: settings.thumbnail_size.max(1),
                    quality: settings.thumbnail_quality.clamp(1, 100),
                    workers: settings.thumbnail_workers.max(1),
                },
                queue: WorkQueue::new(),
                progress: Mutex::new(Progress {
                    started: false,
                    cancelled: false,
                    data: vec![None; len],
                    failed: Vec::new(),
                    finished: 0,
                    handlers: Vec::new(),
                }),
                loaded: OneShot::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.manga_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 全ページのサムネイルを生成する。全ページ完了で返る。
    pub async fn load(&self) -> Result<()> {
        if self.inner.begin()? {
            let len = self.len();
            log::info!("[Thumbnail] {} ページの生成を開始します", len);
            if len == 0 {
                self.inner.loaded.resolve(LoadOutcome::Completed);
            }
            for page in 0..len {
                self.inner.queue.enqueue(page);
            }
            for _ in 0..self.inner.options.workers.min(len) {
                let inner = self.inner.clone();
                self.inner.queue.add_worker(tokio::spawn(async move { inner.work().await }));
            }
            // 積んでいる間に finalize された場合の残り
            if self.inner.is_cancelled() {
                self.inner.queue.clear();
            }
        }

        self.finished().await
    }

    /// 以前に書き出したキャッシュから読み込み、各ページの完了通知をその場で流す
    pub async fn load_from_cache(&self, path: &Path) -> Result<()> {
        let thumbnails = store::read_cache_file(path).await?;
        if thumbnails.len() != self.len() {
            return Err(ViewerError::CacheRead {
                path: path.to_path_buf(),
                reason: format!("ページ数が一致しません ({} != {})", thumbnails.len(), self.len()),
            });
        }
        if !self.inner.begin()? {
            return Err(ViewerError::CacheRead {
                path: path.to_path_buf(),
                reason: "既に生成が始まっています".to_string(),
            });
        }

        log::info!("[Thumbnail] キャッシュから {} ページを読み込みました", thumbnails.len());
        if thumbnails.is_empty() {
            self.inner.loaded.resolve(LoadOutcome::Completed);
        }
        for (page, thumbnail) in thumbnails.into_iter().enumerate() {
            self.inner.finish_page(page, Ok(thumbnail));
        }
        Ok(())
    }

    /// キャッシュがあれば使い、なければ生成して書き出す
    pub async fn load_or_generate(&self, cache_dir: &Path) -> Result<LoadSource> {
        let path = cache_file_path(cache_dir, self.inner.manga_file.digest());
        match self.load_from_cache(&path).await {
            Ok(()) => return Ok(LoadSource::Cache),
            Err(e) => log::warn!("[Thumbnail] キャッシュを使わずに生成します: {}", e),
        }

        self.load().await?;
        if let Err(e) = self.write_cache(&path).await {
            log::warn!("[Thumbnail] キャッシュを保存できませんでした: {}", e);
        }
        Ok(LoadSource::Generated)
    }

    /// 全ページが揃っていなければ失敗する
    pub async fn write_cache(&self, path: &Path) -> Result<()> {
        let thumbnails: Vec<Thumbnail> = {
            let progress = self.inner.progress.lock().unwrap();
            let complete = self.is_loaded() && progress.data.iter().all(Option::is_some);
            if !complete {
                return Err(ViewerError::CacheWrite {
                    path: path.to_path_buf(),
                    reason: "全ページのサムネイルが揃っていません".to_string(),
                });
            }
            progress.data.iter().flatten().cloned().collect()
        };

        store::write_cache_file(path, &thumbnails).await
    }

    /// 未着手のジョブを捨て、実行中のジョブが終わるのを待つ
    pub async fn finalize(&self) {
        self.inner.progress.lock().unwrap().cancelled = true;
        let dropped = self.inner.queue.clear();
        if dropped > 0 {
            log::info!("[Thumbnail] 未着手の {} ジョブを取り消しました", dropped);
        }
        self.inner.queue.join().await;
        self.inner.loaded.resolve(LoadOutcome::Cancelled);
    }

    pub fn add_finished_page_load_handler<F>(&self, handler: F)
    where
        F: Fn(usize, &Thumbnail) + Send + Sync + 'static,
    {
        let handler: PageHandler = Arc::new(handler);
        let replay: Vec<(usize, Thumbnail)> = {
            let mut progress = self.inner.progress.lock().unwrap();
            progress.handlers.push(handler.clone());
            progress
                .data
                .iter()
                .enumerate()
                .filter_map(|(page, t)| t.clone().map(|t| (page, t)))
                .collect()
        };

        for (page, thumbnail) in replay {
            handler(page, &thumbnail);
        }
    }

    /// 全ページ完了時 (完了済みなら即座) に呼ぶ。取り消された場合は呼ばない。
    pub fn add_finished_load_handler<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.loaded.on_resolved(move |outcome| {
            if outcome == LoadOutcome::Completed {
                handler();
            }
        });
    }

    /// 全ページの完了を待つ。`finalize` で打ち切られたら `Cancelled`。
    pub async fn finished(&self) -> Result<()> {
        match self.inner.loaded.wait().await {
            LoadOutcome::Completed => Ok(()),
            LoadOutcome::Cancelled => Err(ViewerError::Cancelled),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.get() == Some(LoadOutcome::Completed)
    }

    pub fn get_page(&self, page: usize) -> Option<Thumbnail> {
        self.inner.progress.lock().unwrap().data.get(page).cloned().flatten()
    }

    /// 生成に失敗したページ
    pub fn failed_pages(&self) -> Vec<usize> {
        let mut failed = self.inner.progress.lock().unwrap().failed.clone();
        failed.sort_unstable();
        failed
    }

    /// まだ着手されていないジョブ数
    pub fn pending_jobs(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn has_started(&self) -> bool {
        self.inner.progress.lock().unwrap().started
    }
}

impl Inner {
    /// 最初の呼び出しだけ true。finalize 後は `Cancelled`。
    fn begin(&self) -> Result<bool> {
        let mut progress = self.progress.lock().unwrap();
        if progress.cancelled {
            return Err(ViewerError::Cancelled);
        }
        Ok(!std::mem::replace(&mut progress.started, true))
    }

    fn is_cancelled(&self) -> bool {
        self.progress.lock().unwrap().cancelled
    }

    async fn work(&self) {
        while !self.is_cancelled() {
            let Some(page) = self.queue.dequeue() else {
                break;
            };
            let result = self.generate(page).await;
            self.finish_page(page, result);
        }
    }

    async fn generate(&self, page: usize) -> Result<Thumbnail> {
        let image = self.manga_file.get_page_image(page, false).await?;
        let ThumbnailOptions { size, quality, .. } = self.options;
        tokio::task::spawn_blocking(move || store::make_thumbnail(&image, size, quality)).await?
    }

    fn finish_page(&self, page: usize, result: Result<Thumbnail>) {
        // データの格納とハンドラ一覧の取得は同じロック内で行う (後から登録した側への再送と重ならない)
        let delivery = {
            let mut progress = self.progress.lock().unwrap();
            match result {
                Ok(thumbnail) => {
                    progress.data[page] = Some(thumbnail.clone());
                    Some((thumbnail, progress.handlers.clone()))
                }
                Err(e) => {
                    log::error!("[Thumbnail] ページ {} の生成に失敗しました: {}", page, e);
                    progress.failed.push(page);
                    None
                }
            }
        };

        if let Some((thumbnail, handlers)) = delivery {
            for handler in handlers {
                handler(page, &thumbnail);
            }
        }

        // 全体の完了はページ単位の通知を出し終えてから数える
        let all_finished = {
            let mut progress = self.progress.lock().unwrap();
            progress.finished += 1;
            progress.finished == progress.data.len()
        };
        if all_finished {
            log::info!("[Thumbnail] 全 {} ページの生成が完了しました", self.manga_file.len());
            self.loaded.resolve(LoadOutcome::Completed);
        }
    }
}
