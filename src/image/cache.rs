//! デコード済みページのキャッシュ。
//!
//! 同じページへの要求は一つのデコードにまとめ、保持数を超えたら
//! 最後に触れてから最も時間が経ったスロットを捨てる。
//! デコード中のスロットも完了済みと同じ優先度で追い出し対象になる。
//! 追い出してもデコード自体は止めず、既に待っている側には結果が届く。

use crate::error::Result;
use crate::image::decoder::DecodedImage;
use crate::sync::OneShot;
use lru::LruCache;
use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

pub type FetchResult = Result<Arc<DecodedImage>>;

pub type FetchFuture = Pin<Box<dyn Future<Output = FetchResult> + Send>>;

/// ページ番号からデコード処理を作る関数
pub type Fetcher = Arc<dyn Fn(usize) -> FetchFuture + Send + Sync>;

pub const DEFAULT_CAPACITY: usize = 10;

/// 一つのページに対するデコード処理 (実行中または完了済み)
#[derive(Clone)]
pub struct Fetching {
    shot: Arc<OneShot<FetchResult>>,
}

impl Fetching {
    fn start(page: usize, future: FetchFuture) -> Self {
        let shot = Arc::new(OneShot::new());
        let fetching = Self { shot: shot.clone() };
        tokio::spawn(async move {
            let result = future.await;
            if let Err(e) = &result {
                log::warn!("[Cache] ページ {} の取得に失敗しました: {}", page, e);
            }
            shot.resolve(result);
        });
        fetching
    }

    /// 完了していれば結果を返す
    pub fn result(&self) -> Option<FetchResult> {
        self.shot.get()
    }

    pub fn is_finished(&self) -> bool {
        self.shot.is_resolved()
    }

    pub async fn wait(&self) -> FetchResult {
        self.shot.wait().await
    }

    /// 完了時 (完了済みなら即座) に呼ばれるハンドラを登録する
    pub fn add_finish_handler<F>(&self, handler: F)
    where
        F: FnOnce(FetchResult) + Send + 'static,
    {
        self.shot.on_resolved(handler);
    }
}

pub struct PageCache {
    slots: Mutex<LruCache<usize, Fetching>>,
    fetcher: Fetcher,
}

impl PageCache {
    pub fn new(capacity: usize, fetcher: Fetcher) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
            fetcher,
        }
    }

    /// デコードを開始 (または既存のものに合流) してハンドルを返す。
    /// tokio ランタイム上で呼ぶこと。
    pub fn pre_fetch(&self, page: usize) -> Fetching {
        let mut slots = self.slots.lock().unwrap();
        // get は LRU 上の位置を最新にする
        if let Some(fetching) = slots.get(&page) {
            return fetching.clone();
        }

        let fetching = Fetching::start(page, (self.fetcher)(page));
        if let Some((evicted, _)) = slots.push(page, fetching.clone()) {
            log::debug!("[Cache] ページ {} を追い出しました (ページ {} を追加)", evicted, page);
        }
        fetching
    }

    pub async fn get_content(&self, page: usize) -> FetchResult {
        let fetching = self.pre_fetch(page);
        if let Some(result) = fetching.result() {
            return result;
        }
        fetching.wait().await
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// LRU 上の位置を変えずに存在を確認する
    pub fn contains(&self, page: usize) -> bool {
        self.slots.lock().unwrap().contains(&page)
    }

    /// 保持中のページ番号 (古い順)
    pub fn resident_pages(&self) -> Vec<usize> {
        self.slots.lock().unwrap().iter().rev().map(|(page, _)| *page).collect()
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap().clear();
    }
}
