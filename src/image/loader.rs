use crate::config::Settings;
use crate::error::{Result, ViewerError};
use crate::image::cache::{FetchFuture, Fetcher, Fetching, PageCache};
use crate::image::decoder::{decode_image_from_memory, DecodedImage};
use crate::image::PageSource;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn is_portrait(&self) -> bool {
        self.width < self.height
    }
}

/// 開いているマンガ一冊分。ページの読み出しとデコード済みキャッシュを持つ。
pub struct MangaFile {
    source: Arc<PageSource>,
    cache: PageCache,
}

impl MangaFile {
    pub async fn open(path: &Path, settings: &Settings) -> Result<Self> {
        let path = path.to_path_buf();
        let settings_for_open = settings.clone();
        let source = tokio::task::spawn_blocking(move || PageSource::open(&path, &settings_for_open)).await??;
        Ok(Self::from_source(source, settings.page_cache_capacity))
    }

    pub fn from_source(source: PageSource, cache_capacity: usize) -> Self {
        let source = Arc::new(source);
        let fetcher: Fetcher = {
            let source = source.clone();
            Arc::new(move |page| -> FetchFuture {
                let source = source.clone();
                Box::pin(async move { load_page(source, page).await.map(Arc::new) })
            })
        };

        Self {
            source,
            cache: PageCache::new(cache_capacity, fetcher),
        }
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn digest(&self) -> &str {
        self.source.digest()
    }

    pub fn source(&self) -> &PageSource {
        &self.source
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    fn check_page(&self, page: usize) -> Result<()> {
        if page < self.len() {
            Ok(())
        } else {
            Err(ViewerError::InvalidPageIndex {
                page,
                len: self.len(),
            })
        }
    }

    /// `use_cache` が false ならキャッシュを通さずに直接デコードする
    pub async fn get_page_image(&self, page: usize, use_cache: bool) -> Result<Arc<DecodedImage>> {
        self.check_page(page)?;
        if use_cache {
            return self.cache.get_content(page).await;
        }
        load_page(self.source.clone(), page).await.map(Arc::new)
    }

    pub async fn get_size(&self, page: usize) -> Result<Size> {
        let image = self.get_page_image(page, true).await?;
        Ok(Size {
            width: image.width,
            height: image.height,
        })
    }

    /// 範囲外のページは無視する
    pub fn pre_fetch(&self, page: usize) -> Option<Fetching> {
        if self.check_page(page).is_err() {
            log::debug!("[Loader] 範囲外のページ {} の先読みを無視します", page);
            return None;
        }
        Some(self.cache.pre_fetch(page))
    }

    pub fn finalize(&self) {
        self.cache.clear();
        self.source.finalize();
    }
}

/// バイト列の読み出しとデコードはブロッキングプールで行う
async fn load_page(source: Arc<PageSource>, page: usize) -> Result<DecodedImage> {
    tokio::task::spawn_blocking(move || {
        let bytes = source.read_page_bytes(page)?;
        let decoded = decode_image_from_memory(page, &bytes)?;
        log::debug!("[Loader] ページ {} をデコードしました ({}x{})", page, decoded.width, decoded.height);
        Ok(decoded)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::test_support::page_dir;

    #[tokio::test]
    async fn serves_pages_through_the_cache() {
        let dir = page_dir(&[(4, 6), (6, 4)]);
        let manga = MangaFile::open(dir.path(), &Settings::default()).await.unwrap();
        assert_eq!(manga.len(), 2);
        assert_eq!(manga.digest().len(), 64);

        let a = manga.get_page_image(0, true).await.unwrap();
        let b = manga.get_page_image(0, true).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manga.get_size(1).await.unwrap(), Size { width: 6, height: 4 });
        assert!(!manga.get_size(1).await.unwrap().is_portrait());

        // キャッシュを通さない場合は別の実体
        let c = manga.get_page_image(0, false).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(*a, *c);
    }

    #[tokio::test]
    async fn rejects_out_of_range_pages() {
        let dir = page_dir(&[(1, 1)]);
        let manga = MangaFile::open(dir.path(), &Settings::default()).await.unwrap();
        assert!(matches!(
            manga.get_page_image(1, true).await,
            Err(ViewerError::InvalidPageIndex { page: 1, len: 1 })
        ));
        assert!(manga.pre_fetch(1).is_none());
        assert!(manga.cache().is_empty());
    }

    #[tokio::test]
    async fn corrupt_page_fails_without_affecting_siblings() {
        let dir = page_dir(&[(2, 3), (2, 3)]);
        std::fs::write(dir.path().join("001.png"), b"garbage").unwrap();
        let manga = MangaFile::open(dir.path(), &Settings::default()).await.unwrap();

        assert!(matches!(
            manga.get_page_image(1, true).await,
            Err(ViewerError::Decode { page: 1, .. })
        ));
        assert!(manga.get_page_image(0, true).await.is_ok());
    }

    #[tokio::test]
    async fn finalize_drops_cached_pages() {
        let dir = page_dir(&[(1, 1), (1, 1)]);
        let manga = MangaFile::open(dir.path(), &Settings::default()).await.unwrap();
        manga.pre_fetch(0).unwrap().wait().await.unwrap();
        assert_eq!(manga.cache().len(), 1);

        manga.finalize();
        assert!(manga.cache().is_empty());
    }
}
