//! サムネイル画像の生成と、キャッシュファイルへの保存・読み込み。
//!
//! キャッシュファイルは `Vec<Thumbnail>` を MessagePack にしたもので、
//! ページ順に1ページ1要素を持つ。

use crate::error::{Result, ViewerError};
use crate::image::decoder::DecodedImage;
use crate::image::loader::Size;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    #[serde(rename = "originalSize")]
    pub original_size: Size,
    /// JPEG
    #[serde(with = "serde_bytes")]
    pub image: Vec<u8>,
}

/// `<cache_dir>/<digest>.cache`
pub fn cache_file_path(cache_dir: &Path, digest: &str) -> PathBuf {
    cache_dir.join(format!("{}.cache", digest))
}

/// 長辺が `size` になるよう縦横比を保って縮小 (拡大) した寸法
pub fn fit_within(width: u32, height: u32, size: u32) -> (u32, u32) {
    let scaled = |short: u32, long: u32| -> u32 {
        ((size as f64 * short as f64 / long as f64).round() as u32).max(1)
    };
    if height < width {
        (size, scaled(height, width))
    } else {
        (scaled(width, height), size)
    }
}

pub fn make_thumbnail(image: &DecodedImage, size: u32, quality: u8) -> Result<Thumbnail> {
    let (w, h) = fit_within(image.width, image.height, size);
    let resized = imageops::resize(&image.pixels, w, h, FilterType::Lanczos3);
    // JPEG はアルファを持てない
    let rgb = DynamicImage::ImageRgba8(resized).to_rgb8();

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| ViewerError::Encode(Arc::new(e)))?;

    Ok(Thumbnail {
        original_size: Size {
            width: image.width,
            height: image.height,
        },
        image: buf,
    })
}

pub async fn read_cache_file(path: &Path) -> Result<Vec<Thumbnail>> {
    let cache_read = |reason: String| ViewerError::CacheRead {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = tokio::fs::read(path).await.map_err(|e| cache_read(e.to_string()))?;
    rmp_serde::from_slice(&bytes).map_err(|e| cache_read(e.to_string()))
}

/// 一時ファイルに書いてから置き換えるので、途中で失敗しても壊れたファイルは残らない
pub async fn write_cache_file(path: &Path, thumbnails: &[Thumbnail]) -> Result<()> {
    let cache_write = |reason: String| ViewerError::CacheWrite {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = rmp_serde::to_vec_named(thumbnails).map_err(|e| cache_write(e.to_string()))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| cache_write(e.to_string()))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &bytes).await.map_err(|e| cache_write(e.to_string()))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(cache_write(e.to_string()));
    }

    log::info!("[Thumbnail] キャッシュを書き込みました: {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
