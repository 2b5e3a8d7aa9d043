//! ビューア全体で共通のエラー型。
//!
//! キャッシュの待機者全員に同じエラーを配るため `Clone` にしている。
//! `Clone` でない下位エラーは `Arc` で包む。

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ViewerError {
    /// 範囲外のページ番号。呼び出し側のバグ。
    #[error("無効なページ番号: {page} (全 {len} ページ)")]
    InvalidPageIndex { page: usize, len: usize },

    #[error("ソースを読み込めません: {}: {source}", path.display())]
    SourceIo {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("対応していないソースです: {}", .0.display())]
    UnsupportedSource(PathBuf),

    #[error("アーカイブエラー: {0}")]
    Archive(#[source] Arc<zip::result::ZipError>),

    #[error("ソースは既に閉じられています")]
    SourceClosed,

    #[error("ページ {page} のデコードに失敗しました: {source}")]
    Decode {
        page: usize,
        #[source]
        source: Arc<image::ImageError>,
    },

    #[error("画像のエンコードに失敗しました: {0}")]
    Encode(#[source] Arc<image::ImageError>),

    #[error("サムネイルキャッシュを読み込めません: {}: {reason}", path.display())]
    CacheRead { path: PathBuf, reason: String },

    #[error("サムネイルキャッシュを書き込めません: {}: {reason}", path.display())]
    CacheWrite { path: PathBuf, reason: String },

    #[error("描画先を取得できません: {0}")]
    ContextUnavailable(String),

    #[error("選択範囲が空です")]
    EmptySelection,

    #[error("処理は取り消されました")]
    Cancelled,

    #[error("バックグラウンドタスクが異常終了しました: {0}")]
    Join(String),
}

impl ViewerError {
    pub fn source_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        ViewerError::SourceIo {
            path: path.into(),
            source: Arc::new(err),
        }
    }

    pub fn decode(page: usize, err: image::ImageError) -> Self {
        ViewerError::Decode {
            page,
            source: Arc::new(err),
        }
    }
}

impl From<zip::result::ZipError> for ViewerError {
    fn from(err: zip::result::ZipError) -> Self {
        ViewerError::Archive(Arc::new(err))
    }
}

impl From<tokio::task::JoinError> for ViewerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ViewerError::Join(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
