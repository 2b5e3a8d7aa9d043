use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// ページとして扱う画像の拡張子
pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 4] = ["png", "webp", "jpg", "jpeg"];

/// アーカイブとして開く拡張子
pub const SUPPORTED_ARCHIVE_EXTENSIONS: [&str; 2] = ["zip", "cbz"];

const APP_DIR_NAME: &str = "hayate-reader";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// デコード済みページを保持する最大数
    pub page_cache_capacity: usize,
    /// 移動先より前に先読みするページ数
    pub prefetch_behind: usize,
    /// 移動先から先読みするページ数 (移動先を含む)
    pub prefetch_ahead: usize,
    pub thumbnail_workers: usize,
    pub thumbnail_size: u32,
    pub thumbnail_quality: u8,
    /// true なら natord の自然順、false なら名前のバイト順
    pub natural_sort: bool,
    /// サムネイルキャッシュの保存先 (未指定なら OS のキャッシュディレクトリ)
    pub thumbnail_cache_dir: Option<PathBuf>,
    pub capture_output: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_cache_capacity: 10,
            prefetch_behind: 2,
            prefetch_ahead: 5,
            thumbnail_workers: 4,
            thumbnail_size: 300,
            thumbnail_quality: 85,
            natural_sort: false,
            thumbnail_cache_dir: None,
            capture_output: PathBuf::from("capture.png"),
        }
    }
}

impl Settings {
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        if let Ok(content) = fs::read_to_string(&path) {
            match serde_json::from_str(&content) {
                Ok(settings) => return settings,
                Err(e) => log::warn!(
                    "[Config] {} を解釈できません。既定値を使います: {}",
                    path.as_ref().display(),
                    e
                ),
            }
        }
        Self::default()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    /// サムネイルキャッシュのディレクトリ
    pub fn thumbnail_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.thumbnail_cache_dir {
            return dir.clone();
        }

        let mut path = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(std::env::temp_dir);
        path.push(APP_DIR_NAME);
        path.push("thumbnails");
        path
    }
}

pub fn is_supported_image(name: &str) -> bool {
    has_extension(name, &SUPPORTED_IMAGE_EXTENSIONS)
}

pub fn is_supported_archive(path: &Path) -> bool {
    path.to_str()
        .map(|s| has_extension(s, &SUPPORTED_ARCHIVE_EXTENSIONS))
        .unwrap_or(false)
}

fn has_extension(name: &str, allowed: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| allowed.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
