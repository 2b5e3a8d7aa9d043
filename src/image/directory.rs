use crate::config::is_supported_image;
use crate::error::{Result, ViewerError};
use crate::image::digest::{compute_digest, SourceKind};
use crate::image::sort_page_names;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// ディレクトリ直下の画像をページとして扱うローダー
pub struct DirectoryLoader {
    path: PathBuf,
    file_names: Vec<String>,
    digest: String,
}

impl DirectoryLoader {
    pub fn open(path: &Path, natural_sort: bool) -> Result<Self> {
        let path = std::path::absolute(path).map_err(|e| ViewerError::source_io(path, e))?;
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| ViewerError::source_io(&path, e))?;

        let mut file_names = Vec::new();
        for entry in WalkDir::new(&path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let err = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walkdir error"));
                ViewerError::source_io(&path, err)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_supported_image(&name) {
                file_names.push(name);
            }
        }
        sort_page_names(&mut file_names, natural_sort);

        let digest = compute_digest(SourceKind::Directory, &path, file_names.len(), modified);
        log::info!("[Directory] {} を開きました: {} ページ", path.display(), file_names.len());

        Ok(Self {
            path,
            file_names,
            digest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_file_names(&self) -> &[String] {
        &self.file_names
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn read_page(&self, index: usize) -> Result<Vec<u8>> {
        let name = self.file_names.get(index).ok_or(ViewerError::InvalidPageIndex {
            page: index,
            len: self.file_names.len(),
        })?;
        let file_path = self.path.join(name);
        std::fs::read(&file_path).map_err(|e| ViewerError::source_io(file_path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::test_support::png_bytes;
    use std::fs;

    #[test]
    fn lists_immediate_image_children_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10.png", "2.png", "1.jpeg", "notes.txt"] {
            fs::write(dir.path().join(name), png_bytes(1, 1)).unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/0.png"), png_bytes(1, 1)).unwrap();

        let loader = DirectoryLoader::open(dir.path(), false).unwrap();
        assert_eq!(loader.get_file_names(), ["1.jpeg", "10.png", "2.png"]);

        let natural = DirectoryLoader::open(dir.path(), true).unwrap();
        assert_eq!(natural.get_file_names(), ["1.jpeg", "2.png", "10.png"]);
    }

    #[test]
    fn reads_page_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = png_bytes(2, 2);
        fs::write(dir.path().join("a.png"), &bytes).unwrap();

        let loader = DirectoryLoader::open(dir.path(), false).unwrap();
        assert_eq!(loader.read_page(0).unwrap(), bytes);
        assert!(matches!(loader.read_page(5), Err(ViewerError::InvalidPageIndex { .. })));
    }

    #[test]
    fn unreadable_directory_is_source_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryLoader::open(&dir.path().join("missing"), false).err().unwrap();
        assert!(matches!(err, ViewerError::SourceIo { .. }));
    }
}
