use crate::config::is_supported_image;
use crate::error::{Result, ViewerError};
use crate::image::digest::{compute_digest, SourceKind};
use crate::image::sort_page_names;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zip::ZipArchive;

// ヘッダのサイズ値は信用できないので、先に確保するのはこの大きさまで
const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

fn initial_capacity(declared_size: u64) -> usize {
    usize::try_from(declared_size).unwrap_or(usize::MAX).min(MAX_PREALLOCATION)
}

/// zip / cbz アーカイブのページローダー
pub struct ArchiveLoader {
    path: PathBuf,
    // finalize 後は None
    archive: Mutex<Option<ZipArchive<File>>>,
    file_names: Vec<String>,
    digest: String,
}

impl ArchiveLoader {
    pub fn open(path: &Path, natural_sort: bool) -> Result<Self> {
        let path = std::path::absolute(path).map_err(|e| ViewerError::source_io(path, e))?;
        let file = File::open(&path).map_err(|e| ViewerError::source_io(&path, e))?;
        let modified = file
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| ViewerError::source_io(&path, e))?;
        let mut archive = ZipArchive::new(file)?;

        let mut file_names = Vec::new();
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            if entry.is_file() && is_supported_image(entry.name()) {
                file_names.push(entry.name().to_string());
            }
        }
        sort_page_names(&mut file_names, natural_sort);

        let digest = compute_digest(SourceKind::Zip, &path, file_names.len(), modified);
        log::info!("[Archive] {} を開きました: {} ページ", path.display(), file_names.len());

        Ok(Self {
            path,
            archive: Mutex::new(Some(archive)),
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

        let mut guard = self.archive.lock().unwrap();
        let archive = guard.as_mut().ok_or(ViewerError::SourceClosed)?;
        let mut entry = archive.by_name(name)?;
        let mut buffer = Vec::with_capacity(initial_capacity(entry.size()));
        entry
            .read_to_end(&mut buffer)
            .map_err(|e| ViewerError::source_io(&self.path, e))?;
        Ok(buffer)
    }

    /// ファイルハンドルを解放する。二度目以降は何もしない。
    pub fn finalize(&self) {
        if self.archive.lock().unwrap().take().is_some() {
            log::debug!("[Archive] {} を閉じました", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::test_support::{png_bytes, write_zip};

    #[test]
    fn lists_only_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.zip");
        write_zip(
            &path,
            &[
                ("b/010.png", png_bytes(2, 3)),
                ("readme.txt", b"hello".to_vec()),
                ("a/002.JPG", png_bytes(2, 3)),
                ("a/001.webp", png_bytes(2, 3)),
                ("b/009.gif", png_bytes(2, 3)),
            ],
        );

        let loader = ArchiveLoader::open(&path, false).unwrap();
        assert_eq!(loader.get_file_names(), ["a/001.webp", "a/002.JPG", "b/010.png"]);
        assert!(loader.path().is_absolute());
    }

    #[test]
    fn reads_entry_bytes_and_rejects_bad_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.cbz");
        let page = png_bytes(4, 4);
        write_zip(&path, &[("1.png", page.clone())]);

        let loader = ArchiveLoader::open(&path, false).unwrap();
        assert_eq!(loader.read_page(0).unwrap(), page);
        assert!(matches!(
            loader.read_page(1),
            Err(ViewerError::InvalidPageIndex { page: 1, len: 1 })
        ));
    }

    #[test]
    fn declared_entry_size_does_not_drive_allocation() {
        assert_eq!(initial_capacity(1234), 1234);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOCATION);
        assert_eq!(initial_capacity(8 * 1024 * 1024 * 1024), MAX_PREALLOCATION);
    }

    #[test]
    fn finalize_is_idempotent_and_closes_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.zip");
        write_zip(&path, &[("1.png", png_bytes(1, 1))]);

        let loader = ArchiveLoader::open(&path, false).unwrap();
        loader.finalize();
        loader.finalize();
        assert!(matches!(loader.read_page(0), Err(ViewerError::SourceClosed)));
    }

    #[test]
    fn missing_file_is_source_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveLoader::open(&dir.path().join("nope.zip"), false).err().unwrap();
        assert!(matches!(err, ViewerError::SourceIo { .. }));
    }
}
