pub mod archive;
pub mod cache;
pub mod decoder;
pub mod digest;
pub mod directory;
pub mod loader;

use crate::config::{is_supported_archive, Settings};
use crate::error::{Result, ViewerError};
use crate::image::archive::ArchiveLoader;
use crate::image::digest::SourceKind;
use crate::image::directory::DirectoryLoader;
use std::path::Path;

/// ページの読み出し元。zip アーカイブかディレクトリのどちらか。
pub enum PageSource {
    Archive(ArchiveLoader),
    Directory(DirectoryLoader),
}

impl PageSource {
    /// パスの種類に応じてローダーを選び、ページ一覧を作る
    pub fn open(path: &Path, settings: &Settings) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self::Directory(DirectoryLoader::open(path, settings.natural_sort)?));
        }
        if is_supported_archive(path) {
            return Ok(Self::Archive(ArchiveLoader::open(path, settings.natural_sort)?));
        }
        if !path.exists() {
            return Err(ViewerError::source_io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            ));
        }
        Err(ViewerError::UnsupportedSource(path.to_path_buf()))
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Archive(_) => SourceKind::Zip,
            Self::Directory(_) => SourceKind::Directory,
        }
    }

    pub fn len(&self) -> usize {
        self.page_names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Archive(a) => a.path(),
            Self::Directory(d) => d.path(),
        }
    }

    pub fn page_names(&self) -> &[String] {
        match self {
            Self::Archive(a) => a.get_file_names(),
            Self::Directory(d) => d.get_file_names(),
        }
    }

    pub fn digest(&self) -> &str {
        match self {
            Self::Archive(a) => a.digest(),
            Self::Directory(d) => d.digest(),
        }
    }

    /// ページの生バイト列を読む (ブロッキング)
    pub fn read_page_bytes(&self, page: usize) -> Result<Vec<u8>> {
        match self {
            Self::Archive(a) => a.read_page(page),
            Self::Directory(d) => d.read_page(page),
        }
    }

    pub fn finalize(&self) {
        match self {
            Self::Archive(a) => a.finalize(),
            // ディレクトリは開きっぱなしのハンドルを持たない
            Self::Directory(_) => {}
        }
    }
}

pub(crate) fn sort_page_names(names: &mut [String], natural: bool) {
    if natural {
        names.sort_by(|a, b| natord::compare(a, b));
    } else {
        names.sort();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::{Cursor, Write};
    use std::path::Path;

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 128, 255])
        });
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    pub fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, data) in entries {
            zip.start_file(*name, zip::write::FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    /// (幅, 高さ) の並びからページ画像を持つディレクトリを作る
    pub fn page_dir(sizes: &[(u32, u32)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (i, (w, h)) in sizes.iter().enumerate() {
            std::fs::write(dir.path().join(format!("{:03}.png", i)), png_bytes(*w, *h)).unwrap();
        }
        dir
    }
}
