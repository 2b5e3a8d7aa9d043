//! ソースの同一性を表すダイジェスト。サムネイルキャッシュのファイル名に使う。

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Zip,
    Directory,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Zip => "zip",
            SourceKind::Directory => "directory",
        }
    }
}

// フィールド順がそのままハッシュ対象の JSON になる
#[derive(Serialize)]
struct DigestRecord<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    path: &'a str,
    length: usize,
    #[serde(rename = "lastUpdated")]
    last_updated: String,
}

/// `{type, path, length, lastUpdated}` の JSON を SHA-256 した16進文字列
pub fn compute_digest(kind: SourceKind, path: &Path, length: usize, modified: SystemTime) -> String {
    let last_updated = DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Millis, true);
    let path = path.to_string_lossy();
    let record = DigestRecord {
        kind: kind.as_str(),
        path: &path,
        length,
        last_updated,
    };

    // 文字列と整数だけなので直列化は失敗しない
    let json = serde_json::to_string(&record).unwrap_or_default();
    format!("{:x}", Sha256::digest(json.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(secs * 1000 + 250)
    }

    #[test]
    fn digest_is_sha256_of_json_record() {
        let digest = compute_digest(SourceKind::Zip, Path::new("/books/a.zip"), 12, at(0));
        let expected_json =
            r#"{"type":"zip","path":"/books/a.zip","length":12,"lastUpdated":"1970-01-01T00:00:00.250Z"}"#;
        assert_eq!(digest, format!("{:x}", Sha256::digest(expected_json.as_bytes())));
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn digest_changes_with_each_field() {
        let base = compute_digest(SourceKind::Directory, Path::new("/b"), 3, at(10));
        assert_eq!(base, compute_digest(SourceKind::Directory, Path::new("/b"), 3, at(10)));
        assert_ne!(base, compute_digest(SourceKind::Zip, Path::new("/b"), 3, at(10)));
        assert_ne!(base, compute_digest(SourceKind::Directory, Path::new("/c"), 3, at(10)));
        assert_ne!(base, compute_digest(SourceKind::Directory, Path::new("/b"), 4, at(10)));
        assert_ne!(base, compute_digest(SourceKind::Directory, Path::new("/b"), 3, at(11)));
    }
}
