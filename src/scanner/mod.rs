//! 検索フォルダのスキャン
//!
//! 複数のルートを並列に走査し、正規化パスで重複を除いた上で
//! パスの辞書順に並べた候補ファイル一覧を返す。照合の同点判定は
//! この順序に依存するので、並列化の影響が順序に漏れないようにしている。

use crate::error::{Result, StagerError};
use collection_stager_common::split_extension;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

/// 照合候補のファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// 正規化済みの絶対パス（同一性の基準）
    pub path: PathBuf,
    pub file_name: String,
    /// 拡張子を除いたファイル名
    pub stem: String,
}

impl CandidateFile {
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_string_lossy().to_string();
        let stem = split_extension(&file_name).0.to_string();
        Some(Self { path, file_name, stem })
    }
}

/// 検索フォルダ群をスキャンする
///
/// 存在しない・読めないフォルダは警告を出してスキップする。
/// `cancel` はフォルダ単位でのみ確認する。
pub fn scan_roots(roots: &[PathBuf], cancel: &AtomicBool) -> Result<Vec<CandidateFile>> {
    let per_root: Vec<Option<Vec<CandidateFile>>> = roots
        .par_iter()
        .map(|root| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            Some(scan_root(root))
        })
        .collect();

    if cancel.load(Ordering::Relaxed) || per_root.iter().any(Option::is_none) {
        return Err(StagerError::Cancelled);
    }

    let mut merged: BTreeMap<PathBuf, CandidateFile> = BTreeMap::new();
    for candidate in per_root.into_iter().flatten().flatten() {
        merged.entry(candidate.path.clone()).or_insert(candidate);
    }

    let candidates: Vec<CandidateFile> = merged.into_values().collect();
    tracing::info!(roots = roots.len(), files = candidates.len(), "スキャン完了");
    Ok(candidates)
}

fn scan_root(root: &Path) -> Vec<CandidateFile> {
    if !root.is_dir() {
        tracing::warn!(root = %root.display(), "検索フォルダが見つからないためスキップ");
        return Vec::new();
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "読み込めないエントリをスキップ");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let canonical = match entry.path().canonicalize() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "パスを正規化できないためスキップ");
                continue;
            }
        };

        if let Some(candidate) = CandidateFile::from_path(canonical) {
            files.push(candidate);
        }
    }

    tracing::debug!(root = %root.display(), files = files.len(), "フォルダをスキャン");
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    fn no_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn test_candidate_from_path() {
        let c = CandidateFile::from_path(PathBuf::from("/a/b/doc1.tif")).unwrap();
        assert_eq!(c.file_name, "doc1.tif");
        assert_eq!(c.stem, "doc1");
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let result = scan_roots(&[PathBuf::from("/nonexistent/folder/12345")], &no_cancel()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_scan_recursive_and_sorted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();

        File::create(root.join("c.jpg")).unwrap();
        File::create(root.join("a.jpg")).unwrap();
        File::create(root.join("sub").join("b.tif")).unwrap();

        let result = scan_roots(&[root.to_path_buf()], &no_cancel()).unwrap();
        assert_eq!(result.len(), 3);

        let paths: Vec<&PathBuf> = result.iter().map(|c| &c.path).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn test_overlapping_roots_deduplicated() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        File::create(root.join("nested").join("doc1.tif")).unwrap();

        let roots = vec![root.to_path_buf(), root.join("nested")];
        let result = scan_roots(&roots, &no_cancel()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].file_name, "doc1.tif");
    }

    #[test]
    fn test_cancelled_scan() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cancel = AtomicBool::new(true);
        let result = scan_roots(&[temp_dir.path().to_path_buf()], &cancel);
        assert!(matches!(result, Err(StagerError::Cancelled)));
    }
}
