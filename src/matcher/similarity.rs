//! ファイル名の類似度
//!
//! 小文字化したファイル名同士と語幹同士の正規化レーベンシュタイン類似度の
//! 大きい方をスコアとする（0.0〜1.0）。

use collection_stager_common::split_extension;

/// 比較用に小文字化したファイル名と語幹
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameKey {
    pub name: String,
    pub stem: String,
}

impl NameKey {
    /// パス区切りを含む値は最後の要素だけを使う
    pub fn new(file_name: &str) -> Self {
        let base = file_name
            .trim()
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        let stem = split_extension(&base).0.to_string();
        Self { name: base, stem }
    }
}

pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b)
}

pub fn score(row: &NameKey, candidate: &NameKey) -> f64 {
    similarity(&row.name, &candidate.name).max(similarity(&row.stem, &candidate.stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_key() {
        let key = NameKey::new("Scans/DOC1.TIF");
        assert_eq!(key.name, "doc1.tif");
        assert_eq!(key.stem, "doc1");
    }

    #[test]
    fn test_identical_names() {
        assert!((score(&NameKey::new("doc1.tif"), &NameKey::new("doc1.tif")) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_stem_match_ignores_extension() {
        let s = score(&NameKey::new("doc1.tif"), &NameKey::new("DOC1.jpg"));
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_similar_but_distinct() {
        let s = score(&NameKey::new("doc1.tif"), &NameKey::new("doc2.tif"));
        assert!(s < 0.90);
        assert!(s > 0.5);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(similarity("", "abc"), 0.0);
    }
}
