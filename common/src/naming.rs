//! 派生URL生成（命名規則）
//!
//! コンテナ・コレクション・ファイル名から object_location / image_small /
//! image_thumb の3つのURLを決定的に生成する。I/Oも時刻も参照しないので、
//! 同じ入力は常に同じURLになる。

use crate::sanitize::{sanitize_file_name, split_extension};
use crate::types::Field;
use serde::{Deserialize, Serialize};

/// 既定のストレージアカウント名
pub const DEFAULT_CONTAINER: &str = "collectionbuilder";

const OBJS_DIR: &str = "objs";
const SMALLS_DIR: &str = "smalls";
const THUMBS_DIR: &str = "thumbs";

const SMALL_SUFFIX: &str = "_SMALL.jpg";
const THUMB_SUFFIX: &str = "_TN.jpg";

/// 命名規則
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConvention {
    /// BLOBストレージのアカウント名
    pub container: String,
    /// コレクション名（空ならパスに含めない）
    #[serde(default)]
    pub collection: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            container: DEFAULT_CONTAINER.to_string(),
            collection: String::new(),
        }
    }
}

impl NamingConvention {
    pub fn new(container: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            collection: collection.into(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("https://{}.blob.core.windows.net", self.container.trim())
    }

    fn url(&self, dir: &str, leaf: &str) -> String {
        let collection = self.collection.trim();
        if collection.is_empty() {
            format!("{}/{}/{}", self.base_url(), dir, leaf)
        } else {
            format!("{}/{}/{}/{}", self.base_url(), dir, collection, leaf)
        }
    }
}

/// 1ファイル分の派生URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeUrls {
    pub object_location: String,
    pub image_small: String,
    pub image_thumb: String,
}

impl DerivativeUrls {
    /// フィールドに対応するURL（派生URL以外は None）
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::ObjectLocation => Some(&self.object_location),
            Field::ImageSmall => Some(&self.image_small),
            Field::ImageThumb => Some(&self.image_thumb),
            Field::ObjectId | Field::ParentId | Field::DisplayTemplate | Field::Filename => None,
        }
    }

    /// URLの最終パスセグメント（例: `doc1_SMALL.jpg`）
    pub fn leaf(&self, field: Field) -> Option<&str> {
        self.get(field)
            .map(|url| url.rsplit('/').next().unwrap_or(url))
    }
}

/// ファイル名から派生URLを生成する
///
/// `file_name` は照合で確定したファイルのベース名。サニタイズ後の名前で
/// object_location を、その語幹で small / thumb を組み立てる。
pub fn synthesize(naming: &NamingConvention, file_name: &str) -> DerivativeUrls {
    let sanitized = sanitize_file_name(file_name);
    let (stem, _) = split_extension(&sanitized);

    DerivativeUrls {
        object_location: naming.url(OBJS_DIR, &sanitized),
        image_small: naming.url(SMALLS_DIR, &format!("{}{}", stem, SMALL_SUFFIX)),
        image_thumb: naming.url(THUMBS_DIR, &format!("{}{}", stem, THUMB_SUFFIX)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_with_collection() {
        let naming = NamingConvention::new("collectionbuilder", "letters");
        let urls = synthesize(&naming, "doc1.tif");

        assert_eq!(
            urls.object_location,
            "https://collectionbuilder.blob.core.windows.net/objs/letters/doc1.tif"
        );
        assert_eq!(
            urls.image_small,
            "https://collectionbuilder.blob.core.windows.net/smalls/letters/doc1_SMALL.jpg"
        );
        assert_eq!(
            urls.image_thumb,
            "https://collectionbuilder.blob.core.windows.net/thumbs/letters/doc1_TN.jpg"
        );
    }

    #[test]
    fn test_synthesize_without_collection() {
        let urls = synthesize(&NamingConvention::default(), "doc1.tif");
        assert_eq!(
            urls.image_small,
            "https://collectionbuilder.blob.core.windows.net/smalls/doc1_SMALL.jpg"
        );
    }

    #[test]
    fn test_synthesize_sanitizes_name() {
        let urls = synthesize(&NamingConvention::default(), "Box 1 - Letter.tif");
        assert!(urls.object_location.ends_with("/objs/Box_1--Letter.tif"));
        assert!(urls.image_thumb.ends_with("/thumbs/Box_1--Letter_TN.jpg"));
    }

    #[test]
    fn test_synthesize_is_pure() {
        let naming = NamingConvention::new("store", "c1");
        assert_eq!(synthesize(&naming, "a.jpg"), synthesize(&naming, "a.jpg"));
    }

    #[test]
    fn test_leaf() {
        let urls = synthesize(&NamingConvention::default(), "doc1.tif");
        assert_eq!(urls.leaf(Field::ImageSmall), Some("doc1_SMALL.jpg"));
        assert_eq!(urls.leaf(Field::ObjectLocation), Some("doc1.tif"));
        assert_eq!(urls.leaf(Field::Filename), None);
    }
}
