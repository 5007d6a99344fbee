//! メタデータ表の型定義
//!
//! - Field: 照合・伝播で参照する既知カラム
//! - DisplayTemplate: display_template の閉じたタグ
//! - MetadataRow / RowSet: 行順を明示的なインデックスとして保持する表
//!
//! 空文字と欠損値（`nan` など上流ツールが出力する表現）は取り込み時に
//! 一つの空値 `""` へ正規化する。以降の処理は `is_empty()` だけで判定する。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 欠損値として扱うトークン（既知カラムのみ）
const NULL_TOKENS: &[&str] = &["nan", "NaN", "None", "null", "NULL"];

/// 既知カラム
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ObjectId,
    ParentId,
    DisplayTemplate,
    Filename,
    ObjectLocation,
    ImageSmall,
    ImageThumb,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::ObjectId,
        Field::ParentId,
        Field::DisplayTemplate,
        Field::Filename,
        Field::ObjectLocation,
        Field::ImageSmall,
        Field::ImageThumb,
    ];

    /// 照合で生成される派生URLカラム
    pub const DERIVATIVES: [Field; 3] = [Field::ObjectLocation, Field::ImageSmall, Field::ImageThumb];

    /// 親へ伝播されるカラム（object_location は伝播しない）
    pub const PROPAGATED: [Field; 2] = [Field::ImageSmall, Field::ImageThumb];

    /// CSV上のカラム名
    pub fn column_name(&self) -> &'static str {
        match self {
            Field::ObjectId => "objectid",
            Field::ParentId => "parentid",
            Field::DisplayTemplate => "display_template",
            Field::Filename => "filename",
            Field::ObjectLocation => "object_location",
            Field::ImageSmall => "image_small",
            Field::ImageThumb => "image_thumb",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column_name() == name)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column_name())
    }
}

/// display_template の値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayTemplate {
    Standalone,
    CompoundObject,
    Multiple,
    /// image / pdf / video / record など、照合上は単独オブジェクトと同じ扱い
    Other(String),
}

impl DisplayTemplate {
    /// 前後空白を除き、大文字小文字を区別せずに解釈する
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_lowercase().as_str() {
            "standalone" => DisplayTemplate::Standalone,
            "compound_object" => DisplayTemplate::CompoundObject,
            "multiple" => DisplayTemplate::Multiple,
            _ => DisplayTemplate::Other(trimmed.to_string()),
        }
    }

    /// 複合オブジェクト（compound_object / multiple）か
    pub fn is_compound(&self) -> bool {
        match self {
            DisplayTemplate::CompoundObject | DisplayTemplate::Multiple => true,
            DisplayTemplate::Standalone | DisplayTemplate::Other(_) => false,
        }
    }
}

impl std::fmt::Display for DisplayTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayTemplate::Standalone => write!(f, "standalone"),
            DisplayTemplate::CompoundObject => write!(f, "compound_object"),
            DisplayTemplate::Multiple => write!(f, "multiple"),
            DisplayTemplate::Other(s) => write!(f, "{}", s),
        }
    }
}

/// メタデータ表の1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRow {
    /// 元ファイル上の行位置（データ行、0始まり）。先着・先頭子の判定はこの値で行う
    pub index: usize,
    cells: Vec<String>,
}

impl MetadataRow {
    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

/// カラム定義と全行
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
    rows: Vec<MetadataRow>,
}

impl RowSet {
    /// 取り込み境界: 短い行を空セルで埋め、既知カラムの欠損表現を空値に正規化する
    pub fn new(columns: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let positions: HashMap<String, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .rev()
            .collect();

        let known: Vec<bool> = columns
            .iter()
            .map(|name| Field::from_column_name(name).is_some())
            .collect();

        let rows = records
            .into_iter()
            .enumerate()
            .map(|(index, mut cells)| {
                cells.resize(columns.len(), String::new());
                for (cell, is_known) in cells.iter_mut().zip(&known) {
                    if *is_known && is_missing(cell) {
                        cell.clear();
                    }
                }
                MetadataRow { index, cells }
            })
            .collect();

        Self { columns, positions, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, field: Field) -> bool {
        self.positions.contains_key(field.column_name())
    }

    pub fn rows(&self) -> &[MetadataRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 行インデックスとフィールドから値を取得（カラムが無ければ空値）
    pub fn get(&self, row: usize, field: Field) -> &str {
        match (self.rows.get(row), self.positions.get(field.column_name())) {
            (Some(r), Some(&col)) => r.cells[col].as_str(),
            _ => "",
        }
    }

    /// 値を設定する。カラムが存在しない場合は false
    pub fn set(&mut self, row: usize, field: Field, value: &str) -> bool {
        let Some(&col) = self.positions.get(field.column_name()) else {
            return false;
        };
        match self.rows.get_mut(row) {
            Some(r) => {
                r.cells[col] = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn display_template(&self, row: usize) -> DisplayTemplate {
        DisplayTemplate::parse(self.get(row, Field::DisplayTemplate))
    }

    /// 書き出し用に行をセル列として返す（元の行順・カラム順）
    pub fn records(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(|r| r.cells.as_slice())
    }
}

fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || NULL_TOKENS.contains(&trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_display_template_parse() {
        assert_eq!(DisplayTemplate::parse("standalone"), DisplayTemplate::Standalone);
        assert_eq!(DisplayTemplate::parse(" Compound_Object "), DisplayTemplate::CompoundObject);
        assert_eq!(DisplayTemplate::parse("multiple"), DisplayTemplate::Multiple);
        assert_eq!(DisplayTemplate::parse("image"), DisplayTemplate::Other("image".into()));
        assert!(DisplayTemplate::parse("multiple").is_compound());
        assert!(!DisplayTemplate::parse("").is_compound());
    }

    #[test]
    fn test_missing_values_normalized_in_known_columns_only() {
        let rows = RowSet::new(
            strings(&["objectid", "image_small", "notes"]),
            vec![strings(&["doc1", "nan", "nan"]), strings(&["doc2", "  ", " keep "])],
        );

        assert_eq!(rows.get(0, Field::ImageSmall), "");
        assert_eq!(rows.records().next().unwrap()[2], "nan");
        assert_eq!(rows.get(1, Field::ImageSmall), "");
        assert_eq!(rows.records().nth(1).unwrap()[2], " keep ");
    }

    #[test]
    fn test_short_records_are_padded() {
        let rows = RowSet::new(strings(&["objectid", "filename", "image_thumb"]), vec![strings(&["a"])]);
        assert_eq!(rows.records().next().unwrap().len(), 3);
        assert_eq!(rows.get(0, Field::ImageThumb), "");
    }

    #[test]
    fn test_set_on_missing_column() {
        let mut rows = RowSet::new(strings(&["objectid"]), vec![strings(&["a"])]);
        assert!(!rows.set(0, Field::ImageSmall, "x"));
        assert!(rows.set(0, Field::ObjectId, "b"));
        assert_eq!(rows.get(0, Field::ObjectId), "b");
    }

    #[test]
    fn test_row_index_is_original_position() {
        let rows = RowSet::new(strings(&["objectid"]), vec![strings(&["a"]), strings(&["b"])]);
        let indices: Vec<usize> = rows.rows().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }
}
