//! 複合オブジェクトへの派生URL伝播
//!
//! 照合結果の反映がすべて終わった後に実行する。親（parentid が空の複合オブジェクト行）の
//! 空の image_small / image_thumb を、元の行順で最初の子からコピーする。
//! 親に既に値がある場合は学芸員が設定した画像とみなし、決して上書きしない。
//! object_location は伝播しない。

use crate::audit::{AuditEntry, AuditLog, Decision, Phase};
use crate::error::{Result, StagerError};
use collection_stager_common::{DisplayTemplate, Field, RowSet};
use std::collections::HashMap;

/// 伝播の統計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// 対象になった親の数
    pub parents_seen: usize,
    /// 1フィールド以上コピーした親の数
    pub parents_updated: usize,
    pub fields_filled: usize,
}

/// parentid → 子の行インデックス（元の行順）
pub fn child_index(rows: &RowSet) -> HashMap<&str, Vec<usize>> {
    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    for row in rows.rows() {
        let parent = rows.get(row.index, Field::ParentId);
        if !parent.is_empty() {
            children.entry(parent).or_default().push(row.index);
        }
    }
    children
}

fn is_parent_candidate(rows: &RowSet, row: usize) -> bool {
    if !rows.get(row, Field::ParentId).is_empty() {
        return false;
    }
    match rows.display_template(row) {
        DisplayTemplate::CompoundObject | DisplayTemplate::Multiple => true,
        DisplayTemplate::Standalone | DisplayTemplate::Other(_) => false,
    }
}

/// 先頭の子から親へ派生URLを伝播する
///
/// objectid / parentid カラムが無い場合は何も変更せず `StagerError::Configuration` を返す。
pub fn propagate(rows: &mut RowSet, audit: &mut AuditLog) -> Result<PropagationStats> {
    let missing: Vec<&str> = [Field::ObjectId, Field::ParentId]
        .into_iter()
        .filter(|&f| !rows.has_column(f))
        .map(|f| f.column_name())
        .collect();
    if !missing.is_empty() {
        return Err(StagerError::Configuration(format!(
            "必須カラムがありません: {}（親子の伝播をスキップ）",
            missing.join(", ")
        )));
    }

    let fields: Vec<Field> = Field::PROPAGATED
        .into_iter()
        .filter(|&f| rows.has_column(f))
        .collect();

    let parents: Vec<usize> = (0..rows.len())
        .filter(|&i| is_parent_candidate(rows, i))
        .collect();

    // 親ごとの書き込み内容を先に確定させる
    let mut plan: Vec<(usize, Vec<(Field, String)>)> = Vec::new();
    let mut stats = PropagationStats::default();
    {
        let children = child_index(rows);

        for &parent in &parents {
            let objectid = rows.get(parent, Field::ObjectId);
            if objectid.is_empty() {
                tracing::warn!(row = parent, "親の objectid が空のためスキップ");
                audit.record(AuditEntry {
                    phase: Phase::Propagate,
                    row: parent,
                    objectid: String::new(),
                    field: None,
                    decision: Decision::SkipParent,
                    reason: "objectid が空".into(),
                });
                continue;
            }

            stats.parents_seen += 1;

            let Some(&first_child) = children.get(objectid).and_then(|c| c.first()) else {
                audit.record(AuditEntry {
                    phase: Phase::Propagate,
                    row: parent,
                    objectid: objectid.to_string(),
                    field: None,
                    decision: Decision::NoChildren,
                    reason: "子レコードなし".into(),
                });
                continue;
            };

            let mut writes = Vec::new();
            for &field in &fields {
                let parent_value = rows.get(parent, field);
                let child_value = rows.get(first_child, field);

                let (decision, reason) = if !parent_value.is_empty() {
                    (Decision::KeepParent, format!("既存値 {} を保持", parent_value))
                } else if child_value.is_empty() {
                    (Decision::NoChildValue, format!("先頭の子（行 {}）の値が空", first_child))
                } else {
                    writes.push((field, child_value.to_string()));
                    (
                        Decision::FillFromChild,
                        format!("先頭の子（行 {}）から {} をコピー", first_child, child_value),
                    )
                };

                audit.record(AuditEntry {
                    phase: Phase::Propagate,
                    row: parent,
                    objectid: objectid.to_string(),
                    field: Some(field),
                    decision,
                    reason,
                });
            }

            if !writes.is_empty() {
                plan.push((parent, writes));
            }
        }
    }

    for (parent, writes) in plan {
        stats.parents_updated += 1;
        for (field, value) in writes {
            rows.set(parent, field, &value);
            stats.fields_filled += 1;
        }
    }

    tracing::info!(
        parents = stats.parents_seen,
        updated = stats.parents_updated,
        fields = stats.fields_filled,
        "親子の伝播完了"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> RowSet {
        RowSet::new(
            columns.iter().map(|s| s.to_string()).collect(),
            rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
        )
    }

    const COLUMNS: &[&str] = &["objectid", "parentid", "display_template", "image_small", "image_thumb"];

    #[test]
    fn test_first_child_wins() {
        let mut rows = table(
            COLUMNS,
            &[
                &["album_01", "", "compound_object", "", ""],
                &["p2", "album_01", "image", "X", "XT"],
                &["p1", "album_01", "image", "Y", "YT"],
            ],
        );
        let mut audit = AuditLog::new();
        let stats = propagate(&mut rows, &mut audit).unwrap();

        assert_eq!(rows.get(0, Field::ImageSmall), "X");
        assert_eq!(rows.get(0, Field::ImageThumb), "XT");
        assert_eq!(stats.parents_updated, 1);
        assert_eq!(stats.fields_filled, 2);
        assert_eq!(audit.count(Decision::FillFromChild), 2);
    }

    #[test]
    fn test_existing_parent_value_kept() {
        let mut rows = table(
            COLUMNS,
            &[
                &["album_01", "", "multiple", "custom.jpg", ""],
                &["c1", "album_01", "image", "X", "XT"],
            ],
        );
        let mut audit = AuditLog::new();
        propagate(&mut rows, &mut audit).unwrap();

        assert_eq!(rows.get(0, Field::ImageSmall), "custom.jpg");
        assert_eq!(rows.get(0, Field::ImageThumb), "XT");
        assert_eq!(audit.count(Decision::KeepParent), 1);
    }

    #[test]
    fn test_object_location_never_propagated() {
        let mut rows = table(
            &["objectid", "parentid", "display_template", "object_location", "image_small"],
            &[
                &["album_01", "", "compound_object", "", ""],
                &["c1", "album_01", "image", "https://x/objs/c1.tif", "S"],
            ],
        );
        propagate(&mut rows, &mut AuditLog::new()).unwrap();

        assert_eq!(rows.get(0, Field::ObjectLocation), "");
        assert_eq!(rows.get(0, Field::ImageSmall), "S");
    }

    #[test]
    fn test_standalone_parent_not_filled() {
        let mut rows = table(
            COLUMNS,
            &[&["doc1", "", "standalone", "", ""], &["c1", "doc1", "image", "X", "XT"]],
        );
        let before = rows.clone();
        propagate(&mut rows, &mut AuditLog::new()).unwrap();
        assert_eq!(rows, before);
    }

    #[test]
    fn test_missing_parentid_column_aborts() {
        let mut rows = table(
            &["objectid", "display_template", "image_small"],
            &[&["album_01", "compound_object", ""]],
        );
        let before = rows.clone();
        let result = propagate(&mut rows, &mut AuditLog::new());

        assert!(matches!(result, Err(StagerError::Configuration(_))));
        assert_eq!(rows, before);
    }

    #[test]
    fn test_parent_without_objectid_skipped() {
        let mut rows = table(
            COLUMNS,
            &[&["", "", "compound_object", "", ""], &["c1", "", "image", "X", "XT"]],
        );
        let mut audit = AuditLog::new();
        let stats = propagate(&mut rows, &mut audit).unwrap();

        assert_eq!(stats.parents_seen, 0);
        assert_eq!(audit.count(Decision::SkipParent), 1);
        assert_eq!(rows.get(0, Field::ImageSmall), "");
    }

    #[test]
    fn test_empty_child_value() {
        let mut rows = table(
            COLUMNS,
            &[&["album_01", "", "compound_object", "", ""], &["c1", "album_01", "image", "", "XT"]],
        );
        let mut audit = AuditLog::new();
        propagate(&mut rows, &mut audit).unwrap();

        assert_eq!(rows.get(0, Field::ImageSmall), "");
        assert_eq!(rows.get(0, Field::ImageThumb), "XT");
        assert_eq!(audit.count(Decision::NoChildValue), 1);
    }
}
