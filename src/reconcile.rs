//! 照合結果の反映
//!
//! 照合で確保したファイルの派生URLを、フィールドごとに保護ルールを適用して
//! 行へ書き込む。
//!
//! ## 保護ルール（object_location / image_small / image_thumb それぞれ独立）
//! - 空欄 → 生成URLを設定（fill）
//! - 処理中のファイルを参照している → 再生成して上書き（refresh）
//! - 別のファイルを参照している → そのまま保持（preserve）
//!
//! 複合オブジェクト行は一切変更しない（skip-protected）。URLは伝播でのみ入る。

use crate::audit::{AuditEntry, AuditLog, Decision, Phase};
use crate::matcher::MatchResult;
use collection_stager_common::{synthesize, DerivativeUrls, DisplayTemplate, Field, NamingConvention, RowSet};

/// 反映結果の統計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// 値が実際に変わった行数
    pub rows_changed: usize,
    pub fills: usize,
    pub refreshes: usize,
    pub preserved: usize,
    pub skipped_protected: usize,
}

/// 既存値が処理中のファイルを参照しているか
///
/// filename をそのまま含む、または最終パスセグメントが生成URLと同じ名前なら参照とみなす。
pub fn references_file(current: &str, filename: &str, urls: &DerivativeUrls, field: Field) -> bool {
    let filename = filename.trim();
    if !filename.is_empty() && current.contains(filename) {
        return true;
    }
    let current_leaf = current.rsplit('/').next().unwrap_or(current);
    urls.leaf(field).is_some_and(|leaf| leaf == current_leaf)
}

/// 1フィールド分の保護ルール
pub fn protective_update(current: &str, filename: &str, urls: &DerivativeUrls, field: Field) -> Decision {
    if current.is_empty() {
        Decision::Fill
    } else if references_file(current, filename, urls, field) {
        Decision::Refresh
    } else {
        Decision::Preserve
    }
}

/// 一致した行すべてに保護ルールを適用する
///
/// 一致していない行には触れない。複合オブジェクト行は派生URLカラムごとに
/// skip-protected を記録する。1行分の判定をすべて済ませてから書き込むので、
/// 行が中途半端に更新されることはない。
pub fn reconcile(
    rows: &mut RowSet,
    matches: &[MatchResult],
    naming: &NamingConvention,
    audit: &mut AuditLog,
) -> ReconcileStats {
    let mut stats = ReconcileStats::default();

    let fields: Vec<Field> = Field::DERIVATIVES
        .into_iter()
        .filter(|&f| {
            let present = rows.has_column(f);
            if !present {
                tracing::warn!(column = f.column_name(), "カラムが無いため更新をスキップ");
            }
            present
        })
        .collect();

    for result in matches {
        let row = result.row;
        let objectid = rows.get(row, Field::ObjectId).to_string();

        match rows.display_template(row) {
            template @ (DisplayTemplate::CompoundObject | DisplayTemplate::Multiple) => {
                for &field in &fields {
                    stats.skipped_protected += 1;
                    audit.record(AuditEntry {
                        phase: Phase::Reconcile,
                        row,
                        objectid: objectid.clone(),
                        field: Some(field),
                        decision: Decision::SkipProtected,
                        reason: format!("display_template={} は複合オブジェクトのため照合では更新しない", template),
                    });
                }
                continue;
            }
            DisplayTemplate::Standalone | DisplayTemplate::Other(_) => {}
        }

        let Some(claimed) = result.claimed.as_ref().filter(|_| result.is_matched()) else {
            continue;
        };

        let urls = synthesize(naming, &claimed.file_name);
        let mut writes: Vec<(Field, &str)> = Vec::new();

        for &field in &fields {
            let current = rows.get(row, field);
            let decision = protective_update(current, &result.filename, &urls, field);
            let Some(value) = urls.get(field) else {
                continue;
            };

            let reason = match decision {
                Decision::Fill => format!("空欄に {} を設定", value),
                Decision::Refresh => format!("{} を参照する既存値を {} に更新", result.filename, value),
                _ => format!("別ファイルを参照する既存値 {} を保持", current),
            };

            match decision {
                Decision::Fill => stats.fills += 1,
                Decision::Refresh => stats.refreshes += 1,
                _ => stats.preserved += 1,
            }

            if decision.is_write() && current != value {
                writes.push((field, value));
            }

            audit.record(AuditEntry {
                phase: Phase::Reconcile,
                row,
                objectid: objectid.clone(),
                field: Some(field),
                decision,
                reason,
            });
        }

        if !writes.is_empty() {
            stats.rows_changed += 1;
            for (field, value) in writes {
                rows.set(row, field, value);
            }
        }
    }

    tracing::info!(
        rows_changed = stats.rows_changed,
        fills = stats.fills,
        refreshes = stats.refreshes,
        preserved = stats.preserved,
        skipped_protected = stats.skipped_protected,
        "照合結果を反映"
    );
    stats
}
