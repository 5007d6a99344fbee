//! ファイル照合モジュール
//!
//! メタデータ行の filename と候補ファイルをあいまい照合し、
//! 1行につき最大1ファイルを確保する。
//!
//! ## ルール
//! - 行は元の順序で処理し、先の行が優先して候補を確保する
//! - 1つの候補ファイルを確保できるのは1行だけ
//! - 複合オブジェクト行は自分の filename では照合しない
//! - 同点時: 完全一致（拡張子込み） > 語幹一致（大文字小文字無視） > スキャン順
//! - 未処理の別の行が名前をそのまま指しているファイルは、あいまい一致では確保しない

pub mod similarity;
mod types;

pub use types::{MatchResult, MatchStatus, MatchSummary};

use crate::scanner::CandidateFile;
use collection_stager_common::{Field, RowSet};
use indicatif::ProgressBar;
use similarity::{score, NameKey};
use std::cmp::Ordering;
use std::collections::HashMap;

/// 候補の評価値
#[derive(Debug, Clone, Copy)]
struct Scored {
    index: usize,
    score: f64,
    exact_name: bool,
    exact_stem: bool,
}

impl Scored {
    /// self が other より優先されるなら Greater
    fn rank(&self, other: &Scored) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.exact_name.cmp(&other.exact_name))
            .then(self.exact_stem.cmp(&other.exact_stem))
            .then(other.index.cmp(&self.index))
    }
}

pub struct Matcher {
    threshold: f64,
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 全行を照合する
    ///
    /// filename が空の行は結果に含まれない。複合オブジェクト行は候補を確保せず
    /// `MatchStatus::Protected` として返す。
    pub fn match_rows(
        &self,
        rows: &RowSet,
        candidates: &[CandidateFile],
        progress: &ProgressBar,
    ) -> Vec<MatchResult> {
        let keys: Vec<NameKey> = candidates.iter().map(|c| NameKey::new(&c.file_name)).collect();
        let mut claimed = vec![false; candidates.len()];

        let eligible: Vec<usize> = (0..rows.len())
            .filter(|&i| !rows.get(i, Field::Filename).is_empty())
            .collect();

        // まだ処理していない行が名前をそのまま指しているファイル
        let mut reserved: HashMap<String, usize> = HashMap::new();
        for &i in &eligible {
            if !rows.get(i, Field::ObjectId).is_empty() && !rows.display_template(i).is_compound() {
                *reserved.entry(NameKey::new(rows.get(i, Field::Filename)).name).or_insert(0) += 1;
            }
        }

        progress.set_length(eligible.len() as u64);
        let mut results = Vec::with_capacity(eligible.len());

        for &row in &eligible {
            progress.inc(1);

            let objectid = rows.get(row, Field::ObjectId).to_string();
            let filename = rows.get(row, Field::Filename).to_string();

            if rows.display_template(row).is_compound() {
                tracing::debug!(row, filename = %filename, "複合オブジェクト行のため照合しない");
                results.push(MatchResult {
                    status: MatchStatus::Protected,
                    ..unmatched(row, objectid, filename, None, 0.0)
                });
                continue;
            }

            if objectid.is_empty() {
                tracing::warn!(row, filename = %filename, "objectid が空のため照合対象外");
                results.push(unmatched(row, objectid, filename, None, 0.0));
                continue;
            }

            let key = NameKey::new(&filename);
            let base_name = filename.trim().rsplit(['/', '\\']).next().unwrap_or_default();
            if let Some(count) = reserved.get_mut(&key.name) {
                *count = count.saturating_sub(1);
            }

            let best = keys
                .iter()
                .enumerate()
                .filter(|(i, _)| !claimed[*i])
                .filter_map(|(index, cand)| {
                    let exact_name = candidates[index].file_name == base_name;
                    let same_name = cand.name == key.name;
                    if !same_name && reserved.get(&cand.name).copied().unwrap_or(0) > 0 {
                        return None;
                    }
                    Some(Scored {
                        index,
                        score: score(&key, cand),
                        exact_name,
                        exact_stem: cand.stem == key.stem,
                    })
                })
                .max_by(|a, b| a.rank(b));

            let result = match best {
                Some(best) if best.score >= self.threshold => {
                    claimed[best.index] = true;
                    let candidate = candidates[best.index].clone();
                    tracing::info!(
                        row,
                        objectid = %objectid,
                        filename = %filename,
                        path = %candidate.path.display(),
                        score = best.score,
                        "照合: 一致"
                    );
                    MatchResult {
                        row,
                        objectid,
                        filename,
                        claimed: Some(candidate),
                        closest: None,
                        score: best.score,
                        status: MatchStatus::Matched,
                    }
                }
                Some(best) if best.score > 0.0 => {
                    let closest = candidates[best.index].path.clone();
                    log_unmatched(row, &filename, best.score, self.threshold);
                    MatchResult {
                        status: MatchStatus::BelowThreshold,
                        ..unmatched(row, objectid, filename, Some(closest), best.score)
                    }
                }
                _ => {
                    log_unmatched(row, &filename, 0.0, self.threshold);
                    unmatched(row, objectid, filename, None, 0.0)
                }
            };

            results.push(result);
        }

        progress.finish_and_clear();
        results
    }
}

fn unmatched(
    row: usize,
    objectid: String,
    filename: String,
    closest: Option<std::path::PathBuf>,
    score: f64,
) -> MatchResult {
    MatchResult {
        row,
        objectid,
        filename,
        claimed: None,
        closest,
        score,
        status: MatchStatus::Unmatched,
    }
}

// スコアに応じてログの重大度を変える
fn log_unmatched(row: usize, filename: &str, score: f64, threshold: f64) {
    let percent = (score * 100.0).round();
    if score < 0.5 {
        tracing::error!(row, filename = %filename, score, "照合: 一致なし（{}%）", percent);
    } else {
        tracing::warn!(
            row,
            filename = %filename,
            score,
            "照合: 一致なし（{}% / しきい値 {}%）",
            percent,
            (threshold * 100.0).round()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn table(rows: &[[&str; 4]]) -> RowSet {
        let columns = ["objectid", "parentid", "display_template", "filename"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let records = rows
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect();
        RowSet::new(columns, records)
    }

    fn candidates(names: &[&str]) -> Vec<CandidateFile> {
        names
            .iter()
            .map(|n| CandidateFile::from_path(PathBuf::from("/objs").join(n)).unwrap())
            .collect()
    }

    fn run(rows: &RowSet, cands: &[CandidateFile]) -> Vec<MatchResult> {
        Matcher::new(0.90).match_rows(rows, cands, &ProgressBar::hidden())
    }

    #[test]
    fn test_exact_match() {
        let rows = table(&[["doc1", "", "standalone", "doc1.tif"]]);
        let results = run(&rows, &candidates(&["doc1.tif", "doc2.tif"]));

        assert_eq!(results.len(), 1);
        assert!(results[0].is_matched());
        assert_eq!(results[0].claimed.as_ref().unwrap().file_name, "doc1.tif");
        assert!((results[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_compound_rows_are_not_matched() {
        let rows = table(&[
            ["album_01", "", "compound_object", "album_01.jpg"],
            ["page_1", "album_01", "image", "album_01.jpg"],
        ]);
        let results = run(&rows, &candidates(&["album_01.jpg"]));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, MatchStatus::Protected);
        assert!(results[0].claimed.is_none());
        // 複合行が名指ししていたファイルは後の行が確保できる
        assert!(results[1].is_matched());
    }

    #[test]
    fn test_empty_filename_rows_are_skipped() {
        let rows = table(&[["album_01", "", "compound_object", ""]]);
        assert!(run(&rows, &candidates(&["album_01.jpg"])).is_empty());
    }

    #[test]
    fn test_file_claimed_once() {
        let rows = table(&[
            ["a", "", "standalone", "doc1.tif"],
            ["b", "", "standalone", "doc1.tif"],
        ]);
        let results = run(&rows, &candidates(&["doc1.tif"]));

        assert!(results[0].is_matched());
        assert_eq!(results[1].status, MatchStatus::Unmatched);
    }

    #[test]
    fn test_tie_break_prefers_exact_name() {
        let rows = table(&[["a", "", "standalone", "doc1.tif"]]);
        // 語幹同士は両方とも完全一致（スコア1.0）
        let results = run(&rows, &candidates(&["DOC1.jpg", "doc1.tif"]));
        assert_eq!(results[0].claimed.as_ref().unwrap().file_name, "doc1.tif");
    }

    #[test]
    fn test_tie_break_prefers_stem_then_scan_order() {
        let rows = table(&[["a", "", "standalone", "Doc1.tif"]]);
        let results = run(&rows, &candidates(&["doc1.png", "DOC1.jpg"]));
        assert_eq!(results[0].claimed.as_ref().unwrap().file_name, "doc1.png");
    }

    #[test]
    fn test_below_threshold_reports_closest() {
        let rows = table(&[["a", "", "standalone", "doc1.tif"]]);
        let results = run(&rows, &candidates(&["doc2.tif"]));

        assert_eq!(results[0].status, MatchStatus::BelowThreshold);
        assert!(results[0].claimed.is_none());
        assert_eq!(results[0].closest, Some(PathBuf::from("/objs/doc2.tif")));
    }

    #[test]
    fn test_no_candidates() {
        let rows = table(&[["a", "", "standalone", "doc1.tif"]]);
        let results = run(&rows, &[]);
        assert_eq!(results[0].status, MatchStatus::Unmatched);
    }

    #[test]
    fn test_empty_objectid_is_unmatched() {
        let rows = table(&[["", "", "standalone", "doc1.tif"]]);
        let results = run(&rows, &candidates(&["doc1.tif"]));
        assert_eq!(results[0].status, MatchStatus::Unmatched);
    }

    #[test]
    fn test_reserved_name_not_taken_by_fuzzy_claim() {
        // img_0003 は img_0001 と 0.9 以上で似ているが、img_0001 は後の行が名指ししている
        let rows = table(&[
            ["c", "", "standalone", "img_0003.tif"],
            ["a", "", "standalone", "img_0001.tif"],
        ]);
        let results = run(&rows, &candidates(&["img_0001.tif"]));

        assert_eq!(results[0].status, MatchStatus::Unmatched);
        assert!(results[1].is_matched());
        assert_eq!(results[1].claimed.as_ref().unwrap().file_name, "img_0001.tif");
    }

    #[test]
    fn test_fuzzy_match_above_threshold() {
        let rows = table(&[["a", "", "standalone", "letter_1902_final.tif"]]);
        let results = run(&rows, &candidates(&["letter_1902_finl.tif"]));
        assert!(results[0].is_matched());
        assert!(results[0].score < 1.0);
    }
}
