use crate::scanner::CandidateFile;
use std::path::PathBuf;

/// 照合状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// しきい値以上の候補を確保した
    Matched,
    /// 候補が無い、または objectid が空
    Unmatched,
    /// 最良候補がしきい値未満
    BelowThreshold,
    /// 複合オブジェクト行のため自分の filename では照合しない
    Protected,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Matched => write!(f, "一致"),
            MatchStatus::Unmatched => write!(f, "不一致"),
            MatchStatus::BelowThreshold => write!(f, "しきい値未満"),
            MatchStatus::Protected => write!(f, "複合オブジェクト"),
        }
    }
}

/// 1行分の照合結果
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// 行インデックス
    pub row: usize,
    pub objectid: String,
    /// 行の filename 値
    pub filename: String,
    /// 確保した候補（Matched のときのみ）
    pub claimed: Option<CandidateFile>,
    /// しきい値未満だった最良候補（確認表示用）
    pub closest: Option<PathBuf>,
    pub score: f64,
    pub status: MatchStatus,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        self.status == MatchStatus::Matched
    }
}

/// 照合の集計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub matched: usize,
    pub unmatched: usize,
    pub below_threshold: usize,
    /// 照合対象外の複合オブジェクト行
    pub protected: usize,
}

impl MatchSummary {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut summary = Self::default();
        for r in results {
            match r.status {
                MatchStatus::Matched => summary.matched += 1,
                MatchStatus::Unmatched => summary.unmatched += 1,
                MatchStatus::BelowThreshold => summary.below_threshold += 1,
                MatchStatus::Protected => summary.protected += 1,
            }
        }
        summary
    }

    /// 照合を試みた行数（複合オブジェクト行は含まない）
    pub fn total(&self) -> usize {
        self.matched + self.unmatched + self.below_threshold
    }
}
