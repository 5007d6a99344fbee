//! 照合結果の確認
//!
//! 反映前に照合結果の一覧を表示し、利用者の確認を取る。

use crate::error::{Result, StagerError};
use crate::matcher::{MatchResult, MatchStatus, MatchSummary};
use dialoguer::Confirm;
use std::io::IsTerminal;

/// 照合結果を表形式で表示
pub fn print_matches(results: &[MatchResult]) {
    let summary = MatchSummary::from_results(results);

    println!("照合結果: {}件中 {}件一致", summary.total(), summary.matched);

    for r in results {
        match r.status {
            MatchStatus::Matched => {
                if let Some(c) = &r.claimed {
                    println!(
                        "  ✔ [{}] {} → {} ({:.0}%)",
                        r.row + 1,
                        r.filename,
                        c.path.display(),
                        r.score * 100.0
                    );
                }
            }
            MatchStatus::BelowThreshold => {
                let closest = r
                    .closest
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!(
                    "  ⚠ [{}] {} → 候補 {} ({:.0}%、しきい値未満)",
                    r.row + 1,
                    r.filename,
                    closest,
                    r.score * 100.0
                );
            }
            MatchStatus::Unmatched => {
                println!("  ✗ [{}] {} → 一致なし", r.row + 1, r.filename);
            }
            MatchStatus::Protected => {
                println!("  - [{}] {} → 複合オブジェクトのため照合しない", r.row + 1, r.filename);
            }
        }
    }

    if summary.below_threshold + summary.unmatched > 0 {
        println!(
            "\n一致しなかった {}件の行は変更しません",
            summary.below_threshold + summary.unmatched
        );
    }
}

/// 反映してよいか確認する
///
/// `assume_yes` なら確認を省略する。端末でない場合は `assume_yes` が必要。
pub fn confirm_commit(results: &[MatchResult], assume_yes: bool) -> Result<()> {
    print_matches(results);

    if assume_yes {
        return Ok(());
    }

    if !std::io::stdin().is_terminal() {
        tracing::error!("非対話環境では --yes が必要です");
        return Err(StagerError::ReviewDeclined);
    }

    let accepted = Confirm::new()
        .with_prompt("この照合結果をCSVに反映しますか？")
        .default(false)
        .interact()
        .map_err(|e| StagerError::Io(std::io::Error::other(e.to_string())))?;

    if accepted {
        Ok(())
    } else {
        Err(StagerError::ReviewDeclined)
    }
}
