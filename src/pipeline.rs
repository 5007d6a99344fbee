//! 一括処理
//!
//! スキャン → 照合 →（確認）→ 反映 → 伝播 → 保存 の順に実行する。
//! 各段階は明示的な行セットを受け取り、前段の内部には触れない。
//! 設定・監査ログ・中断フラグは `RunContext` で受け渡す。
//!
//! 中断フラグはフォルダ単位のスキャンの合間と、保存の直前で確認する。
//! 保存を始めた後は中断しない。

use crate::audit::AuditLog;
use crate::error::{Result, StagerError};
use crate::matcher::{MatchResult, MatchSummary, Matcher};
use crate::propagate::{propagate, PropagationStats};
use crate::reconcile::{reconcile, ReconcileStats};
use crate::scanner::{scan_roots, CandidateFile};
use crate::store::{self, StagedFile, TableFormat};
use collection_stager_common::{NamingConvention, RowSet};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 1回の実行で共有する文脈
#[derive(Debug)]
pub struct RunContext {
    pub roots: Vec<PathBuf>,
    pub naming: NamingConvention,
    pub threshold: f64,
    pub audit: AuditLog,
    pub cancel: Arc<AtomicBool>,
    pub show_progress: bool,
}

impl RunContext {
    pub fn new(roots: Vec<PathBuf>, naming: NamingConvention, threshold: f64) -> Self {
        Self {
            roots,
            naming,
            threshold,
            audit: AuditLog::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            show_progress: false,
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template("  照合中 [{bar:40}] {pos}/{len}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }

    /// Ctrl+C で中断フラグを立てる
    ///
    /// ハンドラはプロセスに1つだけ登録できる。登録できなかった場合は警告のみ。
    pub fn install_interrupt_handler(&self) {
        let cancel = Arc::clone(&self.cancel);
        let result = ctrlc::set_handler(move || {
            tracing::warn!("中断を受け付けました。次の区切りで停止します");
            cancel.store(true, Ordering::SeqCst);
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "Ctrl+C ハンドラを登録できません");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// 検索フォルダをスキャンする
    pub fn scan(&self) -> Result<Vec<CandidateFile>> {
        if self.roots.is_empty() {
            return Err(StagerError::NoSearchDirectories);
        }
        scan_roots(&self.roots, &self.cancel)
    }

    /// 読み込み・スキャン・照合までを行う（ファイルは変更しない）
    pub fn plan(&self, table_path: &Path) -> Result<Plan> {
        let (rows, format) = store::load_table_with_format(table_path)?;
        let input_digest = store::digest(table_path)?;
        let candidates = self.scan()?;

        let matcher = Matcher::new(self.threshold);
        let matches = matcher.match_rows(&rows, &candidates, &self.progress_bar());

        Ok(Plan {
            source: table_path.to_path_buf(),
            input_digest,
            rows,
            format,
            candidates,
            matches,
        })
    }

    /// 照合結果を反映して保存する
    ///
    /// CSVと監査ログはどちらも一時ファイルに書き終えてから rename する。
    /// 一時ファイルの段階で失敗した場合、どちらのファイルも変更されない。
    pub fn commit(&mut self, plan: Plan, options: &CommitOptions) -> Result<RunReport> {
        if self.is_cancelled() {
            return Err(StagerError::Cancelled);
        }

        let Plan {
            source,
            input_digest,
            mut rows,
            format,
            matches,
            ..
        } = plan;

        let outcome = run_pass(&mut rows, &matches, self);

        let mut report = RunReport {
            matches: MatchSummary::from_results(&matches),
            reconcile: outcome.reconcile,
            propagation: outcome.propagation,
            propagation_warning: outcome.propagation_warning,
            input_digest,
            output_digest: None,
            written: None,
            backup: None,
            audit_entries: self.audit.len(),
        };

        if options.dry_run {
            tracing::info!("ドライランのため保存しません");
            return Ok(report);
        }

        let target = options.output.clone().unwrap_or_else(|| source.clone());
        let table = store::render_table(&rows, &format)?;
        let audit = match &options.audit_path {
            Some(path) => Some((path, self.audit.to_jsonl()?)),
            None => None,
        };

        if self.is_cancelled() {
            return Err(StagerError::Cancelled);
        }

        if let Some(dir) = &options.backup_dir {
            if target == source {
                report.backup = Some(store::backup_table(&source, dir)?);
            }
        }

        let staged_table = StagedFile::write(&target, &table)?;
        let staged_audit = match audit {
            Some((path, bytes)) => Some(StagedFile::write(path, &bytes)?),
            None => None,
        };

        staged_table.commit()?;
        tracing::info!(path = %target.display(), rows = rows.len(), "CSVを保存");
        if let Some(staged) = staged_audit {
            let path = staged.path().to_path_buf();
            staged.commit()?;
            tracing::info!(path = %path.display(), entries = report.audit_entries, "監査ログを保存");
        }

        report.output_digest = Some(store::digest(&target)?);
        report.written = Some(target);

        Ok(report)
    }
}

/// 照合までの結果
#[derive(Debug)]
pub struct Plan {
    pub source: PathBuf,
    pub input_digest: String,
    pub rows: RowSet,
    /// 読み込み時の書式（BOM・改行コード・変更のない行の原文）
    pub format: TableFormat,
    pub candidates: Vec<CandidateFile>,
    pub matches: Vec<MatchResult>,
}

/// 保存時のオプション
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// 出力先（省略時は入力を上書き）
    pub output: Option<PathBuf>,
    /// 監査ログ（JSON Lines）の出力先
    pub audit_path: Option<PathBuf>,
    /// 上書き前のバックアップ先フォルダ
    pub backup_dir: Option<PathBuf>,
    pub dry_run: bool,
}

/// 反映と伝播の結果
#[derive(Debug)]
pub struct PassOutcome {
    pub reconcile: ReconcileStats,
    pub propagation: Option<PropagationStats>,
    pub propagation_warning: Option<String>,
}

/// 実行結果
#[derive(Debug)]
pub struct RunReport {
    pub matches: MatchSummary,
    pub reconcile: ReconcileStats,
    pub propagation: Option<PropagationStats>,
    /// 必須カラム不足で伝播を中止した場合の理由
    pub propagation_warning: Option<String>,
    pub input_digest: String,
    pub output_digest: Option<String>,
    pub written: Option<PathBuf>,
    pub backup: Option<PathBuf>,
    pub audit_entries: usize,
}

impl RunReport {
    /// 出力が入力とバイト単位で同一か
    pub fn unchanged(&self) -> bool {
        self.output_digest.as_deref() == Some(self.input_digest.as_str())
    }
}

/// メモリ上で反映と伝播を行う
///
/// 伝播の構成エラーは警告として返し、反映結果は保持する。
pub fn run_pass(rows: &mut RowSet, matches: &[MatchResult], ctx: &mut RunContext) -> PassOutcome {
    let reconcile = reconcile(rows, matches, &ctx.naming, &mut ctx.audit);

    let (propagation, propagation_warning) = match propagate(rows, &mut ctx.audit) {
        Ok(stats) => (Some(stats), None),
        Err(StagerError::Configuration(msg)) => {
            tracing::warn!("{}", msg);
            (None, Some(msg))
        }
        Err(e) => {
            tracing::warn!(error = %e, "伝播を中止");
            (None, Some(e.to_string()))
        }
    };

    PassOutcome {
        reconcile,
        propagation,
        propagation_warning,
    }
}
