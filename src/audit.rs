//! 監査ログ
//!
//! 照合・伝播のフィールド単位の判定をすべて記録する。部分再処理で既存のURLが
//! 消えていないことを利用者が確認するための出力なので、時刻などの非決定的な
//! 値は含めない。

use crate::error::Result;
use collection_stager_common::Field;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// 処理フェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Reconcile,
    Propagate,
}

/// フィールド単位の判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// 空欄に生成URLを設定
    Fill,
    /// 同じファイルを指す既存URLを再生成
    Refresh,
    /// 別のファイルを指す既存URLを保持
    Preserve,
    /// 複合オブジェクト行のため照合由来の更新をしない
    SkipProtected,
    /// 先頭の子から親へコピー
    FillFromChild,
    /// 親に既に値があるため保持
    KeepParent,
    /// 先頭の子の値が空
    NoChildValue,
    /// 子レコードが無い
    NoChildren,
    /// 親の objectid が空
    SkipParent,
}

impl Decision {
    /// 行の値を変更する判定か
    pub fn is_write(&self) -> bool {
        match self {
            Decision::Fill | Decision::Refresh | Decision::FillFromChild => true,
            Decision::Preserve
            | Decision::SkipProtected
            | Decision::KeepParent
            | Decision::NoChildValue
            | Decision::NoChildren
            | Decision::SkipParent => false,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Decision::Fill => "fill",
            Decision::Refresh => "refresh",
            Decision::Preserve => "preserve",
            Decision::SkipProtected => "skip-protected",
            Decision::FillFromChild => "fill-from-child",
            Decision::KeepParent => "keep-parent",
            Decision::NoChildValue => "no-child-value",
            Decision::NoChildren => "no-children",
            Decision::SkipParent => "skip-parent",
        };
        f.write_str(s)
    }
}

/// 監査ログの1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub phase: Phase,
    /// 行インデックス（データ行、0始まり）
    pub row: usize,
    pub objectid: String,
    /// 行全体に対する判定では None
    pub field: Option<Field>,
    pub decision: Decision,
    pub reason: String,
}

/// 監査ログ（記録順を保持）
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: AuditEntry) {
        let field = entry.field.map(|f| f.column_name()).unwrap_or("-");
        tracing::info!(
            target: "audit",
            phase = ?entry.phase,
            row = entry.row,
            objectid = %entry.objectid,
            field,
            decision = %entry.decision,
            "{}",
            entry.reason
        );
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 判定ごとの件数
    pub fn count(&self, decision: Decision) -> usize {
        self.entries.iter().filter(|e| e.decision == decision).count()
    }

    /// JSON Lines に変換
    pub fn to_jsonl(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        for entry in &self.entries {
            serde_json::to_writer(&mut buffer, entry)?;
            buffer.write_all(b"\n")?;
        }
        Ok(buffer)
    }

    /// JSON Lines としてアトミックに書き出す
    pub fn write_jsonl(&self, path: &Path) -> Result<()> {
        crate::store::write_atomic(path, &self.to_jsonl()?)
    }
}
