//! メタデータCSVの読み書き
//!
//! 書き込みは同じフォルダの一時ファイルに書いてから rename で置き換える。
//! 途中で失敗しても元のファイルは変更されない。
//! 値を変更していない行は読み込んだときの原文のまま書き戻す。

use crate::error::{Result, StagerError};
use chrono::Local;
use collection_stager_common::{sanitize_backup_stem, RowSet};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 改行コード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// 読み込み時の書式と原文
///
/// 書き出し時、読み込み時から値が変わっていない行は原文をそのまま出力する。
/// BOM・改行コード・末尾改行の有無も読み込み時のものを保つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFormat {
    pub bom: bool,
    pub line_ending: LineEnding,
    pub trailing_newline: bool,
    header: Option<RawRecord>,
    records: Vec<RawRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawRecord {
    /// 正規化後のセル
    cells: Vec<String>,
    /// 終端を除いた原文
    text: String,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            bom: false,
            line_ending: LineEnding::Lf,
            trailing_newline: true,
            header: None,
            records: Vec::new(),
        }
    }
}

impl TableFormat {
    fn original_header(&self, columns: &[String]) -> Option<&str> {
        self.header
            .as_ref()
            .filter(|raw| raw.cells == columns)
            .map(|raw| raw.text.as_str())
    }

    fn original_record(&self, index: usize, cells: &[String]) -> Option<&str> {
        self.records
            .get(index)
            .filter(|raw| raw.cells == cells)
            .map(|raw| raw.text.as_str())
    }
}

/// CSVを読み込む（全値を文字列として扱う）
pub fn load_table(path: &Path) -> Result<RowSet> {
    Ok(load_table_with_format(path)?.0)
}

/// CSVを書式情報つきで読み込む
pub fn load_table_with_format(path: &Path) -> Result<(RowSet, TableFormat)> {
    let bytes = fs::read(path)?;
    let (bom, bytes) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (true, rest),
        None => (false, bytes.as_slice()),
    };

    let text = std::str::from_utf8(bytes).map_err(|e| StagerError::Encoding {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let (rows, mut format) = parse_table(text)?;
    format.bom = bom;
    Ok((rows, format))
}

/// CSV文字列から読み込む
pub fn parse_table(text: &str) -> Result<(RowSet, TableFormat)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();

    let mut records = Vec::new();
    let mut starts = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() > columns.len() {
            return Err(StagerError::Config(format!(
                "{}行目の列数がヘッダーより多い（{} > {}）",
                i + 2,
                record.len(),
                columns.len()
            )));
        }
        starts.push(record.position().map_or(text.len(), |p| p.byte() as usize));
        records.push(record.iter().map(|s| s.to_string()).collect());
    }

    tracing::info!(rows = records.len(), columns = columns.len(), "CSVを読み込み");
    let rows = RowSet::new(columns, records);

    // 各レコードの原文は次のレコードの開始位置までを切り出す
    let header_end = starts.first().copied().unwrap_or(text.len());
    let header_text = text.get(..header_end).unwrap_or_default();
    let mut ends: Vec<usize> = starts.iter().skip(1).copied().collect();
    ends.push(text.len());

    let format = TableFormat {
        bom: false,
        line_ending: if header_text.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        },
        trailing_newline: text.is_empty() || text.ends_with('\n'),
        header: Some(RawRecord {
            cells: rows.columns().to_vec(),
            text: strip_terminator(header_text).to_string(),
        }),
        records: rows
            .records()
            .zip(starts.iter().zip(&ends))
            .map(|(cells, (&start, &end))| RawRecord {
                cells: cells.to_vec(),
                text: strip_terminator(text.get(start..end).unwrap_or_default()).to_string(),
            })
            .collect(),
    };

    Ok((rows, format))
}

// 空行が挟まっていても原文の前後の改行は落とす
fn strip_terminator(text: &str) -> &str {
    text.trim_matches(['\r', '\n'])
}

fn render_record(cells: &[String]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(cells)?;

    let mut bytes = writer
        .into_inner()
        .map_err(|e| StagerError::Io(e.into_error()))?;
    bytes.pop();
    String::from_utf8(bytes).map_err(|e| StagerError::Config(e.to_string()))
}

/// CSVへ書き出す
///
/// 変更のない行は原文のまま、変更した行は必要な場合のみ引用符をつけて書く。
pub fn render_table(rows: &RowSet, format: &TableFormat) -> Result<Vec<u8>> {
    let mut lines = Vec::with_capacity(rows.len() + 1);

    lines.push(match format.original_header(rows.columns()) {
        Some(text) => text.to_string(),
        None => render_record(rows.columns())?,
    });
    for (index, cells) in rows.records().enumerate() {
        lines.push(match format.original_record(index, cells) {
            Some(text) => text.to_string(),
            None => render_record(cells)?,
        });
    }

    let terminator = format.line_ending.as_str();
    let mut out = Vec::new();
    if format.bom {
        out.extend_from_slice(UTF8_BOM);
    }
    out.extend_from_slice(lines.join(terminator).as_bytes());
    if format.trailing_newline {
        out.extend_from_slice(terminator.as_bytes());
    }
    Ok(out)
}

/// 一時ファイルに書き込み済みで rename 待ちの出力
///
/// `commit` せずに破棄すると一時ファイルを削除する。
#[derive(Debug)]
pub struct StagedFile {
    tmp_path: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// 同じフォルダの一時ファイルに書き込み、fsync する
    pub fn write(path: &Path, bytes: &[u8]) -> Result<Self> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StagerError::Config(format!("保存先がファイルではありません: {}", path.display())))?;

        let staged = Self {
            tmp_path: dir.join(format!(".{}.tmp", file_name)),
            path: path.to_path_buf(),
            committed: false,
        };

        let mut file = fs::File::create(&staged.tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// rename で置き換える
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// 一時ファイル → fsync → rename で書き込む
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    StagedFile::write(path, bytes)?.commit()
}

/// 上書き前に入力CSVをタイムスタンプ付きでコピーする
pub fn backup_table(path: &Path, backup_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "metadata".into());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "csv".into());

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let dest = backup_dir.join(format!("{}_{}.{}", sanitize_backup_stem(&stem), timestamp, ext));

    fs::copy(path, &dest)?;
    tracing::info!(from = %path.display(), to = %dest.display(), "バックアップを作成");
    Ok(dest)
}

/// ファイルのSHA-256（16進）
pub fn digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
