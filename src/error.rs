use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagerError {
    /// 必須カラム不足など。伝播フェーズのみを中止する
    #[error("構成エラー: {0}")]
    Configuration(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV解析エラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("文字コードエラー: {path} はUTF-8ではありません ({detail})")]
    Encoding { path: PathBuf, detail: String },

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("検索フォルダが指定されていません。`cb-stage config --add-dir DIR` または `--dir` で指定してください")]
    NoSearchDirectories,

    #[error("しきい値は0.0〜1.0で指定してください: {0}")]
    InvalidThreshold(f64),

    #[error("処理が中断されました")]
    Cancelled,

    #[error("照合結果の確認で中止されました（ファイルは変更していません）")]
    ReviewDeclined,
}

pub type Result<T> = std::result::Result<T, StagerError>;
