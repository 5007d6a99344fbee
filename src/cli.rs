use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cb-stage")]
#[command(about = "CollectionBuilder向け ファイル照合・メタデータURL反映ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 照合・URL反映・親子伝播を一括実行
    Run {
        /// メタデータCSV
        #[arg(required = true)]
        csv: PathBuf,

        /// 検索フォルダ（複数指定可、省略時は設定値）
        #[arg(short, long = "dir")]
        dirs: Vec<PathBuf>,

        /// ストレージアカウント名
        #[arg(long)]
        container: Option<String>,

        /// コレクション名
        #[arg(long)]
        collection: Option<String>,

        /// 照合しきい値（0.0-1.0）
        #[arg(short, long)]
        threshold: Option<f64>,

        /// 出力CSV（省略時は上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 監査ログ（JSON Lines）の出力先
        #[arg(long)]
        audit: Option<PathBuf>,

        /// 上書き前のバックアップ先フォルダ
        #[arg(long)]
        backup_dir: Option<PathBuf>,

        /// ドライラン（保存しない）
        #[arg(long)]
        dry_run: bool,

        /// 照合結果の確認を省略
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// 照合結果のみを表示（CSVは変更しない）
    Match {
        /// メタデータCSV
        #[arg(required = true)]
        csv: PathBuf,

        /// 検索フォルダ
        #[arg(short, long = "dir")]
        dirs: Vec<PathBuf>,

        /// 照合しきい値（0.0-1.0）
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// 検索フォルダの候補ファイル一覧を表示
    Scan {
        /// 検索フォルダ
        #[arg(short, long = "dir")]
        dirs: Vec<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// ストレージアカウント名を設定
        #[arg(long)]
        set_container: Option<String>,

        /// コレクション名を設定（空文字で解除）
        #[arg(long)]
        set_collection: Option<String>,

        /// 検索フォルダを追加
        #[arg(long)]
        add_dir: Vec<PathBuf>,

        /// 検索フォルダをすべて削除
        #[arg(long)]
        clear_dirs: bool,

        /// 照合しきい値を設定
        #[arg(long)]
        set_threshold: Option<f64>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
