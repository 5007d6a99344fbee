//! ファイル名サニタイズ
//!
//! アップロード先のBLOB名はサニタイズ済みのファイル名で決まるため、
//! URL生成の前に必ずここを通す。

use regex::Regex;

/// ファイル名を語幹と拡張子に分割する
///
/// 先頭のドットだけを持つ名前（`.gitkeep` など）は拡張子なしとして扱う。
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    }
}

/// アップロード用にファイル名をサニタイズする
///
/// - 前後の空白を除去
/// - 「空白-空白」「空白-」「-空白」を `--` に置換
/// - 残りの空白を `_` に置換
/// - 拡張子はそのまま残す
pub fn sanitize_file_name(name: &str) -> String {
    lazy_static::lazy_static! {
        static ref SPACED_DASH: Regex = Regex::new(r"\s+-\s+").unwrap();
        static ref SPACE_DASH: Regex = Regex::new(r"\s+-").unwrap();
        static ref DASH_SPACE: Regex = Regex::new(r"-\s+").unwrap();
        static ref SPACES: Regex = Regex::new(r"\s+").unwrap();
    }

    let (stem, ext) = split_extension(name.trim());
    let stem = stem.trim();

    let stem = SPACED_DASH.replace_all(stem, "--");
    let stem = SPACE_DASH.replace_all(&stem, "--");
    let stem = DASH_SPACE.replace_all(&stem, "--");
    let stem = SPACES.replace_all(&stem, "_");

    format!("{}{}", stem, ext.trim())
}

/// バックアップファイル名用の語幹サニタイズ
pub fn sanitize_backup_stem(name: &str) -> String {
    lazy_static::lazy_static! {
        static ref UNSAFE: Regex = Regex::new(r"[^\w\-_.]").unwrap();
        static ref DASH_RUN: Regex = Regex::new(r"_*-_*").unwrap();
        static ref UNDERSCORE_RUN: Regex = Regex::new(r"_+").unwrap();
    }

    let replaced = name.replace(' ', "_");
    let replaced = UNSAFE.replace_all(&replaced, "_");
    let replaced = DASH_RUN.replace_all(&replaced, "-");
    UNDERSCORE_RUN.replace_all(&replaced, "_").into_owned()
}
