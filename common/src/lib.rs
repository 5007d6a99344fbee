//! Collection Stager Common Library
//!
//! CLIと将来のフロントエンドで共有される型とユーティリティ

pub mod types;
pub mod naming;
pub mod sanitize;

pub use types::{DisplayTemplate, Field, MetadataRow, RowSet};
pub use naming::{DerivativeUrls, NamingConvention, synthesize};
pub use sanitize::{sanitize_backup_stem, sanitize_file_name, split_extension};
