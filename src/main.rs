use clap::Parser;
use collection_stager::{cli, config, error, logging, pipeline, review};
use cli::{Cli, Commands};
use config::Config;
use error::Result;
use pipeline::{CommitOptions, RunContext};
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Run { csv, dirs, container, collection, threshold, output, audit, backup_dir, dry_run, yes } => {
            println!("📚 cb-stage - 照合・URL反映\n");

            let mut naming = config.naming();
            if let Some(container) = container {
                naming.container = container;
            }
            if let Some(collection) = collection {
                naming.collection = collection;
            }
            let threshold = config::validate_threshold(threshold.unwrap_or(config.threshold))?;

            let mut ctx = RunContext::new(search_dirs(dirs, &config), naming, threshold);
            ctx.show_progress = true;
            ctx.install_interrupt_handler();

            // 1. 読み込み・スキャン・照合
            println!("[1/3] CSV読み込み・スキャン・照合中...");
            let plan = ctx.plan(&csv)?;
            println!(
                "✔ {}行 / 候補ファイル{}件\n",
                plan.rows.len(),
                plan.candidates.len()
            );

            // 2. 確認
            println!("[2/3] 照合結果の確認");
            review::confirm_commit(&plan.matches, yes)?;
            println!();

            // 3. 反映・伝播・保存
            println!("[3/3] URL反映・親子伝播{}...", if dry_run { "（ドライラン）" } else { "・保存" });
            let options = CommitOptions {
                output,
                audit_path: audit,
                backup_dir,
                dry_run,
            };
            let report = ctx.commit(plan, &options)?;

            println!(
                "✔ 反映: 設定 {} / 更新 {} / 保持 {} / 複合スキップ {}フィールド（変更行 {}）",
                report.reconcile.fills,
                report.reconcile.refreshes,
                report.reconcile.preserved,
                report.reconcile.skipped_protected,
                report.reconcile.rows_changed
            );
            match (&report.propagation, &report.propagation_warning) {
                (Some(stats), _) => println!(
                    "✔ 伝播: 親 {}件中 {}件を更新（{}フィールド）",
                    stats.parents_seen, stats.parents_updated, stats.fields_filled
                ),
                (None, Some(warning)) => println!("⚠ 伝播をスキップ: {}", warning),
                (None, None) => {}
            }
            if let Some(backup) = &report.backup {
                println!("✔ バックアップ: {}", backup.display());
            }
            if let Some(written) = &report.written {
                println!("✔ 保存: {}", written.display());
                if report.unchanged() {
                    println!("  （内容は入力と同一です）");
                }
            }
            if let Some(audit_path) = &options.audit_path {
                if !dry_run {
                    println!("✔ 監査ログ: {} ({}件)", audit_path.display(), report.audit_entries);
                }
            }

            println!("\n✅ 完了");
        }

        Commands::Match { csv, dirs, threshold } => {
            println!("🔍 cb-stage - 照合プレビュー\n");

            let threshold = config::validate_threshold(threshold.unwrap_or(config.threshold))?;
            let mut ctx = RunContext::new(search_dirs(dirs, &config), config.naming(), threshold);
            ctx.show_progress = true;
            ctx.install_interrupt_handler();

            let plan = ctx.plan(&csv)?;
            review::print_matches(&plan.matches);
        }

        Commands::Scan { dirs } => {
            let ctx = RunContext::new(search_dirs(dirs, &config), config.naming(), config.threshold);
            ctx.install_interrupt_handler();
            let candidates = ctx.scan()?;

            for c in &candidates {
                println!("{}", c.path.display());
            }
            println!("\n✔ {}件のファイルを検出", candidates.len());
        }

        Commands::Config { set_container, set_collection, add_dir, clear_dirs, set_threshold, show } => {
            let mut config = config;
            let mut changed = false;

            if let Some(container) = set_container {
                config.container = container;
                changed = true;
            }
            if let Some(collection) = set_collection {
                config.collection = collection;
                changed = true;
            }
            if clear_dirs {
                config.search_dirs.clear();
                changed = true;
            }
            for dir in add_dir {
                changed |= config.add_search_dir(dir);
            }
            if let Some(threshold) = set_threshold {
                config.set_threshold(threshold)?;
                changed = true;
            }

            if changed {
                config.save()?;
                println!("✔ 設定を保存しました");
            }

            if show || !changed {
                println!("設定:");
                println!("  コンテナ: {}", config.container);
                println!(
                    "  コレクション: {}",
                    if config.collection.is_empty() { "（なし）" } else { config.collection.as_str() }
                );
                println!("  しきい値: {:.0}%", config.threshold * 100.0);
                println!("  検索フォルダ:");
                for dir in &config.search_dirs {
                    println!("    - {}", dir.display());
                }
            }
        }
    }

    Ok(())
}

// コマンドラインで指定があればそちらを優先
fn search_dirs(dirs: Vec<PathBuf>, config: &Config) -> Vec<PathBuf> {
    if dirs.is_empty() {
        config.search_dirs.clone()
    } else {
        dirs
    }
}
