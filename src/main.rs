use anyhow::{Context, Result};
use clap::Parser;
use jarscan::cli::{Cli, Commands, OutputFormat};
use jarscan::config::{clear_db, resolve_db_path};
use jarscan::record::ClassRecord;
use jarscan::scan::Scanner;
use jarscan::session::Session;
use jarscan::store::RecordStore;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command.clone() {
        Commands::Scan {
            jar_path,
            format,
            output,
        } => {
            let db_path = resolve_db_path(&cli)?;
            let store = RecordStore::open(db_path)?;
            let mut session = Session::resume(store)?;
            let result = run_scan(&mut session, &jar_path)?;
            session.shutdown()?;
            write_output(&render_scan(&result, format)?, output.as_deref())?;
        }
        Commands::Records { format } => {
            let db_path = resolve_db_path(&cli)?;
            let store = RecordStore::open(db_path)?;
            let records = store.records()?;
            store.shutdown()?;
            write_output(&render_records(&records, format)?, None)?;
        }
        Commands::Remove { index } => {
            let db_path = resolve_db_path(&cli)?;
            let store = RecordStore::open(db_path)?;
            let mut session = Session::resume(store)?;
            let removed = session.remove(index);
            session.shutdown()?;
            match removed {
                Some(record) => println!("removed {}", record.name),
                None => anyhow::bail!("no record at index {index}"),
            }
        }
        Commands::Stats => {
            let db_path = resolve_db_path(&cli)?;
            let store = RecordStore::open(db_path)?;
            let stats = store.stats()?;
            store.shutdown()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Clear => {
            let db_path = resolve_db_path(&cli)?;
            clear_db(&db_path)?;
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct ScanOutput {
    archive: String,
    records_added: usize,
    skipped_entries: usize,
    flush_failures: usize,
    records_total: usize,
    duration_ms: u64,
    records: Vec<ClassRecord>,
}

fn run_scan(session: &mut Session, jar_path: &Path) -> Result<ScanOutput> {
    let start = Instant::now();
    let scanner = Scanner::new(jar_path);
    let report = session.process(&scanner)?;

    Ok(ScanOutput {
        archive: jar_path.to_string_lossy().to_string(),
        records_added: report.records_added,
        skipped_entries: report.skipped_entries,
        flush_failures: report.flush_failures,
        records_total: session.records().len(),
        duration_ms: start.elapsed().as_millis() as u64,
        records: session.records().to_vec(),
    })
}

fn render_scan(result: &ScanOutput, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("archive: {}\n", result.archive));
            out.push_str(&format!("records_added: {}\n", result.records_added));
            out.push_str(&format!("skipped_entries: {}\n", result.skipped_entries));
            out.push_str(&format!("flush_failures: {}\n", result.flush_failures));
            out.push_str(&format!("duration_ms: {}\n", result.duration_ms));
            out.push_str(&render_table(&result.records));
            Ok(out)
        }
    }
}

fn render_records(records: &[ClassRecord], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Text => Ok(render_table(records)),
    }
}

fn render_table(records: &[ClassRecord]) -> String {
    let mut out = String::new();
    for (index, record) in records.iter().enumerate() {
        let kind = if record.is_interface {
            "interface"
        } else {
            "class"
        };
        out.push_str(&format!(
            "{index:4}  {kind:9}  {:6}  {}\n",
            record.line_count, record.name
        ));
    }
    out
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory: {}", parent.display()))?;
            }
        }
        std::fs::write(path, content)
            .with_context(|| format!("failed to write output file: {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}
