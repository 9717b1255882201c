//! latency_analyse - summarise latency lines from a captured vicon_stream log
//!
//! Scans the input for `System Latency: <f> ms. FC Latency: <f>, Vicon Latency: <f>`
//! lines and reports min / max / mean for each column.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

use vicon_stream::latency::{parse_latency_lines, summarize, ColumnStats};

#[derive(Parser, Debug)]
#[command(
    name = "latency_analyse",
    about = "Summarise System/FC/Vicon latency lines from a diagnostic log"
)]
struct Args {
    /// Diagnostic log to scan ("-" for stdin).
    #[arg(default_value = "log/output.txt")]
    input: PathBuf,

    /// Emit the summary as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let text = if args.input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(&args.input)
            .with_context(|| format!("failed to read {}", args.input.display()))?
    };

    let samples = parse_latency_lines(&text);
    let summary = summarize(&samples)
        .ok_or_else(|| anyhow!("no latency lines found in {}", args.input.display()))?;

    if args.json {
        let column = |stats: &ColumnStats| {
            serde_json::json!({ "min_ms": stats.min, "max_ms": stats.max, "avg_ms": stats.avg })
        };
        let out = serde_json::json!({
            "count": summary.count,
            "system_latency": column(&summary.system),
            "fc_latency": column(&summary.fc),
            "vicon_latency": column(&summary.vicon),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} latency lines", summary.count);
    println!(
        "{:<16} {:>12} {:>12} {:>12}",
        "Latency Type", "Min (ms)", "Max (ms)", "Avg (ms)"
    );
    for (name, stats) in [
        ("System Latency", summary.system),
        ("FC Latency", summary.fc),
        ("Vicon Latency", summary.vicon),
    ] {
        println!(
            "{:<16} {:>12.3} {:>12.3} {:>12.3}",
            name, stats.min, stats.max, stats.avg
        );
    }
    Ok(())
}
