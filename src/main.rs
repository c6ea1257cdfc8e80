use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser as ClapParser, Subcommand};

use redmon::config::{CaseMode, ParserConfig, UnquotedArgs};
use redmon::monitor::Parser;
use redmon::output::{self, OutputFormat};
use redmon::stats::Stats;

#[derive(ClapParser)]
#[command(
    name = "redmon",
    about = "Decode MONITOR output into structured command records"
)]
struct Cli {
    /// Show how long decoding took
    #[arg(long, global = true)]
    timing: bool,

    /// Report skipped lines and config resolution on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read parser settings from this file instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the command case mode (preserve, upper, lower)
    #[arg(long, global = true, value_parser = parse_case)]
    command_case: Option<CaseMode>,

    /// Override the argument case mode (preserve, upper, lower)
    #[arg(long, global = true, value_parser = parse_case)]
    args_case: Option<CaseMode>,

    /// Accept argument tokens that do not open with a quote
    #[arg(long, global = true)]
    lenient: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode each line and print one record per line
    Parse {
        /// Monitor log to read (stdin if omitted)
        file: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Include the original line in each record
        #[arg(long)]
        raw: bool,
        /// Fail on the first line that cannot be decoded
        #[arg(long)]
        strict: bool,
    },
    /// Summarize command, key and database counts
    Stats {
        /// Monitor log to read (stdin if omitted)
        file: Option<PathBuf>,
        /// How many commands and keys to list
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective parser configuration
    Config {
        /// Validate this config file instead
        #[arg(long, value_name = "PATH")]
        check: Option<PathBuf>,
    },
}

fn parse_case(s: &str) -> Result<CaseMode, String> {
    CaseMode::parse(s).ok_or_else(|| format!("unknown case mode '{s}'"))
}

/// Resolve the parser config: file layers, then env, then command-line flags.
fn resolve_config(cli: &Cli) -> anyhow::Result<ParserConfig> {
    let mut cfg = if let Some(ref path) = cli.config {
        if cli.verbose {
            eprintln!("[redmon] using config {}", path.display());
        }
        let mut cfg = ParserConfig::check_file(path)?;
        cfg.apply_env(cli.verbose);
        cfg
    } else {
        ParserConfig::load(cli.verbose)?
    };
    if let Some(mode) = cli.command_case {
        cfg.command_case = mode;
    }
    if let Some(mode) = cli.args_case {
        cfg.args_case = mode;
    }
    if cli.lenient {
        cfg.unquoted_args = UnquotedArgs::Lenient;
    }
    Ok(cfg)
}

fn open_input(file: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    match file {
        Some(path) => {
            let f = std::fs::File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(f)))
        }
        None => Ok(Box::new(BufReader::new(std::io::stdin()))),
    }
}

/// Feed every non-blank line of `input` to `on_line`, with its 1-based number.
/// Lines that are not valid UTF-8 are decoded lossily.
fn for_each_line(
    mut input: Box<dyn BufRead>,
    mut on_line: impl FnMut(usize, &str) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let mut buf = Vec::new();
    let mut lineno = 0;
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).context("failed to read input")? == 0 {
            return Ok(());
        }
        lineno += 1;
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        on_line(lineno, line)?;
    }
}

fn cmd_parse(
    file: Option<&Path>,
    format: OutputFormat,
    raw: bool,
    strict: bool,
    cli: &Cli,
) -> anyhow::Result<i32> {
    let parser = Parser::new(resolve_config(cli)?);
    let input = open_input(file)?;
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    let mut skipped = 0usize;

    let start = std::time::Instant::now();
    for_each_line(input, |lineno, line| {
        match parser.decode(line) {
            Ok(parsed) => writeln!(out, "{}", output::render(&parsed, format, raw)?)?,
            Err(e) if strict => anyhow::bail!("line {lineno}: {e}"),
            Err(e) => {
                skipped += 1;
                if cli.verbose {
                    eprintln!("[redmon] skipped line {lineno}: {e}");
                }
            }
        }
        Ok(())
    })?;
    out.flush()?;
    let elapsed = start.elapsed();

    if cli.verbose && skipped > 0 {
        eprintln!("[redmon] {skipped} line(s) skipped");
    }
    if cli.timing {
        eprintln!("[redmon] decoding took {:.1}ms", elapsed.as_secs_f64() * 1000.0);
    }
    Ok(0)
}

fn cmd_stats(file: Option<&Path>, top: usize, json: bool, cli: &Cli) -> anyhow::Result<i32> {
    let parser = Parser::new(resolve_config(cli)?);
    let input = open_input(file)?;
    let mut stats = Stats::new();

    let start = std::time::Instant::now();
    for_each_line(input, |lineno, line| {
        match parser.decode(line) {
            Ok(parsed) => stats.record(&parsed),
            Err(e) => {
                stats.record_unrecognized();
                if cli.verbose {
                    eprintln!("[redmon] skipped line {lineno}: {e}");
                }
            }
        }
        Ok(())
    })?;
    let elapsed = start.elapsed();

    let summary = stats.summary(top);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "lines: {}  decoded: {}  unrecognized: {}",
            summary.total_lines, summary.decoded, summary.unrecognized
        );
        if let Some(span) = summary.span_secs {
            println!("span: {span:.3}s");
        }
        for (db, count) in &summary.dbs {
            println!("db {db}: {count}");
        }
        if !summary.top_commands.is_empty() {
            println!("top commands:");
            for (cmd, count) in &summary.top_commands {
                println!("  {count:>8}  {cmd}");
            }
        }
        if !summary.top_keys.is_empty() {
            println!("top keys:");
            for (key, count) in &summary.top_keys {
                println!("  {count:>8}  {}", key.escape_debug());
            }
        }
    }

    if cli.timing {
        eprintln!("[redmon] decoding took {:.1}ms", elapsed.as_secs_f64() * 1000.0);
    }
    Ok(0)
}

fn cmd_config(check: Option<&Path>, cli: &Cli) -> anyhow::Result<i32> {
    if let Some(path) = check {
        ParserConfig::check_file(path)?;
        eprintln!("[redmon] {} is valid", path.display());
        return Ok(0);
    }
    let cfg = resolve_config(cli)?;
    let mut table = toml::Table::new();
    table.insert("parser".to_string(), toml::Value::try_from(cfg)?);
    print!("{}", toml::to_string(&table)?);
    Ok(0)
}

fn main() {
    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Parse {
            file,
            format,
            raw,
            strict,
        } => cmd_parse(file.as_deref(), *format, *raw, *strict, &cli),
        Commands::Stats { file, top, json } => cmd_stats(file.as_deref(), *top, *json, &cli),
        Commands::Config { check } => cmd_config(check.as_deref(), &cli),
    };
    let exit_code = result.unwrap_or_else(|e| {
        eprintln!("[redmon] error: {e:#}");
        1
    });
    std::process::exit(exit_code);
}
