use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hsbc_ingest::{ParseError, ParseOptions, Statement};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod pdf;
mod state;

#[derive(Parser, Debug)]
#[command(name = "hsbc-parse", version, about = "HSBC HK credit card eStatement parser")]
struct Cli {
    /// Log filter (e.g. `debug`, `hsbc_parse=trace`); overrides RUST_LOG and config
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a PDF eStatement and print it as JSON
    Parse {
        pdf: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Parse pre-extracted statement text (pages separated by form feeds)
    ParseText {
        txt: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the normalized logical lines the parser sees
    Lines {
        /// PDF or text file
        path: PathBuf,
    },

    /// Manage ~/.hsbc-parse/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Print version and build commit
    Version,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Write JSON to this file instead of stdout (always pretty-printed)
    #[arg(short = 'o', long)]
    out: Option<PathBuf>,

    /// Pretty-print JSON
    #[arg(long)]
    pretty: bool,

    /// Report parse failures as JSON on stdout
    #[arg(long)]
    error_json: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file if none exists
    Init,
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    init_tracing(cli.log_level.as_deref(), &cfg.log.level)?;

    match cli.command {
        Command::Parse { pdf, output } => {
            let pages = pdf::pdf_pages(&pdf)?;
            run_parse(&pdf, &pages, &output, &cfg)?;
        }

        Command::ParseText { txt, output } => {
            let text = fs::read_to_string(&txt).with_context(|| format!("read {}", txt.display()))?;
            let pages = hsbc_ingest::normalize::split_pages(&text);
            run_parse(&txt, &pages, &output, &cfg)?;
        }

        Command::Lines { path } => {
            let pages = pdf::read_pages(&path)?;
            let parser = hsbc_ingest::Parser::new(parse_options(&cfg))?;
            for line in parser.lines(&pages) {
                println!("{:>3}:{:<4} {}", line.page, line.number, line.text);
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
            ConfigCommand::Path => println!("{}", config::config_path()?.display()),
        },

        Command::Version => println!("{}", version_line()),
    }

    Ok(())
}

/// `hsbc-parse 0.1.0 (<git describe>)`, or `unknown` outside a checkout.
fn version_line() -> String {
    format!(
        "hsbc-parse {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("HSBC_PARSE_BUILD_SHA")
    )
}

fn init_tracing(cli_level: Option<&str>, config_level: &str) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid --log-level {level:?}"))?,
        None if std::env::var_os("RUST_LOG").is_some() => EnvFilter::from_default_env(),
        None => EnvFilter::try_new(config_level)
            .with_context(|| format!("invalid log.level {config_level:?} in config"))?,
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("install tracing subscriber")?;
    Ok(())
}

fn parse_options(cfg: &config::Config) -> ParseOptions {
    ParseOptions {
        extra_boilerplate: cfg.normalizer.extra_boilerplate.clone(),
    }
}

fn run_parse(source: &Path, pages: &[Vec<String>], output: &OutputArgs, cfg: &config::Config) -> Result<()> {
    tracing::info!(path = %source.display(), pages = pages.len(), "parsing statement");

    let parser = hsbc_ingest::Parser::new(parse_options(cfg))?;
    match parser.parse_pages(pages) {
        Ok(stmt) => {
            tracing::info!(
                product = %stmt.product,
                date = %stmt.statement_date,
                sub_accounts = stmt.sub_accounts.len(),
                cards = stmt.sub_accounts.iter().map(|s| s.cards.len()).sum::<usize>(),
                transactions = stmt.transaction_count(),
                "parsed statement"
            );
            write_statement(&stmt, output, cfg.output.pretty)
        }
        Err(err) => {
            tracing::warn!(kind = %err.kind, "parse failed");
            report_failure(&err, output.error_json)?;
            std::process::exit(1);
        }
    }
}

fn write_statement(stmt: &Statement, output: &OutputArgs, pretty_default: bool) -> Result<()> {
    match &output.out {
        Some(path) => {
            let json = serde_json::to_string_pretty(stmt).context("serialize statement")?;
            fs::write(path, json + "\n").with_context(|| format!("write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote statement");
        }
        None => {
            let json = if output.pretty || pretty_default {
                serde_json::to_string_pretty(stmt)
            } else {
                serde_json::to_string(stmt)
            }
            .context("serialize statement")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn report_failure(err: &ParseError, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string(err).context("serialize error")?);
    } else {
        eprintln!("ERROR: {err}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_line_carries_build_revision() {
        let line = version_line();
        let rest = line
            .strip_prefix(&format!("hsbc-parse {} (", env!("CARGO_PKG_VERSION")))
            .unwrap();
        let revision = rest.strip_suffix(')').unwrap();
        assert!(!revision.is_empty());
        assert!(!revision.contains(char::is_whitespace));
    }

    #[test]
    fn test_parse_text_flags() {
        let cli = Cli::try_parse_from(["hsbc-parse", "parse-text", "s.txt", "--pretty", "--error-json"]).unwrap();
        match cli.command {
            Command::ParseText { txt, output } => {
                assert_eq!(txt, PathBuf::from("s.txt"));
                assert!(output.pretty && output.error_json);
                assert!(output.out.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
