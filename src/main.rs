//! minitype CLI
//!
//! Command-line interface for the minitype checker.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use colored::*;
use minitype::{
    analyzer::{AnalyzerOptions, SemanticAnalyzer},
    ast::Module,
    lexer::tokenize,
    parser::parse_source,
    typechecker::{Diagnostic, TypeChecker},
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

/// Exit status when no diagnostics were reported
const EXIT_CLEAN: i32 = 0;
/// Exit status when the checker reported diagnostics
const EXIT_DIAGNOSTICS: i32 = 1;
/// Exit status for fatal errors (unreadable file, syntax error, unsupported construct)
const EXIT_FATAL: i32 = 2;

#[derive(Parser)]
#[command(name = "minitype")]
#[command(version)]
#[command(about = "A small static type checker for a subset of Python", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Source file to check
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Additional callable that declares a generic parameter (TypeVar is always recognised)
    #[arg(
        long = "generic-constructor",
        value_name = "NAME",
        env = "MINITYPE_GENERIC_CONSTRUCTORS",
        value_delimiter = ',',
        global = true
    )]
    generic_constructors: Vec<String>,

    /// Dump the symbol tables to stderr before type checking
    #[arg(long, env = "MINITYPE_DEBUG", global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Type check a source file
    Check {
        /// The source file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Output diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse and display the AST
    Parse {
        /// The source file to parse
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Tokenize and display tokens
    Lex {
        /// The source file to tokenize
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Run the semantic analyzer and display its symbol tables
    Tables {
        /// The source file to analyze
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Compact log lines: no timestamp, span timing kept
struct NoTimestamp;

impl FormatTime for NoTimestamp {
    fn format_time(&self, _w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        Ok(())
    }
}

fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_env("MINITYPE_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_timer(NoTimestamp)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let options = analyzer_options(&cli.generic_constructors);

    let result = match cli.command {
        Some(Commands::Check { file, json }) => check_file(&file, json, &options, cli.debug),
        Some(Commands::Parse { file, json }) => parse_file(&file, json),
        Some(Commands::Lex { file }) => lex_file(&file),
        Some(Commands::Tables { file, json }) => tables_file(&file, json, &options),
        None => match cli.file {
            Some(file) => check_file(&file, false, &options, cli.debug),
            None => {
                let _ = Cli::command().print_help();
                Ok(EXIT_FATAL)
            }
        },
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            std::process::exit(EXIT_FATAL);
        }
    }
}

fn analyzer_options(extra_constructors: &[String]) -> AnalyzerOptions {
    let mut options = AnalyzerOptions::default();
    for name in extra_constructors {
        let name = name.trim();
        if !name.is_empty() && !options.generic_constructors.iter().any(|c| c == name) {
            options.generic_constructors.push(name.to_string());
        }
    }
    options
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn parse_module(path: &Path) -> anyhow::Result<Module> {
    let source = read_source(path)?;
    Ok(parse_source(&source)?)
}

fn analyze_module(module: &Module, options: &AnalyzerOptions) -> anyhow::Result<SemanticAnalyzer> {
    let mut analyzer = SemanticAnalyzer::with_options(options.clone());
    analyzer.analyze(module)?;
    Ok(analyzer)
}

fn check_file(
    path: &Path,
    json: bool,
    options: &AnalyzerOptions,
    debug: bool,
) -> anyhow::Result<i32> {
    let module = parse_module(path)?;
    let analyzer = analyze_module(&module, options)?;

    if debug {
        eprint!("{}", analyzer.tables());
    }

    let diagnostics = TypeChecker::new(&analyzer)?.check(&module)?;

    if json {
        let report = serde_json::json!({
            "file": path.display().to_string(),
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(path, &diagnostics);
    }

    Ok(if diagnostics.is_empty() {
        EXIT_CLEAN
    } else {
        EXIT_DIAGNOSTICS
    })
}

fn print_report(path: &Path, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        println!(
            "{}:{}: {} {}",
            path.display(),
            diagnostic.line,
            "error:".red().bold(),
            diagnostic
        );
    }

    if diagnostics.is_empty() {
        println!("{}", "Success: no issues found in 1 source file".green().bold());
    } else {
        let noun = if diagnostics.len() == 1 { "error" } else { "errors" };
        println!(
            "{}",
            format!(
                "Found {} {} in 1 file (checked 1 source file)",
                diagnostics.len(),
                noun
            )
            .red()
            .bold()
        );
    }
}

fn parse_file(path: &Path, json: bool) -> anyhow::Result<i32> {
    let module = parse_module(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&module)?);
    } else {
        println!("{:#?}", module);
    }

    Ok(EXIT_CLEAN)
}

fn lex_file(path: &Path) -> anyhow::Result<i32> {
    let source = read_source(path)?;

    for token in tokenize(&source)? {
        println!(
            "{}:{} {:?} {:?}",
            token.line, token.column, token.kind, token.lexeme
        );
    }

    Ok(EXIT_CLEAN)
}

fn tables_file(path: &Path, json: bool, options: &AnalyzerOptions) -> anyhow::Result<i32> {
    let module = parse_module(path)?;
    let analyzer = analyze_module(&module, options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(analyzer.tables())?);
    } else {
        print!("{}", analyzer.tables());
    }

    Ok(EXIT_CLEAN)
}
