//! Multi-phase code translation pipeline with a differential test harness.
//!
//! `run` drives the collaborator backend through the configured phases,
//! `compare` and `validate` expose the harness directly, and `tool` serves the
//! JSON tool contracts to a collaborator runtime.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use transpipe::core::language::Language;
use transpipe::exit_codes;
use transpipe::io::collaborator::CommandCollaborator;
use transpipe::io::config::load_config;
use transpipe::io::harness::DifferentialHarness;
use transpipe::io::prompt::TemplateRenderer;
use transpipe::io::tools::{ToolName, Toolbox};
use transpipe::io::validator::validate_code;
use transpipe::logging;
use transpipe::run::Pipeline;

#[derive(Parser)]
#[command(
    name = "transpipe",
    version,
    about = "Phase-sequenced code translation with differential testing"
)]
struct Cli {
    /// Pipeline configuration file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "transpipe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline over a source file and print the outcome.
    Run {
        input: PathBuf,
        /// Identifier stored under `program_key`.
        #[arg(long)]
        key: Option<String>,
    },
    /// Compare two implementations test by test.
    Compare {
        #[arg(long)]
        impl_a: PathBuf,
        #[arg(long)]
        impl_b: PathBuf,
        #[arg(long)]
        tests_a: PathBuf,
        #[arg(long)]
        tests_b: PathBuf,
        /// File piped to every test's stdin.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Syntax-check a source file without running it.
    Validate {
        file: PathBuf,
        #[arg(long, value_enum)]
        lang: Language,
    },
    /// Call a tool with JSON arguments read from stdin.
    Tool {
        #[arg(value_enum)]
        name: ToolName,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { input, key } => cmd_run(&cli.config, &input, key.as_deref()),
        Command::Compare {
            impl_a,
            impl_b,
            tests_a,
            tests_b,
            input,
        } => cmd_compare(
            &cli.config,
            [&impl_a, &impl_b, &tests_a, &tests_b],
            input.as_deref(),
        ),
        Command::Validate { file, lang } => cmd_validate(&cli.config, &file, lang),
        Command::Tool { name } => cmd_tool(&cli.config, name),
    }
}

fn cmd_run(config_path: &Path, input: &Path, key: Option<&str>) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let source = read_source(input)?;
    let collaborator = CommandCollaborator::new(cfg.collaborator.clone())?;
    let renderer = TemplateRenderer::new();
    let expected: Vec<String> = cfg.output_keys().into_iter().map(str::to_string).collect();
    let pipeline = Pipeline::new(cfg, &collaborator, &renderer)?;

    let outcome = pipeline.run(&source, key)?;
    print_json(&outcome)?;
    let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    if outcome.expected_outputs_present(&expected) {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::INCOMPLETE)
    }
}

fn cmd_compare(config_path: &Path, sources: [&PathBuf; 4], input: Option<&Path>) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let [impl_a, impl_b, tests_a, tests_b] = sources.map(|path| read_source(path));
    let stdin = input.map(read_source).transpose()?.unwrap_or_default();

    let summary = DifferentialHarness::new(cfg.harness).compare(
        &impl_a?, &impl_b?, &tests_a?, &tests_b?, &stdin,
    );
    print_json(&summary)?;
    if summary.matched {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::MISMATCH)
    }
}

fn cmd_validate(config_path: &Path, file: &Path, lang: Language) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let source = read_source(file)?;
    let report = validate_code(lang, &source, &cfg.harness);
    print_json(&report)?;
    if report.valid {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::MISMATCH)
    }
}

fn cmd_tool(config_path: &Path, name: ToolName) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("read tool arguments from stdin")?;
    let args: Value = serde_json::from_str(&raw).context("parse tool arguments")?;
    let result = Toolbox::new(cfg.harness).call(name, args)?;
    print_json(&result)?;
    Ok(exit_codes::OK)
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{out}");
    Ok(())
}
