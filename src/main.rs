use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use walkdir::WalkDir;

use awsup::diag::{Diagnostics, Severity};
use awsup::{cfnjson, config, eval, schema};

#[derive(Parser)]
#[command(name = "awsup")]
#[command(about = "awsup is a transpiler for authoring AWS CloudFormation templates")]
#[command(
    long_about = "awsup is a transpiler that generates AWS CloudFormation templates based on\na convenient, readable source language."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate CloudFormation template JSON from awsup configuration
    Generate {
        /// Source directory or file
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Pass constants from values files into the root module (repeatable)
        #[arg(long = "constants", short = 'c', value_name = "FILE")]
        constants: Vec<PathBuf>,
    },
    /// Rewrite .awsup files into the canonical formatting
    Fmt {
        /// Report files that would change instead of rewriting them
        #[arg(long = "check-only", short = 'c')]
        check_only: bool,

        /// Files or directories to format
        #[arg(value_name = "PATH", default_value = ".")]
        paths: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Usage problems exit 1; diagnostic errors exit 2.
            return match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }
                _ => ExitCode::from(1),
            };
        }
    };

    let code = match cli.command {
        Commands::Generate { path, constants } => run_generate(&path, &constants),
        Commands::Fmt { check_only, paths } => run_fmt(check_only, &paths),
    };
    ExitCode::from(code)
}

fn run_generate(path: &Path, constants_files: &[PathBuf]) -> u8 {
    let mut parser = config::Parser::new();
    let mut diags = Diagnostics::new();

    let sch = schema::Schema::builtin();

    let (input_constants, constants_diags) = parser.parse_values_files(constants_files);
    diags.append(constants_diags);
    if diags.has_errors() {
        print_diagnostics(&diags);
        return 2;
    }

    let (ctx, ctx_diags) = eval::RootContext::new(&mut parser, path, &input_constants);
    diags.append(ctx_diags);
    if diags.has_errors() {
        print_diagnostics(&diags);
        return 2;
    }

    let (template, template_diags) = ctx.build(&sch);
    diags.append(template_diags);
    if diags.has_errors() {
        print_diagnostics(&diags);
        return 2;
    }

    println!("{}", cfnjson::marshal(&template));

    // No errors, but there may still be warnings to report.
    print_diagnostics(&diags);
    0
}

fn run_fmt(check_only: bool, paths: &[PathBuf]) -> u8 {
    let mut failed = false;
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                let is_source = entry.file_type().is_file()
                    && entry
                        .path()
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| ext.eq_ignore_ascii_case("awsup"))
                        .unwrap_or(false);
                if is_source {
                    failed |= fmt_file(entry.path(), check_only).is_err();
                }
            }
        } else {
            failed |= fmt_file(path, check_only).is_err();
        }
    }
    if failed {
        2
    } else {
        0
    }
}

fn fmt_file(path: &Path, check_only: bool) -> Result<()> {
    let result = (|| -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let body = hcl::parse(&content).with_context(|| format!("parsing {}", path.display()))?;
        let formatted = hcl::format::to_string(&body)
            .with_context(|| format!("formatting {}", path.display()))?;
        if formatted == content {
            return Ok(());
        }
        if check_only {
            println!("{}", path.display());
        } else {
            std::fs::write(path, formatted)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("reformatted {}", path.display());
        }
        Ok(())
    })();

    if let Err(err) = &result {
        eprintln!("Error: {:#}", err);
    }
    result
}

fn print_diagnostics(diags: &Diagnostics) {
    if diags.is_empty() {
        return;
    }

    let mut stderr = io::stderr().lock();
    let color = io::stderr().is_terminal();
    for diag in diags.iter() {
        let (label, code) = match diag.severity {
            Severity::Error => ("Error", "31"),
            Severity::Warning => ("Warning", "33"),
        };
        let _ = if color {
            writeln!(stderr, "\x1b[1;{}m{}:\x1b[0m {}", code, label, diag.summary)
        } else {
            writeln!(stderr, "{}: {}", label, diag.summary)
        };
        if !diag.detail.is_empty() {
            let _ = writeln!(stderr, "  {}", diag.detail);
        }
        if let Some(subject) = &diag.subject {
            let _ = writeln!(stderr, "  at: {}", subject);
        }
    }
}
