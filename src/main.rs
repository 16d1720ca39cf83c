//! Sable Compiler command line

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sable::frontend::module::ModuleLoader;
use sable::{Compiler, CompilerOptions};

/// Sable Compiler
#[derive(Parser, Debug)]
#[command(name = "sablec")]
#[command(version = "0.1.0")]
#[command(about = "Sable compiler - semantic checker for Sable modules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a source file and everything it imports
    Check {
        /// Input source file (.sbl)
        input: PathBuf,

        #[command(flatten)]
        project: ProjectArgs,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the symbols of a module as JSON
    Symbols {
        /// Input source file (.sbl)
        input: PathBuf,

        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct ProjectArgs {
    /// Project root (defaults to the directory of the input file)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Additional directory to search for imports
    #[arg(short = 'I', long = "search-path", value_name = "DIR")]
    search_paths: Vec<PathBuf>,

    /// Allow github.com/... imports from the .modules cache
    #[arg(long)]
    allow_remote: bool,
}

impl ProjectArgs {
    fn options(&self, input: &Path) -> CompilerOptions {
        let root = self.root.clone().unwrap_or_else(|| {
            input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        let mut options = CompilerOptions::new(root).with_remote_imports(self.allow_remote);
        for path in &self.search_paths {
            options = options.with_search_path(path.clone());
        }
        options
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Check { input, project, json } => check_file(&input, &project, json),
        Commands::Symbols { input, project } => print_symbols(&input, &project),
        Commands::Version => {
            println!("sablec 0.1.0");
            println!("Sable Compiler");
            println!("License: Apache-2.0");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn analyze(input: &Path, project: &ProjectArgs) -> anyhow::Result<(Compiler<ModuleLoader>, String)> {
    let loader = ModuleLoader::from_fs(project.options(input));
    let mut compiler = Compiler::new(loader)?;
    let key = compiler
        .check(input)
        .with_context(|| format!("could not check {}", input.display()))?;
    Ok((compiler, key))
}

fn check_file(input: &Path, project: &ProjectArgs, json: bool) -> anyhow::Result<ExitCode> {
    let (compiler, _) = analyze(input, project)?;
    let diagnostics = compiler.diagnostics();

    if json {
        println!("{}", serde_json::to_string_pretty(diagnostics.as_slice())?);
    } else {
        for diagnostic in diagnostics.iter() {
            eprintln!("{}\n", diagnostic);
        }
    }

    if diagnostics.has_errors() {
        eprintln!("Checked {}: {}", input.display(), diagnostics.summary());
        return Ok(ExitCode::FAILURE);
    }
    if !json {
        println!(
            "\u{2705} No errors found ({} modules, {})",
            compiler.context().module_count(),
            diagnostics.summary()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn print_symbols(input: &Path, project: &ProjectArgs) -> anyhow::Result<ExitCode> {
    let (compiler, key) = analyze(input, project)?;
    if compiler.diagnostics().should_stop() {
        for diagnostic in compiler.diagnostics().iter() {
            eprintln!("{}\n", diagnostic);
        }
        bail!("analysis of '{}' stopped early", key);
    }
    let symbols = compiler.dump_symbols(&key)?;
    println!("{}", serde_json::to_string_pretty(&symbols)?);
    Ok(ExitCode::SUCCESS)
}
