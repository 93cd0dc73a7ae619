//! Proving Ground command-line entry point

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::task::LocalSet;
use tracing::{debug, info, warn};

use proving_ground::cli::{self, Args};
use proving_ground::config::{expand_path, AppConfig, EnvConfig};
use proving_ground::discovery::{is_test_file, list_tree, ModuleLoader};
use proving_ground::executor::{CaseSettings, Run, RunOptions, Suite};
use proving_ground::output::{build_reporters, status_line, Palette, ReportOptions};
use proving_ground::utils::{init_logger, LogLevel};

mod demos;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logger(LogLevel::from_verbosity(args.verbose));

    // Phase futures and fault channels are not Send; everything runs on one LocalSet.
    let local = LocalSet::new();
    local
        .run_until(async move {
            match args.command {
                cli::Command::Run(run_args) => run_tests(run_args).await,
                cli::Command::List(list_args) => {
                    list_tests(list_args)?;
                    Ok(ExitCode::SUCCESS)
                }
            }
        })
        .await
}

fn load_config(explicit: Option<&Path>, env: &EnvConfig) -> Result<AppConfig> {
    let path: Option<PathBuf> = explicit
        .map(Path::to_path_buf)
        .or_else(|| env.config_file.as_deref().map(expand_path));

    let mut config = match path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_default()?,
    };
    config.apply_env(env);
    Ok(config)
}

async fn run_tests(args: cli::RunArgs) -> Result<ExitCode> {
    let env = EnvConfig::load();
    if env.has_any() {
        debug!("Applying environment overrides: {:?}", env);
    }
    let mut config = load_config(args.config.as_deref(), &env)?;
    args.apply(&mut config);
    config.validate()?;

    let report_options = ReportOptions {
        show_passed: config.show_passed,
        palette: Palette::new(config.color),
        junit_output: config.junit_path(),
    };
    let reporters = build_reporters(&config.reporters, &report_options)?;

    let registry = demos::registry();
    let mut run = Run::new().with_settings(config.case_settings());
    let mut found = 0;
    for path in &args.paths {
        found += run.add_path(path, &registry)?.len();
    }
    info!("Discovered {} test file(s)", found);

    let options = RunOptions::default().stop_on_failure(config.stop_on_failure);
    let summary = run.run(&options).await?;

    for reporter in &reporters {
        debug!("Running {} reporter", reporter.name());
        reporter.report(&run)?;
    }

    println!("\n{}", status_line(&summary, &report_options.palette));

    if found == 0 {
        warn!("No test files found");
        println!("No test files found under the given paths");
        return Ok(ExitCode::FAILURE);
    }

    Ok(if summary.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn list_tests(args: cli::ListArgs) -> Result<()> {
    let registry = demos::registry();
    let settings = CaseSettings::default();

    for path in &args.paths {
        for file in list_tree(path, is_test_file)? {
            let suite = Suite::load(&file, &registry as &dyn ModuleLoader, &settings);
            println!("\n{} ({})", suite.name(), file.display());

            match suite.load_error() {
                Some(error) => println!("   an error occurred while loading this file: {error:#}"),
                None if suite.tests().is_empty() => println!("   no tests"),
                None => {
                    for test in suite.tests() {
                        println!("   {}", test.name());
                    }
                }
            }
        }
    }
    println!();
    Ok(())
}
