//! Core-dump capture CLI.
//!
//! `dumpcore dump` crashes a runtime on purpose and moves the resulting core
//! file into a directory; `dumpcore exec-script` runs a shell exercise
//! submission between fixture commands; `dumpcore init-config` writes the
//! default config file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use dumpcore::core::types::CoreDumpRequest;
use dumpcore::dump::SystemCoreDumper;
use dumpcore::error::DumpCoreError;
use dumpcore::exercise::ShellScriptExercise;
use dumpcore::exit_codes;
use dumpcore::io::config::{DumpConfig, load_config, write_config};
use dumpcore::logging;

#[derive(Parser)]
#[command(
    name = "dumpcore",
    version,
    about = "Produce and collect core dumps for exercise verification"
)]
struct Cli {
    /// Path to the TOML config file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "dumpcore.toml")]
    config: PathBuf,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crash the runtime and move its core file into `--dest`.
    Dump {
        /// Directory the core file is moved into (created if missing).
        #[arg(long)]
        dest: PathBuf,
        /// Script to crash instead of the built-in expression.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Show a "please wait" message if the dump takes a while.
        #[arg(long)]
        progress: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run a shell exercise submission with fixture commands around it.
    ExecScript {
        submission: PathBuf,
        /// Command run before the submission (repeatable).
        #[arg(long = "pre")]
        pre: Vec<String>,
        /// Command run after the submission (repeatable).
        #[arg(long = "post")]
        post: Vec<String>,
    },
    /// Write the default config to `--config`.
    InitConfig {
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Dump {
            dest,
            script,
            progress,
            json,
        } => cmd_dump(&load(&cli.config)?, dest, script, progress, json),
        Command::ExecScript {
            submission,
            pre,
            post,
        } => cmd_exec_script(&load(&cli.config)?, &submission, pre, post),
        Command::InitConfig { force } => cmd_init_config(&cli.config, force),
    }
}

fn load(path: &Path) -> Result<DumpConfig> {
    let cfg = load_config(path).context("load config")?;
    debug!(config = %path.display(), "config loaded");
    Ok(cfg)
}

fn cmd_init_config(path: &Path, force: bool) -> Result<i32> {
    if !write_config(path, &DumpConfig::default(), force)? {
        eprintln!(
            "{} already exists; pass --force to replace it",
            path.display()
        );
        return Ok(exit_codes::INVALID);
    }
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_dump(
    cfg: &DumpConfig,
    dest: PathBuf,
    script: Option<PathBuf>,
    progress: bool,
    json: bool,
) -> Result<i32> {
    let mut request = CoreDumpRequest::new(dest).with_progress(progress);
    if let Some(script) = script {
        request = request.with_script(script);
    }

    let result = SystemCoreDumper::from_config(cfg).dump_core(&request)?;
    if json {
        let payload = serde_json::to_string(&result).context("serialize result json")?;
        println!("{payload}");
    } else {
        println!("{}", result.destination_path.display());
    }
    Ok(exit_codes::OK)
}

fn cmd_exec_script(
    cfg: &DumpConfig,
    submission: &Path,
    pre: Vec<String>,
    post: Vec<String>,
) -> Result<i32> {
    let mut exercise = ShellScriptExercise::new(&cfg.exercise.shell)
        .pre(pre)
        .post(post);
    exercise.timeout = cfg.exercise.timeout_secs.map(Duration::from_secs);
    exercise.output_limit_bytes = cfg.output_limit_bytes;

    exercise.process(submission, |run| -> Result<i32> {
        std::io::stdout()
            .write_all(run.stdout.as_bytes())
            .context("write stdout")?;
        std::io::stderr()
            .write_all(run.stderr.as_bytes())
            .context("write stderr")?;
        if run.timed_out {
            eprintln!("submission timed out");
            return Ok(exit_codes::INVALID);
        }
        Ok(run.status.code().unwrap_or(exit_codes::INVALID))
    })?
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<DumpCoreError>()
        .map(|err| exit_codes::for_stage(err.stage()))
        .unwrap_or(exit_codes::INVALID)
}
