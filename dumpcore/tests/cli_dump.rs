//! CLI tests for `dumpcore dump` and `dumpcore exec-script`.
//!
//! Spawns the binary with a temp config and checks stdout and exit codes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use dumpcore::core::types::RelocationResult;
use dumpcore::exit_codes;
use dumpcore::io::config::{DumpConfig, ExerciseConfig, load_config, write_config};
use dumpcore::io::core_config::CorePatternSource;
use dumpcore::test_support::write_fake_runtime;

fn write_test_config(dir: &Path, runtime_body: &str) -> PathBuf {
    let cores = dir.join("cores");
    fs::create_dir_all(&cores).expect("cores dir");
    let runtime = write_fake_runtime(dir, runtime_body).expect("runtime");
    let cfg = DumpConfig {
        shell: PathBuf::from("/bin/sh"),
        runtime: runtime.display().to_string(),
        core_pattern: CorePatternSource::Static {
            pattern: cores.join("core.%P.%f").display().to_string(),
        },
        exercise: ExerciseConfig {
            shell: PathBuf::from("/bin/sh"),
            timeout_secs: None,
        },
        ..DumpConfig::default()
    };
    let path = dir.join("dumpcore.toml");
    write_config(&path, &cfg, false).expect("write config");
    path
}

fn dumpcore(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dumpcore"))
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("run dumpcore")
}

#[test]
fn dump_prints_destination_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    let cores = temp.path().join("cores");
    let config = write_test_config(
        temp.path(),
        &format!("echo $$; : > '{}/core.'$$'.node'; exit 134", cores.display()),
    );
    let dest = temp.path().join("dest");

    let output = dumpcore(
        &config,
        &["dump", "--dest", dest.to_str().expect("utf8 path"), "--json"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{output:?}");
    let result: RelocationResult =
        serde_json::from_slice(&output.stdout).expect("parse json output");
    assert_eq!(result.destination_path.parent(), Some(dest.as_path()));
    assert!(result.destination_path.exists());
}

#[test]
fn dump_of_clean_exit_uses_spawn_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_test_config(temp.path(), "echo $$; exit 0");
    let dest = temp.path().join("dest");

    let output = dumpcore(&config, &["dump", "--dest", dest.to_str().expect("utf8 path")]);

    assert_eq!(output.status.code(), Some(exit_codes::SPAWN));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exited successfully"), "{stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn exec_script_forwards_output_and_status() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_test_config(temp.path(), "exit 1");
    let submission = temp.path().join("answer.sh");
    fs::write(&submission, "echo \"$GREETING\"; exit 7\n").expect("write submission");

    let output = dumpcore(
        &config,
        &[
            "exec-script",
            submission.to_str().expect("utf8 path"),
            "--pre",
            "GREETING=hello",
        ],
    );

    assert_eq!(output.status.code(), Some(7));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
}

#[test]
fn exec_script_missing_submission_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_test_config(temp.path(), "exit 1");

    let output = dumpcore(&config, &["exec-script", "/definitely/missing.sh"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read submission"));
}

#[test]
fn init_config_writes_defaults_once() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("conf").join("dumpcore.toml");

    let output = dumpcore(&config, &["init-config"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{output:?}");
    assert_eq!(
        load_config(&config).expect("load written config"),
        DumpConfig::default()
    );

    fs::write(&config, "runtime = \"nodejs\"\n").expect("edit config");
    let output = dumpcore(&config, &["init-config"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--force"));
    assert_eq!(load_config(&config).expect("load").runtime, "nodejs");

    let output = dumpcore(&config, &["init-config", "--force"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&config).expect("load"), DumpConfig::default());
}
