use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const TASK_ID: &str = "alice_1700000000";

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn log_dir(&self) -> PathBuf {
        self.xdg_state.join("studywatch")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("studywatch");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }
}

fn run_watch(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("studywatch-watch"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute studywatch-watch: {e}"))
}

fn describe(args: &[&str], output: &Output) -> String {
    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "studywatch-watch {rendered_args}\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

/// Mock the three task endpoints with fixed bodies.
fn mock_task(server: &mut mockito::ServerGuard, status_body: &str, logs_body: &str) {
    server
        .mock("GET", "/api/health")
        .with_status(200)
        .with_body(r#"{"status": true, "msg": "OK"}"#)
        .create();
    server
        .mock("GET", format!("/api/task/{TASK_ID}").as_str())
        .with_status(200)
        .with_body(status_body)
        .create();
    server
        .mock("GET", format!("/api/task/{TASK_ID}/details").as_str())
        .with_status(200)
        .with_body(r#"{"status": true, "data": {"courses": [], "active_jobs": {}}}"#)
        .create();
    server
        .mock("GET", format!("/api/logs/{TASK_ID}").as_str())
        .with_status(200)
        .with_body(logs_body)
        .create();
}

#[test]
fn watch_completed_task_prints_logs_and_exits_zero() {
    let env = CliTestEnv::new();
    let mut server = mockito::Server::new();
    mock_task(
        &mut server,
        r#"{"status": true, "data": {"status": "completed", "progress": 5, "total": 5}}"#,
        r#"{"status": true, "data": [
            {"timestamp": 1000, "level": "info", "message": "ch1 done"},
            {"timestamp": 1002, "level": "success", "message": "done"}
        ]}"#,
    );

    let server_url = format!("{}/api", server.url());
    let args = [TASK_ID, "--server", server_url.as_str(), "--interval-ms", "500"];
    let output = run_watch(&env, &args);

    assert_eq!(output.status.code(), Some(0), "{}", describe(&args, &output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("INFO     ch1 done"), "{}", describe(&args, &output));
    assert!(stdout.contains("SUCCESS  done"));
    assert!(stdout.contains(&format!("Task {TASK_ID} completed (5/5 courses)")));

    assert!(
        env.log_dir().exists(),
        "log directory should exist at {}",
        env.log_dir().display()
    );
}

#[test]
fn watch_failed_task_reports_error_and_exits_one() {
    let env = CliTestEnv::new();
    let mut server = mockito::Server::new();
    mock_task(
        &mut server,
        r#"{"status": true, "data": {"status": "error", "progress": 1, "total": 3, "error": "login failed"}}"#,
        r#"{"status": true, "data": []}"#,
    );

    let server_url = format!("{}/api", server.url());
    let args = [TASK_ID, "--server", server_url.as_str()];
    let output = run_watch(&env, &args);

    assert_eq!(output.status.code(), Some(1), "{}", describe(&args, &output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("login failed"), "{}", describe(&args, &output));
}

#[test]
fn watch_uses_server_from_config_file() {
    let env = CliTestEnv::new();
    let mut server = mockito::Server::new();
    mock_task(
        &mut server,
        r#"{"status": true, "data": {"status": "completed", "progress": 2, "total": 2}}"#,
        r#"{"status": true, "data": []}"#,
    );
    env.write_config(&format!(
        "[server]\nbase_url = \"{}/api\"\n\n[monitor]\ninterval_ms = 500\n",
        server.url()
    ));

    let args = [TASK_ID];
    let output = run_watch(&env, &args);

    assert_eq!(output.status.code(), Some(0), "{}", describe(&args, &output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("completed (2/2 courses)"));
}

#[test]
fn watch_rejects_zero_interval() {
    let env = CliTestEnv::new();
    let args = [TASK_ID, "--interval-ms", "0"];
    let output = run_watch(&env, &args);

    assert!(!output.status.success(), "{}", describe(&args, &output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("interval_ms"), "{}", describe(&args, &output));
}

#[test]
fn watch_requires_task_id() {
    let env = CliTestEnv::new();
    let output = run_watch(&env, &[]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TASK_ID"));
}

#[test]
fn watch_help_lists_overrides() {
    let env = CliTestEnv::new();
    let output = run_watch(&env, &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--server"));
    assert!(stdout.contains("--interval-ms"));
}
