//! Integration tests for the singleton launcher public interface.
//!
//! Most tests replace the process table and process creation with fakes. The
//! Unix tests at the bottom use the real process table, some of them through
//! a child copy of this test binary (`helper_process`).

use std::cell::Cell;
use std::io;
use warden_core::process::{ProcessMatch, ProcessQuery, ProcessSource, Spawner};
use warden_core::{
    LaunchCommand, LaunchStatus, MatchMode, ServiceHandle, SingletonLauncher, WardenError,
};

/// Process table that never contains the service.
#[derive(Default)]
struct EmptyTable {
    queries: Cell<usize>,
}

impl ProcessQuery for EmptyTable {
    fn find_by_name(&self, _name: &str, _mode: MatchMode) -> warden_core::Result<Vec<ProcessMatch>> {
        self.queries.set(self.queries.get() + 1);
        Ok(Vec::new())
    }
}

/// Process table that always contains the service at a fixed PID.
struct RunningTable(u32);

impl ProcessQuery for RunningTable {
    fn find_by_name(&self, _name: &str, _mode: MatchMode) -> warden_core::Result<Vec<ProcessMatch>> {
        Ok(vec![ProcessMatch {
            pid: self.0,
            source: ProcessSource::ProcessScan,
            cmdline: Some("/usr/bin/python3 /usr/local/bin/glances -w".into()),
        }])
    }
}

/// Spawner handing out increasing PIDs.
struct CountingSpawner {
    next_pid: Cell<u32>,
    calls: Cell<usize>,
}

impl CountingSpawner {
    fn new() -> Self {
        Self {
            next_pid: Cell::new(31337),
            calls: Cell::new(0),
        }
    }
}

impl Spawner for CountingSpawner {
    fn spawn_detached(&self, _command: &LaunchCommand) -> io::Result<u32> {
        self.calls.set(self.calls.get() + 1);
        let pid = self.next_pid.get();
        self.next_pid.set(pid + 1);
        Ok(pid)
    }
}

fn glances() -> ServiceHandle {
    ServiceHandle::new(
        "glances",
        LaunchCommand::parse("/usr/local/bin/glances -w").unwrap(),
    )
}

#[test]
fn test_glances_login_scenario() {
    let spawner = CountingSpawner::new();
    let mut lines: Vec<String> = Vec::new();
    let mut handle = glances();

    let result = SingletonLauncher::new(EmptyTable::default(), &spawner, &mut lines)
        .ensure_running(&mut handle)
        .unwrap();

    assert_eq!(result.status, LaunchStatus::Launched);
    let pid = result.pid.expect("launched process has a PID");
    assert_ne!(pid, 0);
    assert_eq!(handle.running_pid(), Some(pid));
    assert_eq!(spawner.calls.get(), 1);
    assert_eq!(lines, vec!["start glances".to_string()]);
}

#[test]
fn test_second_login_sees_running_instance() {
    let spawner = CountingSpawner::new();
    let mut lines: Vec<String> = Vec::new();
    let mut launcher = SingletonLauncher::new(RunningTable(2001), &spawner, &mut lines);

    for _ in 0..3 {
        let result = launcher.ensure_running(&mut glances()).unwrap();
        assert_eq!(result.status, LaunchStatus::AlreadyRunning);
        assert_eq!(result.pid, Some(2001));
    }
    drop(launcher);

    assert_eq!(spawner.calls.get(), 0);
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l == "glances is running"));
}

#[test]
fn test_whitespace_name_never_reaches_the_process_table() {
    let table = EmptyTable::default();
    let spawner = CountingSpawner::new();
    let mut handle = ServiceHandle::new("  ", LaunchCommand::new("glances", ["-w"]));

    let err = SingletonLauncher::new(&table, &spawner, Vec::new())
        .ensure_running(&mut handle)
        .unwrap_err();

    assert!(matches!(err, WardenError::Validation { .. }));
    assert_eq!(table.queries.get(), 0);
    assert_eq!(spawner.calls.get(), 0);
}

#[cfg(unix)]
#[test]
fn test_real_launch_is_detected_on_next_call() {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    use warden_core::process::{DetachedSpawner, SysinfoProcessQuery};

    let token = format!("warden-core-e2e-{}", std::process::id());
    let mut handle = ServiceHandle::new(
        token.clone(),
        LaunchCommand::new("sh", ["-c".to_string(), format!("sleep 3600; : {}", token)]),
    );

    let mut launcher =
        SingletonLauncher::new(SysinfoProcessQuery, DetachedSpawner::default(), Vec::new())
            .with_match_mode(MatchMode::CommandLine);

    let first = launcher.ensure_running(&mut handle).unwrap();
    assert_eq!(first.status, LaunchStatus::Launched);
    let pid = first.pid.unwrap();

    let second = launcher.ensure_running(&mut handle).unwrap();
    let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);

    assert_eq!(second.status, LaunchStatus::AlreadyRunning);
    assert_eq!(second.pid, Some(pid));
    assert_eq!(
        launcher.into_sink(),
        vec![format!("start {}", token), format!("{} is running", token)]
    );
}

/// Runs inside a child copy of this test binary, started by the tests below.
///
/// `WARDEN_HELPER_MODE` picks the behavior:
/// - `threads`: keep three worker threads alive for a while
/// - `self-match`: call `ensure_running` for a name found only in this
///   process's own arguments and record the outcome in `WARDEN_HELPER_OUT`
#[test]
#[ignore = "helper process for the multi-threaded detection tests"]
fn helper_process() {
    use std::time::Duration;

    match std::env::var("WARDEN_HELPER_MODE").as_deref() {
        Ok("threads") => {
            let workers: Vec<_> = (0..3)
                .map(|_| std::thread::spawn(|| std::thread::sleep(Duration::from_secs(30))))
                .collect();
            for worker in workers {
                let _ = worker.join();
            }
        }
        Ok("self-match") => {
            use warden_core::process::SysinfoProcessQuery;

            let token = std::env::var("WARDEN_HELPER_TOKEN").unwrap();
            let out = std::env::var("WARDEN_HELPER_OUT").unwrap();

            // A second thread of our own that shares our command line
            let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
            let worker = std::thread::spawn(move || {
                let _ = done_rx.recv();
            });

            let spawner = CountingSpawner::new();
            let mut handle =
                ServiceHandle::new(token, LaunchCommand::new("true", Vec::<String>::new()));
            let result = SingletonLauncher::new(SysinfoProcessQuery, &spawner, Vec::new())
                .with_match_mode(MatchMode::CommandLine)
                .ensure_running(&mut handle)
                .unwrap();

            done_tx.send(()).unwrap();
            worker.join().unwrap();

            std::fs::write(out, format!("{} {}", result.status, spawner.calls.get())).unwrap();
        }
        _ => {}
    }
}

/// Start `helper_process` in a child copy of this binary with `token` on its
/// command line.
#[cfg(unix)]
fn spawn_helper(mode: &str, token: &str, envs: &[(&str, &str)]) -> std::process::Child {
    use std::process::{Command, Stdio};

    Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "helper_process", "--ignored", "--test-threads=1", token])
        .env("WARDEN_HELPER_MODE", mode)
        .envs(envs.iter().copied())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap()
}

#[cfg(unix)]
#[test]
fn test_threaded_service_counts_once() {
    use std::time::{Duration, Instant};
    use warden_core::process::SysinfoProcessQuery;

    let token = format!("warden-threaded-{}", std::process::id());
    let mut child = spawn_helper("threads", &token, &[]);

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut found = Vec::new();
    while Instant::now() < deadline {
        found = SysinfoProcessQuery
            .find_by_name(&token, MatchMode::CommandLine)
            .unwrap();
        if !found.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    // Let the worker threads come up before looking again
    std::thread::sleep(Duration::from_millis(500));
    let settled = SysinfoProcessQuery
        .find_by_name(&token, MatchMode::CommandLine)
        .unwrap();

    let _ = child.kill();
    let _ = child.wait();

    assert!(!found.is_empty(), "helper process never showed up");
    let pids: Vec<u32> = settled.iter().map(|m| m.pid).collect();
    assert_eq!(pids, vec![child.id()]);
}

#[cfg(unix)]
#[test]
fn test_multithreaded_caller_never_matches_itself() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let out = temp_dir.path().join("outcome");
    let token = format!("warden-self-{}", std::process::id());

    let status = spawn_helper(
        "self-match",
        &token,
        &[
            ("WARDEN_HELPER_TOKEN", token.as_str()),
            ("WARDEN_HELPER_OUT", out.to_str().unwrap()),
        ],
    )
    .wait()
    .unwrap();

    assert!(status.success());
    let outcome = std::fs::read_to_string(&out).expect("helper recorded no outcome");
    assert_eq!(outcome, "launched 1");
}
