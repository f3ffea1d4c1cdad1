use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

const JOIN: &str = r#"{"msg":"user joining project","clientId":"c1","userId":"u1","projectId":"p1","time":"2024-01-01T00:00:00.000Z"}"#;
const OTHER_JOIN: &str = r#"{"msg":"user joining project","clientId":"c2","userId":"u2","projectId":"p1","time":"2024-01-01T00:05:00.000Z","userAgent":"Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0"}"#;
const LEAVE: &str = r#"{"msg":"client leaving project","clientId":"c1","userId":"u1","projectId":"p1","time":"2024-01-01T00:10:00.000Z"}"#;

struct ExporterGuard {
    child: Child,
}

impl Drop for ExporterGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind probe listener");
    listener.local_addr().expect("Failed to read probe address").port()
}

fn spawn_exporter(logs_dir: &Path, state_file: &Path, port: u16) -> ExporterGuard {
    let child = Command::new(env!("CARGO_BIN_EXE_realtime-exporter"))
        .arg("--logs-path")
        .arg(logs_dir)
        .arg("--savestate-file")
        .arg(state_file)
        .arg("--polling-time")
        .arg("1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--bind-address")
        .arg("127.0.0.1")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn realtime-exporter");
    ExporterGuard { child }
}

fn scrape(port: u16) -> Option<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).ok()?;
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .ok()?;
    let mut response = String::new();
    stream.read_to_string(&mut response).ok()?;
    Some(response)
}

fn wait_for_metric(port: u16, needle: &str, timeout: Duration) -> String {
    let deadline = Instant::now() + timeout;
    let mut last = String::new();
    while Instant::now() < deadline {
        if let Some(response) = scrape(port) {
            if response.contains(needle) {
                return response;
            }
            last = response;
        }
        sleep(Duration::from_millis(50));
    }
    panic!("Timed out waiting for `{}`; last scrape:\n{}", needle, last);
}

fn wait_for_file(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for {}", path.display());
}

#[test]
fn exporter_serves_metrics_from_log_file() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let log_file = temp_dir.path().join("real-time.log");
    fs_err::write(&log_file, format!("{}\n{}\n{}\n", JOIN, OTHER_JOIN, LEAVE)).expect("write log");
    let state_file = temp_dir.path().join("state.json");
    let port = free_port();

    let _exporter = spawn_exporter(temp_dir.path(), &state_file, port);
    let body = wait_for_metric(
        port,
        "realtime_session_duration_seconds_sum 600.0",
        Duration::from_secs(10),
    );

    assert!(body.starts_with("HTTP/1.1 200 OK"));
    assert!(body.contains("realtime_exporter_info{version=\"1.0\"} 1\n"));
    assert!(body.contains("realtime_project_joins_total{browser=\"Other\",os=\"Other\"} 1\n"));
    assert!(body.contains("realtime_project_joins_total{browser=\"Chrome\",os=\"Windows NT\"} 1\n"));
    assert!(body.contains("realtime_project_leaves_total{browser=\"Other\",os=\"Other\"} 1\n"));
    assert!(body.contains("realtime_active_connections 1\n"));
    assert!(body.contains("realtime_active_users 1\n"));
    assert!(body.contains("realtime_unique_users_total 2\n"));
    assert!(body.contains("realtime_session_duration_seconds_count 1\n"));
}

#[test]
fn exporter_restores_open_sessions_after_restart() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let log_file = temp_dir.path().join("real-time.log");
    fs_err::write(&log_file, format!("{}\n", JOIN)).expect("write log");
    let state_file = temp_dir.path().join("state.json");

    {
        let port = free_port();
        let _exporter = spawn_exporter(temp_dir.path(), &state_file, port);
        wait_for_metric(port, "realtime_active_connections 1\n", Duration::from_secs(10));
        wait_for_file(&state_file, Duration::from_secs(10));
    }

    fs_err::write(&log_file, format!("{}\n{}\n", JOIN, LEAVE)).expect("append leave");
    let port = free_port();
    let _exporter = spawn_exporter(temp_dir.path(), &state_file, port);
    let body = wait_for_metric(
        port,
        "realtime_session_duration_seconds_sum 600.0",
        Duration::from_secs(10),
    );

    assert!(body.contains("realtime_project_joins_total{browser=\"Other\",os=\"Other\"} 1\n"));
    assert!(body.contains("realtime_active_connections 0\n"));
}
