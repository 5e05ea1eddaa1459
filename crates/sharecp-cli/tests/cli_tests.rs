use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

fn sharecp(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sharecp").expect("binary built");
    cmd.arg("--config").arg(config).env_remove("SHARECP_PASSWORD");
    cmd
}

fn stderr_of(cmd: &mut Command) -> (Option<i32>, String) {
    let output = cmd.output().expect("run sharecp");
    (
        output.status.code(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("sharecp")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for sub in ["send", "send-many", "check"] {
        assert!(stdout.contains(sub), "missing {sub} in:\n{stdout}");
    }
}

#[test]
fn missing_server_is_reported() {
    let dir = TempDir::new().unwrap();
    let (code, stderr) = stderr_of(
        sharecp(&dir.path().join("none.toml"))
            .args(["--share", "data", "send", "a.txt", "a.txt"]),
    );
    assert_eq!(code, Some(1));
    assert!(stderr.contains("sharecp: no server given"), "{stderr}");
}

#[test]
fn malformed_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[default\n").unwrap();

    let (code, stderr) = stderr_of(sharecp(&path).arg("check"));
    assert_eq!(code, Some(1));
    assert!(stderr.contains("failed to parse config"), "{stderr}");
}

#[test]
fn send_many_requires_names() {
    let dir = TempDir::new().unwrap();
    let (code, _) = stderr_of(
        sharecp(&dir.path().join("none.toml")).args(["send-many", "--from", "./", "--to", "x/"]),
    );
    assert_eq!(code, Some(2));
}

#[test]
fn refused_connection_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!("[default]\nserver = \"127.0.0.1:{port}\"\nshare = \"data\"\nusername = \"alice\"\n"),
    )
    .unwrap();

    let (code, stderr) = stderr_of(
        sharecp(&config)
            .env("SHARECP_PASSWORD", "pw")
            .args(["--connect-timeout", "2", "check"]),
    );
    assert_eq!(code, Some(1));
    assert!(stderr.contains("cannot connect to 127.0.0.1"), "{stderr}");
}

#[test]
fn missing_smbclient_is_reported() {
    let dir = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let server = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());

    let (code, stderr) = stderr_of(
        sharecp(&dir.path().join("none.toml"))
            .env("SHARECP_PASSWORD", "pw")
            .args(["--server", server.as_str(), "--share", "data", "--user", "alice"])
            .args(["--smbclient", "/nonexistent/sharecp/smbclient", "check"]),
    );
    drop(listener);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("not found"), "{stderr}");
}

#[test]
fn no_password_without_terminal() {
    let dir = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let server = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());

    let (code, stderr) = stderr_of(
        sharecp(&dir.path().join("none.toml"))
            .args(["--server", server.as_str(), "--share", "data", "--user", "alice"])
            .arg("check"),
    );
    drop(listener);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("SHARECP_PASSWORD"), "{stderr}");
}
