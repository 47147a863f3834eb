use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("compass-download").unwrap();
    cmd.env("COMPASS_DOWNLOADER_DIR", dir.path())
        .env_remove("COMPASS_PASSWORD");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("download"))
        .stdout(contains("config"));
}

#[test]
fn test_config_shows_paths() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(contains("config.json"))
        .stdout(contains("Download route:   download"));
}

#[test]
fn test_init_writes_settings() {
    let dir = TempDir::new().unwrap();
    cmd(&dir).arg("init").assert().success();
    assert!(dir.path().join("config.json").exists());
}

#[test]
fn test_download_requires_backend() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .args([
            "download",
            "--public-key",
            "backend.pem",
            "--private-key",
            "client.pem",
            "-u",
            "alice",
        ])
        .assert()
        .failure();
}

#[test]
fn test_download_missing_key_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.pem");
    cmd(&dir)
        .args(["download", "--url", "http://127.0.0.1:9/api", "-u", "alice", "--password", "secret"])
        .arg("--public-key")
        .arg(&missing)
        .arg("--private-key")
        .arg(&missing)
        .arg("-o")
        .arg(dir.path().join("out.zip"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("The download failed"));
    assert!(!dir.path().join("out.zip").exists());
}
