//! End-to-end tests for the forge binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const CONFIG: &str = r#"
[package]
module = "ehcache"
version = "3.10.8"
group = "org.ehcache"
artifacts = ["core"]

[[package.relocations]]
from = "org/terracotta/"
to = "org/ehcache/shadow/org/terracotta/"

[lookup]
root = "libs"

[publish]
max_attempts = 2
concurrency = 2

[publish.backoff]
initial_ms = 1
max_ms = 2

[[targets]]
name = "local"
kind = "filesystem"
root = "repo"

[[targets]]
name = "images"
kind = "image-layer"
root = "images"
tags = ["${version}", "${version.2}"]
"#;

/// A project directory with an exploded `core` artifact and a forge.toml.
struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::with_config(CONFIG)
    }

    fn with_config(config: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let core = temp_dir.path().join("libs/core");
        write(&core.join("org/ehcache/Cache.class"), b"cache");
        write(&core.join("org/terracotta/Stats.class"), b"stats");
        write(
            &core.join("META-INF/services/org.terracotta.Spi"),
            b"org.terracotta.Impl\n",
        );
        write(&temp_dir.path().join("forge.toml"), config.as_bytes());
        Self { temp_dir }
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    fn config(&self) -> PathBuf {
        self.root().join("forge.toml")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_forge"));
        command
            .arg("--config")
            .arg(self.config())
            .args(args)
            .env_remove("FORGE_MAX_ATTEMPTS")
            .env_remove("FORGE_CONFIG")
            .current_dir(self.root());
        command
    }

    fn forge(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("failed to run forge")
    }
}

fn write(path: &Path, data: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_forge"))
        .arg("--help")
        .output()
        .expect("failed to run forge");
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn test_targets_lists_kinds() {
    let ctx = TestContext::new();
    let output = ctx.forge(&["targets"]);
    assert!(output.status.success());
    let kinds = stdout(&output);
    assert!(kinds.lines().any(|l| l == "filesystem"));
    assert!(kinds.lines().any(|l| l == "image-layer"));
}

#[test]
fn test_version_components() {
    let ctx = TestContext::new();
    let output = ctx.forge(&["version", "3.10.8-SNAPSHOT", "--components", "2"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "3.10");

    let output = ctx.forge(&["version", "-1.0"]);
    assert!(!output.status.success());
}

#[test]
fn test_resolve_json_relocates_entries() {
    let ctx = TestContext::new();
    let output = ctx.forge(&["--quiet", "resolve", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let variants: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let entries = variants[0]["entries"].as_array().unwrap();
    let paths: Vec<&str> = entries.iter().filter_map(|e| e["path"].as_str()).collect();
    assert!(paths.contains(&"org/ehcache/shadow/org/terracotta/Stats.class"));
    assert!(paths.contains(&"META-INF/services/org.ehcache.shadow.org.terracotta.Spi"));
    assert!(!paths.contains(&"org/terracotta/Stats.class"));
    assert_eq!(variants[0]["artifact_id"], "ehcache");
}

#[test]
fn test_resolve_dotted_relocation() {
    let config = CONFIG.replace(
        "from = \"org/terracotta/\"\nto = \"org/ehcache/shadow/org/terracotta/\"",
        "from = \"org.terracotta.\"\nto = \"org.ehcache.shadow.org.terracotta.\"",
    );
    assert_ne!(config, CONFIG);
    let ctx = TestContext::with_config(&config);

    let output = ctx.forge(&["--quiet", "resolve", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let variants: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let paths: Vec<&str> = variants[0]["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["path"].as_str())
        .collect();
    assert!(paths.contains(&"org/ehcache/shadow/org/terracotta/Stats.class"));
    assert!(paths.contains(&"META-INF/services/org.ehcache.shadow.org.terracotta.Spi"));
    assert!(!paths.iter().any(|p| p.starts_with("org/terracotta/")));
    assert!(paths.contains(&"META-INF/maven/org.ehcache/ehcache/pom.xml"));
}

#[test]
fn test_conflicting_entries_fail() {
    let config = CONFIG.replace("artifacts = [\"core\"]", "artifacts = [\"core\", \"extra\"]");
    let ctx = TestContext::with_config(&config);
    write(&ctx.root().join("libs/extra/org/ehcache/Cache.class"), b"different cache");

    for command in [&["resolve"][..], &["--quiet", "publish"][..]] {
        let output = ctx.forge(command);
        assert_eq!(output.status.code(), Some(1), "{command:?}");
        let err = stderr(&output);
        assert!(err.contains("Conflicting entries for 'org/ehcache/Cache.class'"), "{err}");
    }
    assert!(!ctx.root().join("repo").exists());
}

#[test]
fn test_resolve_unknown_variant_fails() {
    let ctx = TestContext::new();
    let output = ctx.forge(&["resolve", "--variant", "ee"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Unknown variant"));
}

#[test]
fn test_assemble_writes_jars() {
    let ctx = TestContext::new();
    let output = ctx.forge(&["--quiet", "assemble", "-o", "out"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(ctx.root().join("out/ehcache-3.10.8.jar").is_file());
}

#[test]
fn test_publish_then_republish_is_unchanged() {
    let ctx = TestContext::new();

    let output = ctx.forge(&["--quiet", "publish"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(
        ctx.root()
            .join("repo/org/ehcache/ehcache/3.10.8/ehcache-3.10.8.jar")
            .is_file()
    );
    assert!(ctx.root().join("images/ehcache/3.10.json").is_file());
    assert!(stdout(&output).contains("published"));

    let again = ctx.forge(&["--quiet", "publish"]);
    assert!(again.status.success(), "{}", stderr(&again));
    assert!(stdout(&again).contains("unchanged"));
}

#[test]
fn test_publish_only_selected_target() {
    let ctx = TestContext::new();
    let output = ctx.forge(&["--quiet", "publish", "--target", "local"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(!ctx.root().join("images").exists());

    let unknown = ctx.forge(&["publish", "--target", "nexus"]);
    assert!(!unknown.status.success());
    assert!(stderr(&unknown).contains("Unknown target"));
}

#[test]
fn test_publish_failure_sets_exit_code() {
    let ctx = TestContext::new();
    // a file where the repository directory should be
    write(&ctx.root().join("repo"), b"not a directory");

    let output = ctx.forge(&["--quiet", "publish", "--target", "local", "--max-attempts", "1"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("local"));
}

#[test]
fn test_missing_config_fails() {
    let ctx = TestContext::new();
    let output = Command::new(env!("CARGO_BIN_EXE_forge"))
        .args(["--config", "absent.toml", "resolve"])
        .current_dir(ctx.root())
        .output()
        .expect("failed to run forge");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to load"));
}

#[cfg(unix)]
#[test]
fn test_interrupt_cancels_pending_retries() {
    use std::time::{Duration, Instant};

    // nothing listens on port 1; every upload is refused and retried after a long backoff
    let config = CONFIG
        .replace("max_attempts = 2", "max_attempts = 5")
        .replace("initial_ms = 1", "initial_ms = 60000")
        .replace("max_ms = 2", "max_ms = 60000")
        + "\n[[targets]]\nname = \"nexus\"\nkind = \"repository\"\nurl = \"http://127.0.0.1:1\"\n";
    let ctx = TestContext::with_config(&config);

    let mut child = ctx
        .command(&["--quiet", "publish", "--target", "nexus"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run forge");
    std::thread::sleep(Duration::from_millis(1500));
    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("failed to run kill");
    assert!(status.success());

    let started = Instant::now();
    while child.try_wait().unwrap().is_none() {
        if started.elapsed() > Duration::from_secs(30) {
            child.kill().unwrap();
            panic!("forge did not stop after interrupt");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    let output = child.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("fatal: cancelled"), "{}", stdout(&output));
}
