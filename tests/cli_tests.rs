//! Tests for the `agent-link` binary.

#![cfg(unix)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

struct Fixture {
    home: TempDir,
    lib: TempDir,
    dest: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let lib = TempDir::new().unwrap();
        write(
            lib.path(),
            "agents/core/code-reviewer.md",
            "---\nname: code-reviewer\n---\nReview.",
        );
        write(
            lib.path(),
            "agents/specialized/dotnet/webapi-expert.md",
            "---\nname: dotnet-webapi-expert\n---\nBuild $ARGUMENTS.",
        );
        write(
            lib.path(),
            "agents/specialized/dotnet/webapi-expert-v2.md",
            "---\nname: dotnet-webapi-expert-v2\n---\nBuild v2.",
        );
        write(lib.path(), "commands/test.md", "Run tests: $1 then $ARGUMENTS");
        Self {
            home: TempDir::new().unwrap(),
            lib,
            dest: TempDir::new().unwrap(),
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("agent-link").unwrap();
        cmd.env("HOME", self.home.path())
            .env_remove("AGENT_LINK_DEST")
            .env_remove("AGENT_LINK_SOURCE")
            .env_remove("AGENT_LINK_MODE")
            .env_remove("RUST_LOG")
            .arg("--source")
            .arg(self.lib.path())
            .arg("--dest")
            .arg(self.dest.path());
        cmd
    }
}

// ============================================================================
// link / unlink
// ============================================================================

mod link_tests {
    use super::*;

    #[test]
    fn test_link_then_relink() {
        let fx = Fixture::new();

        fx.cmd()
            .arg("link")
            .assert()
            .success()
            .stdout(predicate::str::contains("4 created"));
        assert!(fx.dest.path().join("commands/test.md").exists());
        assert!(
            fx.dest
                .path()
                .join("agents/specialized/dotnet/webapi-expert.md")
                .exists()
        );

        fx.cmd()
            .arg("link")
            .assert()
            .success()
            .stdout(predicate::str::contains("4 unchanged"));
    }

    #[test]
    fn test_collision_exits_nonzero() {
        let fx = Fixture::new();
        write(fx.dest.path(), "commands/test.md", "mine");

        fx.cmd()
            .arg("link")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("collision"));
        assert_eq!(
            std::fs::read_to_string(fx.dest.path().join("commands/test.md")).unwrap(),
            "mine"
        );
    }

    #[test]
    fn test_dry_run_json() {
        let fx = Fixture::new();

        let output = fx
            .cmd()
            .args(["link", "--dry-run", "--json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(report["dry_run"], true);
        assert_eq!(report["entries"].as_array().unwrap().len(), 4);
        assert_eq!(std::fs::read_dir(fx.dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_copy_mode() {
        let fx = Fixture::new();
        fx.cmd().args(["link", "--copy"]).assert().success();

        let target = fx.dest.path().join("commands/test.md");
        assert!(
            !std::fs::symlink_metadata(&target)
                .unwrap()
                .file_type()
                .is_symlink()
        );
    }

    #[test]
    fn test_unlink_round_trip() {
        let fx = Fixture::new();
        fx.cmd().arg("link").assert().success();

        fx.cmd()
            .arg("unlink")
            .assert()
            .success()
            .stdout(predicate::str::contains("4 removed"));
        assert_eq!(std::fs::read_dir(fx.dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_source_fails() {
        let fx = Fixture::new();
        let mut cmd = Command::cargo_bin("agent-link").unwrap();
        cmd.env("HOME", fx.home.path())
            .arg("--source")
            .arg(fx.lib.path().join("missing"))
            .arg("--dest")
            .arg(fx.dest.path())
            .arg("link")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No capability documents found"));
    }
}

// ============================================================================
// list / invoke
// ============================================================================

mod lookup_tests {
    use super::*;

    #[test]
    fn test_list_commands() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["list", "--kind", "command"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/test"))
            .stdout(predicate::str::contains("@agent-").not());
    }

    #[test]
    fn test_list_json() {
        let fx = Fixture::new();
        let output = fx
            .cmd()
            .args(["list", "--json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let listing: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(listing["documents"].as_array().unwrap().len(), 4);
        assert!(listing["overrides"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_log_json_writes_json_lines_to_stderr() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["--log-json", "list"])
            .assert()
            .success()
            .stderr(predicate::str::contains("\"level\":\"INFO\""))
            .stderr(predicate::str::contains("Registry loaded"));
    }

    #[test]
    fn test_invoke_renders_arguments() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["invoke", "/test", "unit", "fast"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Run tests: unit then unit fast"));
    }

    #[test]
    fn test_invoke_ambiguous_prefix_exits_2() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["invoke", "@agent-dotnet-webapi"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("dotnet-webapi-expert-v2"));
    }

    #[test]
    fn test_invoke_exact_agent() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["invoke", "@agent-dotnet-webapi-expert", "an", "API"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Build an API."));
    }
}
