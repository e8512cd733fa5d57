use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn teamsync_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("teamsync"));
    cmd.env_clear().current_dir(dir);
    cmd
}

const COMPLETE: &str = r#"
ApiKeys:
  TokenKey: ["t1"]
  BaseUrl: "http://127.0.0.1:9"
LdapURL: "127.0.0.1"
LdapPort: 9
LdapFilter: "(&(objectClass=person)(memberOf=cn=%s,ou=groups,dc=example,dc=org))"
LdapUserSearchBase: "ou=people,dc=example,dc=org"
"#;

#[test]
fn help_lists_flags() {
    let dir = TempDir::new().expect("dir");
    teamsync_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--config"))
        .stdout(contains("--dryrun"))
        .stdout(contains("--once"));
}

#[test]
fn missing_base_url_fails_before_any_run() {
    let dir = TempDir::new().expect("dir");
    let config = dir.path().join("config.yaml");
    fs::write(
        &config,
        "ApiKeys:\n  TokenKey: [\"t1\"]\nLdapURL: ldap.test\nLdapFilter: \"(cn=%s)\"\nLdapUserSearchBase: dc=test\n",
    )
    .expect("write config");

    teamsync_cmd(dir.path())
        .args(["--config", config.to_str().expect("utf-8 path"), "--once"])
        .assert()
        .failure()
        .stderr(contains("GITEA_URL"));
}

#[test]
fn unreadable_config_falls_back_to_empty_environment() {
    let dir = TempDir::new().expect("dir");
    teamsync_cmd(dir.path())
        .args(["--config", "does-not-exist.yaml", "--once"])
        .assert()
        .failure()
        .stderr(contains("GITEA_TOKEN"));
}

#[test]
fn bad_schedule_is_rejected_at_startup() {
    let dir = TempDir::new().expect("dir");
    let config = dir.path().join("config.yaml");
    fs::write(&config, format!("{COMPLETE}ReqTime: \"every tuesday\"\n")).expect("write config");

    teamsync_cmd(dir.path())
        .args(["--config", config.to_str().expect("utf-8 path")])
        .assert()
        .failure()
        .stderr(contains("invalid schedule"));
}

#[test]
fn dryrun_takes_an_explicit_boolean() {
    let dir = TempDir::new().expect("dir");
    teamsync_cmd(dir.path())
        .args(["--dryrun", "maybe", "--once"])
        .assert()
        .failure()
        .stderr(contains("--dryrun"));
}

#[test]
fn unreachable_directory_fails_a_single_run() {
    let dir = TempDir::new().expect("dir");
    let config = dir.path().join("config.yaml");
    fs::write(&config, COMPLETE).expect("write config");

    teamsync_cmd(dir.path())
        .args(["--config", config.to_str().expect("utf-8 path"), "--once"])
        .assert()
        .failure()
        .stderr(contains("sync run failed"));
}
