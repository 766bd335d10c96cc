//! End-to-end tests of the deckhand binary
//!
//! Everything runs with `--dry-run`, so no host is contacted; the recorded
//! operations printed on stdout are checked instead.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONFIG: &str = r#"
[roles]
web = ["web1", "deploy@web2:2222"]
system-role = ["admin1"]

[vars]
home = "/srv/shop"
acct = "shop"
crontab = "0 * * * * {home}/bin/hourly"
"#;

fn config_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("deckhand.toml"), CONFIG).unwrap();
    dir
}

fn deckhand(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("deckhand").unwrap();
    cmd.current_dir(dir).arg("-C").arg(dir).env("RUST_LOG", "warn");
    cmd
}

#[test]
fn hosts_lists_roles() {
    let dir = config_dir();

    deckhand(dir.path())
        .arg("hosts")
        .assert()
        .success()
        .stdout(predicate::str::contains("system-role:\n  admin1\n"))
        .stdout(predicate::str::contains("web:\n  web1\n  deploy@web2:2222\n"));
}

#[test]
fn run_renders_command_per_host() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["--dry-run", "-R", "web", "run", "ls {home}/releases"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[web1] run: ls /srv/shop/releases"))
        .stdout(predicate::str::contains(
            "[deploy@web2:2222] run: ls /srv/shop/releases",
        ));
}

#[test]
fn set_overrides_config_vars() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["--dry-run", "-H", "web1", "--set", "home=/opt/shop"])
        .args(["run", "--cd", "{home}", "make"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[web1] run: cd /opt/shop && make"));
}

#[test]
fn set_python_updates_virtualenv_command() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["--dry-run", "-H", "web1", "--set", "python=python3"])
        .args(["run", "{virtualenv} env"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[web1] run: virtualenv -p python3 "));
}

#[test]
fn run_without_hosts_fails() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["run", "uptime"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No target hosts selected"));
}

#[test]
fn unknown_role_fails() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["-R", "db", "run", "uptime"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Role 'db' not found"));
}

#[test]
fn missing_variable_fails_before_any_operation() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["--dry-run", "-H", "web1", "run", "ls {nowhere}"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn sync_mirrors_tree() {
    let dir = config_dir();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::write(src.join("a.txt"), "a").unwrap();
    fs::write(src.join("sub/b.txt"), "b").unwrap();
    fs::write(src.join("sub/c.pyc"), "c").unwrap();

    deckhand(dir.path())
        .args(["--dry-run", "-H", "web1", "sync", "src", "{home}/app"])
        .args(["--exclude", "src/a.txt", "--exclude-glob", "**/*.pyc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[web1] run: mkdir -p /srv/shop/app\n"))
        .stdout(predicate::str::contains("[web1] run: mkdir -p /srv/shop/app/src/sub\n"))
        .stdout(predicate::str::contains("-> /srv/shop/app/src/sub/b.txt (1 bytes)"))
        .stdout(predicate::str::contains("a.txt").not())
        .stdout(predicate::str::contains("c.pyc").not());
}

#[test]
fn sync_missing_source_fails() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["--dry-run", "-H", "web1", "sync", "nope", "/r"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Source tree not found"));
}

#[test]
fn put_string_uploads_rendered_content() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["--dry-run", "-H", "web1", "put-string", "home is {home}", "{home}/motd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-> /srv/shop/motd (17 bytes)"));
}

#[test]
fn render_prints_template() {
    let dir = config_dir();
    fs::write(dir.path().join("app.conf.tmpl"), "root = {home}\nuser = {acct}\n").unwrap();

    deckhand(dir.path())
        .args(["render", "app.conf.tmpl"])
        .assert()
        .success()
        .stdout("root = /srv/shop\nuser = shop\n");
}

#[test]
fn render_reports_unset_variables() {
    let dir = config_dir();
    fs::write(dir.path().join("app.conf.tmpl"), "{home} {port} {workers}\n").unwrap();

    deckhand(dir.path())
        .args(["render", "app.conf.tmpl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("port, workers"));
}

#[test]
fn crontab_uses_configured_entries() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["--dry-run", "-H", "web1", "crontab"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-> /srv/shop/tmp/crontab ("))
        .stdout(predicate::str::contains("[web1] run: crontab /srv/shop/tmp/crontab"));
}

#[test]
fn user_setup_targets_system_role() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["--dry-run", "-R", "system-role", "user", "setup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[admin1] run: sudo -H bash -c"))
        .stdout(predicate::str::contains("adduser"))
        .stdout(predicate::str::contains("run: sudo mv /tmp/.deckhand-"))
        .stdout(predicate::str::contains("/etc/service/shop/log"));
}

#[test]
fn ec2_dry_run_shows_lookup() {
    let dir = config_dir();

    deckhand(dir.path())
        .args(["--dry-run", "ec2", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[localhost] run: aws ec2 describe-tags"));
}
