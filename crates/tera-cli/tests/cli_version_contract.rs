use predicates::prelude::*;

#[test]
fn tera_version_contract() {
    let bin = assert_cmd::cargo::cargo_bin!("tera");
    let out = std::process::Command::new(bin)
        .args(["version"])
        // Disable `.env` autoload so this contract stays hermetic.
        .env("TERA_DOTENV", "0")
        .output()
        .expect("run tera version");

    assert!(out.status.success(), "tera version failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse version json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("version"));
    assert_eq!(v["name"].as_str(), Some("tera"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
}

#[test]
fn tera_version_text_output() {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("tera"))
        .args(["version", "--output", "text"])
        .env("TERA_DOTENV", "0")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("tera "));
}
