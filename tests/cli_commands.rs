#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const SAMPLE_GBK: &str = "\
LOCUS       TEST    20 bp    DNA
DEFINITION  sample record.
ORIGIN
        1 acgtn gatt
       11 aca
//
LOCUS       SECOND
ORIGIN
        1 TTTT
//
";

const SAMPLE_DUMP: &str = "\
aca: 1
acg: 1
att: 1
cgt: 1
gat: 1
tac: 1
tta: 1
ttt: 2
";

struct Workspace {
    dir: TempDir,
    config: PathBuf,
    gbk: PathBuf,
}

impl Workspace {
    fn new(config: &str) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let config_path = dir.path().join("cli.toml");
        fs::write(&config_path, config).expect("write config");
        let gbk = dir.path().join("sample.gbk");
        fs::write(&gbk, SAMPLE_GBK).expect("write gbk");
        Self {
            dir,
            config: config_path,
            gbk,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("genebank");
        cmd.env("GENEBANK_CONFIG", &self.config)
            .env_remove("RUST_LOG")
            .arg("--quiet");
        cmd
    }

    fn create(&self, order: u32) -> PathBuf {
        self.cmd()
            .args(["create", "--kmer-len", "3", "--order"])
            .arg(order.to_string())
            .arg(&self.gbk)
            .assert()
            .success();
        tree_path(&self.gbk, 3, order)
    }
}

fn tree_path(gbk: &Path, k: usize, order: u32) -> PathBuf {
    PathBuf::from(format!("{}.btree.data.{k}.{order}", gbk.display()))
}

fn json_output(cmd: &mut assert_cmd::Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("valid json")
}

#[test]
fn create_writes_default_tree_and_dump() {
    let ws = Workspace::new("");
    ws.cmd()
        .args(["create", "--kmer-len", "3", "--order", "4", "--dump"])
        .arg(&ws.gbk)
        .assert()
        .success();
    let tree = tree_path(&ws.gbk, 3, 4);
    assert!(tree.exists());
    let mut dump = tree.clone().into_os_string();
    dump.push(".dump");
    assert_eq!(fs::read_to_string(dump).expect("dump file"), SAMPLE_DUMP);
}

#[test]
fn create_reports_counts_as_json() {
    let ws = Workspace::new("");
    let output = ws.path("custom.bt");
    let json = json_output(
        ws.cmd()
            .args(["--format", "json", "create", "-k", "3", "--order", "0", "--output"])
            .arg(&output)
            .arg(&ws.gbk),
    );
    assert_eq!(json["order"], 205);
    assert_eq!(json["kmers_read"], 9);
    assert_eq!(json["distinct_kmers"], 8);
    assert_eq!(json["sections"], 2);
    assert!(output.exists());
}

#[test]
fn config_file_supplies_order() {
    let ws = Workspace::new("order = 5\ncache_capacity = 4\n");
    let json = json_output(
        ws.cmd()
            .args(["--format", "json", "create", "-k", "3"])
            .arg(&ws.gbk),
    );
    assert_eq!(json["order"], 5);
    assert_eq!(json["cache_capacity"], 4);
    assert!(tree_path(&ws.gbk, 3, 5).exists());
}

#[test]
fn search_prints_found_queries() {
    let ws = Workspace::new("");
    let tree = ws.create(4);
    let queries = ws.path("queries.txt");
    fs::write(&queries, "TTT\nggg\n\naca\n").expect("write queries");
    let output = ws
        .cmd()
        .args(["search", "--cache", "8"])
        .arg(&tree)
        .arg(&queries)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8(output).unwrap(), "ttt: 2\naca: 1\n");
}

#[test]
fn search_skips_queries_with_unknown_bases() {
    let ws = Workspace::new("");
    let tree = ws.create(4);
    let queries = ws.path("queries.txt");
    fs::write(&queries, "tnt\naca\n").expect("write queries");
    let json = json_output(
        ws.cmd()
            .args(["--format", "json", "search"])
            .arg(&tree)
            .arg(&queries),
    );
    assert_eq!(json["queries"], 1);
    assert_eq!(json["skipped"], 1);
    assert_eq!(json["hits"][0]["query"], "aca");
    assert_eq!(json["hits"][0]["count"], 1);
}

#[test]
fn search_rejects_query_length_mismatch() {
    let ws = Workspace::new("");
    let tree = ws.create(4);
    let queries = ws.path("queries.txt");
    fs::write(&queries, "acgt\n").expect("write queries");
    let output = ws
        .cmd()
        .arg("search")
        .arg(&tree)
        .arg(&queries)
        .assert()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).unwrap();
    assert!(stderr.starts_with("error:"), "{stderr}");
    assert!(stderr.contains("expected 3"), "{stderr}");
}

#[test]
fn dump_command_matches_create_dump() {
    let ws = Workspace::new("");
    let tree = ws.create(3);
    let output = ws
        .cmd()
        .arg("dump")
        .arg(&tree)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8(output).unwrap(), SAMPLE_DUMP);
}

#[test]
fn stats_emits_json() {
    let ws = Workspace::new("");
    let tree = ws.create(4);
    let json = json_output(ws.cmd().args(["--format", "json", "stats"]).arg(&tree));
    assert_eq!(json["order"], 4);
    assert_eq!(json["distinct_keys"], 8);
    assert_eq!(json["total_occurrences"], 9);
    assert!(json["height"].as_u64().unwrap() >= 2);
    assert!(json["cache"].is_null());
}

#[test]
fn verify_passes_then_fails_on_corruption() {
    let ws = Workspace::new("");
    let tree = ws.create(4);
    let json = json_output(ws.cmd().args(["--format", "json", "verify"]).arg(&tree));
    assert_eq!(json["success"], true);

    let mut bytes = fs::read(&tree).unwrap();
    bytes[8..12].copy_from_slice(&1u32.to_be_bytes());
    fs::write(&tree, bytes).unwrap();
    ws.cmd().arg("verify").arg(&tree).assert().code(2);
}

#[test]
fn missing_input_is_reported() {
    let ws = Workspace::new("");
    let output = ws
        .cmd()
        .args(["create", "-k", "3"])
        .arg(ws.path("absent.gbk"))
        .assert()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).unwrap();
    assert!(stderr.contains("absent.gbk"), "{stderr}");
}

#[test]
fn invalid_kmer_len_is_rejected() {
    let ws = Workspace::new("");
    ws.cmd()
        .args(["create", "-k", "32"])
        .arg(&ws.gbk)
        .assert()
        .code(1);
}

#[test]
fn oversized_order_is_rejected() {
    let ws = Workspace::new("");
    let output = ws
        .cmd()
        .args(["create", "-k", "3", "--order", "4000000000"])
        .arg(&ws.gbk)
        .assert()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).unwrap();
    assert!(stderr.contains("invalid configuration"), "{stderr}");
}
