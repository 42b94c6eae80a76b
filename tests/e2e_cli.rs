//! Process-level tests: the binary's stdin contract and exit codes.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn run_binary(credentials: &Path, stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_protein-graph"))
        .arg("--credentials")
        .arg(credentials)
        .args(["--log-level", "warn"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(stdin.as_bytes()).unwrap();
    child.wait_with_output().unwrap()
}

/// Snapshot, KEGG tables and credentials under `dir`; returns the credentials path.
fn write_inputs(dir: &Path) -> std::path::PathBuf {
    fs::write(dir.join("species.tsv"), "id\tname\n9606\tHomo sapiens\n").unwrap();
    fs::write(
        dir.join("proteins.tsv"),
        "id\tspecies_id\texternal_id\tpreferred_name\tannotation\n\
         1\t9606\t9606.ENSP00000292303\tCCR5\tC-C chemokine receptor type 5\n",
    ).unwrap();
    fs::write(dir.join("associations.tsv"), "species_id\tid1\tid2\tevidence_scores\tcombined_score\n").unwrap();
    fs::write(dir.join("actions.tsv"), "species_id\tid1\tid2\tmode\tscore\n").unwrap();
    for table in ["compounds", "drugs", "diseases"] {
        fs::write(dir.join(format!("kegg_{table}.hsa.tsv")), "id\tname\n").unwrap();
    }
    fs::write(
        dir.join("kegg_pathways.hsa.tsv"),
        "id\tname\tdescription\tclasses\tgenes\tdiseases\tdrugs\tcompounds\n",
    ).unwrap();

    let credentials = dir.join("credentials.json");
    let json = serde_json::json!({
        "relational": { "snapshot_dir": dir },
        "graph": { "dump_path": dir.join("graph.cypher") },
        "migration": { "kegg_dir": dir },
    });
    fs::write(&credentials, json.to_string()).unwrap();
    credentials
}

#[test]
fn test_two_input_lines_exit_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_binary(&dir.path().join("credentials.json"), "Homo sapiens\nCCR5\n");

    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("graph.cypher").exists());
}

#[test]
fn test_unknown_species_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = write_inputs(dir.path());

    let output = run_binary(&credentials, "Danio rerio\n");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Danio rerio"));
    assert!(!dir.path().join("graph.cypher").exists());
}

#[test]
fn test_species_run_writes_dump() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = write_inputs(dir.path());

    let output = run_binary(&credentials, "Homo sapiens\n");

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let dump = fs::read_to_string(dir.path().join("graph.cypher")).unwrap();
    assert!(dump.contains("MATCH (n) DETACH DELETE n;"));
    assert!(dump.contains("name: 'CCR5'"));
}
