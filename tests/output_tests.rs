//! Output emitter behavior: formats, file bootstrap, suffix handling

use deimos::output::{JsonRecord, OutputConfig, OutputManager};
use deimos::scanner::ScanResults;
use deimos::utils::targets::TargetIndex;
use std::net::Ipv4Addr;
use std::path::PathBuf;

fn temp_base(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("deimos-{}-{}", name, std::process::id()))
}

fn sample_results() -> (ScanResults, TargetIndex) {
    let results = ScanResults::new();
    results.add(Ipv4Addr::new(10, 0, 0, 2), 80);

    let mut targets = TargetIndex::new();
    targets.add_ip(Ipv4Addr::new(10, 0, 0, 2));
    targets.coalesce();
    (results, targets)
}

#[test]
fn test_json_output_creates_directories_and_suffix() {
    let base = temp_base("json");
    let _ = std::fs::remove_dir_all(&base);

    let (results, targets) = sample_results();
    let manager = OutputManager::new(OutputConfig {
        json: true,
        file: Some(base.join("out").join("x")),
    });
    manager.write_results(&results, &targets).unwrap();

    let path = base.join("out").join("x.json");
    let contents = std::fs::read_to_string(&path).unwrap();
    let records: Vec<JsonRecord> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ip, "10.0.0.2");
    assert_eq!(records[0].port, 80);
    // Host equals the IP here, so the field is omitted
    assert!(records[0].host.is_none());
    assert!(!contents.contains("\"host\""));

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let mode = std::fs::metadata(base.join("out")).unwrap().mode();
        assert_eq!(mode & 0o077, 0, "output dir must be owner-only");
    }

    std::fs::remove_dir_all(&base).unwrap();
}

#[test]
fn test_text_output_lines() {
    let base = temp_base("text");
    let _ = std::fs::remove_dir_all(&base);

    let (results, targets) = sample_results();
    results.add(Ipv4Addr::new(10, 0, 0, 2), 443);

    let manager = OutputManager::new(OutputConfig {
        json: false,
        file: Some(base.join("scan.txt")),
    });
    manager.write_results(&results, &targets).unwrap();

    let contents = std::fs::read_to_string(base.join("scan.txt")).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines, vec!["10.0.0.2:80", "10.0.0.2:443"]);

    std::fs::remove_dir_all(&base).unwrap();
}

#[test]
fn test_resolved_names_expand_records() {
    let base = temp_base("names");
    let _ = std::fs::remove_dir_all(&base);

    let results = ScanResults::new();
    let ip = Ipv4Addr::new(10, 0, 0, 7);
    results.add(ip, 22);

    let mut targets = TargetIndex::new();
    targets.add_ip(ip);
    targets.add_name(ip, "bastion.internal");
    targets.coalesce();

    let manager = OutputManager::new(OutputConfig {
        json: true,
        file: Some(base.join("named")),
    });
    manager.write_results(&results, &targets).unwrap();

    let contents = std::fs::read_to_string(base.join("named.json")).unwrap();
    let record: JsonRecord = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
    assert_eq!(record.ip, "10.0.0.7");
    assert_eq!(record.host.as_deref(), Some("bastion.internal"));
    assert_eq!(record.port, 22);

    std::fs::remove_dir_all(&base).unwrap();
}

#[test]
fn test_stream_only_output_needs_no_file() {
    let (results, targets) = sample_results();
    let manager = OutputManager::new(OutputConfig::default());
    // No file configured: stream emission alone must succeed
    manager.write_results(&results, &targets).unwrap();
}
