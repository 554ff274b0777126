//! Integration tests for the CLI application
//!
//! These tests run the strkernel binary against real sequence files and
//! verify the gram, score and info subcommands end to end.

use serde_json::Value;
use std::io::Write;
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};

/// Helper to create test data files
struct TestDataFiles {
    pub data_file: NamedTempFile,
    pub support_file: NamedTempFile,
    pub weights_file: NamedTempFile,
}

impl TestDataFiles {
    fn new() -> std::io::Result<Self> {
        // Sequences to analyze
        let mut data_file = NamedTempFile::new()?;
        writeln!(data_file, "# query sequences")?;
        writeln!(data_file, "+1 GATTACCA")?;
        writeln!(data_file, "+1 GATTAGCA")?;
        writeln!(data_file, "-1 CATTACCA")?;
        writeln!(data_file, "-1 GGTTACCA")?;
        data_file.flush()?;

        // Support set for scoring
        let mut support_file = NamedTempFile::new()?;
        writeln!(support_file, "+1 ACGTACGT")?;
        writeln!(support_file, "-1 TTGGCCAA")?;
        writeln!(support_file, "+1 ACGTTCGT")?;
        writeln!(support_file, "-1 TAGGCCAA")?;
        support_file.flush()?;

        // Coefficients for the first three support sequences
        let mut weights_file = NamedTempFile::new()?;
        writeln!(weights_file, "0 0.5")?;
        writeln!(weights_file, "1 -0.25")?;
        writeln!(weights_file, "2 1.0")?;
        weights_file.flush()?;

        Ok(TestDataFiles {
            data_file,
            support_file,
            weights_file,
        })
    }
}

/// Get the path to the compiled CLI binary
fn get_cli_binary_path() -> String {
    // Try to find the binary in target/debug or target/release
    let debug_path = "target/debug/strkernel";
    let release_path = "target/release/strkernel";

    if std::path::Path::new(debug_path).exists() {
        debug_path.to_string()
    } else if std::path::Path::new(release_path).exists() {
        release_path.to_string()
    } else {
        // Build the binary if it doesn't exist
        let output = Command::new("cargo")
            .args(&["build", "--bin", "strkernel"])
            .output()
            .expect("Failed to build CLI binary");

        if !output.status.success() {
            panic!(
                "Failed to build CLI binary: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        debug_path.to_string()
    }
}

/// Parse the matrix rows printed by the gram command
fn parse_gram_stdout(stdout: &str, n: usize) -> Vec<Vec<f64>> {
    let rows: Vec<Vec<f64>> = stdout
        .lines()
        .filter_map(|line| {
            let values: Option<Vec<f64>> = line
                .split_whitespace()
                .map(|tok| tok.parse::<f64>().ok())
                .collect();
            values.filter(|v| v.len() == n)
        })
        .collect();
    assert_eq!(rows.len(), n, "Expected {} matrix rows in output", n);
    rows
}

#[test]
fn test_cli_gram_command() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "gram",
            "--data",
            test_data.data_file.path().to_str().unwrap(),
            "--degree",
            "3",
        ])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(
        output.status.success(),
        "Gram command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Kernel Matrix ==="));
    assert!(stdout.contains("Sequences: 4 (length 8)"));
    assert!(stdout.contains("Cache:"));
}

#[test]
fn test_cli_gram_matrix_normalized_and_symmetric() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "gram",
            "--data",
            test_data.data_file.path().to_str().unwrap(),
            "--degree",
            "4",
        ])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(
        output.status.success(),
        "Gram command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let matrix = parse_gram_stdout(&stdout, 4);

    for i in 0..4 {
        assert!(
            (matrix[i][i] - 1.0).abs() < 1e-6,
            "Normalized diagonal should be 1.0, got {}",
            matrix[i][i]
        );
        for j in 0..4 {
            assert!(
                (matrix[i][j] - matrix[j][i]).abs() < 1e-6,
                "Matrix should be symmetric at ({}, {})",
                i,
                j
            );
        }
    }
}

#[test]
fn test_cli_gram_raw_skips_normalization() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "gram",
            "--data",
            test_data.data_file.path().to_str().unwrap(),
            "--raw",
        ])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(
        output.status.success(),
        "Gram command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let matrix = parse_gram_stdout(&stdout, 4);
    assert!(
        matrix[0][0] > 1.0,
        "Raw self-similarity should exceed 1.0, got {}",
        matrix[0][0]
    );
}

#[test]
fn test_cli_gram_json_report() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let report_path = temp_dir.path().join("gram.json");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "gram",
            "--data",
            test_data.data_file.path().to_str().unwrap(),
            "--degree",
            "3",
            "--output",
            report_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(
        output.status.success(),
        "Gram command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(report_path.exists(), "Report file was not created");

    let contents = std::fs::read_to_string(&report_path).expect("Failed to read report");
    let report: Value = serde_json::from_str(&contents).expect("Report should be valid JSON");

    assert_eq!(report["num_sequences"], 4);
    assert_eq!(report["sequence_length"], 8);
    assert_eq!(report["degree"], 3);
    assert_eq!(report["normalized"], true);
    let matrix = report["matrix"]
        .as_array()
        .expect("Matrix should be an array");
    assert_eq!(matrix.len(), 4);
    assert_eq!(matrix[0].as_array().unwrap().len(), 4);
    assert!(report["cache"]["hits"].is_number());
}

#[test]
fn test_cli_gram_with_mismatch_budget() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "gram",
            "--data",
            test_data.data_file.path().to_str().unwrap(),
            "--degree",
            "3",
            "--max-mismatch",
            "1",
        ])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(
        output.status.success(),
        "Gram command with mismatches failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_cli_gram_small_cache() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "gram",
            "--data",
            test_data.data_file.path().to_str().unwrap(),
            "--cache-size",
            "1",
        ])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(
        output.status.success(),
        "Gram command with small cache failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_cli_gram_zero_cache_fails() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "gram",
            "--data",
            test_data.data_file.path().to_str().unwrap(),
            "--cache-size",
            "0",
        ])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(!output.status.success(), "Zero cache budget should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"));
}

#[test]
fn test_cli_gram_nonexistent_file() {
    let output = Command::new(get_cli_binary_path())
        .args(&["gram", "--data", "/nonexistent/sequences.txt"])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(
        !output.status.success(),
        "Gram command should fail for a missing file"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"));
}

#[test]
fn test_cli_gram_invalid_symbol() {
    let mut bad_file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(bad_file, "+1 GATTXCCA").expect("Failed to write");
    bad_file.flush().expect("Failed to flush");

    let output = Command::new(get_cli_binary_path())
        .args(&["gram", "--data", bad_file.path().to_str().unwrap()])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(
        !output.status.success(),
        "Gram command should reject symbols outside the alphabet"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"));
}

#[test]
fn test_cli_score_command() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "score",
            "--support",
            test_data.support_file.path().to_str().unwrap(),
            "--weights",
            test_data.weights_file.path().to_str().unwrap(),
            "--data",
            test_data.data_file.path().to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run CLI score command");

    assert!(
        output.status.success(),
        "Score command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# Scores for 4 sequences"));

    let score_lines: Vec<&str> = stdout
        .lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .collect();
    assert_eq!(score_lines.len(), 4, "Expected one score per sequence");
    for line in score_lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(parts.len(), 2, "Expected 'index score', got: {}", line);
        parts[0].parse::<usize>().expect("Index should parse");
        parts[1].parse::<f64>().expect("Score should parse");
    }
}

#[test]
fn test_cli_score_with_level_breakdown() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "score",
            "--support",
            test_data.support_file.path().to_str().unwrap(),
            "--weights",
            test_data.weights_file.path().to_str().unwrap(),
            "--data",
            test_data.data_file.path().to_str().unwrap(),
            "--degree",
            "4",
            "--levels",
        ])
        .output()
        .expect("Failed to run CLI score command");

    assert!(
        output.status.success(),
        "Score command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("level_contributions"));

    let score_lines: Vec<&str> = stdout
        .lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .collect();
    for line in score_lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        // index, score, then one contribution per substring length
        assert_eq!(parts.len(), 2 + 4, "Unexpected field count: {}", line);
    }
}

#[test]
fn test_cli_score_output_file() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let scores_path = temp_dir.path().join("scores.txt");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "score",
            "--support",
            test_data.support_file.path().to_str().unwrap(),
            "--weights",
            test_data.weights_file.path().to_str().unwrap(),
            "--data",
            test_data.data_file.path().to_str().unwrap(),
            "--output",
            scores_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run CLI score command");

    assert!(
        output.status.success(),
        "Score command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(scores_path.exists(), "Scores file was not created");
    let contents = std::fs::read_to_string(&scores_path).expect("Failed to read scores");
    assert!(contents.contains("# Scores for 4 sequences"));
}

#[test]
fn test_cli_score_empty_weights_fails() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");
    let empty_weights = NamedTempFile::new().expect("Failed to create temp file");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "score",
            "--support",
            test_data.support_file.path().to_str().unwrap(),
            "--weights",
            empty_weights.path().to_str().unwrap(),
            "--data",
            test_data.data_file.path().to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run CLI score command");

    assert!(
        !output.status.success(),
        "Score command should fail without coefficients"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"));
}

#[test]
fn test_cli_score_weight_index_out_of_range() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");
    let mut bad_weights = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(bad_weights, "10 0.5").expect("Failed to write");
    bad_weights.flush().expect("Failed to flush");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "score",
            "--support",
            test_data.support_file.path().to_str().unwrap(),
            "--weights",
            bad_weights.path().to_str().unwrap(),
            "--data",
            test_data.data_file.path().to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run CLI score command");

    assert!(
        !output.status.success(),
        "Score command should reject out-of-range support indices"
    );
}

#[test]
fn test_cli_score_malformed_weights_fails() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");
    let mut bad_weights = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(bad_weights, "zero 0.5").expect("Failed to write");
    bad_weights.flush().expect("Failed to flush");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "score",
            "--support",
            test_data.support_file.path().to_str().unwrap(),
            "--weights",
            bad_weights.path().to_str().unwrap(),
            "--data",
            test_data.data_file.path().to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run CLI score command");

    assert!(
        !output.status.success(),
        "Score command should reject malformed coefficient lines"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"));
}

#[test]
fn test_cli_info_command() {
    let output = Command::new(get_cli_binary_path())
        .args(&["info", "--degree", "5", "--length", "10"])
        .output()
        .expect("Failed to run CLI info command");

    assert!(
        output.status.success(),
        "Info command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Weighted-Degree Kernel ==="));
    assert!(stdout.contains("Degree:          5"));
    assert!(stdout.contains("Per-level weights:"));
    assert!(stdout.contains("Block weights"));
    assert!(stdout.contains("Normalization constant:"));
}

#[test]
fn test_cli_info_mismatch_tables() {
    let output = Command::new(get_cli_binary_path())
        .args(&["info", "--degree", "4", "--max-mismatch", "1"])
        .output()
        .expect("Failed to run CLI info command");

    assert!(
        output.status.success(),
        "Info command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Weights with 1 mismatch(es):"));
}

#[test]
fn test_cli_info_truncates_long_block_table() {
    let output = Command::new(get_cli_binary_path())
        .args(&["info", "--length", "24"])
        .output()
        .expect("Failed to run CLI info command");

    assert!(
        output.status.success(),
        "Info command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("more)"), "Long tables should be truncated");
}

#[test]
fn test_cli_info_zero_degree_fails() {
    let output = Command::new(get_cli_binary_path())
        .args(&["info", "--degree", "0"])
        .output()
        .expect("Failed to run CLI info command");

    assert!(!output.status.success(), "Zero degree should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"));
}

#[test]
fn test_cli_info_duplicate_alphabet_fails() {
    let output = Command::new(get_cli_binary_path())
        .args(&["info", "--alphabet", "AACG"])
        .output()
        .expect("Failed to run CLI info command");

    assert!(
        !output.status.success(),
        "Duplicate alphabet symbols should fail"
    );
}

#[test]
fn test_cli_help() {
    let output = Command::new(get_cli_binary_path())
        .arg("--help")
        .output()
        .expect("Failed to run CLI help command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Weighted-degree string kernel engine"));
    assert!(stdout.contains("gram"));
    assert!(stdout.contains("score"));
    assert!(stdout.contains("info"));
}

#[test]
fn test_cli_version() {
    let output = Command::new(get_cli_binary_path())
        .arg("--version")
        .output()
        .expect("Failed to run CLI version command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("strkernel"));
}

#[test]
fn test_cli_gram_subcommand_help() {
    let output = Command::new(get_cli_binary_path())
        .args(&["gram", "--help"])
        .output()
        .expect("Failed to run CLI gram help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--cache-size"));
    assert!(stdout.contains("--max-mismatch"));
}

#[test]
fn test_cli_no_subcommand_fails() {
    let output = Command::new(get_cli_binary_path())
        .output()
        .expect("Failed to run CLI binary");

    assert!(!output.status.success(), "A subcommand should be required");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"));
}

#[test]
fn test_cli_verbose_flag() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "-v",
            "gram",
            "--data",
            test_data.data_file.path().to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(
        output.status.success(),
        "Verbose gram command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_cli_debug_flag() {
    let test_data = TestDataFiles::new().expect("Failed to create test data");

    let output = Command::new(get_cli_binary_path())
        .args(&[
            "-d",
            "gram",
            "--data",
            test_data.data_file.path().to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run CLI gram command");

    assert!(
        output.status.success(),
        "Debug gram command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}
