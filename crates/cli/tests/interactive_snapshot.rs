use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn nonce() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

#[test]
fn test_cli_interactive_writes_snapshot() {
    let snapshot_path =
        std::env::temp_dir().join(format!("bringup-interactive-snapshot-{}.json", nonce()));
    let _ = std::fs::remove_file(&snapshot_path);

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args([
            "run",
            "--variant",
            "double-buffer",
            "--max-steps",
            "3",
            "--no-uart-stdout",
            "--snapshot",
            snapshot_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute bringup");

    assert!(output.status.success());

    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    assert_eq!(snapshot["program"], "double-buffer");
    assert_eq!(snapshot["steps"], 3);
    assert_eq!(snapshot["frame_addresses"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["peripherals"]["fpga"]["publish_count"], 3);

    let _ = std::fs::remove_file(&snapshot_path);
}

#[test]
fn test_cli_interactive_echoes_console() {
    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["run", "--variant", "hello", "--input", "Ada\n"])
        .output()
        .expect("Failed to execute bringup");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Hello Ada!"), "{}", stdout);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("steps/s"), "{}", stderr);
}

#[test]
fn test_cli_interactive_software_irq() {
    let snapshot_path =
        std::env::temp_dir().join(format!("bringup-software-irq-{}.json", nonce()));

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args([
            "run",
            "--variant",
            "cpu-irq",
            "--max-steps",
            "10",
            "--software-irq-every",
            "5",
            "--no-uart-stdout",
            "--snapshot",
            snapshot_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute bringup");

    assert!(output.status.success());
    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    assert_eq!(snapshot["interrupts"], 2);
    assert_eq!(snapshot["uart"], "CPU interrupt\nCPU interrupt\n");

    let _ = std::fs::remove_file(&snapshot_path);
}

#[test]
fn test_cli_interactive_missing_platform_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["run", "--platform", "/nonexistent/board.yaml"])
        .output()
        .expect("Failed to execute bringup");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_help_lists_subcommands() {
    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .arg("--help")
        .output()
        .expect("Failed to execute bringup");

    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    assert!(help.contains("run"));
    assert!(help.contains("test"));
}
