use std::{fs, process::Command};

fn aquarium() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_aquarium"));
    let _ = command.env("RUST_LOG", "warn");
    command
}

#[test]
fn fixed_step_session_prints_result_line() {
    let output = aquarium()
        .args(["--fish-count", "100", "--frames", "5", "--fixed-step-ms", "16"])
        .output()
        .expect("failed to run aquarium");

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "[RESULT] MODE:batched,COUNT:100,FPS:78");
}

#[test]
fn scenario_file_changes_reported_count() {
    let path = std::env::temp_dir().join(format!("aquarium-scenario-{}.json", std::process::id()));
    fs::write(
        &path,
        r#"{"behaviors": [{"frame": 2, "op": "+", "count": 20}, {"frame": 1, "op": "-", "count": 5}]}"#,
    )
    .expect("scenario written");

    let output = aquarium()
        .args(["--fish-count", "50", "--frames", "6", "--fixed-step-ms", "10"])
        .args(["--draw-mode", "per-entity", "--scenario"])
        .arg(&path)
        .output()
        .expect("failed to run aquarium");
    let _ = fs::remove_file(&path);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.trim().starts_with("[RESULT] MODE:per-entity,COUNT:65,FPS:"),
        "unexpected output: {stdout}"
    );
}

#[test]
fn negative_fish_count_fails_startup() {
    let output = aquarium()
        .args(["--fish-count", "-10", "--frames", "1"])
        .output()
        .expect("failed to run aquarium");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("entity count must be zero or greater"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn asteroid_preset_runs_headless() {
    let output = aquarium()
        .args(["--preset", "asteroids", "--fish-count", "200"])
        .args(["--frames", "3", "--fixed-step-ms", "10"])
        .output()
        .expect("failed to run aquarium");

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "[RESULT] MODE:batched,COUNT:200,FPS:150");
}

#[test]
fn oversized_fish_count_fails_without_aborting() {
    let output = aquarium()
        .args(["--fish-count", "4000000000", "--frames", "1"])
        .output()
        .expect("failed to run aquarium");

    assert_eq!(output.status.code(), Some(1), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to allocate instance storage for 4000000000 entities"),
        "unexpected stderr: {stderr}"
    );
}
