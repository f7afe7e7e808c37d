use std::path::PathBuf;
use std::process::{Command, Output};

fn root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn nucleo() -> PathBuf {
    root().join("configs/boards/nucleo-f401re.yaml")
}

fn f4blink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_f4blink"))
        .args(args)
        .output()
        .expect("Failed to execute f4blink")
}

fn report_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .rfind(|l| l.starts_with('{'))
        .unwrap_or_else(|| panic!("no JSON report on stdout: {}", stdout));
    serde_json::from_str(line).expect("Failed to parse JSON report")
}

#[test]
fn test_run_default_board_passes() {
    let board = nucleo();
    let output = f4blink(&["run", "--board", board.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let json = report_json(&output);
    assert_eq!(json["status"], "pass");
    assert_eq!(json["flow"], "pll");
    assert_eq!(json["polls"]["hse"], 4);
    assert_eq!(json["polls"]["pll"], 6);
    assert_eq!(json["polls"]["switch"], 2);
    assert_eq!(json["clock"]["sysclk_hz"], 84_000_000);
    assert_eq!(json["toggles"], 4);
    assert!(json["violations"].as_array().unwrap().is_empty());
}

#[test]
fn test_run_without_hse_fails_bringup() {
    let board = nucleo();
    let output = f4blink(&[
        "run",
        "--board",
        board.to_str().unwrap(),
        "--no-hse",
        "--timeout-polls",
        "50",
        "--json",
    ]);
    assert_eq!(output.status.code(), Some(1), "{:?}", output);

    let json = report_json(&output);
    assert_eq!(json["status"], "timeout");
    assert_eq!(json["toggles"], 0);
    assert_eq!(json["clock"]["sysclk_hz"], 16_000_000);
}

#[test]
fn test_run_hsi_flow() {
    let board = nucleo();
    let output = f4blink(&[
        "run",
        "--board",
        board.to_str().unwrap(),
        "--no-pll",
        "--blinks",
        "3",
        "--json",
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let json = report_json(&output);
    assert_eq!(json["flow"], "hsi");
    assert!(json.get("polls").is_none());
    assert_eq!(json["led"], "PA5");
    assert_eq!(json["led_on"], true);
}

#[test]
fn test_latency_overrides_change_poll_counts() {
    let board = nucleo();
    let output = f4blink(&[
        "run",
        "--board",
        board.to_str().unwrap(),
        "--hse-latency",
        "0",
        "--pll-latency",
        "10",
        "--switch-latency",
        "0",
        "--json",
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let json = report_json(&output);
    assert_eq!(json["polls"]["hse"], 1);
    assert_eq!(json["polls"]["pll"], 11);
    assert_eq!(json["polls"]["switch"], 1);
}

#[test]
fn test_snapshot_contains_trace() -> anyhow::Result<()> {
    let snapshot = std::env::temp_dir().join(format!("f4blink-snapshot-{}.json", std::process::id()));
    let board = nucleo();
    let output = f4blink(&[
        "run",
        "--board",
        board.to_str().unwrap(),
        "--snapshot",
        snapshot.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let content = std::fs::read_to_string(&snapshot)?;
    std::fs::remove_file(&snapshot).ok();
    let json: serde_json::Value = serde_json::from_str(&content)?;

    assert_eq!(json["report"]["status"], "pass");
    assert_eq!(json["bus"]["peripherals"]["flash"]["acr"], 2);
    let trace = json["trace"].as_array().unwrap();
    assert_eq!(trace.len() as u64, json["bus"]["accesses"].as_u64().unwrap());
    assert_eq!(trace[0]["kind"], "read");
    Ok(())
}

#[test]
fn test_check_prints_clock_tree() {
    let board = nucleo();
    let output = f4blink(&["check", "--board", board.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sysclk:     84000000 Hz"), "{}", stdout);
    assert!(stdout.contains("pll48:      48000000 Hz"), "{}", stdout);
}

#[test]
fn test_invalid_profile_is_config_error() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("f4blink-bad-{}.yaml", std::process::id()));
    std::fs::write(
        &path,
        r#"
name: "bad-vco"
hse_hz: 8000000
pll: { m: 4, n: 84, p: 2, q: 7 }
flash_latency: 5
led: { port: a, pin: 5 }
"#,
    )?;

    let check = f4blink(&["check", "--board", path.to_str().unwrap()]);
    let run = f4blink(&["run", "--board", path.to_str().unwrap()]);
    std::fs::remove_file(&path).ok();

    assert_eq!(check.status.code(), Some(2));
    assert_eq!(run.status.code(), Some(2));
    Ok(())
}

#[test]
fn test_missing_profile_is_config_error() {
    let output = f4blink(&["run", "--board", "does/not/exist.yaml"]);
    assert_eq!(output.status.code(), Some(2));
}
