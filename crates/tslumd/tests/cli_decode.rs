#![cfg(feature = "cli")]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use tslumd::frame::frame_to_bytes;
use tslumd::packet::{encode, DisplayMessage, Packet, Tally};

const CAM_1: [u8; 17] = [
    0x0F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0xD5, 0x00, 0x05, 0x00, b'C', b'A', b'M', b' ',
    b'1',
];

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "tslumd-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn tslumd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tslumd"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn run_with_stdin(args: &[&str], input: &[u8]) -> Output {
    let mut child = tslumd()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("tslumd should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(input)
        .expect("stdin should accept input");
    child.wait_with_output().expect("tslumd should finish")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect()
}

#[test]
fn decode_raw_file_reports_tallies() {
    let dir = unique_temp_dir("decode");
    let path = dir.join("cam1.bin");
    std::fs::write(&path, CAM_1).expect("capture should be writable");

    let output = tslumd()
        .arg("--format")
        .arg("json")
        .arg("decode")
        .arg(&path)
        .output()
        .expect("decode should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 1);

    let packet = &lines[0];
    assert_eq!(packet["screen"], 0);
    assert_eq!(packet["encoding"], "ascii");
    let message = &packet["messages"][0];
    assert_eq!(message["index"], 1);
    assert_eq!(message["text"], "CAM 1");
    assert_eq!(message["left"], "RED");
    assert_eq!(message["text_tally"], "RED");
    assert_eq!(message["right"], "RED");
    assert_eq!(message["brightness"], 3);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_framed_stdin_prints_each_packet() {
    let first = Packet::new(2).with_message(
        DisplayMessage::new(7, "PGM")
            .with_tallies(Tally::Off, Tally::Green, Tally::Amber)
            .with_brightness(1),
    );
    let second = Packet::new(3).with_message(DisplayMessage::with_control(0x02FE, 0, "\u{00fe}"));

    let mut wire = frame_to_bytes(&encode(&first).unwrap()).to_vec();
    wire.extend_from_slice(&frame_to_bytes(&encode(&second).unwrap()));

    let output = run_with_stdin(&["--format", "json", "decode", "--framed"], &wire);
    assert!(output.status.success());

    let lines = json_lines(&output);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["source"], "stdin");
    assert_eq!(lines[0]["screen"], 2);
    assert_eq!(lines[0]["messages"][0]["text_tally"], "GREEN");
    assert_eq!(lines[0]["messages"][0]["right"], "AMBER");
    assert_eq!(lines[1]["screen"], 3);
    assert_eq!(lines[1]["messages"][0]["index"], 0x02FE);
}

#[test]
fn decode_corrupted_packet_exits_60() {
    let mut corrupted = CAM_1;
    corrupted[0] = 0x10;

    let output = run_with_stdin(&["decode"], &corrupted);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("decode failed"));
}

#[test]
fn decode_missing_file_fails() {
    let output = tslumd()
        .arg("decode")
        .arg("/nonexistent/tslumd/capture.bin")
        .output()
        .expect("decode should run");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed reading"));
}

#[test]
fn log_file_is_appended() {
    let dir = unique_temp_dir("logfile");
    let capture = dir.join("cam1.bin");
    let log = dir.join("tslumd.log");
    std::fs::write(&capture, CAM_1).expect("capture should be writable");

    let run = || {
        Command::new(env!("CARGO_BIN_EXE_tslumd"))
            .arg("--log-level")
            .arg("debug")
            .arg("--log-file")
            .arg(&log)
            .arg("--format")
            .arg("json")
            .arg("decode")
            .arg(&capture)
            .output()
            .expect("decode should run")
    };

    assert!(run().status.success());
    let first = std::fs::read_to_string(&log).expect("log file should exist");
    assert!(first.contains("appending logs to file"));

    assert!(run().status.success());
    let second = std::fs::read_to_string(&log).expect("log file should exist");
    assert!(second.len() > first.len());
    assert!(second.starts_with(&first));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn failure_reports_recent_debug_lines() {
    let dir = unique_temp_dir("recent");
    let log = dir.join("tslumd.log");

    let output = tslumd()
        .arg("--log-file")
        .arg(&log)
        .arg("decode")
        .arg(dir.join("missing.bin"))
        .output()
        .expect("decode should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let (before, recent) = stderr
        .split_once("recent log lines:")
        .expect("recent lines should follow the error");
    assert!(before.contains("error: failed reading"));
    assert!(!before.contains("appending logs to file"));
    assert!(recent.contains("DEBUG appending logs to file"));
    assert!(recent.contains("ERROR"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn failure_at_debug_level_does_not_repeat_lines() {
    let output = Command::new(env!("CARGO_BIN_EXE_tslumd"))
        .args(["--log-level", "debug", "decode", "/nonexistent/tslumd/capture.bin"])
        .output()
        .expect("decode should run");

    assert!(!output.status.success());
    assert!(!String::from_utf8_lossy(&output.stderr).contains("recent log lines:"));
}

#[test]
fn version_reports_package_version() {
    let output = tslumd().arg("version").output().expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("tslumd {}", env!("CARGO_PKG_VERSION"))
    );
}
