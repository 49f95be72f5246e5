#![cfg(feature = "cli")]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread;
use std::time::Duration;

use ampwire_frame::checksum;

fn unique_config_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "ampwire-cli-{tag}-{}-{}.json",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

fn ampwire(config: &PathBuf, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ampwire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("ampwire should run")
}

/// Accept one connection, optionally write `reply`, and return the first
/// `expect` bytes received.
fn fake_device(expect: usize, reply: Vec<u8>) -> (u16, thread::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("fake device should bind");
    let port = listener.local_addr().expect("fake device addr").port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("device should accept");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout should apply");
        if !reply.is_empty() {
            stream.write_all(&reply).expect("reply should be written");
        }
        let mut received = vec![0u8; expect];
        stream
            .read_exact(&mut received)
            .expect("command bytes should arrive");
        received
    });
    (port, handle)
}

#[test]
fn volume_set_writes_one_command_frame() {
    let config = unique_config_path("volume");
    let (port, device) = fake_device(9, Vec::new());

    let output = ampwire(
        &config,
        &[
            "--ip",
            "127.0.0.1",
            "--port",
            &port.to_string(),
            "volume",
            "set",
            "10",
        ],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let payload = [0x2F, 0xA0, 0x13, 0x0A, 0x51];
    let mut expected = vec![0xFF, 0x55, 0x05];
    expected.extend_from_slice(&payload);
    expected.push(checksum(&payload));
    assert_eq!(device.join().expect("device thread"), expected);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"ack\":\"Success\""));
    assert!(stdout.contains("\"sent\":10"));
    assert!(stdout.contains("\"volume_value\":10"));
}

#[test]
fn volume_set_to_stored_initial_volume_still_reaches_device() {
    let config = unique_config_path("initial");
    std::fs::write(
        &config,
        r#"{"ip": "127.0.0.1", "source": "usb", "initialvolume": 40}"#,
    )
    .expect("settings should be written");
    let (port, device) = fake_device(9, Vec::new());

    // Stored 40 on the 0-155 range is device unit 8.
    let output = ampwire(&config, &["--port", &port.to_string(), "volume", "set", "8"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let payload = [0x2F, 0xA0, 0x13, 0x08, 0x51];
    let mut expected = vec![0xFF, 0x55, 0x05];
    expected.extend_from_slice(&payload);
    expected.push(checksum(&payload));
    assert_eq!(device.join().expect("device thread"), expected);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"sent\":8"));
    let _ = std::fs::remove_file(&config);
}

#[test]
fn volume_adjust_is_relative_to_converted_initial_volume() {
    let config = unique_config_path("adjust");
    std::fs::write(
        &config,
        r#"{"ip": "127.0.0.1", "source": "usb", "initialvolume": 40}"#,
    )
    .expect("settings should be written");
    let (port, device) = fake_device(9, Vec::new());

    let output = ampwire(&config, &["--port", &port.to_string(), "volume", "adjust", "-1"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let payload = [0x2F, 0xA0, 0x14, 0x07, 0x51];
    let mut expected = vec![0xFF, 0x55, 0x05];
    expected.extend_from_slice(&payload);
    expected.push(checksum(&payload));
    assert_eq!(device.join().expect("device thread"), expected);
    let _ = std::fs::remove_file(&config);
}

#[test]
fn monitor_prints_state_from_device_feedback() {
    let config = unique_config_path("monitor");
    let feedback = vec![
        0xFF, 0x55, 0x08, 0x2E, 0xA0, 0x05, 0x03, 0x41, 0x00, 0x00, 0xDB, 0x06,
    ];
    let listener = TcpListener::bind("127.0.0.1:0").expect("fake device should bind");
    let port = listener.local_addr().expect("fake device addr").port();
    let device = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("device should accept");
        thread::sleep(Duration::from_millis(100));
        stream.write_all(&feedback).expect("feedback should be written");
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
    });

    let output = ampwire(
        &config,
        &[
            "--ip",
            "127.0.0.1",
            "--port",
            &port.to_string(),
            "monitor",
            "--count",
            "1",
        ],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"volume_value\":3"));
    let _ = device.join();
}

#[test]
fn volume_without_address_is_data_invalid() {
    let config = unique_config_path("no-ip");
    let output = ampwire(&config, &["volume", "set", "10"]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not configured"));
}

#[test]
fn refused_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("listener addr").port();
    drop(listener);

    let config = unique_config_path("refused");
    let output = ampwire(
        &config,
        &[
            "--ip",
            "127.0.0.1",
            "--port",
            &port.to_string(),
            "volume",
            "adjust",
            "-2",
        ],
    );
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn mute_is_reported_as_unsupported() {
    let config = unique_config_path("mute");
    let output = ampwire(&config, &["mute", "on"]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not supported"));
}

#[test]
fn decode_prints_captured_feedback() {
    let config = unique_config_path("decode");
    let output = ampwire(&config, &["decode", "ff5508 2ea0 0503 4100 00db 06"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"direction\":\"feedback\""));
    assert!(stdout.contains("\"code_name\":\"VOLUME_DOWN_NOTIFY\""));
    assert!(stdout.contains("\"value\":3"));
}

#[test]
fn decode_rejects_bad_checksum() {
    let config = unique_config_path("decode-bad");
    let output = ampwire(&config, &["decode", "ff5508 2ea0 0503 4100 00db 07"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn config_set_rejects_invalid_address_without_saving() {
    let config = unique_config_path("config-bad");
    let output = ampwire(&config, &["config", "set", "--ip", "999.1.1.1"]);
    assert_eq!(output.status.code(), Some(60));
    assert!(!config.exists());
}

#[test]
fn config_set_then_show() {
    let config = unique_config_path("config");
    let output = ampwire(
        &config,
        &[
            "config",
            "set",
            "--ip",
            "192.168.1.20",
            "--initial-volume",
            "40",
        ],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output = ampwire(&config, &["config", "show"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"ip\":\"192.168.1.20\""));
    assert!(stdout.contains("\"initial_volume\":40"));
    assert!(stdout.contains("\"source\":\"usb\""));

    let _ = std::fs::remove_file(&config);
}
