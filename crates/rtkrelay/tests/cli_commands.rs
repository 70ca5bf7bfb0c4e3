#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Command;
use std::thread;

use bytes::BytesMut;
use rtkrelay::frame::{
    encode_frame, CarrierSolution, FixQuality, PositionFix, UtcTime, CLASS_NAV, ID_NAV_PVT,
};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/rtkrelay-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn fix(carrier: CarrierSolution, satellites: u8) -> PositionFix {
    PositionFix {
        time: UtcTime {
            year: 2025,
            month: 4,
            day: 2,
            hour: 9,
            minute: 41,
            second: 7,
        },
        fix_quality: FixQuality::ThreeD,
        carrier_solution: carrier,
        satellites,
        latitude: 45.6471947,
        longitude: -122.4567891,
        altitude_msl: 61.25,
        horizontal_accuracy: 0.014,
        vertical_accuracy: 0.02,
        valid: true,
    }
}

fn frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(class, id, payload, &mut buf).expect("frame should encode");
    buf.to_vec()
}

fn rtkrelay() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rtkrelay"));
    cmd.arg("--log-level").arg("error").arg("--format").arg("json");
    cmd
}

#[test]
fn decode_reports_fixes_from_capture() {
    let dir = unique_temp_dir("decode");
    let capture = dir.join("capture.ubx");

    let mut bytes = vec![0x00, 0xB5, 0x13, 0x37];
    bytes.extend(frame(
        CLASS_NAV,
        ID_NAV_PVT,
        &fix(CarrierSolution::Float, 18).to_nav_pvt(),
    ));
    bytes.extend(frame(0x0A, 0x04, b""));
    bytes.extend(frame(
        CLASS_NAV,
        ID_NAV_PVT,
        &fix(CarrierSolution::Fixed, 21).to_nav_pvt(),
    ));
    std::fs::write(&capture, &bytes).expect("capture should be writable");

    let output = rtkrelay()
        .arg("decode")
        .arg(&capture)
        .arg("--chunk")
        .arg("13")
        .output()
        .expect("decode should run");

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(
        json["schema_id"],
        "https://schemas.3leaps.dev/rtkrelay/cli/v1/decode-result.schema.json"
    );
    assert_eq!(json["fixes"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["fixes"][0]["carrier_solution"], "float");
    assert_eq!(json["fixes"][1]["satellites"], 21);
    assert_eq!(json["fixed"], 1);
    assert_eq!(json["float"], 1);
    assert_eq!(json["frames"], 3);
    assert_eq!(json["bytes"], bytes.len());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn decode_without_fixes_exits_data_invalid() {
    let dir = unique_temp_dir("decode-empty");
    let capture = dir.join("noise.ubx");
    std::fs::write(&capture, [0x55u8; 300]).expect("capture should be writable");

    let output = rtkrelay()
        .arg("decode")
        .arg(&capture)
        .output()
        .expect("decode should run");

    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no position fixes"), "stderr: {stderr}");

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn decode_missing_file_fails() {
    let output = rtkrelay()
        .arg("decode")
        .arg(format!("/tmp/rtkrelay-missing-{}.ubx", std::process::id()))
        .output()
        .expect("decode should run");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn probe_reports_accepted_session() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();

    let caster = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("probe should connect");
        let mut request = Vec::new();
        let mut buf = [0u8; 512];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).expect("request should arrive");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        stream
            .write_all(b"ICY 200 OK\r\n\r\n\xD3\x00\x02ab")
            .expect("response should send");
        String::from_utf8_lossy(&request).into_owned()
    });

    let output = rtkrelay()
        .arg("probe")
        .arg("--caster")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--mountpoint")
        .arg("BASE01")
        .arg("--user")
        .arg("rover")
        .arg("--password")
        .arg("secret")
        .arg("--listen")
        .arg("300ms")
        .output()
        .expect("probe should run");

    let request = caster.join().expect("caster thread");
    assert!(request.starts_with("GET /BASE01 HTTP/1.1\r\n"), "{request}");
    assert!(request.contains("Authorization: Basic cm92ZXI6c2VjcmV0\r\n"));

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(json["accepted"], true);
    assert_eq!(json["status_line"], "ICY 200 OK");
    assert_eq!(json["authenticated"], true);
    assert_eq!(json["bytes_received"], 5);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("secret"));
}

#[test]
fn probe_rejected_by_caster_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();

    let caster = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("probe should connect");
        let mut buf = [0u8; 512];
        let _ = stream.read(&mut buf);
        let _ = stream.write_all(b"HTTP/1.1 401 Unauthorized\r\n\r\n");
    });

    let output = rtkrelay()
        .arg("probe")
        .arg("--caster")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--mountpoint")
        .arg("BASE01")
        .output()
        .expect("probe should run");
    caster.join().expect("caster thread");

    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(json["accepted"], false);
    assert_eq!(json["status_line"], "HTTP/1.1 401 Unauthorized");
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_rtkrelay"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("rtkrelay {}", env!("CARGO_PKG_VERSION")));
}
