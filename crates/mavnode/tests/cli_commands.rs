#![cfg(feature = "cli")]

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use mavnode::frame::{encode_message, FrameReader};
use mavnode::schema::common::{self, CommandAck, CommandLong, Heartbeat, MavResult};
use mavnode::{Identity, Version};

fn vehicle_frame(message: &dyn mavnode::schema::Message, sequence: u8) -> Vec<u8> {
    let registry = common::registry();
    encode_message(message, Version::V2, sequence, Identity::new(1, 1), &registry, None)
        .expect("encode should succeed")
        .to_bytes()
        .to_vec()
}

fn mavnode(args: &[&str]) -> std::process::Child {
    Command::new(env!("CARGO_BIN_EXE_mavnode"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("mavnode should start")
}

fn accept(listener: &TcpListener) -> TcpStream {
    let (stream, _) = listener.accept().expect("cli should connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout should be settable");
    stream
}

fn json_line(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next().expect("stdout should have a line");
    serde_json::from_str(line).expect("stdout should be JSON")
}

#[test]
fn listen_prints_received_heartbeat() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr").to_string();
    let child = mavnode(&["listen", &format!("tcp:{addr}"), "--count", "1"]);

    let mut vehicle = accept(&listener);
    let heartbeat = Heartbeat {
        mav_type: 2,
        autopilot: 3,
        ..Heartbeat::default()
    };
    vehicle.write_all(b"noise").expect("write should succeed");
    vehicle
        .write_all(&vehicle_frame(&heartbeat, 42))
        .expect("write should succeed");

    let output = child.wait_with_output().expect("listen should exit");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let frame = json_line(&output);
    assert_eq!(frame["message_id"], 0);
    assert_eq!(frame["message_name"], "HEARTBEAT");
    assert_eq!(frame["sequence"], 42);
    assert_eq!(frame["system_id"], 1);
    assert_eq!(frame["signed"], false);
}

fn run_command_against(result: MavResult) -> (Output, CommandLong) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr").to_string();
    let child = mavnode(&["command", &format!("tcp:{addr}"), "400", "1", "--timeout", "2s"]);

    let vehicle = accept(&listener);
    let mut reader = FrameReader::new(vehicle.try_clone().expect("clone should succeed"));
    let frame = reader.read_frame().expect("command frame should arrive");
    let command = frame
        .message_as::<CommandLong>()
        .expect("COMMAND_LONG expected")
        .clone();

    let ack = CommandAck {
        command: command.command,
        result,
        ..CommandAck::default()
    };
    (&vehicle)
        .write_all(&vehicle_frame(&ack, 0))
        .expect("write should succeed");

    let output = child.wait_with_output().expect("command should exit");
    (output, command)
}

#[test]
fn command_reports_accepted_result() {
    let (output, command) = run_command_against(MavResult::ACCEPTED);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(command.command, 400);
    assert_eq!(command.params[0], 1.0);
    assert_eq!((command.target_system, command.target_component), (1, 1));

    let response = json_line(&output);
    assert_eq!(response["result_name"], "MAV_RESULT_ACCEPTED");
    assert_eq!(response["responder"], "1:1");
}

#[test]
fn command_rejection_sets_exit_code() {
    let (output, _) = run_command_against(MavResult::DENIED);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(json_line(&output)["result_name"], "MAV_RESULT_DENIED");
}

#[test]
fn listen_fails_when_nothing_is_reachable() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        listener.local_addr().expect("local addr").port()
    };
    let output = mavnode(&["listen", &format!("tcp:127.0.0.1:{port}")])
        .wait_with_output()
        .expect("listen should exit");
    assert_eq!(output.status.code(), Some(3));
}
