use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mavnode_frame::{timestamp_now, Frame};
use mavnode_node::CommandResponse;
use mavnode_schema::DialectRegistry;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Frame bytes exactly as received.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    channel: &'a str,
    version: u8,
    sequence: u8,
    system_id: u8,
    component_id: u8,
    message_id: u32,
    message_name: &'a str,
    payload_size: usize,
    signed: bool,
    message: Option<String>,
    payload_hex: String,
    /// MAVLink signing timestamp (10 µs units since 2015-01-01) at print time.
    received_at: u64,
}

pub fn print_frame(frame: &Frame, channel: &str, registry: &DialectRegistry, format: OutputFormat) {
    let name = registry
        .get(frame.message_id)
        .map(|entry| entry.spec.name)
        .unwrap_or("UNKNOWN");
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                channel,
                version: version_number(frame),
                sequence: frame.sequence,
                system_id: frame.system_id,
                component_id: frame.component_id,
                message_id: frame.message_id,
                message_name: name,
                payload_size: frame.payload.len(),
                signed: frame.is_signed(),
                message: frame.message.as_ref().map(|m| format!("{m:?}")),
                payload_hex: hex(&frame.payload),
                received_at: timestamp_now(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "SEQ", "SOURCE", "MESSAGE", "SIZE", "SIGNED"])
                .add_row(vec![
                    channel.to_string(),
                    frame.sequence.to_string(),
                    frame.source().to_string(),
                    format!("{name} ({})", frame.message_id),
                    frame.payload.len().to_string(),
                    frame.is_signed().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match &frame.message {
            Some(message) => println!(
                "[{channel}] seq={} src={} v{} {message:?}",
                frame.sequence,
                frame.source(),
                version_number(frame)
            ),
            None => println!(
                "[{channel}] seq={} src={} v{} {name} #{} payload={}",
                frame.sequence,
                frame.source(),
                version_number(frame),
                frame.message_id,
                hex(&frame.payload)
            ),
        },
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(&frame.to_bytes());
            let _ = out.flush();
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    command: u16,
    result: u8,
    result_name: &'a str,
    result_param2: i32,
    progress: u8,
    response_time_ms: u128,
    responder: String,
}

pub fn print_response(response: &CommandResponse, format: OutputFormat) {
    let result_name = response.result.name().unwrap_or("UNKNOWN");
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            let out = ResponseOutput {
                command: response.command,
                result: response.result.0,
                result_name,
                result_param2: response.result_param2,
                progress: response.progress,
                response_time_ms: response.response_time.as_millis(),
                responder: response.responder.to_string(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "RESULT", "PARAM2", "RESPONDER", "TIME"])
                .add_row(vec![
                    response.command.to_string(),
                    result_name.to_string(),
                    response.result_param2.to_string(),
                    response.responder.to_string(),
                    format!("{:?}", response.response_time),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "command {} -> {} from {} in {:?}",
            response.command, result_name, response.responder, response.response_time
        ),
    }
}

fn version_number(frame: &Frame) -> u8 {
    match frame.version {
        mavnode_frame::Version::V1 => 1,
        mavnode_frame::Version::V2 => 2,
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
