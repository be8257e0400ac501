use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use senseway_frame::message::message_name;
use senseway_session::InboundFrame;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print a single result.
///
/// JSON prints `value`; the other formats print `fields` as a two-column
/// table or as `name: value` lines.
pub fn print_record<T: Serialize>(value: &T, fields: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => {
            let rows = fields
                .iter()
                .map(|(name, value)| vec![name.to_string(), value.clone()])
                .collect();
            print_table(&["FIELD", "VALUE"], rows);
        }
        OutputFormat::Pretty => {
            let width = fields.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            for (name, value) in fields {
                println!("{name:<width$}  {value}");
            }
        }
    }
}

/// Print a list of results.
pub fn print_rows<T: Serialize>(
    values: &[T],
    header: &[&str],
    rows: Vec<Vec<String>>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&values),
        OutputFormat::Table => print_table(header, rows),
        OutputFormat::Pretty => {
            for row in rows {
                println!("{}", row.join("  "));
            }
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_table(header: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    sequence: u64,
    transmitter_id: u8,
    receiver_id: u8,
    message_id: u8,
    message_name: &'a str,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

/// Print one frame seen on the bus.
pub fn print_frame(inbound: &InboundFrame, format: OutputFormat) {
    let frame = &inbound.frame;
    let payload = hex(&frame.payload);
    match format {
        OutputFormat::Json => print_json(&FrameOutput {
            sequence: inbound.sequence,
            transmitter_id: frame.transmitter_id,
            receiver_id: frame.receiver_id,
            message_id: frame.message_id,
            message_name: message_name(frame.message_id),
            payload_size: frame.payload.len(),
            payload,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => print_table(
            &["SEQ", "FROM", "TO", "MESSAGE", "SIZE", "PAYLOAD"],
            vec![vec![
                inbound.sequence.to_string(),
                frame.transmitter_id.to_string(),
                frame.receiver_id.to_string(),
                message_name(frame.message_id).to_string(),
                frame.payload.len().to_string(),
                payload,
            ]],
        ),
        OutputFormat::Pretty => println!(
            "#{} {} -> {} {} ({}) size={} payload={}",
            inbound.sequence,
            frame.transmitter_id,
            frame.receiver_id,
            message_name(frame.message_id),
            frame.message_id,
            frame.payload.len(),
            payload
        ),
    }
}

/// Space-separated upper-case hex.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_spaced_upper_case() {
        assert_eq!(hex(&[0x0A, 0xFF, 0x00]), "0A FF 00");
        assert_eq!(hex(&[]), "");
    }
}
