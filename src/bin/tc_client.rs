//! Task controller client CLI.
//!
//! Frame tooling and an offline negotiation run against a scripted server.
//!
//! # Commands
//!
//! - `encode` - Build a client frame and print it as hex
//! - `decode` - Decode a received frame
//! - `labels` - Compare a received label with a stored one
//! - `config` - Show the effective configuration
//! - `simulate` - Negotiate with a scripted server on the virtual bus

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tc_client::{
    clock::{Clock, ManualClock},
    codec::{
        pgn, Acknowledgement, ClientMessage, Label, LanguageCommand, ProcessDataAcknowledge,
        ProcessDataFrame, ServerMessage, CLIENT_VERSION, LABEL_LENGTH,
    },
    config::Config,
    protocol::{label, SerializedObjectPool, StateMachineState, TaskControllerClient},
    transport::{SentFrame, VirtualCanBus, VirtualControlFunction},
    TcError, VERSION,
};

/// Address of the scripted server
const SIM_SERVER: u8 = 0xF7;
/// Address of the simulated implement
const SIM_CLIENT: u8 = 0x83;
/// Simulated time per tick
const SIM_TICK_MS: u64 = 100;
/// Give up after this many ticks
const SIM_MAX_TICKS: u32 = 2_000;

#[derive(Parser)]
#[command(name = "tc-client")]
#[command(version = VERSION)]
#[command(about = "ISO 11783-10 task controller client tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a client frame
    Encode {
        #[command(subcommand)]
        frame: EncodeFrame,
    },

    /// Decode a received frame
    Decode {
        /// Data bytes as hex, separators allowed ("82 04 12 34 00 00 00 00")
        data: String,

        /// PGN the frame arrived on
        #[arg(short, long, default_value = "0xCB00", value_parser = parse_u32)]
        pgn: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare a received label with the stored one
    Labels {
        /// Label received from the server (7 bytes hex)
        received: String,

        /// Label of the local pool (7 bytes hex)
        stored: String,
    },

    /// Show the effective configuration as TOML
    Config {
        /// Config file path
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Negotiate with a scripted server on the virtual bus
    Simulate {
        /// Config file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Server already holds the pool, skip the transfer
        #[arg(long)]
        stored: bool,

        /// Output the transitions as JSON
        #[arg(long)]
        json: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Subcommand)]
enum EncodeFrame {
    /// Value command
    ValueCommand {
        /// Element number (0-4095)
        #[arg(short, long, value_parser = parse_u16)]
        element: u16,

        /// Data dictionary identifier
        #[arg(short, long, value_parser = parse_u16)]
        ddi: u16,

        /// Value
        #[arg(short, long, value_parser = parse_u32)]
        value: u32,
    },

    /// Process data acknowledge for a set-value command
    Pdack {
        /// Element number (0-4095)
        #[arg(short, long, value_parser = parse_u16)]
        element: u16,

        /// Data dictionary identifier
        #[arg(short, long, value_parser = parse_u16)]
        ddi: u16,
    },

    /// Version response built from the configured capabilities
    VersionResponse {
        /// Config file path
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Client task status
    Status {
        /// Report a task as active
        #[arg(long)]
        task_active: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode { frame } => cmd_encode(frame),
        Commands::Decode { data, pgn, json } => cmd_decode(&data, pgn, json),
        Commands::Labels { received, stored } => cmd_labels(&received, &stored),
        Commands::Config { file } => cmd_config(file),
        Commands::Simulate {
            file,
            stored,
            json,
            verbose,
        } => cmd_simulate(file, stored, json, verbose),
    }
}

fn cmd_encode(frame: EncodeFrame) -> anyhow::Result<()> {
    let msg = match frame {
        EncodeFrame::ValueCommand {
            element,
            ddi,
            value,
        } => ClientMessage::ProcessData(ProcessDataFrame::value_command(element, ddi, value)?),
        EncodeFrame::Pdack { element, ddi } => {
            ClientMessage::Acknowledge(ProcessDataAcknowledge::new(element, ddi)?)
        }
        EncodeFrame::VersionResponse { file } => {
            let caps = Config::load(file.as_deref())?.client.capabilities();
            ClientMessage::Version {
                version: CLIENT_VERSION,
                options: caps.options(),
                booms: caps.booms,
                sections: caps.sections,
                channels: caps.channels,
            }
        }
        EncodeFrame::Status { task_active } => ClientMessage::Status {
            status: u8::from(task_active),
        },
    };

    println!("PGN 0x{:04X}: {}", msg.pgn(), hex::encode_upper(msg.encode()));
    Ok(())
}

fn cmd_decode(data: &str, pgn: u32, json: bool) -> anyhow::Result<()> {
    let bytes = parse_hex(data)?;

    match pgn {
        pgn::PROCESS_DATA => show(&ServerMessage::decode(&bytes)?, json),
        pgn::LANGUAGE_COMMAND => show(&LanguageCommand::decode(&bytes)?, json),
        pgn::ACKNOWLEDGE => show(&Acknowledgement::decode(&bytes)?, json),
        other => Err(TcError::UnexpectedPgn(other).into()),
    }
}

fn cmd_labels(received: &str, stored: &str) -> anyhow::Result<()> {
    let received = parse_label(received)?;
    let stored = parse_label(stored)?;
    println!("{:?}", label::compare(&received, &stored));
    Ok(())
}

fn cmd_config(file: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load(file.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct Transition {
    time_ms: u64,
    state: StateMachineState,
}

/// Server side of the simulation
struct ScriptedServer {
    holds_pool: bool,
    structure: Label,
    localization: Label,
}

impl ScriptedServer {
    fn reply(&self, client: &TaskControllerClient, frame: [u8; 8]) {
        client.process_rx_frame(pgn::PROCESS_DATA, SIM_SERVER, &frame);
    }

    fn label_frame(&self, mux: u8, label: &Label) -> [u8; 8] {
        let mut frame = [mux; 8];
        if self.holds_pool {
            frame[1..].copy_from_slice(label);
        } else {
            frame[1..].fill(0xFF);
        }
        frame
    }

    fn handle(&mut self, client: &TaskControllerClient, frame: &SentFrame) {
        if frame.pgn == pgn::REQUEST {
            // Language command: en, point, 24h, metric
            client.process_rx_frame(
                pgn::LANGUAGE_COMMAND,
                SIM_SERVER,
                &[b'e', b'n', 0x40, 0x00, 0x00, 0x00, b'U', b'S'],
            );
            return;
        }
        if frame.pgn != pgn::PROCESS_DATA || frame.destination != SIM_SERVER {
            return;
        }

        match frame.data.first().copied() {
            Some(0x00) => {
                self.reply(client, [0x10, 0x04, 0xFF, 0x1F, 0x00, 0x01, 0x20, 0x10]);
                self.reply(client, [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
            }
            Some(0x01) => self.reply(client, self.label_frame(0x11, &self.structure)),
            Some(0x21) => self.reply(client, self.label_frame(0x31, &self.localization)),
            Some(0xA1) => {
                self.holds_pool = false;
                self.reply(client, [0xB1, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
            }
            Some(0x41) => self.reply(client, [0x51, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
            Some(0x81) => self.reply(client, [0x91, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
            _ => {}
        }
    }

    fn accept_transfer(&mut self, client: &TaskControllerClient, data: &[u8]) {
        tracing::info!("Scripted server received object pool, {} bytes", data.len());
        self.holds_pool = true;
        let size = u32::try_from(data.len().saturating_sub(1))
            .unwrap_or(u32::MAX)
            .to_le_bytes();
        self.reply(
            client,
            [0x71, 0x00, size[0], size[1], size[2], size[3], 0xFF, 0xFF],
        );
    }
}

fn cmd_simulate(
    file: Option<PathBuf>,
    stored: bool,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    init_logging(verbose);

    let config = Config::load(file.as_deref())?;
    let bus = Arc::new(VirtualCanBus::new());
    let clock = Arc::new(ManualClock::new(0));
    let client = TaskControllerClient::new(
        bus.clone(),
        bus.clone(),
        Arc::new(VirtualControlFunction::new(SIM_SERVER)),
        Arc::new(VirtualControlFunction::new(SIM_CLIENT)),
    )
    .with_clock(clock.clone())
    .with_timing(config.timing.clone());

    let structure = *b"TCSIM01";
    let localization = [b'e', b'n', 0x50, 0x00, 0x55, 0x55, 0xFF];
    let ddop: Vec<u8> = (0..=u8::MAX).collect();
    client.configure(
        Arc::new(SerializedObjectPool::new(structure, localization, ddop)),
        config.client.capabilities(),
    );
    client.initialize(false);

    let mut server = ScriptedServer {
        holds_pool: stored,
        structure,
        localization,
    };
    let mut transitions = vec![Transition {
        time_ms: 0,
        state: client.state(),
    }];

    for _ in 0..SIM_MAX_TICKS {
        let now = clock.now_ms();
        if now % 2_000 == 0 {
            server.reply(&client, [0xFE, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x00, 0xFF]);
        }

        client.update();

        for frame in bus.take_sent() {
            server.handle(&client, &frame);
        }
        while let Some((_, _, data)) = bus.complete_transfer(true) {
            server.accept_transfer(&client, &data);
        }

        let state = client.state();
        if transitions.last().map(|t| t.state) != Some(state) {
            transitions.push(Transition {
                time_ms: now,
                state,
            });
        }
        if client.is_connected() {
            break;
        }
        clock.advance(SIM_TICK_MS);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&transitions)?);
    } else {
        for t in &transitions {
            println!("{:>7} ms  {}", t.time_ms, t.state);
        }
    }

    if !client.is_connected() {
        anyhow::bail!("negotiation did not complete, stopped in {}", client.state());
    }
    if !json {
        println!();
        println!("Connected to task controller:");
        println!("  Version:   {:?}", client.connected_tc_version());
        println!("  Booms:     {}", client.connected_tc_number_booms_supported());
        println!("  Sections:  {}", client.connected_tc_number_sections_supported());
        println!("  Channels:  {}", client.connected_tc_number_channels_supported());
        if let Some(language) = client.language() {
            println!("  Language:  {}", language.language_code);
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn show<T: Serialize + Debug>(value: &T, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{value:#?}");
    }
    Ok(())
}

fn parse_hex(input: &str) -> Result<Vec<u8>, TcError> {
    let clean: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != ',')
        .collect();
    let clean = clean
        .strip_prefix("0x")
        .or_else(|| clean.strip_prefix("0X"))
        .unwrap_or(&clean);
    Ok(hex::decode(clean)?)
}

fn parse_label(input: &str) -> Result<Label, TcError> {
    let bytes = parse_hex(input)?;
    Label::try_from(bytes.as_slice()).map_err(|_| TcError::InvalidLength {
        expected: LABEL_LENGTH,
        actual: bytes.len(),
    })
}

fn parse_number(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    u16::try_from(parse_number(s)?).map_err(|e| format!("'{s}' out of range: {e}"))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    u32::try_from(parse_number(s)?).map_err(|e| format!("'{s}' out of range: {e}"))
}
