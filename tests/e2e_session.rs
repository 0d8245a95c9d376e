//! End-to-end negotiation tests.
//!
//! These tests drive a client on the virtual bus against a scripted task
//! controller and simulated time, from power-up to a connected session.

use std::sync::Arc;

use parking_lot::Mutex;
use tc_client::clock::{Clock, ManualClock};
use tc_client::codec::{pgn, Label};
use tc_client::protocol::{
    ClientCapabilities, SerializedObjectPool, StateMachineState, TaskControllerClient,
};
use tc_client::transport::{SentFrame, VirtualCanBus, VirtualControlFunction};

const SERVER: u8 = 0xF7;
const CLIENT: u8 = 0x83;
const TICK_MS: u64 = 100;
const STRUCTURE: Label = *b"I++1.0 ";
const LOCALIZATION: Label = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Task controller that answers every request immediately
struct ScriptedServer {
    labels: Option<(Label, Label)>,
    accept_transfer_request: bool,
    transfers: Vec<Vec<u8>>,
    deletes: usize,
}

impl ScriptedServer {
    fn new(labels: Option<(Label, Label)>) -> Self {
        Self {
            labels,
            accept_transfer_request: true,
            transfers: Vec::new(),
            deletes: 0,
        }
    }

    fn label_reply(&self, mux: u8, pick: fn(&(Label, Label)) -> Label) -> [u8; 8] {
        let label = self.labels.as_ref().map_or([0xFF; 7], pick);
        let mut frame = [mux; 8];
        frame[1..].copy_from_slice(&label);
        frame
    }

    fn handle(&mut self, frame: &SentFrame) -> Vec<(u32, [u8; 8])> {
        if frame.pgn == pgn::REQUEST {
            return vec![(
                pgn::LANGUAGE_COMMAND,
                [b'd', b'e', 0x00, 0x00, 0x00, 0x00, b'D', b'E'],
            )];
        }
        if frame.pgn != pgn::PROCESS_DATA || frame.destination != SERVER {
            return Vec::new();
        }

        let reply = match frame.data[0] {
            0x00 => {
                return vec![
                    (pgn::PROCESS_DATA, [0x10, 0x04, 0x0A, 0x03, 0x00, 0x01, 0x10, 0x08]),
                    (pgn::PROCESS_DATA, [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
                ];
            }
            0x01 => self.label_reply(0x11, |l| l.0),
            0x21 => self.label_reply(0x31, |l| l.1),
            0xA1 => {
                self.labels = None;
                self.deletes += 1;
                [0xB1, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
            }
            0x41 => {
                let code = u8::from(!self.accept_transfer_request);
                [0x51, code, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
            }
            0x81 => [0x91, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            _ => return Vec::new(),
        };
        vec![(pgn::PROCESS_DATA, reply)]
    }
}

struct Harness {
    bus: Arc<VirtualCanBus>,
    clock: Arc<ManualClock>,
    internal: Arc<VirtualControlFunction>,
    client: TaskControllerClient,
    server: ScriptedServer,
    status_enabled: bool,
    sent: Vec<SentFrame>,
    visited: Vec<StateMachineState>,
}

impl Harness {
    fn new(server: ScriptedServer) -> Self {
        let bus = Arc::new(VirtualCanBus::new());
        let clock = Arc::new(ManualClock::new(0));
        let internal = Arc::new(VirtualControlFunction::new(CLIENT));
        let client = TaskControllerClient::new(
            bus.clone(),
            bus.clone(),
            Arc::new(VirtualControlFunction::new(SERVER)),
            internal.clone(),
        )
        .with_clock(clock.clone());
        client.configure(
            Arc::new(SerializedObjectPool::new(
                STRUCTURE,
                LOCALIZATION,
                (0u8..100).collect(),
            )),
            ClientCapabilities::new(1, 16, 8).with_documentation(true),
        );

        Self {
            bus,
            clock,
            internal,
            client,
            server,
            status_enabled: true,
            sent: Vec::new(),
            visited: Vec::new(),
        }
    }

    fn deliver(&self, replies: Vec<(u32, [u8; 8])>) {
        for (pgn, data) in replies {
            self.client.process_rx_frame(pgn, SERVER, &data);
        }
    }

    fn tick(&mut self) {
        if self.status_enabled && self.clock.now_ms() % 2_000 == 0 {
            self.client.process_rx_frame(
                pgn::PROCESS_DATA,
                SERVER,
                &[0xFE, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x00, 0xFF],
            );
        }

        self.client.update();

        for frame in self.bus.take_sent() {
            let replies = self.server.handle(&frame);
            self.deliver(replies);
            self.sent.push(frame);
        }
        while let Some((_, _, data)) = self.bus.complete_transfer(true) {
            self.server.labels = Some((STRUCTURE, LOCALIZATION));
            self.server.transfers.push(data);
            self.deliver(vec![(
                pgn::PROCESS_DATA,
                [0x71, 0x00, 0x64, 0x00, 0x00, 0x00, 0xFF, 0xFF],
            )]);
        }

        let state = self.client.state();
        if self.visited.last() != Some(&state) {
            self.visited.push(state);
        }
        self.clock.advance(TICK_MS);
    }

    fn run_until(&mut self, target: StateMachineState, max_ticks: u32) -> bool {
        for _ in 0..max_ticks {
            self.tick();
            if self.client.state() == target {
                return true;
            }
        }
        false
    }

    fn saw(&self, state: StateMachineState) -> bool {
        self.visited.contains(&state)
    }
}

/// Fresh server: the pool is uploaded, then activated
#[test]
fn test_full_negotiation_with_transfer() {
    let mut h = Harness::new(ScriptedServer::new(None));
    h.client.initialize(false);
    assert_eq!(h.client.state(), StateMachineState::WaitForStartUpDelay);

    assert!(h.run_until(StateMachineState::Connected, 500));
    assert!(h.client.is_connected());
    assert!(h.client.is_task_active());

    assert!(h.saw(StateMachineState::WaitForServerStatusMessage));
    assert!(h.saw(StateMachineState::RequestLanguage));
    assert!(h.saw(StateMachineState::BeginTransferDDOP));
    assert!(!h.saw(StateMachineState::SendDeleteObjectPool));

    // Working set master announced on the global address first
    let first = &h.sent[0];
    assert_eq!(first.pgn, pgn::WORKING_SET_MASTER);
    assert_eq!(first.destination, 0xFF);

    // Transfer is mux 0x61 followed by the pool
    assert_eq!(h.server.transfers.len(), 1);
    assert_eq!(h.server.transfers[0][0], 0x61);
    assert_eq!(h.server.transfers[0].len(), 101);

    let request = h
        .sent
        .iter()
        .find(|f| f.data.first() == Some(&0x41))
        .unwrap();
    assert_eq!(request.data, vec![0x41, 100, 0, 0, 0, 0xFF, 0xFF, 0xFF]);

    // Our version reply carries the configured capabilities
    let version = h
        .sent
        .iter()
        .find(|f| f.pgn == pgn::PROCESS_DATA && f.data.first() == Some(&0x10))
        .unwrap();
    assert_eq!(version.data, vec![0x10, 0x03, 0xFF, 0x01, 0x00, 0x01, 0x10, 0x08]);

    assert_eq!(h.client.connected_tc_number_sections_supported(), 16);
    assert_eq!(h.client.connected_tc_max_boot_time(), 0x0A);
    assert_eq!(h.client.language().unwrap().language_code, "de");
}

/// Server already holds the same pool: no transfer
#[test]
fn test_negotiation_reuses_stored_pool() {
    let mut h = Harness::new(ScriptedServer::new(Some((STRUCTURE, LOCALIZATION))));
    h.client.initialize(false);

    assert!(h.run_until(StateMachineState::Connected, 500));
    assert!(h.saw(StateMachineState::WaitForLocalizationLabelResponse));
    assert!(!h.saw(StateMachineState::SendRequestTransferObjectPool));
    assert!(h.server.transfers.is_empty());
}

/// Server holds an older pool: delete it, then upload ours
#[test]
fn test_mismatched_pool_is_replaced() {
    let mut h = Harness::new(ScriptedServer::new(Some((*b"I++0.9 ", LOCALIZATION))));
    h.client.initialize(false);

    assert!(h.run_until(StateMachineState::Connected, 500));
    assert!(h.saw(StateMachineState::SendDeleteObjectPool));
    assert_eq!(h.server.deletes, 1);
    assert_eq!(h.server.transfers.len(), 1);
}

/// Same structure, different language: still replaced
#[test]
fn test_localization_mismatch_is_replaced() {
    let mut h = Harness::new(ScriptedServer::new(Some((STRUCTURE, [0x02; 7]))));
    h.client.initialize(false);

    assert!(h.run_until(StateMachineState::Connected, 500));
    assert!(h.saw(StateMachineState::RequestLocalizationLabel));
    assert_eq!(h.server.deletes, 1);
    assert_eq!(h.server.transfers.len(), 1);
}

/// Losing the server drops the session; it comes back without a new upload
#[test]
fn test_server_loss_and_reconnect() {
    let mut h = Harness::new(ScriptedServer::new(None));
    h.client.initialize(false);
    assert!(h.run_until(StateMachineState::Connected, 500));

    h.status_enabled = false;
    assert!(h.run_until(StateMachineState::Disconnected, 100));
    assert!(h.run_until(StateMachineState::WaitForServerStatusMessage, 100));

    // Holds indefinitely without a server
    for _ in 0..200 {
        h.tick();
    }
    assert_eq!(h.client.state(), StateMachineState::WaitForServerStatusMessage);

    h.status_enabled = true;
    assert!(h.run_until(StateMachineState::Connected, 500));
    assert_eq!(h.server.transfers.len(), 1);
}

/// Client task messages keep flowing every two seconds while connected
#[test]
fn test_connected_status_cadence() {
    let mut h = Harness::new(ScriptedServer::new(None));
    h.client.initialize(false);
    assert!(h.run_until(StateMachineState::Connected, 500));
    h.sent.clear();

    for _ in 0..100 {
        h.tick();
    }
    assert!(h.client.is_connected());

    let statuses: Vec<_> = h
        .sent
        .iter()
        .filter(|f| f.data.first() == Some(&0xFF) && f.pgn == pgn::PROCESS_DATA)
        .collect();
    assert_eq!(statuses.len(), 5);
    assert!(statuses.iter().all(|f| f.destination == 0xFF));
    assert!(statuses.iter().all(|f| f.data[4] == 0x01));
}

/// A refused transfer request tears the session down until re-initialized
#[test]
fn test_transfer_refused_requires_initialize() {
    let mut server = ScriptedServer::new(None);
    server.accept_transfer_request = false;
    let mut h = Harness::new(server);
    h.client.initialize(false);

    assert!(h.run_until(StateMachineState::Disconnected, 500));
    assert!(!h.client.is_initialized());
    for _ in 0..200 {
        h.tick();
    }
    assert_eq!(h.client.state(), StateMachineState::Disconnected);

    h.server.accept_transfer_request = true;
    h.client.initialize(false);
    assert!(h.run_until(StateMachineState::Connected, 500));
}

/// NACK from the server drops the session
#[test]
fn test_nack_while_connected() {
    let mut h = Harness::new(ScriptedServer::new(None));
    h.client.initialize(false);
    assert!(h.run_until(StateMachineState::Connected, 500));

    h.client.process_rx_frame(
        pgn::ACKNOWLEDGE,
        SERVER,
        &[0x01, 0xFF, 0xFF, 0xFF, CLIENT, 0x00, 0xCB, 0x00],
    );
    h.tick();
    assert_eq!(h.client.state(), StateMachineState::Disconnected);
}

/// Without a claimed address the client waits in Disconnected
#[test]
fn test_waits_for_address_claim() {
    let mut h = Harness::new(ScriptedServer::new(None));
    h.internal.set_address(None);
    h.client.initialize(false);
    assert_eq!(h.client.state(), StateMachineState::Disconnected);

    for _ in 0..100 {
        h.tick();
    }
    assert_eq!(h.client.state(), StateMachineState::Disconnected);
    assert!(h.sent.is_empty());

    h.internal.set_address(Some(CLIENT));
    assert!(h.run_until(StateMachineState::Connected, 500));
}

/// Value requests and commands reach the application once connected
#[test]
fn test_process_data_exchange() {
    let mut h = Harness::new(ScriptedServer::new(None));
    h.client.initialize(false);
    assert!(h.run_until(StateMachineState::Connected, 500));

    let applied = Arc::new(Mutex::new(Vec::new()));
    let log = applied.clone();
    h.client
        .add_request_value_callback(Arc::new(|element: u16, ddi: u16| {
            (element == 2 && ddi == 0x0074).then_some(12_345_u32)
        }));
    h.client
        .add_value_command_callback(Arc::new(move |element: u16, ddi: u16, value: u32| {
            log.lock().push((element, ddi, value));
            true
        }));

    // Request element 2, DDI 0x0074 (total area)
    h.client.process_rx_frame(
        pgn::PROCESS_DATA,
        SERVER,
        &[0x22, 0x00, 0x74, 0x00, 0x00, 0x00, 0x00, 0x00],
    );
    // Set-and-acknowledge element 3, DDI 0x00A1 (section control state)
    h.client.process_rx_frame(
        pgn::PROCESS_DATA,
        SERVER,
        &[0x3A, 0x00, 0xA1, 0x00, 0x01, 0x00, 0x00, 0x00],
    );
    h.tick();

    assert_eq!(*applied.lock(), vec![(3, 0x00A1, 1)]);
    let value = h
        .sent
        .iter()
        .find(|f| f.data[..2] == [0x23, 0x00])
        .unwrap();
    assert_eq!(value.destination, SERVER);
    assert_eq!(value.data, vec![0x23, 0x00, 0x74, 0x00, 0x39, 0x30, 0x00, 0x00]);
    let pdack = h
        .sent
        .iter()
        .find(|f| f.data[..2] == [0x3D, 0x00])
        .unwrap();
    assert_eq!(pdack.data, vec![0x3D, 0x00, 0xA1, 0x00, 0x00, 0xFA, 0xFF, 0xFF]);

    // Application-initiated value
    assert!(h.client.send_value_command(4, 0x0075, 7).unwrap());
    let sent = h.bus.last_sent().unwrap();
    assert_eq!(sent.data, vec![0x43, 0x00, 0x75, 0x00, 0x07, 0x00, 0x00, 0x00]);
}

/// Terminate from any state returns to Disconnected
#[test]
fn test_terminate_mid_negotiation() {
    let mut h = Harness::new(ScriptedServer::new(None));
    h.client.initialize(false);
    assert!(h.run_until(StateMachineState::WaitForDDOPTransfer, 500));

    h.client.terminate();
    assert_eq!(h.client.state(), StateMachineState::Disconnected);
    assert!(!h.client.is_initialized());
    let before = h.sent.len();
    for _ in 0..50 {
        h.tick();
    }
    assert_eq!(h.sent.len(), before);
}
