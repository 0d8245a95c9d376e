//! Task controller client engine.
//!
//! [`TaskControllerClient`] owns the negotiation state machine. It is driven
//! by [`TaskControllerClient::update`], either from the application's own
//! control loop or from a worker thread started by
//! [`TaskControllerClient::initialize`].
//!
//! # Threading
//!
//! ```text
//!  receive path ──► process_rx_frame ──┐
//!                                      ├──► event queue ──► update()
//!  bulk transfer ──► on_complete ──────┘                      │
//!                                                             ├─ session lock: drain, timeout, step
//!                                                             └─ no lock: process-data callbacks
//! ```
//!
//! The receive path only decodes and queues; every field of the session is
//! read and written under one lock inside the tick. Callbacks run after that
//! lock is released, over a snapshot of the registry, so a handler may call
//! back into the client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::callbacks::{CallbackRegistry, RequestValueCallback, ValueCommandCallback};
use super::capabilities::{ClientCapabilities, ServerCapabilities};
use super::label::{compare_optional, LabelMatch};
use super::pool::ObjectPool;
use super::state::{OnTimeout, StateMachineState};
use crate::clock::{Clock, SystemClock};
use crate::codec::{
    object_pool_transfer_payload, pgn, request_pgn_payload, AcknowledgeErrorCodes,
    Acknowledgement, ClientMessage, Label, LanguageCommand, ProcessDataAcknowledge,
    ProcessDataCommand, ProcessDataFrame, ServerMessage, ServerOption, ServerStatus, Version,
};
use crate::config::TimingConfig;
use crate::error::Result;
use crate::transport::{BulkTransfer, CanBus, ControlFunction};

use super::state::StateMachineState as S;

/// Input queued for the next tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Process-data PGN frame from the server
    Server(ServerMessage),
    /// Language command from the server
    Language(LanguageCommand),
    /// Server NACKed our process-data traffic
    Nack,
    /// Object pool bulk transfer finished
    TransferComplete(bool),
}

/// Bus-facing side of the client, usable without the session lock
struct Endpoints {
    bus: Arc<dyn CanBus>,
    transfer: Arc<dyn BulkTransfer>,
    partner: Arc<dyn ControlFunction>,
    internal: Arc<dyn ControlFunction>,
    events: UnboundedSender<ClientEvent>,
}

impl Endpoints {
    fn ready(&self) -> bool {
        self.partner.is_address_valid() && self.internal.is_address_valid()
    }

    fn partner_address(&self) -> Option<u8> {
        if self.partner.is_address_valid() {
            self.partner.address()
        } else {
            None
        }
    }

    fn send(&self, msg: &ClientMessage) -> bool {
        if !self.internal.is_address_valid() {
            return false;
        }
        match msg.destination(self.partner_address()) {
            Some(destination) => self.bus.send(msg.pgn(), destination, &msg.encode()),
            None => false,
        }
    }

    fn request_language(&self) -> bool {
        match self.partner_address() {
            Some(addr) if self.internal.is_address_valid() => self.bus.send(
                pgn::REQUEST,
                addr,
                &request_pgn_payload(pgn::LANGUAGE_COMMAND),
            ),
            _ => false,
        }
    }

    fn begin_pool_transfer(&self, pool: &[u8]) -> bool {
        let Some(destination) = self.partner_address() else {
            return false;
        };
        if !self.internal.is_address_valid() {
            return false;
        }
        let events = self.events.clone();
        self.transfer.begin_transfer(
            pgn::PROCESS_DATA,
            destination,
            object_pool_transfer_payload(pool),
            Box::new(move |success| {
                // Receiver is gone only when the client was dropped
                let _ = events.send(ClientEvent::TransferComplete(success));
            }),
        )
    }
}

/// Everything guarded by the session lock
struct Session {
    state: StateMachineState,
    state_entry_ms: u64,
    initialized: bool,
    capabilities: ClientCapabilities,
    pool: Option<Arc<dyn ObjectPool>>,
    server: ServerCapabilities,
    server_status: Option<ServerStatus>,
    last_server_status_ms: Option<u64>,
    last_client_status_ms: Option<u64>,
    language: Option<LanguageCommand>,
    language_ms: Option<u64>,
    // Valid from ProcessDDOP onward
    structure_label: Option<Label>,
    localization_label: Option<Label>,
    serialized_pool: Vec<u8>,
    timing: TimingConfig,
    clock: Arc<dyn Clock>,
    events: UnboundedReceiver<ClientEvent>,
}

impl Session {
    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn set_state(&mut self, state: StateMachineState, timestamp_ms: u64) {
        if self.state != state {
            tracing::debug!("Task controller client: {} -> {}", self.state, state);
        }
        self.state = state;
        self.state_entry_ms = timestamp_ms;
        if state == S::Connected {
            self.last_client_status_ms = None;
        }
    }

    fn disconnect(&mut self, now: u64, reason: &str) {
        tracing::warn!("Disconnecting from task controller in {}: {}", self.state, reason);
        self.set_state(S::Disconnected, now);
    }

    /// Server refused our pool; stays down until initialize() is called again
    fn tear_down(&mut self, now: u64, reason: &str) {
        tracing::error!("Task controller rejected the session: {}", reason);
        self.initialized = false;
        self.set_state(S::Disconnected, now);
    }

    fn discard_events(&mut self) {
        while self.events.try_recv().is_ok() {}
    }

    /// Language command received within the last state timeout
    fn has_recent_language(&self, now: u64) -> bool {
        self.language.is_some()
            && self
                .language_ms
                .is_some_and(|at| now.saturating_sub(at) < self.timing.state_timeout_ms)
    }

    fn task_status(&self) -> u8 {
        u8::from(self.server_status.is_some_and(|s| s.is_task_active()))
    }

    fn stored_structure_label(&self) -> Option<Label> {
        self.structure_label
            .or_else(|| self.pool.as_ref().map(|p| p.structure_label()))
    }

    fn stored_localization_label(&self) -> Option<Label> {
        self.localization_label
            .or_else(|| self.pool.as_ref().map(|p| p.localization_label()))
    }

    fn ensure_serialized(&mut self) {
        if self.serialized_pool.is_empty() {
            if let Some(pool) = self.pool.as_ref().filter(|p| p.is_valid()) {
                self.serialized_pool = pool.serialize();
            }
        }
    }

    /// Drain queued events; returns whether any of them changed the state
    fn drain_events(&mut self, now: u64, runtime: &mut Vec<ProcessDataFrame>) -> bool {
        let before = (self.state, self.state_entry_ms);
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event, now, runtime);
        }
        (self.state, self.state_entry_ms) != before
    }

    fn handle_event(&mut self, event: ClientEvent, now: u64, runtime: &mut Vec<ProcessDataFrame>) {
        match event {
            ClientEvent::Server(msg) => self.handle_server_message(msg, now, runtime),
            ClientEvent::Language(language) => {
                tracing::debug!("Language command received: {}", language.language_code);
                self.language = Some(language);
                self.language_ms = Some(now);
                if self.state == S::WaitForLanguageResponse {
                    self.set_state(S::ProcessDDOP, now);
                }
            }
            ClientEvent::Nack => {
                if self.state != S::Disconnected {
                    tracing::error!("Task controller NACKed process data");
                    self.disconnect(now, "NACK");
                }
            }
            ClientEvent::TransferComplete(success) => {
                if self.state != S::WaitForDDOPTransfer {
                    tracing::trace!("Stale transfer completion in {}", self.state);
                } else if success {
                    tracing::debug!("Object pool transfer complete");
                    self.set_state(S::WaitForObjectPoolTransferResponse, now);
                } else {
                    self.disconnect(now, "object pool transfer failed");
                }
            }
        }
    }

    fn handle_server_message(
        &mut self,
        msg: ServerMessage,
        now: u64,
        runtime: &mut Vec<ProcessDataFrame>,
    ) {
        match (self.state, msg) {
            (state, ServerMessage::Status(status)) => {
                self.server_status = Some(status);
                self.last_server_status_ms = Some(now);
                if state == S::WaitForServerStatusMessage {
                    self.set_state(S::SendWorkingSetMaster, now);
                }
            }
            (_, ServerMessage::ProcessData(frame)) => match frame.command {
                ProcessDataCommand::RequestValue
                | ProcessDataCommand::Value
                | ProcessDataCommand::SetValueAndAcknowledge => runtime.push(frame),
                other if other.is_measurement() => tracing::trace!(
                    "Measurement trigger {:?} not supported, element {} DDI {}",
                    other,
                    frame.element,
                    frame.ddi
                ),
                other => tracing::trace!(
                    "Unhandled process data command {:?} for element {} DDI {}",
                    other,
                    frame.element,
                    frame.ddi
                ),
            },
            (S::WaitForRequestVersionResponse, ServerMessage::Version(info)) => {
                self.server = ServerCapabilities::from(info);
                tracing::info!(
                    "Task controller version {:?}, {} booms, {} sections, {} channels",
                    info.version,
                    info.booms,
                    info.sections,
                    info.channels
                );
                self.set_state(S::WaitForRequestVersionFromServer, now);
            }
            (S::WaitForRequestVersionFromServer, ServerMessage::RequestVersion) => {
                self.set_state(S::SendRequestVersionResponse, now);
            }
            (S::WaitForStructureLabelResponse, ServerMessage::StructureLabel { label }) => {
                let next = match compare_optional(&label, self.stored_structure_label().as_ref()) {
                    LabelMatch::Match => S::RequestLocalizationLabel,
                    LabelMatch::NotPresent => S::SendRequestTransferObjectPool,
                    LabelMatch::Mismatch => S::SendDeleteObjectPool,
                };
                self.set_state(next, now);
            }
            (S::WaitForLocalizationLabelResponse, ServerMessage::LocalizationLabel { label }) => {
                let next =
                    match compare_optional(&label, self.stored_localization_label().as_ref()) {
                        LabelMatch::Match => S::SendObjectPoolActivate,
                        LabelMatch::NotPresent => S::SendRequestTransferObjectPool,
                        LabelMatch::Mismatch => S::SendDeleteObjectPool,
                    };
                self.set_state(next, now);
            }
            (S::WaitForDeleteObjectPoolResponse, ServerMessage::DeleteObjectPoolResponse { code, .. }) => {
                tracing::debug!("Delete object pool response code {}", code);
                self.set_state(S::SendRequestTransferObjectPool, now);
            }
            (
                S::WaitForRequestTransferObjectPoolResponse,
                ServerMessage::RequestObjectPoolTransferResponse { code },
            ) => {
                if code == 0 {
                    self.set_state(S::BeginTransferDDOP, now);
                } else {
                    self.tear_down(now, &format!("not enough memory for object pool (code {code})"));
                }
            }
            (
                S::WaitForObjectPoolTransferResponse,
                ServerMessage::ObjectPoolTransferResponse { code, .. },
            ) => {
                if code == 0 {
                    self.set_state(S::SendObjectPoolActivate, now);
                } else {
                    self.tear_down(now, &format!("object pool transfer refused (code {code})"));
                }
            }
            (
                S::WaitForObjectPoolActivateResponse,
                ServerMessage::ActivateDeactivateResponse {
                    code,
                    parent_object,
                    faulty_object,
                    pool_error,
                },
            ) => {
                if code == 0 {
                    tracing::info!("Task controller connected, object pool active");
                    self.set_state(S::Connected, now);
                } else {
                    self.disconnect(
                        now,
                        &format!(
                            "activation failed (code {code}, parent {parent_object}, object {faulty_object}, pool error {pool_error})"
                        ),
                    );
                }
            }
            (
                S::WaitForObjectPoolDeactivateResponse,
                ServerMessage::ActivateDeactivateResponse { code, .. },
            ) => {
                tracing::info!("Object pool deactivated (code {})", code);
                self.set_state(S::Disconnected, now);
            }
            (state, other) => {
                tracing::trace!("Ignoring {:?} in {}", other, state);
            }
        }
    }

    /// Timeout check, then the current state's action
    fn step(&mut self, io: &Endpoints, now: u64) {
        let state = self.state;
        let (since, timeout) = match state {
            S::WaitForStartUpDelay => (self.state_entry_ms, self.timing.startup_delay_ms),
            S::Connected => (
                self.state_entry_ms
                    .max(self.last_server_status_ms.unwrap_or(0)),
                self.timing.server_status_timeout_ms,
            ),
            _ => (self.state_entry_ms, self.timing.state_timeout_ms),
        };

        if now.saturating_sub(since) >= timeout {
            match state.on_timeout() {
                OnTimeout::Hold => {}
                OnTimeout::Disconnect => {
                    self.disconnect(now, "timeout");
                    return;
                }
                OnTimeout::Advance(next) => {
                    self.set_state(next, now);
                    return;
                }
            }
        }

        match state {
            S::Disconnected => {
                if self.pool.is_some() && io.ready() {
                    self.server = ServerCapabilities::default();
                    self.server_status = None;
                    self.last_server_status_ms = None;
                    self.language = None;
                    self.language_ms = None;
                    self.set_state(S::WaitForStartUpDelay, now);
                }
            }
            S::WaitForStartUpDelay
            | S::WaitForServerStatusMessage
            | S::WaitForRequestVersionResponse
            | S::WaitForRequestVersionFromServer
            | S::WaitForStructureLabelResponse
            | S::WaitForLocalizationLabelResponse
            | S::WaitForDeleteObjectPoolResponse
            | S::WaitForRequestTransferObjectPoolResponse
            | S::WaitForDDOPTransfer
            | S::WaitForObjectPoolTransferResponse
            | S::WaitForObjectPoolActivateResponse
            | S::WaitForObjectPoolDeactivateResponse => {}
            S::SendWorkingSetMaster => {
                self.send_then(io, &ClientMessage::WorkingSetMaster { members: 1 }, S::SendStatusMessage, now);
            }
            S::SendStatusMessage => {
                let status = ClientMessage::Status {
                    status: self.task_status(),
                };
                self.send_then(io, &status, S::RequestVersion, now);
            }
            S::RequestVersion => {
                self.send_then(io, &ClientMessage::RequestVersion, S::WaitForRequestVersionResponse, now);
            }
            S::SendRequestVersionResponse => {
                let version = ClientMessage::Version {
                    version: crate::codec::CLIENT_VERSION,
                    options: self.capabilities.options(),
                    booms: self.capabilities.booms,
                    sections: self.capabilities.sections,
                    channels: self.capabilities.channels,
                };
                self.send_then(io, &version, S::RequestLanguage, now);
            }
            S::RequestLanguage => {
                if io.request_language() {
                    self.set_state(S::WaitForLanguageResponse, now);
                }
            }
            S::WaitForLanguageResponse => {
                // Answered while the request was still being retried
                if self.has_recent_language(now) {
                    self.set_state(S::ProcessDDOP, now);
                }
            }
            S::ProcessDDOP => self.process_pool(now),
            S::RequestStructureLabel => {
                self.send_then(io, &ClientMessage::RequestStructureLabel, S::WaitForStructureLabelResponse, now);
            }
            S::RequestLocalizationLabel => {
                self.send_then(
                    io,
                    &ClientMessage::RequestLocalizationLabel,
                    S::WaitForLocalizationLabelResponse,
                    now,
                );
            }
            S::SendDeleteObjectPool => {
                self.send_then(io, &ClientMessage::DeleteObjectPool, S::WaitForDeleteObjectPoolResponse, now);
            }
            S::SendRequestTransferObjectPool => {
                self.ensure_serialized();
                let pool_size = u32::try_from(self.serialized_pool.len()).unwrap_or(u32::MAX);
                self.send_then(
                    io,
                    &ClientMessage::RequestObjectPoolTransfer { pool_size },
                    S::WaitForRequestTransferObjectPoolResponse,
                    now,
                );
            }
            S::BeginTransferDDOP => {
                self.ensure_serialized();
                if io.begin_pool_transfer(&self.serialized_pool) {
                    tracing::debug!("Object pool transfer started, {} bytes", self.serialized_pool.len());
                    self.set_state(S::WaitForDDOPTransfer, now);
                }
            }
            S::SendObjectPoolActivate => {
                self.send_then(io, &ClientMessage::ActivateObjectPool, S::WaitForObjectPoolActivateResponse, now);
            }
            S::Connected => {
                let due = self
                    .last_client_status_ms
                    .is_none_or(|last| now.saturating_sub(last) >= self.timing.status_interval_ms);
                if due
                    && io.send(&ClientMessage::Status {
                        status: self.task_status(),
                    })
                {
                    self.last_client_status_ms = Some(now);
                }
            }
            S::DeactivateObjectPool => {
                self.send_then(
                    io,
                    &ClientMessage::DeactivateObjectPool,
                    S::WaitForObjectPoolDeactivateResponse,
                    now,
                );
            }
        }
    }

    fn send_then(&mut self, io: &Endpoints, msg: &ClientMessage, next: StateMachineState, now: u64) {
        if io.send(msg) {
            self.set_state(next, now);
        }
    }

    fn process_pool(&mut self, now: u64) {
        let pool = match &self.pool {
            Some(pool) if pool.is_valid() => Arc::clone(pool),
            Some(_) => panic!("ProcessDDOP reached with an invalid object pool"),
            None => panic!("ProcessDDOP reached without an object pool; call configure() first"),
        };

        self.structure_label = Some(pool.structure_label());
        self.localization_label = Some(pool.localization_label());
        self.serialized_pool = pool.serialize();
        tracing::debug!(
            "Object pool processed: {} bytes, structure label {}",
            self.serialized_pool.len(),
            hex::encode(pool.structure_label())
        );
        self.set_state(S::RequestStructureLabel, now);
    }
}

struct Shared {
    io: Endpoints,
    session: Mutex<Session>,
    callbacks: Mutex<CallbackRegistry>,
    // Mirrors `Session::initialized` for the receive path
    accepting: AtomicBool,
}

impl Shared {
    fn update(&self) {
        let mut runtime = Vec::new();
        {
            let mut session = self.session.lock();
            if !session.initialized {
                session.discard_events();
                return;
            }
            let now = session.now();
            if !session.drain_events(now, &mut runtime) {
                session.step(&self.io, now);
            }
            if !session.initialized {
                self.accepting.store(false, Ordering::SeqCst);
                session.discard_events();
            }
        }
        self.dispatch(runtime);
    }

    fn dispatch(&self, frames: Vec<ProcessDataFrame>) {
        if frames.is_empty() {
            return;
        }
        let registry = self.callbacks.lock().clone();

        for frame in frames {
            match frame.command {
                ProcessDataCommand::RequestValue => {
                    match registry.dispatch_request_value(frame.element, frame.ddi) {
                        Some(value) => {
                            let reply = ProcessDataFrame {
                                command: ProcessDataCommand::Value,
                                value,
                                ..frame
                            };
                            if !self.io.send(&ClientMessage::ProcessData(reply)) {
                                tracing::warn!(
                                    "Failed to send value for element {} DDI {}",
                                    frame.element,
                                    frame.ddi
                                );
                            }
                        }
                        None => tracing::trace!(
                            "No handler for value request, element {} DDI {}",
                            frame.element,
                            frame.ddi
                        ),
                    }
                }
                ProcessDataCommand::Value | ProcessDataCommand::SetValueAndAcknowledge => {
                    let handled =
                        registry.dispatch_value_command(frame.element, frame.ddi, frame.value);
                    if !handled {
                        tracing::trace!(
                            "No handler for value command, element {} DDI {}",
                            frame.element,
                            frame.ddi
                        );
                    } else if frame.command == ProcessDataCommand::SetValueAndAcknowledge {
                        let ack = ProcessDataAcknowledge {
                            element: frame.element,
                            ddi: frame.ddi,
                            error_codes: AcknowledgeErrorCodes::default(),
                            acknowledged: frame.command,
                        };
                        if !self.io.send(&ClientMessage::Acknowledge(ack)) {
                            tracing::warn!("Failed to send PDACK for element {}", frame.element);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Worker thread and the flag that stops it
struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

/// ISO 11783-10 task controller client
pub struct TaskControllerClient {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for TaskControllerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.shared.session.lock();
        f.debug_struct("TaskControllerClient")
            .field("state", &session.state)
            .field("initialized", &session.initialized)
            .field("capabilities", &session.capabilities)
            .finish_non_exhaustive()
    }
}

impl TaskControllerClient {
    /// Bind a client to its bus collaborators and endpoints
    pub fn new(
        bus: Arc<dyn CanBus>,
        transfer: Arc<dyn BulkTransfer>,
        partner: Arc<dyn ControlFunction>,
        internal: Arc<dyn ControlFunction>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            state: S::Disconnected,
            state_entry_ms: 0,
            initialized: false,
            capabilities: ClientCapabilities::default(),
            pool: None,
            server: ServerCapabilities::default(),
            server_status: None,
            last_server_status_ms: None,
            last_client_status_ms: None,
            language: None,
            language_ms: None,
            structure_label: None,
            localization_label: None,
            serialized_pool: Vec::new(),
            timing: TimingConfig::default(),
            clock: Arc::new(SystemClock::new()),
            events: rx,
        };

        Self {
            shared: Arc::new(Shared {
                io: Endpoints {
                    bus,
                    transfer,
                    partner,
                    internal,
                    events: tx,
                },
                session: Mutex::new(session),
                callbacks: Mutex::new(CallbackRegistry::new()),
                accepting: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Use a different time source
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        self.shared.session.lock().clock = clock;
        self
    }

    /// Use different timeouts and intervals
    pub fn with_timing(self, timing: TimingConfig) -> Self {
        self.shared.session.lock().timing = timing;
        self
    }

    /// Attach the object pool and the capabilities to advertise.
    ///
    /// Replaces any previous configuration wholesale; takes effect on the
    /// next negotiation pass.
    pub fn configure(&self, pool: Arc<dyn ObjectPool>, capabilities: ClientCapabilities) {
        let mut session = self.shared.session.lock();
        session.pool = Some(pool);
        session.capabilities = capabilities;
        session.structure_label = None;
        session.localization_label = None;
        session.serialized_pool.clear();
    }

    /// Arm the session, optionally ticking it from a worker thread
    pub fn initialize(&self, spawn_worker: bool) {
        {
            let mut session = self.shared.session.lock();
            if !session.initialized {
                session.discard_events();
                session.initialized = true;
                self.shared.accepting.store(true, Ordering::SeqCst);
                let now = session.now();
                let next = if session.pool.is_some() && self.shared.io.ready() {
                    S::WaitForStartUpDelay
                } else {
                    S::Disconnected
                };
                session.set_state(next, now);
                tracing::info!("Task controller client initialized");
            }
        }

        if spawn_worker {
            self.start_worker();
        }
    }

    fn start_worker(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let interval = self.shared.session.lock().timing.worker_interval();
        let shared = Arc::clone(&self.shared);
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = Arc::clone(&stop);
        let spawned = thread::Builder::new()
            .name("tc-client".to_string())
            .spawn(move || {
                while !stopped.load(Ordering::SeqCst) {
                    shared.update();
                    thread::sleep(interval);
                }
            });

        match spawned {
            Ok(handle) => *worker = Some(Worker { handle, stop }),
            Err(e) => tracing::error!("Failed to start task controller worker: {}", e),
        }
    }

    /// Tear the session down to `Disconnected` and stop the worker
    pub fn terminate(&self) {
        {
            let mut session = self.shared.session.lock();
            if session.initialized {
                tracing::info!("Task controller client terminated");
            }
            session.initialized = false;
            self.shared.accepting.store(false, Ordering::SeqCst);
            let now = session.now();
            session.set_state(S::Disconnected, now);
            session.discard_events();
        }

        let worker = self.worker.lock().take();
        if let Some(Worker { handle, stop }) = worker {
            stop.store(true, Ordering::SeqCst);
            // The worker exits on its own when terminate runs inside a callback
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::error!("Task controller worker panicked");
            }
        }
    }

    /// Run one tick
    pub fn update(&self) {
        self.shared.update();
    }

    /// Feed a frame received from the bus.
    ///
    /// Frames from anything other than the partner, or received while the
    /// session is not initialized, are dropped.
    pub fn process_rx_frame(&self, pgn: u32, source: u8, data: &[u8]) {
        let io = &self.shared.io;
        if !self.shared.accepting.load(Ordering::SeqCst) || io.partner_address() != Some(source) {
            return;
        }

        let event = match pgn {
            pgn::PROCESS_DATA => match ServerMessage::decode(data) {
                Ok(msg) => ClientEvent::Server(msg),
                Err(e) => {
                    tracing::trace!("Dropping process data frame: {}", e);
                    return;
                }
            },
            pgn::LANGUAGE_COMMAND => match LanguageCommand::decode(data) {
                Ok(language) => ClientEvent::Language(language),
                Err(e) => {
                    tracing::trace!("Dropping language command: {}", e);
                    return;
                }
            },
            pgn::ACKNOWLEDGE => match (Acknowledgement::decode(data), io.internal.address()) {
                (Ok(ack), Some(own)) if ack.is_nack_for(pgn::PROCESS_DATA, own) => {
                    ClientEvent::Nack
                }
                _ => return,
            },
            _ => return,
        };

        // Receiver lives as long as the session
        let _ = io.events.send(event);
    }

    /// Register a request-value handler (no-op if already registered)
    pub fn add_request_value_callback(&self, callback: RequestValueCallback) {
        self.shared.callbacks.lock().add_request_value(callback);
    }

    /// Remove a request-value handler
    pub fn remove_request_value_callback(&self, callback: &RequestValueCallback) {
        self.shared.callbacks.lock().remove_request_value(callback);
    }

    /// Register a value-command handler (no-op if already registered)
    pub fn add_value_command_callback(&self, callback: ValueCommandCallback) {
        self.shared.callbacks.lock().add_value_command(callback);
    }

    /// Remove a value-command handler
    pub fn remove_value_command_callback(&self, callback: &ValueCommandCallback) {
        self.shared.callbacks.lock().remove_value_command(callback);
    }

    /// Send a value to the server; `Ok(false)` if the bus refused it
    pub fn send_value_command(&self, element: u16, ddi: u16, value: u32) -> Result<bool> {
        let frame = ProcessDataFrame::value_command(element, ddi, value)?;
        Ok(self.shared.io.send(&ClientMessage::ProcessData(frame)))
    }

    /// Start deactivating the pool; `false` unless connected
    pub fn deactivate_object_pool(&self) -> bool {
        let mut session = self.shared.session.lock();
        if session.state != S::Connected {
            return false;
        }
        let now = session.now();
        session.set_state(S::DeactivateObjectPool, now);
        true
    }

    /// Current state
    pub fn state(&self) -> StateMachineState {
        self.shared.session.lock().state
    }

    /// Whether initialize() has armed the session
    pub fn is_initialized(&self) -> bool {
        self.shared.session.lock().initialized
    }

    /// Whether the pool is active on a server
    pub fn is_connected(&self) -> bool {
        self.state() == S::Connected
    }

    /// Connected and the server reports an active task
    pub fn is_task_active(&self) -> bool {
        let session = self.shared.session.lock();
        session.state == S::Connected
            && session.server_status.is_some_and(|s| s.is_task_active())
    }

    /// Capabilities passed to configure()
    pub fn capabilities(&self) -> ClientCapabilities {
        self.shared.session.lock().capabilities
    }

    /// Everything the server reported in its version message
    pub fn server_capabilities(&self) -> ServerCapabilities {
        self.shared.session.lock().server
    }

    /// Server protocol version
    pub fn connected_tc_version(&self) -> Version {
        self.server_capabilities().version
    }

    /// Server maximum boot time in seconds
    pub fn connected_tc_max_boot_time(&self) -> u8 {
        self.server_capabilities().max_boot_time
    }

    /// Whether the server advertised an option
    pub fn connected_tc_option_supported(&self, option: ServerOption) -> bool {
        self.server_capabilities().supports(option)
    }

    /// Booms the server supports
    pub fn connected_tc_number_booms_supported(&self) -> u8 {
        self.server_capabilities().booms
    }

    /// Sections the server supports
    pub fn connected_tc_number_sections_supported(&self) -> u8 {
        self.server_capabilities().sections
    }

    /// Position based control channels the server supports
    pub fn connected_tc_number_channels_supported(&self) -> u8 {
        self.server_capabilities().channels
    }

    /// Language command received during negotiation
    pub fn language(&self) -> Option<LanguageCommand> {
        self.shared.session.lock().language.clone()
    }

    /// Most recent server status broadcast
    pub fn server_status(&self) -> Option<ServerStatus> {
        self.shared.session.lock().server_status
    }

    #[cfg(test)]
    pub(crate) fn set_state(&self, state: StateMachineState) {
        let mut session = self.shared.session.lock();
        let now = session.now();
        session.set_state(state, now);
    }

    #[cfg(test)]
    pub(crate) fn set_state_at(&self, state: StateMachineState, timestamp_ms: u64) {
        self.shared.session.lock().set_state(state, timestamp_ms);
    }

    #[cfg(test)]
    pub(crate) fn queued_events(&self) -> usize {
        let mut session = self.shared.session.lock();
        let mut count = 0;
        while session.events.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    #[cfg(test)]
    pub(crate) fn worker_stop_flag(&self) -> Option<Arc<AtomicBool>> {
        self.worker.lock().as_ref().map(|w| Arc::clone(&w.stop))
    }
}

impl Drop for TaskControllerClient {
    fn drop(&mut self) {
        self.terminate();
    }
}
