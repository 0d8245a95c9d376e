//! Task controller client negotiation and runtime.
//!
//! Implements the client side of the ISO 11783-10 connection procedure:
//! server discovery, version exchange, object pool (DDOP) reconciliation by
//! label, transfer, activation and the connected process-data exchange.
//!
//! # Protocol Overview
//!
//! ```text
//! Client                                   Server
//!    |                                        |
//!    |<------------- status (0xFE) -----------|  every 2 s
//!    |----- working set master, client task ->|  global
//!    |---------- request version ------------>|
//!    |<---------------- version --------------|
//!    |<----------- request version -----------|  optional
//!    |---------------- version -------------->|
//!    |------ request language (PGN 0xEA00) -->|
//!    |<----------- language command ----------|
//!    |------- request structure label ------->|
//!    |<---------- structure label ------------|  match / absent / different
//!    |    ... delete, transfer, labels ...    |
//!    |------------- activate pool ----------->|
//!    |<---------- activate response ----------|
//!    |<========== process data ==============>|  connected
//! ```
//!
//! ## Label reconciliation
//!
//! | Server label | Action                                  |
//! |--------------|-----------------------------------------|
//! | equal        | next label, then activate               |
//! | all `0xFF`   | request transfer of our pool            |
//! | different    | delete the server's copy, then transfer |
//!
//! ## Timeouts
//!
//! Every state except `Disconnected`, `WaitForServerStatusMessage` and
//! `WaitForDDOPTransfer` has a timeout. Most lead to `Disconnected`; see
//! [`StateMachineState::on_timeout`] for the exceptions.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tc_client::protocol::{ClientCapabilities, SerializedObjectPool, TaskControllerClient};
//!
//! let client = TaskControllerClient::new(bus.clone(), transport, server, ours);
//! client.configure(
//!     Arc::new(SerializedObjectPool::new(structure, localization, ddop)),
//!     ClientCapabilities::new(1, 32, 16).with_documentation(true),
//! );
//! client.add_value_command_callback(Arc::new(|element, ddi, value| {
//!     apply(element, ddi, value)
//! }));
//! client.initialize(true);
//!
//! // receive path
//! client.process_rx_frame(pgn, source, &data);
//! ```

mod callbacks;
mod capabilities;
mod client;
pub mod label;
mod pool;
mod state;

pub use callbacks::{CallbackRegistry, RequestValueCallback, ValueCommandCallback};
pub use capabilities::{ClientCapabilities, ServerCapabilities};
pub use client::{ClientEvent, TaskControllerClient};
pub use label::{LabelMatch, LABEL_NOT_PRESENT};
pub use pool::{ObjectPool, SerializedObjectPool};
pub use state::{OnTimeout, StateMachineState};
