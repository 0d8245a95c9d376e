//! Client state machine states and their timeout policy.
//!
//! ```text
//! Disconnected ─► WaitForStartUpDelay ─► WaitForServerStatusMessage
//!      ▲                                          │ status
//!      │                                          ▼
//!      │        SendWorkingSetMaster ─► SendStatusMessage ─► RequestVersion
//!      │                                                          │
//!      │   WaitForRequestVersionResponse ◄────────────────────────┘
//!      │          │ version
//!      │          ▼
//!      │   WaitForRequestVersionFromServer ─► SendRequestVersionResponse
//!      │          │ timeout                          │
//!      │          ▼                                  ▼
//!      │   RequestLanguage ─► WaitForLanguageResponse ─► ProcessDDOP
//!      │                                                   │
//!      │   structure / localization label reconciliation ◄─┘
//!      │     match ─► SendObjectPoolActivate
//!      │     mismatch ─► SendDeleteObjectPool ─► SendRequestTransferObjectPool
//!      │     not present ─► SendRequestTransferObjectPool ─► BeginTransferDDOP
//!      │                                       WaitForDDOPTransfer ◄─┘
//!      │                                                 │
//!      │   WaitForObjectPoolTransferResponse ◄───────────┘
//!      │          │
//!      │          ▼
//!      │   SendObjectPoolActivate ─► WaitForObjectPoolActivateResponse
//!      │                                              │
//!      └──── timeout / NACK / failure ─── Connected ◄─┘
//! ```

use serde::Serialize;

/// Negotiation and runtime state of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StateMachineState {
    /// Not talking to a server
    Disconnected,
    /// Holding off after power-up
    WaitForStartUpDelay,
    /// Waiting for any server status broadcast
    WaitForServerStatusMessage,
    /// Sending the working set master message
    SendWorkingSetMaster,
    /// Sending the first client task message
    SendStatusMessage,
    /// Requesting the server's version
    RequestVersion,
    /// Waiting for the server's version
    WaitForRequestVersionResponse,
    /// Waiting for the server to request our version
    WaitForRequestVersionFromServer,
    /// Sending our version
    SendRequestVersionResponse,
    /// Requesting the language command
    RequestLanguage,
    /// Waiting for the language command
    WaitForLanguageResponse,
    /// Computing labels and serializing the pool
    ProcessDDOP,
    /// Requesting the structure label
    RequestStructureLabel,
    /// Waiting for the structure label
    WaitForStructureLabelResponse,
    /// Requesting the localization label
    RequestLocalizationLabel,
    /// Waiting for the localization label
    WaitForLocalizationLabelResponse,
    /// Asking the server to delete its copy of the pool
    SendDeleteObjectPool,
    /// Waiting for the delete response
    WaitForDeleteObjectPoolResponse,
    /// Asking for room to transfer the pool
    SendRequestTransferObjectPool,
    /// Waiting for the answer to the transfer request
    WaitForRequestTransferObjectPoolResponse,
    /// Starting the bulk transfer of the pool
    BeginTransferDDOP,
    /// Waiting for the bulk transfer to complete
    WaitForDDOPTransfer,
    /// Waiting for the server to accept the transferred pool
    WaitForObjectPoolTransferResponse,
    /// Sending object pool activate
    SendObjectPoolActivate,
    /// Waiting for the activate response
    WaitForObjectPoolActivateResponse,
    /// Pool active, exchanging process data
    Connected,
    /// Sending object pool deactivate
    DeactivateObjectPool,
    /// Waiting for the deactivate response
    WaitForObjectPoolDeactivateResponse,
}

/// What happens when a state's timeout elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnTimeout {
    /// No timeout, wait for an external event
    Hold,
    /// Give up and go to `Disconnected`
    Disconnect,
    /// Move on to another state
    Advance(StateMachineState),
}

impl StateMachineState {
    /// Timeout policy of this state
    pub fn on_timeout(self) -> OnTimeout {
        use StateMachineState::*;

        match self {
            Disconnected | WaitForServerStatusMessage | WaitForDDOPTransfer => OnTimeout::Hold,
            WaitForStartUpDelay => OnTimeout::Advance(WaitForServerStatusMessage),
            WaitForRequestVersionFromServer => OnTimeout::Advance(RequestLanguage),
            WaitForLanguageResponse => OnTimeout::Advance(ProcessDDOP),
            _ => OnTimeout::Disconnect,
        }
    }

    /// Whether this state never times out
    pub fn is_hold(self) -> bool {
        self.on_timeout() == OnTimeout::Hold
    }

    /// Whether the state sends a single message and then advances
    pub fn is_send(self) -> bool {
        use StateMachineState::*;

        matches!(
            self,
            SendWorkingSetMaster
                | SendStatusMessage
                | RequestVersion
                | SendRequestVersionResponse
                | RequestLanguage
                | RequestStructureLabel
                | RequestLocalizationLabel
                | SendDeleteObjectPool
                | SendRequestTransferObjectPool
                | SendObjectPoolActivate
                | DeactivateObjectPool
        )
    }

    /// Every state, in negotiation order
    pub fn all() -> [StateMachineState; 28] {
        use StateMachineState::*;

        [
            Disconnected,
            WaitForStartUpDelay,
            WaitForServerStatusMessage,
            SendWorkingSetMaster,
            SendStatusMessage,
            RequestVersion,
            WaitForRequestVersionResponse,
            WaitForRequestVersionFromServer,
            SendRequestVersionResponse,
            RequestLanguage,
            WaitForLanguageResponse,
            ProcessDDOP,
            RequestStructureLabel,
            WaitForStructureLabelResponse,
            RequestLocalizationLabel,
            WaitForLocalizationLabelResponse,
            SendDeleteObjectPool,
            WaitForDeleteObjectPoolResponse,
            SendRequestTransferObjectPool,
            WaitForRequestTransferObjectPoolResponse,
            BeginTransferDDOP,
            WaitForDDOPTransfer,
            WaitForObjectPoolTransferResponse,
            SendObjectPoolActivate,
            WaitForObjectPoolActivateResponse,
            Connected,
            DeactivateObjectPool,
            WaitForObjectPoolDeactivateResponse,
        ]
    }
}

impl std::fmt::Display for StateMachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_states() {
        let holds: Vec<_> = StateMachineState::all()
            .into_iter()
            .filter(|s| s.is_hold())
            .collect();
        assert_eq!(
            holds,
            vec![
                StateMachineState::Disconnected,
                StateMachineState::WaitForServerStatusMessage,
                StateMachineState::WaitForDDOPTransfer,
            ]
        );
    }

    #[test]
    fn test_non_disconnecting_timeouts() {
        assert_eq!(
            StateMachineState::WaitForRequestVersionFromServer.on_timeout(),
            OnTimeout::Advance(StateMachineState::RequestLanguage)
        );
        assert_eq!(
            StateMachineState::WaitForLanguageResponse.on_timeout(),
            OnTimeout::Advance(StateMachineState::ProcessDDOP)
        );
        assert_eq!(
            StateMachineState::WaitForObjectPoolTransferResponse.on_timeout(),
            OnTimeout::Disconnect
        );
    }

    #[test]
    fn test_send_states_disconnect_on_timeout() {
        for state in StateMachineState::all().into_iter().filter(|s| s.is_send()) {
            assert_eq!(state.on_timeout(), OnTimeout::Disconnect, "{state}");
        }
    }
}
