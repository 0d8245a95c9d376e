//! Process-data callback registry.
//!
//! Handlers are shared `Arc` closures. Identity is the allocation, so the
//! same `Arc` (or a clone of it) must be passed to remove a handler.
//! Dispatch walks handlers in registration order and stops at the first one
//! that reports the command as handled.

use std::sync::Arc;

/// Answers a request for the value of `(element, ddi)`; `None` if not handled
pub type RequestValueCallback = Arc<dyn Fn(u16, u16) -> Option<u32> + Send + Sync>;

/// Applies a commanded `(element, ddi, value)`; `true` if handled
pub type ValueCommandCallback = Arc<dyn Fn(u16, u16, u32) -> bool + Send + Sync>;

/// Ordered handler lists
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    request_value: Vec<RequestValueCallback>,
    value_command: Vec<ValueCommandCallback>,
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("request_value", &self.request_value.len())
            .field("value_command", &self.value_command.len())
            .finish()
    }
}

impl CallbackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request-value handler unless already present
    pub fn add_request_value(&mut self, callback: RequestValueCallback) {
        if !self.request_value.iter().any(|c| Arc::ptr_eq(c, &callback)) {
            self.request_value.push(callback);
        }
    }

    /// Remove the first matching request-value handler
    pub fn remove_request_value(&mut self, callback: &RequestValueCallback) {
        if let Some(pos) = self.request_value.iter().position(|c| Arc::ptr_eq(c, callback)) {
            self.request_value.remove(pos);
        }
    }

    /// Append a value-command handler unless already present
    pub fn add_value_command(&mut self, callback: ValueCommandCallback) {
        if !self.value_command.iter().any(|c| Arc::ptr_eq(c, &callback)) {
            self.value_command.push(callback);
        }
    }

    /// Remove the first matching value-command handler
    pub fn remove_value_command(&mut self, callback: &ValueCommandCallback) {
        if let Some(pos) = self.value_command.iter().position(|c| Arc::ptr_eq(c, callback)) {
            self.value_command.remove(pos);
        }
    }

    /// Number of request-value handlers
    pub fn request_value_len(&self) -> usize {
        self.request_value.len()
    }

    /// Number of value-command handlers
    pub fn value_command_len(&self) -> usize {
        self.value_command.len()
    }

    /// First value produced by a request-value handler
    pub fn dispatch_request_value(&self, element: u16, ddi: u16) -> Option<u32> {
        self.request_value.iter().find_map(|c| c(element, ddi))
    }

    /// Whether any value-command handler accepted the command
    pub fn dispatch_value_command(&self, element: u16, ddi: u16, value: u32) -> bool {
        self.value_command.iter().any(|c| c(element, ddi, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = CallbackRegistry::new();
        let cb: RequestValueCallback = Arc::new(|_, _| Some(1));
        registry.add_request_value(cb.clone());
        registry.add_request_value(cb.clone());
        assert_eq!(registry.request_value_len(), 1);

        // A distinct closure with the same body is a different handler
        registry.add_request_value(Arc::new(|_, _| Some(1)));
        assert_eq!(registry.request_value_len(), 2);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = CallbackRegistry::new();
        let cb: ValueCommandCallback = Arc::new(|_, _, _| true);
        registry.remove_value_command(&cb);
        assert_eq!(registry.value_command_len(), 0);
    }

    #[test]
    fn test_dispatch_stops_at_first_handled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();

        let c = calls.clone();
        registry.add_value_command(Arc::new(move |_, ddi, _| {
            c.fetch_add(1, Ordering::SeqCst);
            ddi == 7
        }));
        let c = calls.clone();
        registry.add_value_command(Arc::new(move |_, _, _| {
            c.fetch_add(1, Ordering::SeqCst);
            true
        }));

        assert!(registry.dispatch_value_command(1, 7, 0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(registry.dispatch_value_command(1, 8, 0));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_request_value_falls_through_unhandled() {
        let mut registry = CallbackRegistry::new();
        let first: RequestValueCallback = Arc::new(|_, ddi| (ddi == 1).then_some(10));
        let second: RequestValueCallback = Arc::new(|_, _| Some(20));
        registry.add_request_value(first.clone());
        registry.add_request_value(second);

        assert_eq!(registry.dispatch_request_value(0, 1), Some(10));
        assert_eq!(registry.dispatch_request_value(0, 2), Some(20));

        registry.remove_request_value(&first);
        assert_eq!(registry.dispatch_request_value(0, 1), Some(20));
    }
}
