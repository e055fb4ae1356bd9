//! Outstanding RPC call tracking
//!
//! Every outbound PDU is entered here before its bytes reach the in
//! channel, and removed when the matching response arrives or the session
//! tears down. Insertion order is preserved for diagnostics.

use std::time::Instant;

use crate::error::{BindError, Result};

/// One outstanding call on the virtual connection
#[derive(Debug, Clone)]
pub struct RpcCall {
    pub call_id: u32,
    pub opnum: u16,
    pub started_at: Instant,
}

impl RpcCall {
    fn new(call_id: u32, opnum: u16) -> Self {
        Self {
            call_id,
            opnum,
            started_at: Instant::now(),
        }
    }
}

/// Registry of outstanding calls, keyed by call id.
///
/// Owned by a single session; all mutation goes through `&mut self`.
#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: Vec<RpcCall>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new call. The id must not already be tracked.
    pub fn new_call(&mut self, call_id: u32, opnum: u16) -> Result<()> {
        if self.contains(call_id) {
            return Err(BindError::DuplicateCall(call_id));
        }
        self.calls.push(RpcCall::new(call_id, opnum));
        Ok(())
    }

    /// Register a call id that may legitimately already be tracked.
    ///
    /// The three handshake PDUs share call id 2; the third leg re-registers
    /// it and must succeed whether or not the bind entry is still present.
    pub fn ensure_call(&mut self, call_id: u32, opnum: u16) {
        if !self.contains(call_id) {
            self.calls.push(RpcCall::new(call_id, opnum));
        }
    }

    /// Remove a call whose response has been matched.
    pub fn complete(&mut self, call_id: u32) -> Result<RpcCall> {
        match self.calls.iter().position(|c| c.call_id == call_id) {
            Some(index) => Ok(self.calls.remove(index)),
            None => Err(BindError::UnknownCall(call_id)),
        }
    }

    /// Drop all outstanding calls. Called on terminal failure.
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn contains(&self, call_id: u32) -> bool {
        self.calls.iter().any(|c| c.call_id == call_id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Outstanding calls in insertion order
    pub fn calls(&self) -> &[RpcCall] {
        &self.calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_call_id_rejected() {
        let mut registry = CallRegistry::new();
        registry.new_call(2, 0).unwrap();

        let err = registry.new_call(2, 0).unwrap_err();
        assert!(matches!(err, BindError::DuplicateCall(2)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ensure_call_is_idempotent() {
        let mut registry = CallRegistry::new();
        registry.new_call(2, 0).unwrap();
        registry.ensure_call(2, 0);

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn complete_removes_the_call() {
        let mut registry = CallRegistry::new();
        registry.new_call(2, 0).unwrap();

        let call = registry.complete(2).unwrap();
        assert_eq!(call.call_id, 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn complete_unknown_call_rejected() {
        let mut registry = CallRegistry::new();
        let err = registry.complete(9).unwrap_err();
        assert!(matches!(err, BindError::UnknownCall(9)));
    }

    #[test]
    fn insertion_order_preserved() {
        let mut registry = CallRegistry::new();
        registry.new_call(5, 1).unwrap();
        registry.new_call(3, 2).unwrap();
        registry.new_call(8, 3).unwrap();

        let ids: Vec<u32> = registry.calls().iter().map(|c| c.call_id).collect();
        assert_eq!(ids, vec![5, 3, 8]);
    }

    #[test]
    fn clear_drops_everything() {
        let mut registry = CallRegistry::new();
        registry.new_call(2, 0).unwrap();
        registry.new_call(3, 0).unwrap();
        registry.clear();

        assert!(registry.is_empty());
    }
}
