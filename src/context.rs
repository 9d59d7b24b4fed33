//! Validation context: the ambient facts a macaroon is checked against.

/// Ambient inputs for macaroon creation, extension and validation.
///
/// Carries the current time (Unix seconds, as a 32-bit value, like every
/// timestamp on the wire) and the bytes of the active BLE session, if any.
/// Session bytes are mixed into the MAC for `BleSessionId` caveats, binding
/// the tag to that session; the current time drives expiration checks.
///
/// There is no global state: a context is built per call and passed
/// explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context<'a> {
    current_time: u32,
    ble_session_id: Option<&'a [u8]>,
}

impl<'a> Context<'a> {
    /// Create a context at the given current time.
    pub fn new(current_time: u32) -> Self {
        Self {
            current_time,
            ble_session_id: None,
        }
    }

    /// Attach the active BLE session bytes.
    pub fn with_ble_session_id(mut self, session_id: &'a [u8]) -> Self {
        self.ble_session_id = Some(session_id);
        self
    }

    /// The current time in Unix seconds.
    pub fn current_time(&self) -> u32 {
        self.current_time
    }

    /// The active BLE session bytes, if any.
    pub fn ble_session_id(&self) -> Option<&'a [u8]> {
        self.ble_session_id
    }
}
