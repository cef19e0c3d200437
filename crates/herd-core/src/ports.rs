use crate::error::{Error, Result};

/// Hands out debug ports in strictly increasing order, starting at the base.
///
/// Ports are never reused and never checked against what the host already
/// has bound.
#[derive(Debug)]
pub struct DebugPortAllocator {
    next: Option<u16>,
}

impl DebugPortAllocator {
    #[must_use]
    pub fn new(base: u16) -> Self {
        Self { next: Some(base) }
    }

    /// Take the next port.
    ///
    /// # Errors
    /// Returns `Error::DebugPortsExhausted` once port 65535 has been handed out.
    pub fn allocate(&mut self) -> Result<u16> {
        let port = self.next.ok_or(Error::DebugPortsExhausted)?;
        self.next = port.checked_add(1);
        Ok(port)
    }
}
