// SPDX-License-Identifier: MIT

//! Attached `srun` client bookkeeping (spec.md §4.6 "Attach"): the set of
//! clients that have reconnected to a running step's I/O, distinct from
//! the one `srun` that originally launched it.

use parking_lot::Mutex;

pub const ATTACH_KEY_LEN: usize = 32;

/// One `srun --attach` client's I/O routing, recorded so the I/O layer can
/// fan output out to it alongside the launching client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachClient {
    pub io_addr: String,
    pub resp_addr: String,
    pub key: [u8; ATTACH_KEY_LEN],
    pub uid: u32,
    pub client_version: u16,
}

#[derive(Debug, Default)]
pub struct AttachRegistry {
    clients: Mutex<Vec<AttachClient>>,
}

impl AttachRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new attach client. Re-attaching at the same `io_addr`
    /// replaces the earlier entry (a client that reconnects gets a fresh
    /// key and response address).
    pub fn add(&self, client: AttachClient) {
        let mut guard = self.clients.lock();
        guard.retain(|c| c.io_addr != client.io_addr);
        guard.push(client);
    }

    pub fn snapshot(&self) -> Vec<AttachClient> {
        self.clients.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(io_addr: &str) -> AttachClient {
        AttachClient { io_addr: io_addr.into(), resp_addr: "127.0.0.1:2".into(), key: [1u8; ATTACH_KEY_LEN], uid: 1000, client_version: 1 }
    }

    #[test]
    fn reattach_at_same_io_addr_replaces_entry() {
        let reg = AttachRegistry::new();
        reg.add(client("127.0.0.1:1"));
        let mut second = client("127.0.0.1:1");
        second.client_version = 2;
        reg.add(second);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.snapshot()[0].client_version, 2);
    }

    #[test]
    fn distinct_io_addrs_both_tracked() {
        let reg = AttachRegistry::new();
        reg.add(client("127.0.0.1:1"));
        reg.add(client("127.0.0.1:2"));
        assert_eq!(reg.len(), 2);
    }
}
