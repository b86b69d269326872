#![allow(dead_code)]

pub use stackkv_testkit::{closed_port, FakeServer, Reply, StackEmulator};

use stackkv_client::StackClient;

/// Opens clients against a test server.
pub trait Connect {
    fn client(&self) -> StackClient;
}

impl Connect for FakeServer {
    fn client(&self) -> StackClient {
        StackClient::new(self.settings(None))
    }
}
