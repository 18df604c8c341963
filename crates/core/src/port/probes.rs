// Precondition collaborators: database driver, SNMP sessions, address detection
//
// Each exposes a single "try it and report" capability. Errors are returned
// as plain strings because callers collapse every failure into "not ready".
use async_trait::async_trait;

/// Database driver collaborator
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    /// Open the configured connections; returns how many were obtained
    async fn open_connections(&self) -> Result<usize, String>;
}

/// SNMP session collaborator
#[async_trait]
pub trait SnmpSessionProbe: Send + Sync {
    /// Negotiate sessions; returns how many are usable
    async fn negotiate_sessions(&self) -> Result<usize, String>;
}

/// Address auto-detection for DETECT plugins without configured addresses
#[async_trait]
pub trait AddressDetector: Send + Sync {
    async fn auto_detect(&self) -> Vec<String>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Probe answering with a scripted result for both DB and SNMP
    pub struct MockProbe {
        result: Mutex<Result<usize, String>>,
        calls: AtomicUsize,
    }

    impl MockProbe {
        pub fn new(result: Result<usize, String>) -> Self {
            Self {
                result: Mutex::new(result),
                calls: AtomicUsize::new(0),
            }
        }
        pub fn available(count: usize) -> Self {
            Self::new(Ok(count))
        }
        pub fn failing(reason: &str) -> Self {
            Self::new(Err(reason.to_string()))
        }
        pub fn set_result(&self, result: Result<usize, String>) {
            *self.result.lock().unwrap() = result;
        }
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
        fn answer(&self) -> Result<usize, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatabaseProbe for MockProbe {
        async fn open_connections(&self) -> Result<usize, String> {
            self.answer()
        }
    }

    #[async_trait]
    impl SnmpSessionProbe for MockProbe {
        async fn negotiate_sessions(&self) -> Result<usize, String> {
            self.answer()
        }
    }

    /// Detector returning a fixed list
    #[derive(Default)]
    pub struct MockAddressDetector {
        addresses: Mutex<Vec<String>>,
    }

    impl MockAddressDetector {
        pub fn new(addresses: Vec<String>) -> Self {
            Self {
                addresses: Mutex::new(addresses),
            }
        }
        pub fn empty() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl AddressDetector for MockAddressDetector {
        async fn auto_detect(&self) -> Vec<String> {
            self.addresses.lock().unwrap().clone()
        }
    }
}
