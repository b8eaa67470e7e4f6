use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use crate::asr::SpeechBackend;
use crate::config::Config;
use crate::pipeline::TermMapping;
use crate::store::{TranslationLog, UsageTracker};
use crate::translate::Translator;

/// Shared application state for the transport layer.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub translator: Arc<dyn Translator>,
    /// Present when server-side recognition is available
    pub speech_backend: Option<Arc<dyn SpeechBackend>>,
    pub log: Arc<TranslationLog>,
    pub usage: Arc<UsageTracker>,
    pub mappings: Arc<Vec<TermMapping>>,
    pub phrase_hints: Arc<Vec<String>>,
    pub connections: Arc<ConnectionLimits>,
}

impl AppState {
    pub fn new(
        config: Config,
        translator: Arc<dyn Translator>,
        speech_backend: Option<Arc<dyn SpeechBackend>>,
        phrase_hints: Vec<String>,
    ) -> Self {
        let connections = Arc::new(ConnectionLimits::new(
            config.max_connections,
            config.max_connections_per_ip,
        ));
        Self {
            config: Arc::new(config),
            translator,
            speech_backend,
            log: Arc::new(TranslationLog::new()),
            usage: Arc::new(UsageTracker::new()),
            mappings: Arc::new(crate::pipeline::default_mappings()),
            phrase_hints: Arc::new(phrase_hints),
            connections,
        }
    }
}

/// Why a connection was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    ServerFull,
    TooManyFromAddress,
}

impl AdmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::ServerFull => "server_full",
            AdmissionError::TooManyFromAddress => "too_many_connections",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AdmissionError::ServerFull => "Server is at capacity, try again later",
            AdmissionError::TooManyFromAddress => "Too many connections from this address",
        }
    }
}

#[derive(Default, Debug)]
struct ConnectionCounts {
    total: usize,
    per_address: HashMap<IpAddr, usize>,
}

/// Global and per-address connection caps behind a single mutex.
#[derive(Debug)]
pub struct ConnectionLimits {
    max_total: usize,
    max_per_address: usize,
    counts: Mutex<ConnectionCounts>,
}

impl ConnectionLimits {
    pub fn new(max_total: usize, max_per_address: usize) -> Self {
        Self {
            max_total,
            max_per_address,
            counts: Mutex::new(ConnectionCounts::default()),
        }
    }

    /// Admit a connection, returning a permit that releases on drop.
    pub fn try_acquire(
        self: Arc<Self>,
        address: IpAddr,
    ) -> Result<ConnectionPermit, AdmissionError> {
        let mut counts = self.counts.lock().unwrap();
        if counts.total >= self.max_total {
            return Err(AdmissionError::ServerFull);
        }
        let per_address = counts.per_address.entry(address).or_insert(0);
        if *per_address >= self.max_per_address {
            return Err(AdmissionError::TooManyFromAddress);
        }
        *per_address += 1;
        counts.total += 1;
        drop(counts);
        Ok(ConnectionPermit {
            limits: self,
            address,
        })
    }

    pub fn active(&self) -> usize {
        self.counts.lock().unwrap().total
    }

    fn release(&self, address: IpAddr) {
        let mut counts = self.counts.lock().unwrap();
        counts.total = counts.total.saturating_sub(1);
        if let Some(count) = counts.per_address.get_mut(&address) {
            *count -= 1;
            if *count == 0 {
                counts.per_address.remove(&address);
            }
        }
    }
}

/// RAII admission slot. Cleanup on disconnect is mandatory; dropping the
/// permit is the cleanup.
#[derive(Debug)]
pub struct ConnectionPermit {
    limits: Arc<ConnectionLimits>,
    address: IpAddr,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.limits.release(self.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[test]
    fn test_per_address_cap() {
        let limits = Arc::new(ConnectionLimits::new(50, 2));
        let _a = limits.clone().try_acquire(ip(1)).unwrap();
        let _b = limits.clone().try_acquire(ip(1)).unwrap();
        assert_eq!(
            limits.clone().try_acquire(ip(1)).unwrap_err(),
            AdmissionError::TooManyFromAddress
        );
        // Another address is unaffected
        let _c = limits.clone().try_acquire(ip(2)).unwrap();
    }

    #[test]
    fn test_global_cap() {
        let limits = Arc::new(ConnectionLimits::new(2, 5));
        let _a = limits.clone().try_acquire(ip(1)).unwrap();
        let _b = limits.clone().try_acquire(ip(2)).unwrap();
        assert_eq!(
            limits.clone().try_acquire(ip(3)).unwrap_err(),
            AdmissionError::ServerFull
        );
    }

    #[test]
    fn test_permit_release_on_drop() {
        let limits = Arc::new(ConnectionLimits::new(1, 1));
        let permit = limits.clone().try_acquire(ip(1)).unwrap();
        assert_eq!(limits.active(), 1);
        drop(permit);
        assert_eq!(limits.active(), 0);
        assert!(limits.clone().try_acquire(ip(1)).is_ok());
    }
}
