// storage.rs - Result sink trait and the in-memory packet store
use crate::network::types::PacketRecord;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Destination for per-packet records.
///
/// Implementations must tolerate unordered, possibly-concurrent
/// single-record writes; the pipeline's workers call `store` with no
/// ordering guarantee.
pub trait PacketSink: Send + Sync {
    fn store(&self, record: PacketRecord);
}

/// Aggregated view over the stored records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficStatistics {
    pub total_packets: usize,
    pub unencrypted_packets: usize,
    /// Packets with at least one finding
    pub vulnerabilities: usize,
    pub http_requests: usize,
    pub https_requests: usize,
    /// Share of encrypted packets, 0-100 (100 when nothing is stored)
    pub encryption_rate: usize,
}

/// Bounded in-memory packet store.
///
/// Keeps the most recent `capacity` records; older records are evicted as
/// new ones arrive. The lifetime is owned by the caller, which hands the
/// store to the pipeline as its sink.
pub struct MemoryStore {
    capacity: usize,
    records: Mutex<VecDeque<PacketRecord>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PacketRecord>> {
        self.records.lock().expect("packet store mutex poisoned")
    }

    /// Most recent records, newest first
    pub fn recent(&self, limit: usize) -> Vec<PacketRecord> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    /// All stored unencrypted records, newest first
    pub fn unencrypted(&self) -> Vec<PacketRecord> {
        self.lock()
            .iter()
            .rev()
            .filter(|r| !r.is_encrypted)
            .cloned()
            .collect()
    }

    /// All stored records with at least one finding, newest first
    pub fn vulnerable(&self) -> Vec<PacketRecord> {
        self.lock()
            .iter()
            .rev()
            .filter(|r| r.vulnerability_count > 0)
            .cloned()
            .collect()
    }

    pub fn total_count(&self) -> usize {
        self.lock().len()
    }

    pub fn unencrypted_count(&self) -> usize {
        self.lock().iter().filter(|r| !r.is_encrypted).count()
    }

    pub fn vulnerable_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|r| r.vulnerability_count > 0)
            .count()
    }

    /// Drop records captured before `cutoff_ms`
    pub fn prune_older_than(&self, cutoff_ms: i64) {
        self.lock().retain(|r| r.timestamp_ms >= cutoff_ms);
    }

    pub fn statistics(&self) -> TrafficStatistics {
        let records = self.lock();
        let total = records.len();
        let unencrypted = records.iter().filter(|r| !r.is_encrypted).count();
        let vulnerable = records.iter().filter(|r| r.vulnerability_count > 0).count();
        let http = records.iter().filter(|r| r.protocol == "HTTP").count();
        let https = records.iter().filter(|r| r.protocol == "HTTPS").count();

        TrafficStatistics {
            total_packets: total,
            unencrypted_packets: unencrypted,
            vulnerabilities: vulnerable,
            http_requests: http,
            https_requests: https,
            encryption_rate: if total > 0 {
                (total - unencrypted) * 100 / total
            } else {
                100
            },
        }
    }
}

impl PacketSink for MemoryStore {
    fn store(&self, record: PacketRecord) {
        let mut records = self.lock();
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
    }
}
