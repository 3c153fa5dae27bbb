//! Capacity-bounded emotion event log
//!
//! The log is stored newest-first as a JSON array under a single key. Every
//! read and write goes through the persistence backend, so the backend is the
//! only source of truth.

use std::collections::VecDeque;

use crate::error::FluxError;
use crate::persistence::{MemoryBackend, PersistenceBackend};
use crate::types::{clamp_confidence, Observation};

/// Key the event log is stored under
pub const STORAGE_KEY: &str = "emotion-detector-data";

/// Default maximum number of observations kept
pub const DEFAULT_CAPACITY: usize = 1000;

/// Append-only event log with oldest-first eviction
///
/// Reads are fail-soft: missing, unreadable or corrupt data reads as an empty
/// log. Writes are fail-loud: backend errors are returned to the caller.
///
/// `append` is a read-modify-write of the whole log. Within a process `&mut self`
/// keeps it single-writer; processes sharing one storage location must
/// serialize their appends themselves.
#[derive(Debug)]
pub struct EventStore<B: PersistenceBackend = MemoryBackend> {
    backend: B,
    capacity: usize,
}

impl Default for EventStore<MemoryBackend> {
    fn default() -> Self {
        Self::new(MemoryBackend::new())
    }
}

impl<B: PersistenceBackend> EventStore<B> {
    /// Create a store with the default capacity
    pub fn new(backend: B) -> Self {
        Self::with_capacity(backend, DEFAULT_CAPACITY)
    }

    /// Create a store keeping at most `capacity` observations (minimum 1)
    pub fn with_capacity(backend: B, capacity: usize) -> Self {
        Self {
            backend,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert `observation` at the head, evicting the oldest entries beyond capacity
    pub fn append(&mut self, observation: Observation) -> Result<(), FluxError> {
        // Read errors abort; only missing or corrupt data starts a fresh log
        let mut log: VecDeque<Observation> = self.load()?.into();
        log.push_front(observation);

        if log.len() > self.capacity {
            let evicted = log.len() - self.capacity;
            log.truncate(self.capacity);
            log::debug!("evicted {} oldest observation(s) at capacity {}", evicted, self.capacity);
        }

        self.write(log.make_contiguous())
    }

    /// Full log, newest first
    pub fn all(&self) -> Vec<Observation> {
        self.load().unwrap_or_else(|e| {
            log::warn!("failed to read emotion log, treating as empty: {}", e);
            Vec::new()
        })
    }

    /// Stored log; missing or corrupt data is empty, backend errors are returned
    fn load(&self) -> Result<Vec<Observation>, FluxError> {
        let stored = match self.backend.get(STORAGE_KEY)? {
            Some(stored) => stored,
            None => return Ok(Vec::new()),
        };

        match parse_log(&stored) {
            Ok(log) => Ok(log),
            Err(e) => {
                log::warn!("stored emotion log is corrupt, treating as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every observation
    pub fn clear(&mut self) -> Result<(), FluxError> {
        self.backend.remove(STORAGE_KEY)?;
        Ok(())
    }

    /// Full log as indented JSON
    pub fn export(&self) -> Result<String, FluxError> {
        Ok(serde_json::to_string_pretty(&self.all())?)
    }

    /// Replace the log with a previously exported one
    ///
    /// Entries are kept in the given order and truncated to capacity. Returns the
    /// number of observations stored.
    pub fn import(&mut self, json: &str) -> Result<usize, FluxError> {
        let mut log = parse_log(json)?;
        log.truncate(self.capacity);
        self.write(&log)?;
        Ok(log.len())
    }

    fn write(&mut self, log: &[Observation]) -> Result<(), FluxError> {
        let serialized = serde_json::to_string(log)?;
        self.backend.set(STORAGE_KEY, &serialized).map_err(|e| {
            log::error!("failed to persist emotion log: {}", e);
            FluxError::from(e)
        })
    }
}

/// Parse a serialized log, clamping confidences into range
pub(crate) fn parse_log(json: &str) -> Result<Vec<Observation>, FluxError> {
    let mut log: Vec<Observation> = serde_json::from_str(json)?;
    for observation in &mut log {
        observation.confidence = clamp_confidence(observation.confidence);
    }
    Ok(log)
}
