//! Dispatch trace: an opt-in record of every event the executor invokes.
//!
//! Two runs of the same scenario must produce identical traces. The trace
//! hash gives tests and tooling a cheap way to compare them.

use std::hash::Hasher;

use crate::event::{EventId, SourceType};
use crate::time::VirtualTime;

/// FNV-1a. Unlike `DefaultHasher` its output is fixed across processes.
struct Fnv1a(u64);

impl Default for Fnv1a {
    fn default() -> Self {
        Fnv1a(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for Fnv1a {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(0x0100_0000_01b3);
        }
    }
}

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry<S> {
    /// Virtual time at dispatch.
    pub time: VirtualTime,
    /// The executor's id for the event.
    pub event_id: EventId,
    /// Source the event was tagged with.
    pub source: S,
    /// Label given at submission.
    pub description: String,
}

impl<S: SourceType> std::fmt::Display for TraceEntry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} {} {:?}] {}",
            self.time, self.event_id, self.source, self.description
        )
    }
}

/// Append-only list of [`TraceEntry`] values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTrace<S> {
    entries: Vec<TraceEntry<S>>,
}

impl<S: SourceType> DispatchTrace<S> {
    pub(crate) fn new() -> Self {
        DispatchTrace {
            entries: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, entry: TraceEntry<S>) {
        self.entries.push(entry);
    }

    /// Recorded entries in dispatch order.
    pub fn entries(&self) -> &[TraceEntry<S>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Order-sensitive hash of the whole trace.
    ///
    /// Sources are hashed through their `Debug` form so the value does not
    /// depend on how `S` implements `Hash`.
    pub fn hash(&self) -> u64 {
        let mut hasher = Fnv1a::default();
        for entry in &self.entries {
            hasher.write_u64(entry.time.ticks());
            hasher.write_u64(entry.event_id.raw());
            let source = format!("{:?}", entry.source);
            for field in [source.as_str(), entry.description.as_str()] {
                hasher.write_usize(field.len());
                hasher.write(field.as_bytes());
            }
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(time: u64, id: u64, description: &str) -> TraceEntry<&'static str> {
        TraceEntry {
            time: VirtualTime::new(time),
            event_id: EventId::new(id),
            source: "T1",
            description: description.to_string(),
        }
    }

    #[test]
    fn test_equal_traces_hash_equal() {
        let mut a = DispatchTrace::new();
        let mut b = DispatchTrace::new();
        for trace in [&mut a, &mut b] {
            trace.record(entry(1, 0, "x"));
            trace.record(entry(4, 2, "y"));
        }
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), DispatchTrace::<&'static str>::new().hash());
    }

    #[test]
    fn test_field_boundaries_affect_hash() {
        let mut a = DispatchTrace::new();
        a.record(entry(1, 0, "ab"));
        let mut b = DispatchTrace::new();
        b.record(TraceEntry {
            source: "T1a",
            ..entry(1, 0, "b")
        });
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_trace_hash_is_order_sensitive() {
        let mut a = DispatchTrace::new();
        a.record(entry(1, 0, "x"));
        a.record(entry(2, 1, "y"));

        let mut b = DispatchTrace::new();
        b.record(entry(2, 1, "y"));
        b.record(entry(1, 0, "x"));

        assert_eq!(a.len(), 2);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_entry_display() {
        assert_eq!(entry(7, 3, "tick").to_string(), "[T=7 E#3 \"T1\"] tick");
    }
}
