// Test fixtures shared by the worker, registry and installer tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::{ClusterWorkerContext, WorkEnvelope, WorkerHandler};

#[derive(Clone, Default)]
pub struct Recorded {
    seen: Arc<Mutex<Vec<(u64, u64)>>>,
    flushes: Arc<Mutex<u32>>,
    flushed_after: Arc<Mutex<Option<usize>>>,
}

impl Recorded {
    /// `seq` fields in handling order
    pub fn sequence(&self) -> Vec<u64> {
        self.seen.lock().unwrap().iter().map(|(_, seq)| *seq).collect()
    }

    /// `seq` fields in handling order, grouped by `producer`
    pub fn by_producer(&self) -> BTreeMap<u64, Vec<u64>> {
        let mut grouped: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        for (producer, seq) in self.seen.lock().unwrap().iter() {
            grouped.entry(*producer).or_default().push(*seq);
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn flushes(&self) -> u32 {
        *self.flushes.lock().unwrap()
    }

    /// How many messages had been handled at the latest flush
    pub fn flushed_after(&self) -> Option<usize> {
        *self.flushed_after.lock().unwrap()
    }
}

pub struct RecordingHandler {
    recorded: Recorded,
    fail_on: Option<u64>,
    gate: Option<Arc<Notify>>,
}

impl RecordingHandler {
    pub fn new(recorded: Recorded) -> Self {
        Self {
            recorded,
            fail_on: None,
            gate: None,
        }
    }

    pub fn failing_on(mut self, seq: u64) -> Self {
        self.fail_on = Some(seq);
        self
    }

    /// Park on the first message until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl WorkerHandler for RecordingHandler {
    async fn on_work(&mut self, envelope: WorkEnvelope, _context: &ClusterWorkerContext) -> anyhow::Result<()> {
        if let Some(gate) = self.gate.take() {
            gate.notified().await;
        }

        let producer = envelope.payload["producer"].as_u64().unwrap_or(0);
        let seq = envelope.payload["seq"].as_u64().unwrap_or(0);

        if self.fail_on == Some(seq) {
            anyhow::bail!("refusing seq {}", seq);
        }

        self.recorded.seen.lock().unwrap().push((producer, seq));
        Ok(())
    }

    async fn flush(&mut self, _context: &ClusterWorkerContext) -> anyhow::Result<()> {
        *self.recorded.flushes.lock().unwrap() += 1;
        *self.recorded.flushed_after.lock().unwrap() = Some(self.recorded.len());
        Ok(())
    }
}
