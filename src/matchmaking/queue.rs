//! Quick-match queue implementation

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

/// Participant waiting for a quick match
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub participant: Uuid,
    pub enqueued_at: Instant,
}

impl QueueEntry {
    pub fn new(participant: Uuid) -> Self {
        Self {
            participant,
            enqueued_at: Instant::now(),
        }
    }

    /// How long this participant has been waiting
    pub fn wait_time(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}

/// FIFO pool of anonymous pairing requests
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queue: VecDeque<QueueEntry>,
}

impl MatchmakingQueue {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant at the back of the queue
    pub fn enqueue(&mut self, entry: QueueEntry) {
        // Remove if already in queue (rejoin)
        self.queue.retain(|e| e.participant != entry.participant);
        self.queue.push_back(entry);
    }

    /// Take the longest-waiting entry
    pub fn pop_oldest(&mut self) -> Option<QueueEntry> {
        self.queue.pop_front()
    }

    /// Remove a participant from the queue
    pub fn remove(&mut self, participant: Uuid) -> Option<QueueEntry> {
        let pos = self.queue.iter().position(|e| e.participant == participant)?;
        self.queue.remove(pos)
    }

    /// Check if a participant is in the queue
    #[cfg(test)]
    pub fn contains(&self, participant: &Uuid) -> bool {
        self.queue.iter().any(|e| &e.participant == participant)
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if queue is empty
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
