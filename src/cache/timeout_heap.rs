//! Timeout Heap Module
//!
//! Min-heap of pending deadlines, soonest first.
//!
//! The heap is lazy: deleting or replacing an entry never touches it. Nodes
//! that no longer match the table are discarded when they surface.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use crate::cache::entry::Timeout;

// == Timeout Node ==
/// Snapshot of a descriptor queued for expiry.
#[derive(Debug, Clone)]
pub struct TimeoutNode<K> {
    /// Deadline at the time the node was queued
    pub deadline: Instant,
    /// Id of the descriptor this node was queued for
    pub id: u64,
    /// Key of the owning entry
    pub key: K,
}

impl<K> TimeoutNode<K> {
    pub fn new(key: K, timeout: &Timeout) -> Self {
        Self {
            deadline: timeout.expires_at(),
            id: timeout.id(),
            key,
        }
    }

    /// Returns true if `timeout` is the descriptor this node was queued for.
    pub fn tracks(&self, timeout: &Timeout) -> bool {
        self.id == timeout.id()
    }
}

impl<K> PartialEq for TimeoutNode<K> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl<K> Eq for TimeoutNode<K> {}

impl<K> Ord for TimeoutNode<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl<K> PartialOrd for TimeoutNode<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// == Timeout Heap ==
#[derive(Debug)]
pub struct TimeoutHeap<K> {
    nodes: BinaryHeap<TimeoutNode<K>>,
}

impl<K> Default for TimeoutHeap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimeoutHeap<K> {
    pub fn new() -> Self {
        Self {
            nodes: BinaryHeap::new(),
        }
    }

    /// Queues a descriptor for `key`.
    pub fn push(&mut self, key: K, timeout: &Timeout) {
        self.nodes.push(TimeoutNode::new(key, timeout));
    }

    /// Re-queues an existing node under a later deadline.
    pub fn requeue(&mut self, mut node: TimeoutNode<K>, deadline: Instant) {
        node.deadline = deadline;
        self.nodes.push(node);
    }

    /// Returns the node with the soonest deadline.
    pub fn peek(&self) -> Option<&TimeoutNode<K>> {
        self.nodes.peek()
    }

    pub fn pop(&mut self) -> Option<TimeoutNode<K>> {
        self.nodes.pop()
    }

    /// Soonest queued deadline, stale or not.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.nodes.peek().map(|node| node.deadline)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
