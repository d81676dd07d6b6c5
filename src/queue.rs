//! Per-session buffer for candidates that arrive before the remote
//! description has been applied.

use crate::types::IceCandidate;

/// FIFO candidate buffer. Flushed exactly once, in arrival order, the
/// moment the session gains its remote description; cleared on session
/// destruction even if never flushed.
#[derive(Debug, Clone, Default)]
pub struct CandidateQueue {
    items: Vec<IceCandidate>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, candidate: IceCandidate) {
        self.items.push(candidate);
    }

    /// Remove and return all buffered candidates in enqueue order.
    pub fn drain_all(&mut self) -> Vec<IceCandidate> {
        std::mem::take(&mut self.items)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(n: u16) -> IceCandidate {
        IceCandidate::new(format!("candidate:{n}"), "0", n)
    }

    #[test]
    fn test_drain_preserves_order() {
        let mut queue = CandidateQueue::new();
        queue.enqueue(candidate(1));
        queue.enqueue(candidate(2));
        queue.enqueue(candidate(3));

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0], candidate(1));
        assert_eq!(drained[1], candidate(2));
        assert_eq!(drained[2], candidate(3));
    }

    #[test]
    fn test_drain_empties_the_queue() {
        let mut queue = CandidateQueue::new();
        queue.enqueue(candidate(1));

        assert_eq!(queue.drain_all().len(), 1);
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_clear() {
        let mut queue = CandidateQueue::new();
        queue.enqueue(candidate(1));
        queue.enqueue(candidate(2));
        queue.clear();
        assert_eq!(queue.len(), 0);
    }
}
