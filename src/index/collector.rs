//! Top-k hit collection
//!
//! A bounded min-heap keeps the best `offset + limit` hits seen so far, so a
//! search never sorts the full match set.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::document::Value;
use crate::segment::DocId;

/// Location of a document inside one searcher's segment set
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocAddress {
    pub segment_ord: u32,
    pub doc_id: DocId,
}

impl DocAddress {
    pub fn new(segment_ord: u32, doc_id: DocId) -> Self {
        Self {
            segment_ord,
            doc_id,
        }
    }
}

/// What a hit was ranked by
#[derive(Clone, Debug, PartialEq)]
pub enum OrderKey {
    /// BM25 relevance
    Score(f32),
    /// Value of the order-by field; `None` for docs without one
    Value(Option<Value>),
}

impl OrderKey {
    pub fn score(&self) -> Option<f32> {
        match self {
            OrderKey::Score(score) => Some(*score),
            OrderKey::Value(_) => None,
        }
    }
}

/// Comparable form of an order key
#[derive(Clone, Copy, Debug)]
pub(crate) enum SortKey {
    Score(f32),
    /// Order-preserving fast field value
    Fast(Option<u64>),
}

impl SortKey {
    fn rank(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Score(a), SortKey::Score(b)) => a.total_cmp(b),
            // `None < Some`, so docs without a value rank last
            (SortKey::Fast(a), SortKey::Fast(b)) => a.cmp(b),
            (SortKey::Score(_), SortKey::Fast(_)) => Ordering::Greater,
            (SortKey::Fast(_), SortKey::Score(_)) => Ordering::Less,
        }
    }
}

/// A collected hit; `Greater` means ranked earlier
#[derive(Clone, Copy, Debug)]
pub(crate) struct Ranked {
    pub key: SortKey,
    pub address: DocAddress,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // Equal keys: the lower address ranks first
        self.key
            .rank(&other.key)
            .then_with(|| other.address.cmp(&self.address))
    }
}

/// Collects the best `capacity` hits
pub(crate) struct TopCollector {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl TopCollector {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.min(1024) + 1),
        }
    }

    /// Whether any hit can still be kept; callers skip scoring otherwise
    pub fn is_active(&self) -> bool {
        self.capacity > 0
    }

    pub fn collect(&mut self, key: SortKey, address: DocAddress) {
        if self.capacity == 0 {
            return;
        }
        let hit = Ranked { key, address };
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(hit));
        } else if let Some(Reverse(worst)) = self.heap.peek() {
            if hit > *worst {
                self.heap.pop();
                self.heap.push(Reverse(hit));
            }
        }
    }

    /// Hits, best first
    pub fn into_sorted(self) -> Vec<Ranked> {
        // Ascending `Reverse` order is descending rank
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(hit)| hit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(hits: Vec<Ranked>) -> Vec<(u32, u32)> {
        hits.into_iter()
            .map(|h| (h.address.segment_ord, h.address.doc_id))
            .collect()
    }

    #[test]
    fn test_keeps_best_scores() {
        let mut collector = TopCollector::new(2);
        for (doc, score) in [(0, 1.0), (1, 3.0), (2, 2.0), (3, 0.5)] {
            collector.collect(SortKey::Score(score), DocAddress::new(0, doc));
        }
        assert_eq!(addresses(collector.into_sorted()), vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_ties_break_by_address() {
        let mut collector = TopCollector::new(3);
        collector.collect(SortKey::Score(1.0), DocAddress::new(1, 0));
        collector.collect(SortKey::Score(1.0), DocAddress::new(0, 5));
        collector.collect(SortKey::Score(1.0), DocAddress::new(0, 2));
        collector.collect(SortKey::Score(1.0), DocAddress::new(2, 0));
        assert_eq!(
            addresses(collector.into_sorted()),
            vec![(0, 2), (0, 5), (1, 0)]
        );
    }

    #[test]
    fn test_missing_values_rank_last() {
        let mut collector = TopCollector::new(10);
        collector.collect(SortKey::Fast(None), DocAddress::new(0, 0));
        collector.collect(SortKey::Fast(Some(5)), DocAddress::new(0, 1));
        collector.collect(SortKey::Fast(Some(9)), DocAddress::new(0, 2));
        collector.collect(SortKey::Fast(Some(5)), DocAddress::new(0, 3));
        assert_eq!(
            addresses(collector.into_sorted()),
            vec![(0, 2), (0, 1), (0, 3), (0, 0)]
        );
    }

    #[test]
    fn test_zero_capacity() {
        let mut collector = TopCollector::new(0);
        assert!(!collector.is_active());
        collector.collect(SortKey::Score(1.0), DocAddress::new(0, 0));
        assert!(collector.into_sorted().is_empty());
    }
}
