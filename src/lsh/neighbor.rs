//! Ranked candidates and bounded top-k selection for re-ranking.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A candidate with its exact distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub distance: f32,
    pub id: &'a str,
}

impl<'a> Neighbor<'a> {
    pub fn new(id: &'a str, distance: f32) -> Self {
        Self { distance, id }
    }
}

impl PartialEq for Neighbor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor<'_> {}

impl PartialOrd for Neighbor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Ascending distance, ties broken by lexicographic id.
impl Ord for Neighbor<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(other.id))
    }
}

/// Keeps the `k` smallest neighbors seen so far.
///
/// Backed by a max-heap whose top is the current worst kept neighbor.
#[derive(Debug)]
pub struct TopK<'a> {
    k: usize,
    heap: BinaryHeap<Neighbor<'a>>,
}

impl<'a> TopK<'a> {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
        }
    }

    pub fn push(&mut self, neighbor: Neighbor<'a>) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(neighbor);
        } else if let Some(worst) = self.heap.peek() {
            if neighbor < *worst {
                self.heap.pop();
                self.heap.push(neighbor);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Consume and return neighbors sorted ascending.
    pub fn into_sorted_vec(self) -> Vec<Neighbor<'a>> {
        self.heap.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_by_distance_then_id() {
        let a = Neighbor::new("b", 1.0);
        let b = Neighbor::new("a", 2.0);
        let c = Neighbor::new("a", 1.0);
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn test_top_k_keeps_smallest() {
        let mut top = TopK::new(3);
        for (id, d) in [("e", 5.0), ("a", 1.0), ("d", 4.0), ("b", 2.0), ("c", 3.0)] {
            top.push(Neighbor::new(id, d));
        }
        assert_eq!(top.len(), 3);
        let ids: Vec<&str> = top.into_sorted_vec().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_top_k_tie_break_is_lexicographic() {
        let mut top = TopK::new(2);
        for id in ["z", "m", "a", "q"] {
            top.push(Neighbor::new(id, 1.0));
        }
        let ids: Vec<&str> = top.into_sorted_vec().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "m"]);
    }

    #[test]
    fn test_top_zero() {
        let mut top = TopK::new(0);
        top.push(Neighbor::new("a", 0.0));
        assert!(top.is_empty());
    }
}
