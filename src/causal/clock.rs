use std::fmt;

/*
    Every node keeps one counter per cluster member. A node's own slot counts
    the messages it has originated; slot j on node i counts the messages from
    j that i has delivered so far. Comparing two clocks componentwise gives a
    partial order over causal history: A <= B when every slot of A is at most
    the matching slot of B, and clocks where neither direction holds belong
    to concurrent messages.
*/

pub type NodeId = usize;

/// Fixed-size vector clock, one slot per cluster member, indexed by node id.
///
/// All slots start at 0; the first message a node originates is stamped with
/// own-slot value 1. Slots are monotonically non-decreasing at any one node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VectorClock {
    slots: Vec<u64>,
}

impl VectorClock {
    pub fn new(size: usize) -> Self {
        VectorClock {
            slots: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: NodeId) -> u64 {
        self.slots[index]
    }

    pub fn set_slot(&mut self, index: NodeId, value: u64) {
        self.slots[index] = value;
    }

    /// Bumps one slot by exactly 1 and returns the post-increment value.
    pub fn increment(&mut self, index: NodeId) -> u64 {
        self.slots[index] += 1;
        self.slots[index]
    }

    /// Componentwise `<=` over all slots.
    pub fn le(&self, other: &VectorClock) -> bool {
        self.slots
            .iter()
            .zip(other.slots.iter())
            .all(|(a, b)| a <= b)
    }

    /// Sum of all slots except one, a scalar measure of causal progress
    /// from the rest of the cluster.
    pub fn sum_excluding(&self, index: NodeId) -> u64 {
        self.slots
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, v)| v)
            .sum()
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", slot)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(slots: &[u64]) -> VectorClock {
        let mut c = VectorClock::new(slots.len());
        for (i, v) in slots.iter().enumerate() {
            c.set_slot(i, *v);
        }
        c
    }

    #[test]
    fn increment_returns_post_increment_value() {
        let mut c = VectorClock::new(3);
        assert_eq!(c.increment(0), 1);
        assert_eq!(c.increment(0), 2);
        assert_eq!(c.increment(2), 1);
        assert_eq!(c, clock(&[2, 0, 1]));
    }

    #[test]
    fn le_is_a_partial_order() {
        let a = clock(&[1, 0, 0]);
        let b = clock(&[1, 2, 0]);
        let c = clock(&[0, 1, 0]);

        // reflexive
        assert!(a.le(&a));
        // ordered pair
        assert!(a.le(&b));
        assert!(!b.le(&a));
        // concurrent pair, neither direction holds
        assert!(!a.le(&c));
        assert!(!c.le(&a));
    }

    #[test]
    fn equal_clocks_compare_le_both_ways() {
        let a = clock(&[2, 1, 3]);
        let b = clock(&[2, 1, 3]);
        assert_eq!(a, b);
        assert!(a.le(&b) && b.le(&a));
    }

    #[test]
    fn sum_excluding_skips_one_slot() {
        let c = clock(&[5, 2, 3]);
        assert_eq!(c.sum_excluding(0), 5);
        assert_eq!(c.sum_excluding(1), 8);
        assert_eq!(c.sum_excluding(2), 7);
    }

    #[test]
    fn display_prints_slots_in_node_order() {
        assert_eq!(clock(&[2, 0, 1]).to_string(), "[2 0 1]");
    }
}
