// ===========================================================================
// Arena identifiers
// ===========================================================================
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

arena_id!(
    /// Identifier of a path (an edge of the network).
    PathId
);
arena_id!(
    /// Identifier of a located object.
    TopologyId
);
arena_id!(
    /// Identifier of one (path, start, end) segment of a topology.
    AggregationId
);

/// Monotonic allocator for the three id spaces.
/// Ids are never reused, so a deleted topology keeps its id for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdAllocator {
    next_path: u64,
    next_topology: u64,
    next_aggregation: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            next_path: 1,
            next_topology: 1,
            next_aggregation: 1,
        }
    }
}

impl IdAllocator {
    pub fn next_path(&mut self) -> PathId {
        let id = self.next_path;
        self.next_path += 1;
        PathId(id)
    }

    pub fn next_topology(&mut self) -> TopologyId {
        let id = self.next_topology;
        self.next_topology += 1;
        TopologyId(id)
    }

    pub fn next_aggregation(&mut self) -> AggregationId {
        let id = self.next_aggregation;
        self.next_aggregation += 1;
        AggregationId(id)
    }

    /// Make sure an externally supplied path id is never handed out again.
    pub fn reserve_path(&mut self, id: PathId) {
        if id.0 >= self.next_path {
            self.next_path = id.0 + 1;
        }
    }

    pub fn reserve_topology(&mut self, id: TopologyId) {
        if id.0 >= self.next_topology {
            self.next_topology = id.0 + 1;
        }
    }
}
