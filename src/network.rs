// ===========================================================================
// Arena of paths, topologies and the aggregations linking them
// ===========================================================================
//
// Paths and topologies never point at each other. A PathAggregation holds both
// ids, so the Path <-> Topology cycle only exists through integer keys.
use crate::ids::{AggregationId, IdAllocator, PathId, TopologyId};
use crate::path_graph::Path;
use crate::topology::{PathAggregation, Topology};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "StoredNetwork")]
pub struct Network {
    paths: BTreeMap<PathId, Path>,
    topologies: BTreeMap<TopologyId, Topology>,
    aggregations: BTreeMap<AggregationId, PathAggregation>,
    ids: IdAllocator,
    /// Aggregations keyed by the path they lie on.
    #[serde(skip)]
    by_path: BTreeMap<PathId, BTreeSet<AggregationId>>,
    /// Aggregations keyed by the topology they belong to.
    #[serde(skip)]
    by_topology: BTreeMap<TopologyId, BTreeSet<AggregationId>>,
}

/// Serialized form; the secondary indexes are rebuilt on load.
#[derive(Deserialize)]
struct StoredNetwork {
    paths: BTreeMap<PathId, Path>,
    topologies: BTreeMap<TopologyId, Topology>,
    aggregations: BTreeMap<AggregationId, PathAggregation>,
    ids: IdAllocator,
}

impl From<StoredNetwork> for Network {
    fn from(stored: StoredNetwork) -> Self {
        let mut network = Network {
            paths: stored.paths,
            topologies: stored.topologies,
            aggregations: stored.aggregations,
            ids: stored.ids,
            by_path: BTreeMap::new(),
            by_topology: BTreeMap::new(),
        };
        let links: Vec<(AggregationId, PathId, TopologyId)> = network
            .aggregations
            .values()
            .map(|a| (a.id, a.path, a.topology))
            .collect();
        for (id, path, topology) in links {
            network.link(id, path, topology);
        }
        network
    }
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    fn link(&mut self, id: AggregationId, path: PathId, topology: TopologyId) {
        self.by_path.entry(path).or_default().insert(id);
        self.by_topology.entry(topology).or_default().insert(id);
    }

    fn unlink(&mut self, id: AggregationId, path: PathId, topology: TopologyId) {
        if let Some(ids) = self.by_path.get_mut(&path) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_path.remove(&path);
            }
        }
        if let Some(ids) = self.by_topology.get_mut(&topology) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_topology.remove(&topology);
            }
        }
    }

    /// Store an aggregation, replacing any previous one with the same id.
    fn put_aggregation(&mut self, agg: PathAggregation) {
        if let Some(old) = self.aggregations.get(&agg.id) {
            let (id, path, topology) = (old.id, old.path, old.topology);
            self.unlink(id, path, topology);
        }
        self.link(agg.id, agg.path, agg.topology);
        self.aggregations.insert(agg.id, agg);
    }

    fn ids_to_aggregations<'a>(
        &'a self,
        ids: Option<&'a BTreeSet<AggregationId>>,
    ) -> impl Iterator<Item = &'a PathAggregation> {
        ids.into_iter()
            .flatten()
            .filter_map(move |id| self.aggregations.get(id))
    }

    // --- paths ---

    pub fn path(&self, id: PathId) -> Option<&Path> {
        self.paths.get(&id)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.values()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub(crate) fn path_mut(&mut self, id: PathId) -> Option<&mut Path> {
        self.paths.get_mut(&id)
    }

    pub(crate) fn allocate_path_id(&mut self) -> PathId {
        self.ids.next_path()
    }

    pub(crate) fn insert_path(&mut self, path: Path) {
        self.ids.reserve_path(path.id);
        self.paths.insert(path.id, path);
    }

    pub(crate) fn remove_path(&mut self, id: PathId) -> Option<Path> {
        self.paths.remove(&id)
    }

    // --- topologies ---

    pub fn topology(&self, id: TopologyId) -> Option<&Topology> {
        self.topologies.get(&id)
    }

    pub fn topologies(&self) -> impl Iterator<Item = &Topology> {
        self.topologies.values()
    }

    pub(crate) fn topology_mut(&mut self, id: TopologyId) -> Option<&mut Topology> {
        self.topologies.get_mut(&id)
    }

    pub(crate) fn allocate_topology_id(&mut self) -> TopologyId {
        self.ids.next_topology()
    }

    pub(crate) fn insert_topology(&mut self, topology: Topology) {
        self.ids.reserve_topology(topology.id);
        self.topologies.insert(topology.id, topology);
    }

    // --- aggregations ---

    pub fn aggregation(&self, id: AggregationId) -> Option<&PathAggregation> {
        self.aggregations.get(&id)
    }

    /// Aggregations of a topology in traversal order.
    pub fn aggregations_of(&self, topology: TopologyId) -> Vec<&PathAggregation> {
        let mut aggs: Vec<&PathAggregation> = self
            .ids_to_aggregations(self.by_topology.get(&topology))
            .collect();
        aggs.sort_by_key(|a| (a.order, a.id));
        aggs
    }

    /// Every aggregation that references the path, in id order.
    pub fn aggregations_on(&self, path: PathId) -> Vec<&PathAggregation> {
        self.ids_to_aggregations(self.by_path.get(&path)).collect()
    }

    pub fn topologies_on(&self, path: PathId) -> BTreeSet<TopologyId> {
        self.ids_to_aggregations(self.by_path.get(&path))
            .map(|a| a.topology)
            .collect()
    }

    /// Move an aggregation along its path.
    pub(crate) fn set_positions(&mut self, id: AggregationId, start: f64, end: f64) -> bool {
        match self.aggregations.get_mut(&id) {
            Some(agg) => {
                agg.start_position = start;
                agg.end_position = end;
                true
            }
            None => false,
        }
    }

    /// Move an aggregation onto another path.
    pub(crate) fn reassign_aggregation(
        &mut self,
        id: AggregationId,
        path: PathId,
        start: f64,
        end: f64,
    ) -> bool {
        let Some(mut agg) = self.aggregations.get(&id).cloned() else {
            return false;
        };
        agg.path = path;
        agg.start_position = start;
        agg.end_position = end;
        self.put_aggregation(agg);
        true
    }

    /// Append a segment after the current last one of the topology.
    pub(crate) fn push_aggregation(
        &mut self,
        topology: TopologyId,
        path: PathId,
        start_position: f64,
        end_position: f64,
    ) -> AggregationId {
        let order = self
            .ids_to_aggregations(self.by_topology.get(&topology))
            .map(|a| a.order + 1)
            .max()
            .unwrap_or(0);
        let id = self.ids.next_aggregation();
        self.put_aggregation(PathAggregation {
            id,
            path,
            topology,
            start_position,
            end_position,
            order,
        });
        id
    }

    pub(crate) fn remove_aggregation(&mut self, id: AggregationId) -> Option<PathAggregation> {
        let removed = self.aggregations.remove(&id)?;
        self.unlink(removed.id, removed.path, removed.topology);
        Some(removed)
    }

    /// Replace one aggregation by a run of segments at the same place in the sequence.
    /// The owning topology's orders are renumbered densely afterwards.
    pub(crate) fn splice_aggregation(
        &mut self,
        id: AggregationId,
        replacement: &[(PathId, f64, f64)],
    ) -> Vec<AggregationId> {
        let Some(original) = self.aggregations.get(&id).cloned() else {
            return Vec::new();
        };
        let mut sequence: Vec<AggregationId> = self
            .aggregations_of(original.topology)
            .iter()
            .map(|a| a.id)
            .collect();
        let Some(slot) = sequence.iter().position(|a| *a == id) else {
            return Vec::new();
        };

        let mut created = Vec::with_capacity(replacement.len());
        for (i, &(path, start, end)) in replacement.iter().enumerate() {
            let agg_id = if i == 0 { id } else { self.ids.next_aggregation() };
            self.put_aggregation(PathAggregation {
                id: agg_id,
                path,
                topology: original.topology,
                start_position: start,
                end_position: end,
                order: original.order,
            });
            created.push(agg_id);
        }
        if replacement.is_empty() {
            self.remove_aggregation(id);
        }

        sequence.splice(slot..=slot, created.iter().copied());
        self.set_order(&sequence);
        created
    }

    /// Assign dense orders 0..N-1 following the given sequence.
    pub(crate) fn set_order(&mut self, sequence: &[AggregationId]) {
        for (order, id) in sequence.iter().enumerate() {
            if let Some(agg) = self.aggregations.get_mut(id) {
                agg.order = order as u32;
            }
        }
    }

    pub(crate) fn renumber(&mut self, topology: TopologyId) {
        let sequence: Vec<AggregationId> = self
            .aggregations_of(topology)
            .iter()
            .map(|a| a.id)
            .collect();
        self.set_order(&sequence);
    }
}
