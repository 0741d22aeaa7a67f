// ===========================================================================
// Derived node graph: snapped path endpoints
// ===========================================================================
use crate::ids::PathId;
use crate::path_graph::Path;
use ahash::AHashMap;
use geo_types::Coord;
use rstar::RTree;
use rstar::primitives::GeomWithData;

pub type NodeId = usize;

/// A snapped endpoint coordinate shared by one or more paths. Never persisted.
#[derive(Debug, Clone)]
pub struct PathGraphNode {
    pub id: NodeId,
    pub coord: Coord,
    /// Paths with an endpoint here. A loop path appears twice.
    pub paths: Vec<PathId>,
}

pub struct NodeIndex {
    nodes: Vec<PathGraphNode>,
    tree: RTree<GeomWithData<[f64; 2], NodeId>>,
    ends: AHashMap<PathId, (NodeId, NodeId)>,
    tolerance: f64,
}

impl NodeIndex {
    /// Endpoints closer than `tolerance` to an existing node join it.
    pub fn build<'a>(paths: impl IntoIterator<Item = &'a Path>, tolerance: f64) -> Self {
        let mut index = Self {
            nodes: Vec::new(),
            tree: RTree::new(),
            ends: AHashMap::new(),
            tolerance,
        };
        for path in paths {
            let from = index.node_for(path.start(), path.id);
            let to = index.node_for(path.end(), path.id);
            index.ends.insert(path.id, (from, to));
        }
        index
    }

    fn node_for(&mut self, coord: Coord, path: PathId) -> NodeId {
        if let Some(id) = self.find(coord) {
            self.nodes[id].paths.push(path);
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(PathGraphNode {
            id,
            coord,
            paths: vec![path],
        });
        self.tree.insert(GeomWithData::new([coord.x, coord.y], id));
        id
    }

    /// Node within tolerance of the coordinate, if any.
    pub fn find(&self, coord: Coord) -> Option<NodeId> {
        let hit = self.tree.nearest_neighbor(&[coord.x, coord.y])?;
        let [x, y] = *hit.geom();
        let d = (x - coord.x).hypot(y - coord.y);
        (d <= self.tolerance).then_some(hit.data)
    }

    pub fn endpoints(&self, path: PathId) -> Option<(NodeId, NodeId)> {
        self.ends.get(&path).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&PathGraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[PathGraphNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.nodes.get(id).map(|n| n.paths.len()).unwrap_or(0)
    }
}
