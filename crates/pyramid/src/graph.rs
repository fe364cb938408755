//! Dependency graph of a pyramid build.
//!
//! Every tile from the leaf zoom up to `min_zoom` that has at least one leaf
//! below it is a node. A node knows how many of its children (its
//! producers) are still unfinished; it becomes ready when that reaches zero.
//! Children that never existed are simply not producers, which is how a
//! parent with fewer than four children is represented.

use std::collections::{BTreeSet, HashMap};

use raster_common::{RasterError, RasterResult, TileCoord};

/// Where a node stands in the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    Pending,
    /// Written to the store.
    Built,
    /// Finished without data; nothing was written.
    Empty,
    Failed(String),
}

impl NodeStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, NodeStatus::Pending)
    }
}

#[derive(Debug)]
struct Node {
    unfinished: usize,
    status: NodeStatus,
}

/// Tiles of one pyramid and who waits on whom.
#[derive(Debug)]
pub struct PyramidGraph {
    min_zoom: u32,
    leaf_zoom: u32,
    nodes: HashMap<TileCoord, Node>,
}

impl PyramidGraph {
    /// Build the graph above `leaves`, all of which must share one zoom
    /// level no coarser than `min_zoom`.
    pub fn new(leaves: impl IntoIterator<Item = TileCoord>, min_zoom: u32) -> RasterResult<Self> {
        let leaves: BTreeSet<TileCoord> = leaves.into_iter().collect();
        let leaf_zoom = match leaves.first() {
            Some(first) => first.z,
            None => {
                return Ok(Self {
                    min_zoom,
                    leaf_zoom: min_zoom,
                    nodes: HashMap::new(),
                })
            }
        };
        if let Some(odd) = leaves.iter().find(|c| c.z != leaf_zoom) {
            return Err(RasterError::config(format!(
                "leaf tiles span several zoom levels ({} and {})",
                leaf_zoom, odd.z
            )));
        }
        if leaf_zoom < min_zoom {
            return Err(RasterError::config(format!(
                "leaf zoom {} is coarser than minimum zoom {}",
                leaf_zoom, min_zoom
            )));
        }

        let mut nodes: HashMap<TileCoord, Node> = leaves
            .iter()
            .map(|c| {
                (
                    *c,
                    Node {
                        unfinished: 0,
                        status: NodeStatus::Pending,
                    },
                )
            })
            .collect();

        let mut level: BTreeSet<TileCoord> = leaves;
        for _ in min_zoom..leaf_zoom {
            let mut parents = BTreeSet::new();
            for child in &level {
                if let Some(parent) = child.parent() {
                    nodes
                        .entry(parent)
                        .or_insert(Node {
                            unfinished: 0,
                            status: NodeStatus::Pending,
                        })
                        .unfinished += 1;
                    parents.insert(parent);
                }
            }
            level = parents;
        }

        Ok(Self {
            min_zoom,
            leaf_zoom,
            nodes,
        })
    }

    pub fn min_zoom(&self) -> u32 {
        self.min_zoom
    }

    pub fn leaf_zoom(&self) -> u32 {
        self.leaf_zoom
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        self.nodes.contains_key(&coord)
    }

    /// Tiles at zoom `z`, sorted.
    pub fn level(&self, z: u32) -> Vec<TileCoord> {
        let mut coords: Vec<TileCoord> =
            self.nodes.keys().filter(|c| c.z == z).copied().collect();
        coords.sort();
        coords
    }

    pub fn leaves(&self) -> Vec<TileCoord> {
        self.level(self.leaf_zoom)
    }

    /// The children of `coord` that are part of the graph, by quadrant.
    pub fn producers(&self, coord: TileCoord) -> [Option<TileCoord>; 4] {
        coord.children().map(|c| self.contains(c).then_some(c))
    }

    pub fn status(&self, coord: TileCoord) -> Option<&NodeStatus> {
        self.nodes.get(&coord).map(|n| &n.status)
    }

    /// All producers are finished and the node itself is not.
    pub fn is_ready(&self, coord: TileCoord) -> bool {
        self.nodes
            .get(&coord)
            .is_some_and(|n| n.unfinished == 0 && n.status == NodeStatus::Pending)
    }

    /// Record the outcome of `coord`. Returns its parent when this was the
    /// parent's last unfinished producer.
    pub fn complete(&mut self, coord: TileCoord, status: NodeStatus) -> Option<TileCoord> {
        let node = self.nodes.get_mut(&coord)?;
        if node.status.is_finished() {
            return None;
        }
        node.status = status;

        if coord.z <= self.min_zoom {
            return None;
        }
        let parent = coord.parent()?;
        let node = self.nodes.get_mut(&parent)?;
        node.unfinished = node.unfinished.saturating_sub(1);
        (node.unfinished == 0).then_some(parent)
    }

    /// Nodes that are still pending.
    pub fn unfinished(&self) -> Vec<TileCoord> {
        let mut coords: Vec<TileCoord> = self
            .nodes
            .iter()
            .filter(|(_, n)| !n.status.is_finished())
            .map(|(c, _)| *c)
            .collect();
        coords.sort();
        coords
    }
}
