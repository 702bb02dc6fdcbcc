pub mod topology;

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

use crate::error::{MapgenError, Result};
use crate::mesh::{HexId, HexMesh};

pub use topology::{BoundaryLoop, CoastDistance, RegionTopology};

/// Произвольный (не обязательно связный) набор гексов
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    hexes: BTreeSet<HexId>,
}

impl Region {
    pub fn new(hexes: impl IntoIterator<Item = HexId>) -> Result<Self> {
        let hexes: BTreeSet<HexId> = hexes.into_iter().collect();
        if hexes.is_empty() {
            return Err(MapgenError::EmptyRegion);
        }
        Ok(Self { hexes })
    }

    #[must_use]
    pub fn contains(&self, hex: HexId) -> bool {
        self.hexes.contains(&hex)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hexes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hexes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = HexId> + '_ {
        self.hexes.iter().copied()
    }

    #[must_use]
    pub fn hexes(&self) -> &BTreeSet<HexId> {
        &self.hexes
    }
}

/// Граф смежности гексов суши.
pub fn build_land_graph(mesh: &HexMesh) -> UnGraph<HexId, ()> {
    let mut graph = UnGraph::new_undirected();
    let mut hex_to_node: HashMap<HexId, NodeIndex> = HashMap::new();

    for hex in mesh.hexes().iter().filter(|h| h.land) {
        hex_to_node.insert(hex.id, graph.add_node(hex.id));
    }

    for hex in mesh.hexes().iter().filter(|h| h.land) {
        for neighbour in hex.neighbour_ids() {
            // Каждое ребро добавляем один раз: от меньшего id к большему
            if neighbour <= hex.id {
                continue;
            }
            if let Some(&other) = hex_to_node.get(&neighbour) {
                graph.add_edge(hex_to_node[&hex.id], other, ());
            }
        }
    }
    graph
}

/// Заливкой находит связные участки суши; каждый становится регионом.
pub fn discover_land_regions(mesh: &HexMesh) -> Vec<Region> {
    let graph = build_land_graph(mesh);
    let mut assigned = vec![false; graph.node_count()];
    let mut regions = Vec::new();

    for start in graph.node_indices() {
        if assigned[start.index()] {
            continue;
        }
        let mut tract = Vec::new();
        let mut bfs = Bfs::new(&graph, start);
        while let Some(node) = bfs.next(&graph) {
            assigned[node.index()] = true;
            tract.push(graph[node]);
        }
        // Заливка всегда содержит стартовый гекс
        if let Ok(region) = Region::new(tract) {
            regions.push(region);
        }
    }

    tracing::debug!(
        land_hexes = graph.node_count(),
        regions = regions.len(),
        "land regions discovered"
    );
    regions
}
