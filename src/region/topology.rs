//! Топология границ региона: кольца, береговые вершины, упорядоченные
//! контуры и расстояние каждой вершины до берега.

use std::collections::{BTreeSet, HashMap, HashSet};

use kiddo::float::kdtree::KdTree;

use super::Region;
use crate::config::CoastDistanceMethod;
use crate::mesh::{HexId, HexMesh, Point, VertexId, shared_point_index};

const BUCKET_SIZE: usize = 256;

/// k-d дерево береговых вершин в повёрнутых координатах.
type BorderTree = KdTree<f64, u64, 2, BUCKET_SIZE, u32>;

/// Угол поворота координат перед вставкой в дерево, в радианах.
///
/// Прямые участки берега (край мира, сетка без дрожания) лежат вдоль осей
/// и направлений решётки; после поворота их вершины получают разные
/// координаты по обеим осям. Поворот сохраняет расстояния.
const TREE_ROTATION: f64 = 0.5;

fn tree_coordinates(p: Point) -> [f64; 2] {
    let (sin, cos) = TREE_ROTATION.sin_cos();
    [p.x * cos - p.y * sin, p.x * sin + p.y * cos]
}

/// Дерево нельзя строить, если по какой-то оси корзину переполняют
/// вершины с одинаковой координатой.
fn fits_in_buckets(coordinates: &[[f64; 2]]) -> bool {
    (0..2).all(|axis| {
        let mut values: Vec<f64> = coordinates.iter().map(|c| c[axis]).collect();
        values.sort_by(f64::total_cmp);
        values
            .chunk_by(|a, b| a == b)
            .all(|run| run.len() < BUCKET_SIZE)
    })
}

fn build_border_tree(mesh: &HexMesh, border: &BTreeSet<VertexId>) -> Option<BorderTree> {
    let coordinates: Vec<[f64; 2]> = border
        .iter()
        .map(|&b| tree_coordinates(mesh.vertex(b).position))
        .collect();
    if !fits_in_buckets(&coordinates) {
        tracing::warn!(
            border = border.len(),
            "too many coast vertices share a coordinate, falling back to brute force"
        );
        return None;
    }
    let mut tree = BorderTree::with_capacity(border.len());
    for (&b, c) in border.iter().zip(&coordinates) {
        tree.add(c, b.0 as u64);
    }
    Some(tree)
}

/// Ближайшая береговая вершина и расстояние до неё
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoastDistance {
    pub nearest: VertexId,
    pub distance: f64,
}

/// Один упорядоченный контур границы
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    pub vertices: Vec<VertexId>,
    /// `false`, если берег упирается в край мира
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub struct RegionTopology {
    /// Кольца гексов; кольцо 0 это внешняя оболочка
    pub rings: Vec<Vec<HexId>>,
    ring_of: HashMap<HexId, usize>,
    pub border_vertices: BTreeSet<VertexId>,
    pub loops: Vec<BoundaryLoop>,
    coast: HashMap<VertexId, CoastDistance>,
    /// Максимальное расстояние вершины региона до берега
    pub largest_border_distance: f64,
}

impl RegionTopology {
    pub fn compute(mesh: &HexMesh, region: &Region, method: CoastDistanceMethod) -> Self {
        let rings = border_rings(mesh, region);
        let ring_of = rings
            .iter()
            .enumerate()
            .flat_map(|(n, ring)| ring.iter().map(move |&h| (h, n)))
            .collect();
        let outer: &[HexId] = rings.first().map(Vec::as_slice).unwrap_or(&[]);
        let border = border_vertices(mesh, region, outer);
        let loops = boundary_loops(mesh, region, &border);
        let (coast, largest_border_distance) = coast_distances(mesh, region, &border, method);

        if loops.iter().any(|l| !l.closed) {
            tracing::debug!(hexes = region.len(), "region coastline runs into the world edge");
        }
        tracing::debug!(
            hexes = region.len(),
            rings = rings.len(),
            border_vertices = border.len(),
            loops = loops.len(),
            largest_border_distance,
            "region topology computed"
        );

        Self {
            rings,
            ring_of,
            border_vertices: border,
            loops,
            coast,
            largest_border_distance,
        }
    }

    /// Расстояние гекса до внешней оболочки в шагах
    #[must_use]
    pub fn ring_of(&self, hex: HexId) -> Option<usize> {
        self.ring_of.get(&hex).copied()
    }

    #[must_use]
    pub fn coast_distance(&self, vertex: VertexId) -> Option<CoastDistance> {
        self.coast.get(&vertex).copied()
    }

    #[must_use]
    pub fn has_open_coastline(&self) -> bool {
        self.loops.iter().any(|l| !l.closed)
    }
}

/// Снимает регион слоями. Кольцо 0 составляют гексы, у которых есть сосед вне
/// оставшегося множества.
pub fn border_rings(mesh: &HexMesh, region: &Region) -> Vec<Vec<HexId>> {
    let mut remaining: BTreeSet<HexId> = region.hexes().clone();
    let mut rings = Vec::new();

    while !remaining.is_empty() {
        let mut ring: Vec<HexId> = remaining
            .iter()
            .copied()
            .filter(|&h| mesh.hex(h).neighbour_ids().any(|n| !remaining.contains(&n)))
            .collect();
        if ring.is_empty() {
            // Регион без внешних соседей (весь мир): остаток становится одним кольцом
            ring = remaining.iter().copied().collect();
        }
        for hex in &ring {
            remaining.remove(hex);
        }
        rings.push(ring);
    }
    rings
}

/// Вершины периметра гексов кольца 0, принадлежащие хотя бы одному гексу вне региона.
pub fn border_vertices(mesh: &HexMesh, region: &Region, outer_ring: &[HexId]) -> BTreeSet<VertexId> {
    outer_ring
        .iter()
        .flat_map(|&h| mesh.hex(h).points)
        .filter(|&p| mesh.vertex(p).hexes.iter().any(|&owner| !region.contains(owner)))
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Winding {
    Forward,
    Backward,
}

/// Поворачивает вокруг вершины `point` гекса `hex`, пока ребро в сторону
/// обхода не станет береговым. `None` значит, что ребро лежит на краю мира (или все
/// гексы вокруг вершины в регионе).
fn settle_on_border_edge(
    mesh: &HexMesh,
    region: &Region,
    mut hex: HexId,
    mut point: usize,
    winding: Winding,
) -> Option<(HexId, usize)> {
    for _ in 0..3 {
        let edge = match winding {
            Winding::Forward => point,
            Winding::Backward => (point + 5) % 6,
        };
        match mesh.hex(hex).neighbours[edge] {
            None => return None,
            Some(next) if region.contains(next) => {
                point = shared_point_index(edge, point);
                hex = next;
            }
            Some(_) => return Some((hex, point)),
        }
    }
    None
}

/// Проходит по береговым рёбрам, пока не вернётся к `start`, не упрётся в
/// край мира или уже посещённую вершину. Возвращает пройденные вершины
/// (без `start`) и признак замкнутости.
fn trace(
    mesh: &HexMesh,
    region: &Region,
    start: VertexId,
    (mut hex, mut point): (HexId, usize),
    winding: Winding,
    visited: &mut HashSet<VertexId>,
    limit: usize,
) -> (Vec<VertexId>, bool) {
    let mut walked = Vec::new();
    while walked.len() <= limit {
        let Some((h, p)) = settle_on_border_edge(mesh, region, hex, point, winding) else {
            break;
        };
        let next_point = match winding {
            Winding::Forward => (p + 1) % 6,
            Winding::Backward => (p + 5) % 6,
        };
        let next = mesh.hex(h).points[next_point];
        if next == start {
            return (walked, true);
        }
        if !visited.insert(next) {
            break;
        }
        walked.push(next);
        hex = h;
        point = next_point;
    }
    (walked, false)
}

/// Упорядоченные контуры: по одному на каждый берег или внутреннее озеро.
pub fn boundary_loops(
    mesh: &HexMesh,
    region: &Region,
    border: &BTreeSet<VertexId>,
) -> Vec<BoundaryLoop> {
    let mut visited: HashSet<VertexId> = HashSet::with_capacity(border.len());
    let mut loops = Vec::new();

    for &start in border {
        if visited.contains(&start) {
            continue;
        }
        let Some((hex, point)) = mesh
            .vertex(start)
            .hexes
            .iter()
            .filter(|&&h| region.contains(h))
            .find_map(|&h| mesh.hex(h).point_index(start).map(|i| (h, i)))
        else {
            continue;
        };
        visited.insert(start);

        let (ahead, closed) = trace(
            mesh,
            region,
            start,
            (hex, point),
            Winding::Forward,
            &mut visited,
            border.len(),
        );
        let mut vertices = Vec::with_capacity(ahead.len() + 1);
        if !closed {
            // Открытый берег: дописываем участок позади старта
            let (mut behind, _) = trace(
                mesh,
                region,
                start,
                (hex, point),
                Winding::Backward,
                &mut visited,
                border.len(),
            );
            behind.reverse();
            vertices.extend(behind);
        }
        vertices.push(start);
        vertices.extend(ahead);
        loops.push(BoundaryLoop { vertices, closed });
    }
    loops
}

/// Для каждой вершины периметра гексов региона находит ближайшую береговую
/// вершину и максимальное расстояние по региону.
pub fn coast_distances(
    mesh: &HexMesh,
    region: &Region,
    border: &BTreeSet<VertexId>,
    method: CoastDistanceMethod,
) -> (HashMap<VertexId, CoastDistance>, f64) {
    let mut result = HashMap::new();
    if border.is_empty() {
        return (result, 0.0);
    }

    let points: BTreeSet<VertexId> = region.iter().flat_map(|h| mesh.hex(h).points).collect();

    let tree = match method {
        CoastDistanceMethod::KdTree => build_border_tree(mesh, border),
        CoastDistanceMethod::BruteForce => None,
    };
    let squared = |a: &[f64; 2], b: &[f64; 2]| {
        let dx = a[0] - b[0];
        let dy = a[1] - b[1];
        dx * dx + dy * dy
    };

    let mut largest: f64 = 0.0;
    for vertex in points {
        let position = mesh.vertex(vertex).position;
        let nearest = match &tree {
            Some(tree) => {
                let (_, item) = tree.nearest_one(&tree_coordinates(position), &squared);
                let nearest = VertexId(item as usize);
                // Расстояние по исходным координатам, без погрешности поворота
                CoastDistance {
                    nearest,
                    distance: position.distance(mesh.vertex(nearest).position),
                }
            }
            None => {
                // Строгое сравнение: при равенстве побеждает вершина с меньшим id
                let mut best = CoastDistance {
                    nearest: VertexId(usize::MAX),
                    distance: f64::INFINITY,
                };
                for &b in border {
                    let distance = position.distance(mesh.vertex(b).position);
                    if distance < best.distance {
                        best = CoastDistance {
                            nearest: b,
                            distance,
                        };
                    }
                }
                best
            }
        };
        largest = largest.max(nearest.distance);
        result.insert(vertex, nearest);
    }
    (result, largest)
}
