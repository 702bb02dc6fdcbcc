//! Построение сетки гекс за гексом.
//!
//! Гексы строятся по рядам снизу вверх, слева направо. Новый гекс забирает
//! вершины у уже построенных западного, юго-западного и юго-восточного
//! соседей, поэтому каждая внутренняя вершина существует ровно в одном
//! экземпляре.

use rand::Rng;

use super::{
    Direction, Hex, HexId, HexIndex, HexMesh, Point, Vertex, VertexId, VertexKind,
    shared_point_index,
};
use crate::config::MeshSettings;
use crate::error::{MapgenError, Result};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Смещения вершин правильного гекса от центра: N, NE, SE, S, SW, NW.
fn regular_offsets(radius: f64) -> [Point; 6] {
    let half_width = SQRT_3 * radius / 2.0;
    [
        Point::new(0.0, radius),
        Point::new(half_width, radius / 2.0),
        Point::new(half_width, -radius / 2.0),
        Point::new(0.0, -radius),
        Point::new(-half_width, -radius / 2.0),
        Point::new(-half_width, radius / 2.0),
    ]
}

impl HexMesh {
    /// Строит сетку, покрывающую прямоугольник `width × height`.
    pub fn build<R: Rng + ?Sized>(
        width: f64,
        height: f64,
        settings: &MeshSettings,
        rng: &mut R,
    ) -> Result<Self> {
        if settings.hexes_in_odd_row == 0 {
            return Err(MapgenError::invalid(
                "mesh.hexes_in_odd_row",
                "at least one hex per row is required",
            ));
        }
        if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
            return Err(MapgenError::invalid(
                "world size",
                format!("{width}×{height} is not a positive area"),
            ));
        }

        let hex_width = width / settings.hexes_in_odd_row as f64;
        let radius = hex_width / SQRT_3;

        let mut rows = 0;
        while rows as f64 * radius * 1.5 - radius < height {
            rows += 1;
        }

        let mut mesh = HexMesh {
            world_width: width,
            world_height: height,
            hexes_in_odd_row: settings.hexes_in_odd_row,
            radius,
            hex_width,
            vertices: Vec::new(),
            hexes: Vec::new(),
            row_starts: Vec::with_capacity(rows),
        };

        let offsets = regular_offsets(radius);
        for row in 0..rows {
            mesh.row_starts.push(mesh.hexes.len());
            let y = row as f64 * radius * 1.5;
            let x0 = if row % 2 == 1 { hex_width / 2.0 } else { 0.0 };
            let count = mesh.row_len(row);
            for col in 0..count {
                let centre = Point::new(x0 + col as f64 * hex_width, y);
                let on_edge = row == 0 || row + 1 == rows || col == 0 || col + 1 == count;
                let jitter = if on_edge { 0.0 } else { radius * settings.jitter_strength };
                mesh.add_hex(HexIndex { col, row }, centre, &offsets, on_edge, jitter, rng);
            }
        }

        if settings.clip_to_world {
            mesh.clip_to_world();
        }

        tracing::debug!(
            rows,
            hexes = mesh.hexes.len(),
            vertices = mesh.vertices.len(),
            radius,
            "hex mesh built"
        );
        Ok(mesh)
    }

    /// Уже построенные соседи: запад, юго-запад, юго-восток.
    fn built_neighbours(&self, index: HexIndex) -> [(Direction, Option<HexId>); 3] {
        let HexIndex { col, row } = index;
        let west = col.checked_sub(1).and_then(|c| self.hex_at(c, row));
        let (south_west, south_east) = match row.checked_sub(1) {
            None => (None, None),
            // Нечётный ряд сдвинут вправо: под ним колонки col и col + 1
            Some(below) if row % 2 == 1 => (self.hex_at(col, below), self.hex_at(col + 1, below)),
            Some(below) => (
                col.checked_sub(1).and_then(|c| self.hex_at(c, below)),
                self.hex_at(col, below),
            ),
        };
        [
            (Direction::West, west),
            (Direction::SouthWest, south_west),
            (Direction::SouthEast, south_east),
        ]
    }

    fn new_vertex(&mut self, position: Point, kind: VertexKind) -> VertexId {
        let id = VertexId(self.vertices.len());
        self.vertices.push(Vertex::new(id, position, kind));
        id
    }

    fn add_hex<R: Rng + ?Sized>(
        &mut self,
        index: HexIndex,
        centre: Point,
        offsets: &[Point; 6],
        on_edge: bool,
        jitter: f64,
        rng: &mut R,
    ) {
        let id = HexId(self.hexes.len());
        let neighbours = self.built_neighbours(index);

        let mut points: [Option<VertexId>; 6] = [None; 6];
        for &(direction, neighbour) in &neighbours {
            let Some(neighbour) = neighbour else { continue };
            let edge = direction.index();
            for point in [edge, (edge + 1) % 6] {
                let shared = self.hex(neighbour).points[shared_point_index(edge, point)];
                debug_assert!(
                    points[point].is_none_or(|p| p == shared),
                    "neighbours disagree about a shared vertex"
                );
                points[point] = Some(shared);
            }
        }

        let mut perimeter = [VertexId(0); 6];
        for (i, slot) in points.iter().enumerate() {
            perimeter[i] = match slot {
                Some(existing) => *existing,
                None => {
                    let mut position =
                        Point::new(centre.x + offsets[i].x, centre.y + offsets[i].y);
                    if jitter > 0.0 {
                        position.x += rng.gen_range(-jitter..=jitter);
                        position.y += rng.gen_range(-jitter..=jitter);
                    }
                    self.new_vertex(position, VertexKind::Perimeter)
                }
            };
        }

        let centre_position = Point::mean(perimeter.iter().map(|&p| self.vertex(p).position));
        let centre_vertex = self.new_vertex(centre_position, VertexKind::Centre);
        self.vertex_mut(centre_vertex).add_hex(id);

        for i in 0..6 {
            let a = perimeter[i];
            let b = perimeter[(i + 1) % 6];
            self.vertex_mut(a).add_hex(id);
            self.vertex_mut(a).add_neighbour(b);
            self.vertex_mut(b).add_neighbour(a);
        }

        let mut hex_neighbours = [None; 6];
        for &(direction, neighbour) in &neighbours {
            let Some(neighbour) = neighbour else { continue };
            hex_neighbours[direction.index()] = Some(neighbour);
            self.hex_mut(neighbour).neighbours[direction.opposite().index()] = Some(id);
        }

        self.hexes.push(Hex {
            id,
            index,
            points: perimeter,
            centre: centre_vertex,
            neighbours: hex_neighbours,
            on_world_edge: on_edge,
            land: false,
            flow: None,
            drained_by: Vec::new(),
            upstream: Vec::new(),
            received: 0.0,
            drained_quantity: 0.0,
            lowest_point: None,
        });
    }

    /// Прижимает вершины краевых гексов к границам мира и пересчитывает
    /// центры затронутых гексов.
    fn clip_to_world(&mut self) {
        let (width, height) = (self.world_width, self.world_height);
        let mut touched: Vec<HexId> = Vec::new();
        let edge_hexes: Vec<HexId> = self
            .hexes
            .iter()
            .filter(|h| h.on_world_edge)
            .map(|h| h.id)
            .collect();

        for hex in edge_hexes {
            let points = self.hex(hex).points;
            for point in points {
                let vertex = self.vertex_mut(point);
                let clipped = Point::new(
                    vertex.position.x.clamp(0.0, width),
                    vertex.position.y.clamp(0.0, height),
                );
                if clipped != vertex.position {
                    vertex.position = clipped;
                    touched.extend(vertex.hexes.iter().copied());
                }
            }
        }

        touched.sort_unstable();
        touched.dedup();
        for hex in touched {
            let centre = Point::mean(self.perimeter_positions(hex));
            let centre_vertex = self.hex(hex).centre;
            self.vertex_mut(centre_vertex).position = centre;
        }
    }
}
