// src/spatial.rs
//! Равномерная сетка корзин для поиска ближайших вершин.
//!
//! Запрос просматривает только окрестность 3×3 корзины запроса. Если
//! настоящая ближайшая вершина лежит дальше (разреженные или неровно
//! заполненные корзины), возвращается худший ответ. Это известное
//! приближение, а не ошибка.

use std::collections::HashSet;

use crate::error::{MapgenError, Result};
use crate::mesh::{HexId, HexMesh, Point, VertexId, VertexKind};

/// Ближайшая найденная вершина и квадрат расстояния до неё
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexHit {
    pub vertex: VertexId,
    pub distance_sq: f64,
}

/// Результат раздельного поиска по вершинам периметра и центрам
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NearestVertices {
    pub perimeter: Option<VertexHit>,
    pub centre: Option<VertexHit>,
}

/// Ближайшая вершина вместе с гексом, которому она принадлежит
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexHit {
    pub hex: HexId,
    pub vertex: VertexId,
    pub distance_sq: f64,
}

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cells_along_edge: usize,
    min: Point,
    max: Point,
    buckets: Vec<Vec<VertexId>>,
    inserted: HashSet<VertexId>,
}

impl SpatialIndex {
    pub fn new(cells_along_edge: usize, min: Point, max: Point) -> Result<Self> {
        if cells_along_edge == 0 {
            return Err(MapgenError::invalid(
                "mesh.index_cells_along_edge",
                "must be positive",
            ));
        }
        Ok(Self {
            cells_along_edge,
            min,
            max,
            buckets: vec![Vec::new(); cells_along_edge * cells_along_edge],
            inserted: HashSet::new(),
        })
    }

    /// Индекс по всем вершинам сетки в границах, охватывающих их все.
    pub fn from_mesh(mesh: &HexMesh, cells_along_edge: usize) -> Result<Self> {
        let (min, max) = mesh.vertices().iter().fold(
            (
                Point::new(f64::INFINITY, f64::INFINITY),
                Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            ),
            |(lo, hi), v| {
                (
                    Point::new(lo.x.min(v.position.x), lo.y.min(v.position.y)),
                    Point::new(hi.x.max(v.position.x), hi.y.max(v.position.y)),
                )
            },
        );
        let mut index = Self::new(cells_along_edge, min, max)?;
        for vertex in mesh.vertices() {
            index.insert(vertex.id, vertex.position);
        }
        tracing::debug!(
            vertices = index.len(),
            cells_along_edge,
            "spatial index built"
        );
        Ok(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inserted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
    }

    fn axis_cell(&self, value: f64, lo: f64, hi: f64) -> usize {
        let last = self.cells_along_edge - 1;
        let span = hi - lo;
        if span.is_nan() || span <= 0.0 {
            return 0;
        }
        let cell = ((value - lo) / span * self.cells_along_edge as f64).floor();
        if cell <= 0.0 {
            0
        } else {
            (cell as usize).min(last)
        }
    }

    /// Корзина (колонка, ряд) для точки; точки на границе и за ней попадают в крайние корзины.
    #[must_use]
    pub fn cell_of(&self, point: Point) -> (usize, usize) {
        (
            self.axis_cell(point.x, self.min.x, self.max.x),
            self.axis_cell(point.y, self.min.y, self.max.y),
        )
    }

    /// Добавляет вершину; повторная вставка того же id игнорируется.
    pub fn insert(&mut self, vertex: VertexId, position: Point) -> bool {
        if !self.inserted.insert(vertex) {
            return false;
        }
        let (col, row) = self.cell_of(position);
        self.buckets[row * self.cells_along_edge + col].push(vertex);
        true
    }

    fn neighbourhood(&self, point: Point) -> impl Iterator<Item = VertexId> + '_ {
        let (col, row) = self.cell_of(point);
        let last = self.cells_along_edge - 1;
        let rows = row.saturating_sub(1)..=(row + 1).min(last);
        rows.flat_map(move |r| {
            let cols = col.saturating_sub(1)..=(col + 1).min(last);
            cols.flat_map(move |c| self.buckets[r * self.cells_along_edge + c].iter().copied())
        })
    }

    /// Ближайшие вершина периметра и центр в окрестности 3×3.
    #[must_use]
    pub fn nearest_vertices(&self, mesh: &HexMesh, point: Point) -> NearestVertices {
        let mut result = NearestVertices::default();
        for id in self.neighbourhood(point) {
            let vertex = mesh.vertex(id);
            let hit = VertexHit {
                vertex: id,
                distance_sq: vertex.position.distance_sq(point),
            };
            let slot = match vertex.kind {
                VertexKind::Perimeter => &mut result.perimeter,
                VertexKind::Centre => &mut result.centre,
            };
            if slot.is_none_or(|best| hit.distance_sq < best.distance_sq) {
                *slot = Some(hit);
            }
        }
        result
    }

    /// Ближайшая из двух вершин вместе с её гексом.
    ///
    /// Для центра это его единственный гекс; для вершины периметра
    /// тот из владельцев, чей центр ближе к точке запроса.
    #[must_use]
    pub fn nearest_hex(&self, mesh: &HexMesh, point: Point) -> Option<HexHit> {
        let NearestVertices { perimeter, centre } = self.nearest_vertices(mesh, point);
        let best = match (perimeter, centre) {
            (Some(p), Some(c)) => {
                if p.distance_sq < c.distance_sq {
                    p
                } else {
                    c
                }
            }
            (Some(hit), None) | (None, Some(hit)) => hit,
            (None, None) => return None,
        };
        let hex = mesh
            .vertex(best.vertex)
            .hexes
            .iter()
            .copied()
            .min_by(|&a, &b| {
                let da = mesh.centre_position(a).distance_sq(point);
                let db = mesh.centre_position(b).distance_sq(point);
                da.total_cmp(&db)
            })?;
        Some(HexHit {
            hex,
            vertex: best.vertex,
            distance_sq: best.distance_sq,
        })
    }
}
