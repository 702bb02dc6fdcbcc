//! Гексагональная сетка с общими вершинами.
//!
//! Гексы и вершины хранятся в арене и адресуются стабильными индексами
//! [`HexId`] и [`VertexId`]; взаимные ссылки (владельцы вершины, соседи гекса,
//! направления стока) хранятся как индексы.

mod builder;

use std::fmt;

/// Индекс вершины в арене сетки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

/// Индекс гекса в арене сетки (row-major порядок построения)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexId(pub usize);

impl fmt::Display for HexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hex#{}", self.0)
    }
}

/// Точка в мировых координатах (ось Y направлена вверх)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_sq(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        self.distance_sq(other).sqrt()
    }

    /// Точка на отрезке от `self` к `other`: при `t = 0` это `self`, при `t = 1` это `other`.
    #[must_use]
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// Среднее арифметическое набора точек.
    #[must_use]
    pub fn mean(points: impl IntoIterator<Item = Point>) -> Point {
        let (sum, count) = points
            .into_iter()
            .fold((Point::default(), 0usize), |(acc, n), p| {
                (Point::new(acc.x + p.x, acc.y + p.y), n + 1)
            });
        if count == 0 {
            return sum;
        }
        Point::new(sum.x / count as f64, sum.y / count as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// Вершина периметра, общая для 1–3 гексов
    Perimeter,
    /// Центр ровно одного гекса
    Centre,
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: VertexId,
    pub position: Point,
    pub kind: VertexKind,
    /// Высота; `None`, пока не назначена
    pub altitude: Option<f64>,
    /// Гексы, которым принадлежит вершина
    pub hexes: Vec<HexId>,
    /// Вершины периметра, соединённые с этой одним ребром гекса
    pub neighbours: Vec<VertexId>,
    pub drains_to: Option<VertexId>,
    pub drained_by: Vec<VertexId>,
}

impl Vertex {
    fn new(id: VertexId, position: Point, kind: VertexKind) -> Self {
        Self {
            id,
            position,
            kind,
            altitude: None,
            hexes: Vec::with_capacity(3),
            neighbours: Vec::with_capacity(3),
            drains_to: None,
            drained_by: Vec::new(),
        }
    }

    fn add_hex(&mut self, hex: HexId) {
        if !self.hexes.contains(&hex) {
            self.hexes.push(hex);
        }
    }

    fn add_neighbour(&mut self, vertex: VertexId) {
        if vertex != self.id && !self.neighbours.contains(&vertex) {
            self.neighbours.push(vertex);
        }
    }
}

/// Позиция гекса в сетке со сдвигом нечётных рядов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexIndex {
    pub col: usize,
    pub row: usize,
}

/// Направление на соседа через ребро.
///
/// Ребро `d` соединяет вершины периметра `d` и `d + 1`
/// (периметр по часовой стрелке: N, NE, SE, S, SW, NW).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    NorthEast = 0,
    East = 1,
    SouthEast = 2,
    SouthWest = 3,
    West = 4,
    NorthWest = 5,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Direction {
        Self::ALL[index % 6]
    }

    #[must_use]
    pub const fn opposite(self) -> Direction {
        Self::from_index(self.index() + 3)
    }
}

/// Индекс той же вершины в соседе через ребро `edge`.
///
/// Для ребра `d`: наша вершина `d` совпадает с вершиной `d + 4` соседа,
/// наша вершина `d + 1` с его вершиной `d + 3`.
#[must_use]
pub(crate) const fn shared_point_index(edge: usize, point: usize) -> usize {
    if point % 6 == edge % 6 {
        (edge + 4) % 6
    } else {
        (edge + 3) % 6
    }
}

/// Куда стекает вода с гекса
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Нет соседа ниже самого гекса
    Sink,
    Into(HexId),
}

#[derive(Debug, Clone)]
pub struct Hex {
    pub id: HexId,
    pub index: HexIndex,
    pub points: [VertexId; 6],
    pub centre: VertexId,
    /// Соседи по направлениям [`Direction`]
    pub neighbours: [Option<HexId>; 6],
    /// Гекс на краю прямоугольника генерации
    pub on_world_edge: bool,
    pub land: bool,
    /// Направление стока; `None`, пока не вычислено (и всегда для воды)
    pub flow: Option<Flow>,
    pub drained_by: Vec<HexId>,
    /// Все гексы, транзитивно стекающие в этот, включая его самого
    pub upstream: Vec<HexId>,
    /// Собственная вода гекса
    pub received: f64,
    /// Вода, пришедшая от всех гексов выше по течению
    pub drained_quantity: f64,
    pub(crate) lowest_point: Option<VertexId>,
}

impl Hex {
    #[must_use]
    pub fn neighbour(&self, direction: Direction) -> Option<HexId> {
        self.neighbours[direction.index()]
    }

    pub fn neighbour_ids(&self) -> impl Iterator<Item = HexId> + '_ {
        self.neighbours.iter().flatten().copied()
    }

    /// Позиция вершины в периметре гекса
    #[must_use]
    pub fn point_index(&self, vertex: VertexId) -> Option<usize> {
        self.points.iter().position(|&p| p == vertex)
    }

    #[must_use]
    pub fn is_sink(&self) -> bool {
        self.flow == Some(Flow::Sink)
    }

    /// Полный объём воды, проходящий через гекс
    #[must_use]
    pub fn total_quantity(&self) -> f64 {
        self.received + self.drained_quantity
    }
}

#[derive(Debug, Clone)]
pub struct HexMesh {
    pub world_width: f64,
    pub world_height: f64,
    pub hexes_in_odd_row: usize,
    /// Радиус описанной окружности гекса (он же длина ребра)
    pub radius: f64,
    /// Ширина гекса между параллельными вертикальными рёбрами
    pub hex_width: f64,
    vertices: Vec<Vertex>,
    hexes: Vec<Hex>,
    row_starts: Vec<usize>,
}

impl HexMesh {
    #[must_use]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0]
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id.0]
    }

    #[must_use]
    pub fn hex(&self, id: HexId) -> &Hex {
        &self.hexes[id.0]
    }

    pub fn hex_mut(&mut self, id: HexId) -> &mut Hex {
        &mut self.hexes[id.0]
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[must_use]
    pub fn hexes(&self) -> &[Hex] {
        &self.hexes
    }

    pub fn hex_ids(&self) -> impl Iterator<Item = HexId> + use<> {
        (0..self.hexes.len()).map(HexId)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_starts.len()
    }

    /// Количество гексов в ряду: в чётных на один больше, чем в нечётных.
    #[must_use]
    pub fn row_len(&self, row: usize) -> usize {
        self.hexes_in_odd_row + 1 - row % 2
    }

    #[must_use]
    pub fn hex_at(&self, col: usize, row: usize) -> Option<HexId> {
        if row >= self.row_count() || col >= self.row_len(row) {
            return None;
        }
        Some(HexId(self.row_starts[row] + col))
    }

    #[must_use]
    pub fn centre_position(&self, hex: HexId) -> Point {
        self.vertex(self.hex(hex).centre).position
    }

    pub fn perimeter_positions(&self, hex: HexId) -> impl Iterator<Item = Point> + '_ {
        self.hex(hex).points.iter().map(|&p| self.vertex(p).position)
    }

    /// Касается ли вершина хотя бы одного водного гекса
    #[must_use]
    pub fn is_by_water(&self, vertex: VertexId) -> bool {
        self.vertex(vertex)
            .hexes
            .iter()
            .any(|&h| !self.hex(h).land)
    }

    /// Высота центра гекса.
    ///
    /// Вычисляется один раз как среднее шести вершин периметра и кэшируется
    /// в центральной вершине; `None`, если у периметра ещё нет высот.
    pub fn centre_altitude(&mut self, hex: HexId) -> Option<f64> {
        let centre = self.hex(hex).centre;
        if let Some(altitude) = self.vertex(centre).altitude {
            return Some(altitude);
        }
        let mut sum = 0.0;
        for &point in &self.hex(hex).points {
            sum += self.vertex(point).altitude?;
        }
        let altitude = sum / 6.0;
        self.vertex_mut(centre).altitude = Some(altitude);
        Some(altitude)
    }

    /// Вершины, оставшиеся за пределами мира (после обрезки должно быть пусто).
    #[must_use]
    pub fn out_of_bounds_vertices(&self) -> Vec<VertexId> {
        self.vertices
            .iter()
            .filter(|v| {
                let p = v.position;
                p.x < 0.0 || p.x > self.world_width || p.y < 0.0 || p.y > self.world_height
            })
            .map(|v| v.id)
            .collect()
    }
}
