// src/config.rs
//! Конфигурация генерации мира
//!
//! Этот модуль определяет все параметры, управляющие процедурной генерацией:
//! - Размеры мира и плотность гексагональной сетки
//! - Параметры высот (экспонента, шум, базовый уровень)
//! - Классификация суши (маска или шум)
//! - Параметры стока, бассейнов и рек
//!
//! Все структуры поддерживают загрузку из TOML для удобной настройки через конфигурационные файлы.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MapgenError, Result};

/// Способ поиска ближайшей береговой вершины
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum CoastDistanceMethod {
    /// Полный перебор всех береговых вершин: O(V·B)
    BruteForce,
    /// k-d дерево по береговым вершинам: O(V log B)
    #[default]
    KdTree,
}

/// Параметры гексагональной сетки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeshSettings {
    /// Количество гексов в нечётном ряду (в чётном на один больше).
    /// Определяет радиус гекса: `width / hexes_in_odd_row / sqrt(3)`.
    #[serde(default = "default_hexes_in_odd_row")]
    pub hexes_in_odd_row: usize,

    /// Сила случайного смещения вершин в долях радиуса (0.0 = правильная сетка)
    #[serde(default = "default_jitter_strength")]
    pub jitter_strength: f64,

    /// Прижимать ли вершины краевых гексов к границам мира
    #[serde(default = "default_clip_to_world")]
    pub clip_to_world: bool,

    /// Число ячеек пространственного индекса вдоль каждой оси
    #[serde(default = "default_index_cells_along_edge")]
    pub index_cells_along_edge: usize,
}

fn default_hexes_in_odd_row() -> usize {
    10
}
fn default_jitter_strength() -> f64 {
    0.2
}
fn default_clip_to_world() -> bool {
    true
}
fn default_index_cells_along_edge() -> usize {
    16
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            hexes_in_odd_row: 10,
            jitter_strength: 0.2,
            clip_to_world: true,
            index_cells_along_edge: 16,
        }
    }
}

/// Настройки рельефа
///
/// Высота вершины: `((d / D) ^ altitude_exponent) * (noise * noise_scale + noise_offset) + minimum_altitude`,
/// где `d` это расстояние до берега, `D` это максимальное такое расстояние в регионе.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerrainSettings {
    /// Экспонента роста высоты от берега вглубь суши (разумно 3.5–5.5)
    #[serde(default = "default_altitude_exponent")]
    pub altitude_exponent: f64,

    /// Неотрицательная добавка ко всем высотам суши
    #[serde(default = "default_minimum_altitude")]
    pub minimum_altitude: f64,

    /// Множитель шума в шумовом коэффициенте
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f64,

    /// Центр полосы шумового коэффициента (около 1.0)
    #[serde(default = "default_noise_offset")]
    pub noise_offset: f64,

    /// Частота когерентного шума
    #[serde(default = "default_noise_frequency")]
    pub noise_frequency: f32,

    /// Количество октав фрактального шума
    #[serde(default = "default_noise_octaves")]
    pub noise_octaves: i32,

    /// Способ поиска ближайшей береговой вершины
    #[serde(default)]
    pub coast_distance: CoastDistanceMethod,
}

fn default_altitude_exponent() -> f64 {
    3.5
}
fn default_minimum_altitude() -> f64 {
    0.1
}
fn default_noise_scale() -> f64 {
    0.5
}
fn default_noise_offset() -> f64 {
    0.75
}
fn default_noise_frequency() -> f32 {
    1.0 / 32.0
}
fn default_noise_octaves() -> i32 {
    4
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            altitude_exponent: 3.5,
            minimum_altitude: 0.1,
            noise_scale: 0.5,
            noise_offset: 0.75,
            noise_frequency: 1.0 / 32.0,
            noise_octaves: 4,
            coast_distance: CoastDistanceMethod::KdTree,
        }
    }
}

/// Настройки классификации суши
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LandSettings {
    /// Путь к маске суши (оттенки серого, светлое = суша).
    /// Без маски суша строится по шуму.
    #[serde(default)]
    pub mask: Option<PathBuf>,

    /// Доля точек гекса, которые должны попасть на сушу
    #[serde(default = "default_pass_rate")]
    pub pass_rate: f64,

    /// Стягивание точек периметра к центру перед выборкой (0.0 = без стягивания)
    #[serde(default = "default_attenuation")]
    pub attenuation: f64,

    /// Порог шума для классификации без маски (0.0..1.0)
    #[serde(default = "default_noise_threshold")]
    pub noise_threshold: f64,

    /// Сила затухания суши к краям мира для классификации без маски
    #[serde(default = "default_edge_falloff")]
    pub edge_falloff: f64,
}

fn default_pass_rate() -> f64 {
    0.5
}
fn default_attenuation() -> f64 {
    0.2
}
fn default_noise_threshold() -> f64 {
    0.45
}
fn default_edge_falloff() -> f64 {
    0.6
}

impl Default for LandSettings {
    fn default() -> Self {
        Self {
            mask: None,
            pass_rate: 0.5,
            attenuation: 0.2,
            noise_threshold: 0.45,
            edge_falloff: 0.6,
        }
    }
}

/// Настройки стока
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrainageSettings {
    /// Количество воды, получаемое каждым гексом суши
    #[serde(default = "default_rainfall")]
    pub rainfall: f64,

    /// Минимальный объём стока, при котором сток/устье образует бассейн
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: f64,

    /// Высота центров водных гексов
    #[serde(default = "default_sea_level")]
    pub sea_level: f64,
}

fn default_rainfall() -> f64 {
    1.0
}
fn default_volume_threshold() -> f64 {
    5.0
}
fn default_sea_level() -> f64 {
    0.0
}

impl Default for DrainageSettings {
    fn default() -> Self {
        Self {
            rainfall: 1.0,
            volume_threshold: 5.0,
            sea_level: 0.0,
        }
    }
}

/// Настройки отбора рек
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiverSettings {
    /// Минимальная длина маршрута реки в гексах
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Доля (в процентах) самых длинных рек, которые попадут на карту
    #[serde(default = "default_acceptance_percentage")]
    pub acceptance_percentage: f64,
}

fn default_min_length() -> usize {
    3
}
fn default_acceptance_percentage() -> f64 {
    50.0
}

impl Default for RiverSettings {
    fn default() -> Self {
        Self {
            min_length: 3,
            acceptance_percentage: 50.0,
        }
    }
}

/// Основные параметры генерации мира
///
/// Полная конфигурация для генерации одного мира. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldGenerationParams {
    /// Сид генератора случайных чисел (детерминированная генерация)
    pub seed: u64,

    /// Ширина мира в пикселях (по умолчанию 800)
    #[serde(default = "default_width")]
    pub width: f64,

    /// Высота мира в пикселях (по умолчанию 600)
    #[serde(default = "default_height")]
    pub height: f64,

    #[serde(default)]
    pub mesh: MeshSettings,

    #[serde(default)]
    pub terrain: TerrainSettings,

    #[serde(default)]
    pub land: LandSettings,

    #[serde(default)]
    pub drainage: DrainageSettings,

    #[serde(default)]
    pub rivers: RiverSettings,
}

fn default_width() -> f64 {
    800.0
}
fn default_height() -> f64 {
    600.0
}

impl Default for WorldGenerationParams {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 800.0,
            height: 600.0,
            mesh: MeshSettings::default(),
            terrain: TerrainSettings::default(),
            land: LandSettings::default(),
            drainage: DrainageSettings::default(),
            rivers: RiverSettings::default(),
        }
    }
}

impl WorldGenerationParams {
    /// Загружает параметры из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # world.toml
    /// seed = 42
    /// width = 1024
    /// height = 768
    ///
    /// [mesh]
    /// hexes_in_odd_row = 40
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| MapgenError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let params: Self = toml::from_str(contents)?;
        params.validate()?;
        Ok(params)
    }

    /// Проверяет параметры до начала генерации.
    pub fn validate(&self) -> Result<()> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(MapgenError::invalid("width", "must be a positive number"));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(MapgenError::invalid("height", "must be a positive number"));
        }
        if self.mesh.hexes_in_odd_row == 0 {
            return Err(MapgenError::invalid(
                "mesh.hexes_in_odd_row",
                "at least one hex per row is required",
            ));
        }
        if !(0.0..0.5).contains(&self.mesh.jitter_strength) {
            return Err(MapgenError::invalid(
                "mesh.jitter_strength",
                "must lie within [0, 0.5)",
            ));
        }
        if self.mesh.index_cells_along_edge == 0 {
            return Err(MapgenError::invalid(
                "mesh.index_cells_along_edge",
                "must be positive",
            ));
        }
        if self.terrain.altitude_exponent.is_nan() || self.terrain.altitude_exponent <= 0.0 {
            return Err(MapgenError::invalid(
                "terrain.altitude_exponent",
                "must be positive",
            ));
        }
        if !(3.5..=5.5).contains(&self.terrain.altitude_exponent) {
            tracing::warn!(
                exponent = self.terrain.altitude_exponent,
                "altitude exponent outside the usual 3.5..=5.5 band"
            );
        }
        if !(0.0..).contains(&self.terrain.minimum_altitude) {
            return Err(MapgenError::invalid(
                "terrain.minimum_altitude",
                "must be non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.land.pass_rate) {
            return Err(MapgenError::invalid("land.pass_rate", "must lie within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.land.attenuation) {
            return Err(MapgenError::invalid(
                "land.attenuation",
                "must lie within [0, 1]",
            ));
        }
        if !(0.0..).contains(&self.drainage.rainfall) {
            return Err(MapgenError::invalid(
                "drainage.rainfall",
                "must be non-negative",
            ));
        }
        if !(0.0..=100.0).contains(&self.rivers.acceptance_percentage) {
            return Err(MapgenError::invalid(
                "rivers.acceptance_percentage",
                "must lie within [0, 100]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let params = WorldGenerationParams::from_toml_str("seed = 7").unwrap();
        assert_eq!(params.seed, 7);
        assert_eq!(params.mesh, MeshSettings::default());
        assert_eq!(params.terrain, TerrainSettings::default());
        assert_eq!(params.rivers, RiverSettings::default());
    }

    #[test]
    fn nested_sections_override_defaults() {
        let params = WorldGenerationParams::from_toml_str(
            r#"
            seed = 1
            width = 400
            height = 300

            [mesh]
            hexes_in_odd_row = 25
            jitter_strength = 0.0

            [terrain]
            altitude_exponent = 5.0
            coast_distance = "BruteForce"

            [rivers]
            acceptance_percentage = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(params.mesh.hexes_in_odd_row, 25);
        assert_eq!(params.mesh.jitter_strength, 0.0);
        assert_eq!(params.terrain.coast_distance, CoastDistanceMethod::BruteForce);
        assert_eq!(params.terrain.altitude_exponent, 5.0);
        assert_eq!(params.rivers.acceptance_percentage, 20.0);
        assert_eq!(params.rivers.min_length, 3);
    }

    #[test]
    fn zero_hexes_per_row_is_rejected() {
        let err = WorldGenerationParams::from_toml_str("seed = 1\n[mesh]\nhexes_in_odd_row = 0")
            .unwrap_err();
        assert!(matches!(
            err,
            MapgenError::InvalidParameter {
                name: "mesh.hexes_in_odd_row",
                ..
            }
        ));
    }

    #[test]
    fn negative_world_size_is_rejected() {
        let params = WorldGenerationParams {
            height: -1.0,
            ..WorldGenerationParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn missing_seed_is_a_parse_error() {
        let err = WorldGenerationParams::from_toml_str("width = 10").unwrap_err();
        assert!(matches!(err, MapgenError::ParseConfig(_)));
    }
}
