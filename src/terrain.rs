// src/terrain.rs
//! Высоты суши по расстоянию до берега.
//!
//! Высота вершины растёт круто и вогнуто от почти нуля у берега к
//! максимуму в глубине суши, затем модулируется когерентным шумом.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

use crate::config::TerrainSettings;
use crate::mesh::HexMesh;
use crate::region::{Region, RegionTopology};

/// Источник когерентного двумерного шума в диапазоне примерно [-1, 1].
///
/// Должен быть детерминированным для одинаковых координат.
pub trait NoiseSource {
    fn sample(&self, x: f64, y: f64) -> f64;
}

impl<F> NoiseSource for F
where
    F: Fn(f64, f64) -> f64,
{
    fn sample(&self, x: f64, y: f64) -> f64 {
        self(x, y)
    }
}

/// Фрактальный OpenSimplex2-шум
pub struct SimplexNoise {
    noise: FastNoiseLite,
}

impl SimplexNoise {
    #[must_use]
    pub fn new(seed: u64, frequency: f32, octaves: i32) -> Self {
        let mut noise = FastNoiseLite::new();
        noise.set_seed(Some(seed as i32));
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(octaves));
        noise.set_frequency(Some(frequency));
        Self { noise }
    }

    #[must_use]
    pub fn for_terrain(seed: u64, settings: &TerrainSettings) -> Self {
        Self::new(seed, settings.noise_frequency, settings.noise_octaves)
    }
}

impl NoiseSource for SimplexNoise {
    fn sample(&self, x: f64, y: f64) -> f64 {
        f64::from(self.noise.get_noise_2d(x as f32, y as f32))
    }
}

/// Высота вершины на расстоянии `distance` от берега при максимуме `largest`.
///
/// При `largest == 0` высота определена как 0.
#[must_use]
pub fn coastal_altitude(
    distance: f64,
    largest: f64,
    noise: f64,
    settings: &TerrainSettings,
) -> f64 {
    if largest.is_nan() || largest <= 0.0 {
        return 0.0;
    }
    let base = (distance / largest).powf(settings.altitude_exponent);
    let factor = noise * settings.noise_scale + settings.noise_offset;
    base * factor + settings.minimum_altitude
}

/// Назначает высоты вершинам суши региона, у которых её ещё нет,
/// затем кэширует высоты центров. Возвращает число назначенных вершин.
pub fn assign_region_altitudes(
    mesh: &mut HexMesh,
    region: &Region,
    topology: &RegionTopology,
    noise: &dyn NoiseSource,
    settings: &TerrainSettings,
) -> usize {
    let largest = topology.largest_border_distance;
    let mut assigned = 0;

    for hex in region.iter() {
        if !mesh.hex(hex).land {
            continue;
        }
        let points = mesh.hex(hex).points;
        for point in points {
            if mesh.vertex(point).altitude.is_some() {
                continue;
            }
            let position = mesh.vertex(point).position;
            let distance = topology.coast_distance(point).map_or(0.0, |c| c.distance);
            let sample = noise.sample(position.x.round(), position.y.round());
            mesh.vertex_mut(point).altitude =
                Some(coastal_altitude(distance, largest, sample, settings));
            assigned += 1;
        }
    }

    for hex in region.iter() {
        if mesh.hex(hex).land {
            mesh.centre_altitude(hex);
        }
    }

    tracing::debug!(
        hexes = region.len(),
        assigned,
        largest_border_distance = largest,
        "region altitudes assigned"
    );
    assigned
}
