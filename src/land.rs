// src/land.rs
//! Разметка гексов на сушу и воду.

use std::path::Path;

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use image::GrayImage;

use crate::config::LandSettings;
use crate::error::Result;
use crate::mesh::{HexId, HexMesh, Point};

/// Решает, является ли гекс сушей.
pub trait LandClassifier {
    fn is_land(&self, mesh: &HexMesh, hex: HexId) -> bool;
}

/// Проставляет флаг `land` всем гексам. Возвращает число гексов суши.
pub fn classify_hexes(mesh: &mut HexMesh, classifier: &dyn LandClassifier) -> usize {
    let mut land = 0;
    for hex in mesh.hex_ids() {
        let is_land = classifier.is_land(mesh, hex);
        mesh.hex_mut(hex).land = is_land;
        land += usize::from(is_land);
    }
    tracing::debug!(land, total = mesh.hexes().len(), "hexes classified");
    land
}

/// Точки, по которым голосует гекс: периметр, стянутый к центру, и сам центр.
fn sample_points(mesh: &HexMesh, hex: HexId, attenuation: f64) -> impl Iterator<Item = Point> + '_ {
    let centre = mesh.centre_position(hex);
    mesh.perimeter_positions(hex)
        .map(move |p| p.lerp(centre, attenuation))
        .chain(std::iter::once(centre))
}

/// Суша по растровой маске: светлые пиксели считаются сушей.
///
/// Мир растягивается на всё изображение; ось Y мира направлена вверх,
/// а строки изображения идут сверху вниз.
pub struct MaskClassifier {
    mask: GrayImage,
    pass_rate: f64,
    attenuation: f64,
}

impl MaskClassifier {
    #[must_use]
    pub fn new(mask: GrayImage, settings: &LandSettings) -> Self {
        Self {
            mask,
            pass_rate: settings.pass_rate,
            attenuation: settings.attenuation,
        }
    }

    pub fn from_path(path: impl AsRef<Path>, settings: &LandSettings) -> Result<Self> {
        let mask = image::open(path.as_ref())?.to_luma8();
        tracing::info!(
            path = %path.as_ref().display(),
            width = mask.width(),
            height = mask.height(),
            "land mask loaded"
        );
        Ok(Self::new(mask, settings))
    }

    fn pixel_is_land(&self, mesh: &HexMesh, point: Point) -> bool {
        let (w, h) = self.mask.dimensions();
        if w == 0 || h == 0 {
            return false;
        }
        let u = (point.x / mesh.world_width).clamp(0.0, 1.0);
        let v = (1.0 - point.y / mesh.world_height).clamp(0.0, 1.0);
        let x = ((u * f64::from(w)) as u32).min(w - 1);
        let y = ((v * f64::from(h)) as u32).min(h - 1);
        self.mask.get_pixel(x, y)[0] > 127
    }
}

impl LandClassifier for MaskClassifier {
    fn is_land(&self, mesh: &HexMesh, hex: HexId) -> bool {
        let mut total = 0usize;
        let mut on_land = 0usize;
        for point in sample_points(mesh, hex, self.attenuation) {
            total += 1;
            on_land += usize::from(self.pixel_is_land(mesh, point));
        }
        on_land as f64 / total as f64 >= self.pass_rate
    }
}

/// Суша по шуму с затуханием к краям мира.
pub struct NoiseLandClassifier {
    noise: FastNoiseLite,
    threshold: f64,
    edge_falloff: f64,
}

impl NoiseLandClassifier {
    #[must_use]
    pub fn new(seed: u64, world_width: f64, world_height: f64, settings: &LandSettings) -> Self {
        let mut noise = FastNoiseLite::new();
        noise.set_seed(Some(seed.wrapping_add(1_000_000) as i32));
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(4));
        // Несколько материков на мир независимо от его размера
        noise.set_frequency(Some((3.0 / world_width.max(world_height)) as f32));
        Self {
            noise,
            threshold: settings.noise_threshold,
            edge_falloff: settings.edge_falloff,
        }
    }

    /// Значение «сушности» в точке; выше порога значит суша.
    #[must_use]
    pub fn elevation(&self, mesh: &HexMesh, point: Point) -> f64 {
        let raw = f64::from(self.noise.get_noise_2d(point.x as f32, point.y as f32));
        let nx = point.x / mesh.world_width * 2.0 - 1.0;
        let ny = point.y / mesh.world_height * 2.0 - 1.0;
        let edge = nx.abs().max(ny.abs()).min(1.0);
        (raw + 1.0) / 2.0 - self.edge_falloff * edge * edge
    }
}

impl LandClassifier for NoiseLandClassifier {
    fn is_land(&self, mesh: &HexMesh, hex: HexId) -> bool {
        self.elevation(mesh, mesh.centre_position(hex)) > self.threshold
    }
}

impl<F> LandClassifier for F
where
    F: Fn(&HexMesh, HexId) -> bool,
{
    fn is_land(&self, mesh: &HexMesh, hex: HexId) -> bool {
        self(mesh, hex)
    }
}

#[cfg(test)]
mod tests {
    use image::Luma;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::config::MeshSettings;

    fn mesh() -> HexMesh {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let settings = MeshSettings {
            hexes_in_odd_row: 10,
            ..MeshSettings::default()
        };
        HexMesh::build(200.0, 200.0, &settings, &mut rng).unwrap()
    }

    #[test]
    fn white_mask_is_all_land_and_black_is_all_water() {
        let mut mesh = mesh();
        let white = MaskClassifier::new(
            GrayImage::from_pixel(16, 16, Luma([255])),
            &LandSettings::default(),
        );
        assert_eq!(classify_hexes(&mut mesh, &white), mesh.hexes().len());

        let black = MaskClassifier::new(
            GrayImage::from_pixel(16, 16, Luma([0])),
            &LandSettings::default(),
        );
        assert_eq!(classify_hexes(&mut mesh, &black), 0);
        assert!(mesh.hexes().iter().all(|h| !h.land));
    }

    #[test]
    fn top_half_of_image_maps_to_upper_world() {
        let mut mesh = mesh();
        // Верхние строки изображения светлые
        let mask = GrayImage::from_fn(20, 20, |_, y| if y < 10 { Luma([255]) } else { Luma([0]) });
        let classifier = MaskClassifier::new(mask, &LandSettings::default());
        classify_hexes(&mut mesh, &classifier);

        for hex in mesh.hexes() {
            let y = mesh.centre_position(hex.id).y;
            if y > 130.0 {
                assert!(hex.land, "{} at y={y} should be land", hex.id);
            }
            if y < 70.0 {
                assert!(!hex.land, "{} at y={y} should be water", hex.id);
            }
        }
    }

    #[test]
    fn pass_rate_controls_partial_hexes() {
        let mesh = mesh();
        let hex = mesh.hex_at(4, 4).unwrap();
        let centre = mesh.centre_position(hex);
        // Маска: суша только правее центра гекса
        let split = (centre.x / mesh.world_width * 200.0) as u32;
        let mask = GrayImage::from_fn(200, 200, |x, _| if x > split { Luma([255]) } else { Luma([0]) });

        let strict = MaskClassifier::new(
            mask.clone(),
            &LandSettings {
                pass_rate: 1.0,
                ..LandSettings::default()
            },
        );
        let lenient = MaskClassifier::new(
            mask,
            &LandSettings {
                pass_rate: 0.2,
                ..LandSettings::default()
            },
        );
        assert!(!strict.is_land(&mesh, hex));
        assert!(lenient.is_land(&mesh, hex));
    }

    #[test]
    fn noise_land_fades_out_at_world_edges() {
        let mut mesh = mesh();
        let classifier = NoiseLandClassifier::new(
            4,
            mesh.world_width,
            mesh.world_height,
            &LandSettings {
                edge_falloff: 2.0,
                ..LandSettings::default()
            },
        );
        classify_hexes(&mut mesh, &classifier);
        let corner = mesh.hex_at(0, 0).unwrap();
        assert!(!mesh.hex(corner).land);
    }

    #[test]
    fn closures_classify_too() {
        let mut mesh = mesh();
        let land = classify_hexes(&mut mesh, &|_: &HexMesh, hex: HexId| hex.0 % 2 == 0);
        assert_eq!(land, mesh.hexes().len().div_ceil(2));
    }
}
