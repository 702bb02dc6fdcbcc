// src/world.rs
//! Полный конвейер генерации мира.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::config::WorldGenerationParams;
use crate::drainage::{DrainageNetwork, apply_sea_level};
use crate::error::Result;
use crate::land::{LandClassifier, MaskClassifier, NoiseLandClassifier, classify_hexes};
use crate::mesh::{HexId, HexMesh, Point};
use crate::region::{Region, RegionTopology, discover_land_regions};
use crate::spatial::SpatialIndex;
use crate::terrain::{NoiseSource, SimplexNoise, assign_region_altitudes};

/// Связный участок суши вместе с его топологией
#[derive(Debug, Clone)]
pub struct Land {
    pub region: Region,
    pub topology: RegionTopology,
}

/// Счётчики готового мира
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorldSummary {
    pub hexes: usize,
    pub vertices: usize,
    pub land_hexes: usize,
    pub regions: usize,
    pub open_coastlines: usize,
    pub sinks: usize,
    pub outflows: usize,
    pub basins: usize,
    pub rivers: usize,
}

#[derive(Debug, Clone)]
pub struct World {
    pub params: WorldGenerationParams,
    pub mesh: HexMesh,
    pub index: SpatialIndex,
    pub lands: Vec<Land>,
    pub drainage: DrainageNetwork,
}

impl World {
    /// Генерирует мир с шумом рельефа по сиду и сушей по маске (если задана) или по шуму.
    pub fn generate(params: &WorldGenerationParams) -> Result<Self> {
        let noise = SimplexNoise::for_terrain(params.seed, &params.terrain);
        let classifier: Box<dyn LandClassifier> = match &params.land.mask {
            Some(path) => Box::new(MaskClassifier::from_path(path, &params.land)?),
            None => Box::new(NoiseLandClassifier::new(
                params.seed,
                params.width,
                params.height,
                &params.land,
            )),
        };
        Self::generate_with(params, &noise, classifier.as_ref())
    }

    /// Генерирует мир с заданными источником шума и классификатором суши.
    pub fn generate_with(
        params: &WorldGenerationParams,
        noise: &dyn NoiseSource,
        classifier: &dyn LandClassifier,
    ) -> Result<Self> {
        params.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

        info!(
            seed = params.seed,
            width = params.width,
            height = params.height,
            "building hex mesh"
        );
        let mut mesh = HexMesh::build(params.width, params.height, &params.mesh, &mut rng)?;
        let outside = mesh.out_of_bounds_vertices();
        if params.mesh.clip_to_world && !outside.is_empty() {
            warn!(count = outside.len(), "vertices left outside the world after clipping");
        }
        let index = SpatialIndex::from_mesh(&mesh, params.mesh.index_cells_along_edge)?;
        info!(
            hexes = mesh.hexes().len(),
            vertices = mesh.vertices().len(),
            rows = mesh.row_count(),
            "mesh ready"
        );

        let land_hexes = classify_hexes(&mut mesh, classifier);
        info!(land_hexes, "land classified");

        let mut lands = Vec::new();
        for region in discover_land_regions(&mesh) {
            let topology =
                RegionTopology::compute(&mesh, &region, params.terrain.coast_distance);
            if topology.has_open_coastline() {
                warn!(
                    hexes = region.len(),
                    "region touches the world edge, its coastline is open"
                );
            }
            assign_region_altitudes(&mut mesh, &region, &topology, noise, &params.terrain);
            lands.push(Land { region, topology });
        }
        info!(regions = lands.len(), "altitudes assigned");

        apply_sea_level(&mut mesh, params.drainage.sea_level);
        let drainage =
            DrainageNetwork::compute(&mut mesh, &params.drainage, &params.rivers, &mut rng);

        Ok(Self {
            params: params.clone(),
            mesh,
            index,
            lands,
            drainage,
        })
    }

    #[must_use]
    pub fn summary(&self) -> WorldSummary {
        WorldSummary {
            hexes: self.mesh.hexes().len(),
            vertices: self.mesh.vertices().len(),
            land_hexes: self.mesh.hexes().iter().filter(|h| h.land).count(),
            regions: self.lands.len(),
            open_coastlines: self
                .lands
                .iter()
                .filter(|l| l.topology.has_open_coastline())
                .count(),
            sinks: self.drainage.sinks.len(),
            outflows: self.drainage.outflows.len(),
            basins: self.drainage.basins.len(),
            rivers: self.drainage.rivers.len(),
        }
    }

    /// Гекс под точкой мира.
    #[must_use]
    pub fn hex_at_point(&self, point: Point) -> Option<HexId> {
        self.index.nearest_hex(&self.mesh, point).map(|hit| hit.hex)
    }

    /// Участок суши, содержащий гекс.
    #[must_use]
    pub fn land_of(&self, hex: HexId) -> Option<&Land> {
        self.lands.iter().find(|l| l.region.contains(hex))
    }
}
