pub mod config;
pub mod drainage;
pub mod error;
pub mod land;
pub mod mesh;
pub mod region;
pub mod spatial;
pub mod terrain;
pub mod world;

pub use config::{
    CoastDistanceMethod, DrainageSettings, LandSettings, MeshSettings, RiverSettings,
    TerrainSettings, WorldGenerationParams,
};
pub use drainage::{DrainageBasin, DrainageNetwork, River};
pub use error::{MapgenError, Result};
pub use land::{LandClassifier, MaskClassifier, NoiseLandClassifier};
pub use mesh::{Direction, Flow, Hex, HexId, HexMesh, Point, Vertex, VertexId, VertexKind};
pub use region::{Region, RegionTopology, discover_land_regions};
pub use spatial::SpatialIndex;
pub use terrain::{NoiseSource, SimplexNoise};
pub use world::{Land, World, WorldSummary};
