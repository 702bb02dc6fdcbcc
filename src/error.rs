//! Ошибки генерации мира.
//!
//! Во время штатной работы восстанавливаемых ошибок нет: все варианты ниже
//! означают неверную конфигурацию или недоступный внешний ресурс.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapgenError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("region contains no hexes")]
    EmptyRegion,
    #[error("failed to read world config from {path:?}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse world config: {0}")]
    ParseConfig(#[from] toml::de::Error),
    #[error("failed to load land mask: {0}")]
    Mask(#[from] image::ImageError),
}

impl MapgenError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = MapgenError> = std::result::Result<T, E>;
