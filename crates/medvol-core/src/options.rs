//! Configuration options for medvol.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::modes::{CuttingPlanesConfig, DrrConfig, DvrConfig, MaskConfig, MipConfig};
use crate::normals::NormalsConfig;
use crate::partitioning::DEFAULT_MAX_SEGMENT_BYTESIZE;
use crate::post_process::PostProcessConfig;
use crate::slice_mesh::DEFAULT_SAMPLE_RATE;

/// Global configuration of loading and rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Options {
    /// Byte budget of a single segment's intensity buffer.
    pub max_segment_bytesize: usize,

    /// Number of slices rendered per segment.
    pub sample_rate: u32,

    /// First binding slot used for segment textures.
    pub first_volume_unit: u32,

    /// Normal map computation, disabled when `None`.
    pub normals: Option<NormalsConfig>,

    /// Post-process pass settings.
    pub post_process: PostProcessConfig,

    /// DRR mode settings.
    pub drr: DrrConfig,

    /// DVR mode settings.
    pub dvr: DvrConfig,

    /// MIP mode settings.
    pub mip: MipConfig,

    /// Mask mode settings.
    pub mask: MaskConfig,

    /// Cutting plane windowing.
    pub cutting_planes: CuttingPlanesConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_segment_bytesize: DEFAULT_MAX_SEGMENT_BYTESIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            first_volume_unit: 0,
            normals: None,
            post_process: PostProcessConfig::default(),
            drr: DrrConfig::default(),
            dvr: DvrConfig::default(),
            mip: MipConfig::default(),
            mask: MaskConfig::default(),
            cutting_planes: CuttingPlanesConfig::default(),
        }
    }
}

impl Options {
    /// Parses options from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serializes the options as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
