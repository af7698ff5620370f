//! Dataset descriptors - the JSON file that names a slab file and its shape

use crate::error::{Result, SlabError};
use crate::io::resolve_path;
use crate::layout::{GridGeometry, SlabLayout, StrideLayout};
use crate::loader::VolumeLoader;
use crate::reader::SlabReader;
use crate::types::{ByteOrder, ChannelInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

fn default_headers() -> bool {
    true
}

fn default_cache_size() -> usize {
    50
}

fn default_cell_size() -> [f64; 3] {
    [1000.0, 1000.0, 300.0]
}

/// Everything needed to open and interpret a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Slab file, absolute or relative to the descriptor
    pub filename: String,

    pub num_timesteps: usize,

    pub num_channels: usize,

    pub x: usize,

    pub y: usize,

    pub z: usize,

    /// Trailing 2D fields, e.g. topography
    #[serde(rename = "num_2d_fields", default)]
    pub num_fields_2d: usize,

    /// Whether slices carry frame markers
    #[serde(default = "default_headers")]
    pub headers: bool,

    /// Stride convention; unset means "follow `headers`"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve_2d_fields_per_timestep: Option<bool>,

    #[serde(default)]
    pub byte_order: ByteOrder,

    #[serde(default)]
    pub channels: Vec<ChannelInfo>,

    /// Volumes kept in memory by a loader
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default)]
    pub starting_timestep: usize,

    #[serde(default)]
    pub starting_channel: usize,

    /// Size of one grid cell in metres, `(x, y, z)`
    #[serde(default = "default_cell_size")]
    pub cell_size: [f64; 3],

    /// Geographic corners `(lon, lat)` of the grid
    #[serde(default)]
    pub lower_left: [f64; 2],

    #[serde(default)]
    pub upper_right: [f64; 2],

    /// Directory the descriptor was loaded from
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl DatasetDescriptor {
    /// Create a descriptor with defaults for everything but the shape
    pub fn new(filename: impl Into<String>, geometry: GridGeometry) -> Self {
        Self {
            filename: filename.into(),
            num_timesteps: geometry.num_timesteps,
            num_channels: geometry.num_channels,
            x: geometry.x_size,
            y: geometry.y_size,
            z: geometry.z_size,
            num_fields_2d: geometry.num_fields_2d,
            headers: geometry.has_frame_markers,
            reserve_2d_fields_per_timestep: None,
            byte_order: ByteOrder::Native,
            channels: Vec::new(),
            cache_size: default_cache_size(),
            starting_timestep: 0,
            starting_channel: 0,
            cell_size: default_cell_size(),
            lower_left: [0.0, 0.0],
            upper_right: [0.0, 0.0],
            base_dir: None,
        }
    }

    /// Add a channel description
    pub fn with_channel(mut self, channel: ChannelInfo) -> Self {
        self.channels.push(channel);
        self
    }

    /// Parse a descriptor from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let descriptor: Self =
            serde_json::from_str(json).map_err(|e| SlabError::Metadata(e.to_string()))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Load a descriptor; a relative `filename` resolves against its directory
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SlabError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut descriptor = Self::from_json_str(&json)?;
        descriptor.base_dir = path.parent().map(Path::to_path_buf);

        tracing::debug!(
            descriptor = %path.display(),
            data = %descriptor.data_path().display(),
            "Loaded dataset descriptor"
        );
        Ok(descriptor)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the descriptor as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Check the descriptor for internal consistency
    pub fn validate(&self) -> Result<()> {
        self.geometry().validate()?;

        if self.num_timesteps > 0 && self.starting_timestep >= self.num_timesteps {
            return Err(SlabError::out_of_range(
                "starting timestep",
                self.starting_timestep,
                self.num_timesteps,
            ));
        }
        if self.num_channels > 0 && self.starting_channel >= self.num_channels {
            return Err(SlabError::out_of_range(
                "starting channel",
                self.starting_channel,
                self.num_channels,
            ));
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.index >= self.num_channels {
                return Err(SlabError::out_of_range(
                    "channel",
                    channel.index,
                    self.num_channels,
                ));
            }
            if !seen.insert(channel.index) {
                return Err(SlabError::Metadata(format!(
                    "channel index {} described twice",
                    channel.index
                )));
            }
            if !channel.range().is_valid() {
                return Err(SlabError::Metadata(format!(
                    "channel '{}' has invalid range [{}, {}]",
                    channel.name, channel.min, channel.max
                )));
            }
        }
        Ok(())
    }

    pub fn geometry(&self) -> GridGeometry {
        GridGeometry {
            x_size: self.x,
            y_size: self.y,
            z_size: self.z,
            num_channels: self.num_channels,
            num_timesteps: self.num_timesteps,
            num_fields_2d: self.num_fields_2d,
            has_frame_markers: self.headers,
        }
    }

    pub fn stride(&self) -> StrideLayout {
        match self.reserve_2d_fields_per_timestep {
            Some(true) => StrideLayout::ReserveFields2D,
            Some(false) => StrideLayout::Packed,
            None => StrideLayout::for_markers(self.headers),
        }
    }

    pub fn layout(&self) -> Result<SlabLayout> {
        SlabLayout::new(self.geometry(), self.stride())
    }

    /// Location of the slab file
    pub fn data_path(&self) -> PathBuf {
        let path = resolve_path(&self.filename);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    /// A reader configured for this dataset
    pub fn reader(&self) -> SlabReader {
        SlabReader::new(self.data_path(), self.geometry())
            .with_stride(self.stride())
            .with_byte_order(self.byte_order)
    }

    /// A cached async loader configured for this dataset
    pub fn loader(&self) -> VolumeLoader {
        VolumeLoader::new(self.reader(), self.cache_size)
    }

    /// Channel description by index
    pub fn channel(&self, index: usize) -> Option<&ChannelInfo> {
        self.channels.iter().find(|c| c.index == index)
    }

    /// Channel description by name
    pub fn channel_by_name(&self, name: &str) -> Option<&ChannelInfo> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Physical bounds `(min, max)` of the grid, centred on the origin
    pub fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        let extents = [self.x as f64, self.y as f64, self.z as f64];
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for axis in 0..3 {
            let half = extents[axis] * self.cell_size[axis] / 2.0;
            min[axis] = -half;
            max[axis] = half;
        }
        (min, max)
    }
}
