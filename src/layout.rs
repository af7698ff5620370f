//! Grid geometry and the byte layout of a slab file
//!
//! A file is a flat run of slices with no file header:
//!
//! ```text
//! [t0: [c0: z0 z1 ..][c1: ..] .. (reserved 2D slots)] [t1: ..] .. [f0][f1]..
//! ```
//!
//! Each slice is `x * y` f32 samples, optionally framed by a 4-byte header and
//! a matching 4-byte footer. All offsets are computed in `u64` with overflow
//! checks so datasets past 4 GiB seek to the right place.

use crate::error::{Result, SlabError};
use crate::types::VolumeKey;
use serde::{Deserialize, Serialize};

/// Bytes per sample
pub const SAMPLE_BYTES: u64 = 4;

/// Bytes per frame marker
pub const MARKER_BYTES: u64 = 4;

/// How much space each timestep block occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrideLayout {
    /// Timestep block holds only the channel data
    Packed,
    /// Timestep block also reserves room for `num_fields_2d` slices after the
    /// channel data, although the 2D fields themselves live after the last
    /// timestep
    ReserveFields2D,
}

impl StrideLayout {
    /// Convention used by the producers: framed files reserve, bare files pack
    pub fn for_markers(has_frame_markers: bool) -> Self {
        if has_frame_markers {
            StrideLayout::ReserveFields2D
        } else {
            StrideLayout::Packed
        }
    }
}

impl Default for StrideLayout {
    fn default() -> Self {
        StrideLayout::for_markers(true)
    }
}

/// Shape of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub x_size: usize,
    pub y_size: usize,
    pub z_size: usize,
    pub num_channels: usize,
    pub num_timesteps: usize,
    pub num_fields_2d: usize,
    pub has_frame_markers: bool,
}

impl GridGeometry {
    /// Create a framed geometry with no 2D fields
    pub fn new(
        x_size: usize,
        y_size: usize,
        z_size: usize,
        num_timesteps: usize,
        num_channels: usize,
    ) -> Self {
        Self {
            x_size,
            y_size,
            z_size,
            num_channels,
            num_timesteps,
            num_fields_2d: 0,
            has_frame_markers: true,
        }
    }

    /// Set the number of trailing 2D fields
    pub fn with_fields_2d(mut self, num_fields_2d: usize) -> Self {
        self.num_fields_2d = num_fields_2d;
        self
    }

    /// Enable or disable per-slice frame markers
    pub fn with_frame_markers(mut self, has_frame_markers: bool) -> Self {
        self.has_frame_markers = has_frame_markers;
        self
    }

    /// Ensure all three extents are set
    pub fn validate(&self) -> Result<()> {
        if self.x_size == 0 || self.y_size == 0 || self.z_size == 0 {
            return Err(SlabError::InvalidGeometry(format!(
                "extents must be non-zero, got {} x {} x {}",
                self.x_size, self.y_size, self.z_size
            )));
        }
        Ok(())
    }

    /// Samples in one slice
    pub fn slice_len(&self) -> usize {
        self.x_size * self.y_size
    }

    /// Samples in one volume
    pub fn volume_len(&self) -> usize {
        self.slice_len() * self.z_size
    }

    /// Check if grid coordinates are inside the volume
    pub fn is_in_bounds(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.x_size && y < self.y_size && z < self.z_size
    }

    /// Index into a volume buffer for grid coordinate `(x, y, z)`
    pub fn sample_index(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.slice_len() + y * self.x_size + x
    }
}

/// Byte layout of a file, derived from its geometry and stride convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabLayout {
    geometry: GridGeometry,
    stride: StrideLayout,
    slice_value_bytes: u64,
    slice_bytes: u64,
    channel_bytes: u64,
    timestep_bytes: u64,
}

fn mul(a: u64, b: u64) -> Result<u64> {
    a.checked_mul(b)
        .ok_or_else(|| SlabError::InvalidGeometry(format!("byte size {} * {} overflows", a, b)))
}

fn add(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| SlabError::InvalidGeometry(format!("byte size {} + {} overflows", a, b)))
}

fn to_u64(n: usize) -> u64 {
    n as u64
}

impl SlabLayout {
    /// Compute the layout, rejecting unset extents and arithmetic overflow
    pub fn new(geometry: GridGeometry, stride: StrideLayout) -> Result<Self> {
        geometry.validate()?;

        let slice_samples = mul(to_u64(geometry.x_size), to_u64(geometry.y_size))?;
        let slice_value_bytes = mul(slice_samples, SAMPLE_BYTES)?;
        let slice_bytes = if geometry.has_frame_markers {
            add(slice_value_bytes, 2 * MARKER_BYTES)?
        } else {
            slice_value_bytes
        };
        let channel_bytes = mul(slice_bytes, to_u64(geometry.z_size))?;
        let mut timestep_bytes = mul(channel_bytes, to_u64(geometry.num_channels))?;
        if stride == StrideLayout::ReserveFields2D {
            timestep_bytes = add(
                timestep_bytes,
                mul(slice_bytes, to_u64(geometry.num_fields_2d))?,
            )?;
        }

        // Every reachable offset must fit, including the end of the last 2D field.
        let layout = Self {
            geometry,
            stride,
            slice_value_bytes,
            slice_bytes,
            channel_bytes,
            timestep_bytes,
        };
        layout.expected_file_len()?;
        Ok(layout)
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn stride(&self) -> StrideLayout {
        self.stride
    }

    /// Payload bytes of one slice, without markers
    pub fn slice_value_bytes(&self) -> u64 {
        self.slice_value_bytes
    }

    /// Bytes of one slice on disk, markers included
    pub fn slice_bytes(&self) -> u64 {
        self.slice_bytes
    }

    /// Bytes of one channel block (`z_size` slices)
    pub fn channel_bytes(&self) -> u64 {
        self.channel_bytes
    }

    /// Stride between consecutive timestep blocks
    pub fn timestep_bytes(&self) -> u64 {
        self.timestep_bytes
    }

    /// Check a (timestep, channel) pair against the geometry
    pub fn check_volume(&self, key: VolumeKey) -> Result<()> {
        if key.timestep >= self.geometry.num_timesteps {
            return Err(SlabError::out_of_range(
                "timestep",
                key.timestep,
                self.geometry.num_timesteps,
            ));
        }
        if key.channel >= self.geometry.num_channels {
            return Err(SlabError::out_of_range(
                "channel",
                key.channel,
                self.geometry.num_channels,
            ));
        }
        Ok(())
    }

    /// Check a 2D field index against the geometry
    pub fn check_field_2d(&self, index: usize) -> Result<()> {
        if index >= self.geometry.num_fields_2d {
            return Err(SlabError::out_of_range(
                "2D field",
                index,
                self.geometry.num_fields_2d,
            ));
        }
        Ok(())
    }

    /// Absolute offset of the first slice of a volume
    pub fn volume_offset(&self, key: VolumeKey) -> Result<u64> {
        self.check_volume(key)?;
        add(
            mul(self.timestep_bytes, to_u64(key.timestep))?,
            mul(self.channel_bytes, to_u64(key.channel))?,
        )
    }

    /// Offset where the 2D fields begin
    ///
    /// The fields follow the channel data of the last timestep. This does not
    /// account for per-timestep reservations under `ReserveFields2D`.
    pub fn fields_2d_start(&self) -> Result<u64> {
        mul(
            mul(self.channel_bytes, to_u64(self.geometry.num_channels))?,
            to_u64(self.geometry.num_timesteps),
        )
    }

    /// Absolute offset of a 2D field's slice
    pub fn field_2d_offset(&self, index: usize) -> Result<u64> {
        self.check_field_2d(index)?;
        add(
            self.fields_2d_start()?,
            mul(self.slice_bytes, to_u64(index))?,
        )
    }

    /// Length a complete file must have
    pub fn expected_file_len(&self) -> Result<u64> {
        let volumes = mul(self.timestep_bytes, to_u64(self.geometry.num_timesteps))?;
        let fields = add(
            self.fields_2d_start()?,
            mul(self.slice_bytes, to_u64(self.geometry.num_fields_2d))?,
        )?;
        Ok(volumes.max(fields))
    }

    /// True when the 2D-field region overlaps timestep data
    ///
    /// Happens under `ReserveFields2D` as soon as there is more than one
    /// timestep, because the field offsets ignore the reservations.
    pub fn fields_overlap_volumes(&self) -> bool {
        self.stride == StrideLayout::ReserveFields2D
            && self.geometry.num_fields_2d > 0
            && self.geometry.num_timesteps > 1
    }

    /// Get a summary string of the layout
    pub fn summary(&self) -> String {
        let g = &self.geometry;
        format!(
            "{} x {} x {} grid, {} channels, {} timesteps, {} 2D fields, markers {}, {:?} stride ({} per timestep)",
            g.x_size,
            g.y_size,
            g.z_size,
            g.num_channels,
            g.num_timesteps,
            g.num_fields_2d,
            if g.has_frame_markers { "on" } else { "off" },
            self.stride,
            crate::utils::format_bytes(self.timestep_bytes),
        )
    }
}
