//! Slab reader - main API for fetching volumes and 2D fields from a file

use crate::error::{Result, SlabError};
use crate::io::{SliceFile, SliceFormat};
use crate::layout::{GridGeometry, SlabLayout, StrideLayout};
use crate::types::{ByteOrder, VolumeKey};
use crate::volume::{Field2D, Volume};
use std::io;
use std::path::{Path, PathBuf};

/// State of the backing file
#[derive(Debug)]
enum FileState {
    /// Not opened yet
    Closed,
    /// Opened successfully; kept for the reader's lifetime
    Open(SliceFile),
    /// Opening failed; the reader will not try again
    Failed(io::ErrorKind, String),
}

/// Random-access reader over one slab file
///
/// The file is opened on the first fetch and stays open until the reader is
/// dropped. A reader is not meant to be shared between threads: each worker
/// should clone its own, which copies the configuration but not the handle.
#[derive(Debug)]
pub struct SlabReader {
    path: PathBuf,
    geometry: GridGeometry,
    stride: StrideLayout,
    byte_order: ByteOrder,
    file: FileState,
}

impl Clone for SlabReader {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            geometry: self.geometry,
            stride: self.stride,
            byte_order: self.byte_order,
            file: FileState::Closed,
        }
    }
}

impl SlabReader {
    /// Create a reader for `path`
    ///
    /// The stride convention defaults to the one matching the geometry's
    /// marker mode. Nothing is opened until the first fetch.
    pub fn new(path: impl AsRef<Path>, geometry: GridGeometry) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stride: StrideLayout::for_markers(geometry.has_frame_markers),
            geometry,
            byte_order: ByteOrder::Native,
            file: FileState::Closed,
        }
    }

    /// Set the stride convention
    pub fn with_stride(mut self, stride: StrideLayout) -> Self {
        self.stride = stride;
        self
    }

    /// Set the byte order of the file
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point the reader at another file, closing the current handle
    pub fn set_path(&mut self, path: impl AsRef<Path>) {
        self.path = path.as_ref().to_path_buf();
        self.file = FileState::Closed;
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Replace the whole geometry
    pub fn set_geometry(&mut self, geometry: GridGeometry) {
        self.geometry = geometry;
    }

    /// Extents as `(x, y, z)`
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.geometry.x_size, self.geometry.y_size, self.geometry.z_size)
    }

    pub fn set_sizes(&mut self, x_size: usize, y_size: usize, z_size: usize) {
        self.geometry.x_size = x_size;
        self.geometry.y_size = y_size;
        self.geometry.z_size = z_size;
    }

    pub fn num_timesteps(&self) -> usize {
        self.geometry.num_timesteps
    }

    pub fn set_num_timesteps(&mut self, num_timesteps: usize) {
        self.geometry.num_timesteps = num_timesteps;
    }

    pub fn num_channels(&self) -> usize {
        self.geometry.num_channels
    }

    pub fn set_num_channels(&mut self, num_channels: usize) {
        self.geometry.num_channels = num_channels;
    }

    pub fn num_fields_2d(&self) -> usize {
        self.geometry.num_fields_2d
    }

    pub fn set_num_fields_2d(&mut self, num_fields_2d: usize) {
        self.geometry.num_fields_2d = num_fields_2d;
    }

    pub fn has_frame_markers(&self) -> bool {
        self.geometry.has_frame_markers
    }

    /// Toggle frame markers; the stride convention is left as is
    pub fn set_frame_markers(&mut self, has_frame_markers: bool) {
        self.geometry.has_frame_markers = has_frame_markers;
    }

    pub fn stride(&self) -> StrideLayout {
        self.stride
    }

    pub fn set_stride(&mut self, stride: StrideLayout) {
        self.stride = stride;
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    /// Whether the backing file is currently open
    pub fn is_open(&self) -> bool {
        matches!(self.file, FileState::Open(_))
    }

    /// Byte layout for the current configuration
    pub fn layout(&self) -> Result<SlabLayout> {
        SlabLayout::new(self.geometry, self.stride)
    }

    /// Offset of a volume, validated against the geometry
    pub fn volume_offset(&self, timestep: usize, channel: usize) -> Result<u64> {
        self.layout()?.volume_offset(VolumeKey::new(timestep, channel))
    }

    /// Offset of a 2D field, validated against the geometry
    pub fn field_2d_offset(&self, index: usize) -> Result<u64> {
        self.layout()?.field_2d_offset(index)
    }

    /// Fetch the volume for `(timestep, channel)`
    ///
    /// Sample `(x, y, z)` lands at `z * x_size * y_size + y * x_size + x`.
    pub fn fetch_volume(&mut self, timestep: usize, channel: usize) -> Result<Volume> {
        self.volume_offset(timestep, channel)?;
        let mut data = vec![0.0f32; self.geometry.volume_len()];
        self.fetch_volume_into(timestep, channel, &mut data)?;
        Ok(Volume::new(
            VolumeKey::new(timestep, channel),
            self.sizes(),
            data,
        ))
    }

    /// Fetch a volume into a caller-owned buffer of exactly `x * y * z` samples
    ///
    /// On error the buffer contents are unspecified and must be discarded.
    pub fn fetch_volume_into(
        &mut self,
        timestep: usize,
        channel: usize,
        out: &mut [f32],
    ) -> Result<()> {
        let layout = self.layout()?;
        let key = VolumeKey::new(timestep, channel);
        let offset = layout.volume_offset(key)?;
        check_len(out, self.geometry.volume_len(), "volume")?;

        tracing::trace!(%key, offset, "Fetching volume");
        self.read_at(offset, out)
    }

    /// Fetch the 2D field at `index`
    pub fn fetch_field_2d(&mut self, index: usize) -> Result<Field2D> {
        self.field_2d_offset(index)?;
        let mut data = vec![0.0f32; self.geometry.slice_len()];
        self.fetch_field_2d_into(index, &mut data)?;
        Ok(Field2D::new(
            index,
            (self.geometry.x_size, self.geometry.y_size),
            data,
        ))
    }

    /// Fetch a 2D field into a caller-owned buffer of exactly `x * y` samples
    pub fn fetch_field_2d_into(&mut self, index: usize, out: &mut [f32]) -> Result<()> {
        let layout = self.layout()?;
        let offset = layout.field_2d_offset(index)?;
        check_len(out, self.geometry.slice_len(), "2D field")?;

        tracing::trace!(index, offset, "Fetching 2D field");
        self.read_at(offset, out)
    }

    fn read_at(&mut self, offset: u64, out: &mut [f32]) -> Result<()> {
        let format = SliceFormat {
            samples: self.geometry.slice_len(),
            frame_markers: self.geometry.has_frame_markers,
            byte_order: self.byte_order,
        };
        self.file()?.read_slices(offset, format, out)
    }

    /// The open file, opening it on first use
    fn file(&mut self) -> Result<&mut SliceFile> {
        if let FileState::Closed = self.file {
            match SliceFile::open(&self.path) {
                Ok(file) => self.file = FileState::Open(file),
                Err(SlabError::Open { path, source }) => {
                    self.file = FileState::Failed(source.kind(), source.to_string());
                    return Err(SlabError::Open { path, source });
                }
                Err(e) => return Err(e),
            }
        }

        match &mut self.file {
            FileState::Open(file) => Ok(file),
            FileState::Failed(kind, message) => Err(SlabError::Open {
                path: self.path.clone(),
                source: io::Error::new(*kind, message.clone()),
            }),
            FileState::Closed => Err(SlabError::Open {
                path: self.path.clone(),
                source: io::Error::new(io::ErrorKind::Other, "file not opened"),
            }),
        }
    }
}

fn check_len(out: &[f32], expected: usize, what: &str) -> Result<()> {
    if out.len() != expected {
        return Err(SlabError::InvalidGeometry(format!(
            "{} buffer holds {} samples, expected {}",
            what,
            out.len(),
            expected
        )));
    }
    Ok(())
}
