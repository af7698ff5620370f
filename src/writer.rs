//! Slab writer - produces files in the layout `SlabReader` consumes

use crate::error::{Result, SlabError};
use crate::layout::{GridGeometry, SlabLayout, StrideLayout};
use crate::types::{ByteOrder, VolumeKey};
use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Writes volumes and 2D fields at the offsets a reader will look for them
///
/// When frame markers are on, each slice is bracketed by its payload length
/// in bytes, the record marker of a Fortran unformatted write.
pub struct SlabWriter {
    path: PathBuf,
    layout: SlabLayout,
    byte_order: ByteOrder,
    out: BufWriter<File>,
}

impl SlabWriter {
    /// Create (or truncate) `path` and size it for the full dataset
    pub fn create(
        path: impl AsRef<Path>,
        geometry: GridGeometry,
        stride: StrideLayout,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let layout = SlabLayout::new(geometry, stride)?;
        if layout.fields_overlap_volumes() {
            return Err(SlabError::InvalidGeometry(format!(
                "2D fields would overlap timestep data ({} timesteps with reserved 2D slots)",
                geometry.num_timesteps
            )));
        }
        let len = layout.expected_file_len()?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&path).map_err(|source| SlabError::Open {
            path: path.clone(),
            source,
        })?;
        file.set_len(len)?;

        tracing::debug!(path = %path.display(), len, "Created slab file");

        Ok(Self {
            path,
            layout,
            byte_order: ByteOrder::Native,
            out: BufWriter::new(file),
        })
    }

    /// Set the byte order samples and markers are written in
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> &SlabLayout {
        &self.layout
    }

    /// Write the volume for `(timestep, channel)`; `data` holds `x * y * z` samples
    pub fn write_volume(&mut self, timestep: usize, channel: usize, data: &[f32]) -> Result<()> {
        let offset = self.layout.volume_offset(VolumeKey::new(timestep, channel))?;
        let expected = self.layout.geometry().volume_len();
        self.write_at(offset, data, expected, "volume")
    }

    /// Write the 2D field at `index`; `data` holds `x * y` samples
    pub fn write_field_2d(&mut self, index: usize, data: &[f32]) -> Result<()> {
        let offset = self.layout.field_2d_offset(index)?;
        let expected = self.layout.geometry().slice_len();
        self.write_at(offset, data, expected, "2D field")
    }

    /// Flush buffered data and sync it to disk
    pub fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[f32], expected: usize, what: &str) -> Result<()> {
        if data.len() != expected {
            return Err(SlabError::InvalidGeometry(format!(
                "{} data holds {} samples, expected {}",
                what,
                data.len(),
                expected
            )));
        }

        self.out
            .seek(SeekFrom::Start(offset))
            .map_err(|source| SlabError::Seek {
                path: self.path.clone(),
                offset,
                source,
            })?;

        let geometry = *self.layout.geometry();
        let payload = u32::try_from(self.layout.slice_value_bytes()).map_err(|_| {
            SlabError::InvalidGeometry("slice too large for a 4-byte record marker".to_string())
        })?;
        let marker = self.byte_order.write_u32(payload);

        for slice in data.chunks_exact(geometry.slice_len()) {
            if geometry.has_frame_markers {
                self.out.write_all(&marker)?;
            }
            if self.byte_order.needs_swap() {
                for v in slice {
                    self.out.write_all(&v.to_bits().swap_bytes().to_ne_bytes())?;
                }
            } else {
                self.out.write_all(bytemuck::cast_slice(slice))?;
            }
            if geometry.has_frame_markers {
                self.out.write_all(&marker)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_is_presized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.bin");
        let geometry = GridGeometry::new(2, 2, 3, 2, 2).with_fields_2d(1);
        let writer = SlabWriter::create(&path, geometry, StrideLayout::Packed).unwrap();
        let expected = writer.layout().expected_file_len().unwrap();
        writer.finish().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), expected);
        assert_eq!(expected, (16 + 8) * 3 * 2 * 2 + 24);
    }

    #[test]
    fn test_markers_hold_payload_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        let geometry = GridGeometry::new(2, 1, 1, 1, 1);
        let mut writer = SlabWriter::create(&path, geometry, StrideLayout::Packed).unwrap();
        writer.write_volume(0, 0, &[1.5, 2.5]).unwrap();
        writer.finish().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(u32::from_ne_bytes(bytes[0..4].try_into().unwrap()), 8);
        assert_eq!(f32::from_ne_bytes(bytes[4..8].try_into().unwrap()), 1.5);
        assert_eq!(f32::from_ne_bytes(bytes[8..12].try_into().unwrap()), 2.5);
        assert_eq!(u32::from_ne_bytes(bytes[12..16].try_into().unwrap()), 8);
    }

    #[test]
    fn test_big_endian_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("be.bin");
        let geometry = GridGeometry::new(1, 1, 1, 1, 1);
        let mut writer = SlabWriter::create(&path, geometry, StrideLayout::Packed)
            .unwrap()
            .with_byte_order(ByteOrder::Big);
        writer.write_volume(0, 0, &[1.0]).unwrap();
        writer.finish().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], &[0, 0, 0, 4]);
        assert_eq!(&bytes[4..8], &1.0f32.to_be_bytes());
    }

    #[test]
    fn test_overlapping_fields_rejected() {
        let dir = TempDir::new().unwrap();
        let geometry = GridGeometry::new(2, 2, 1, 2, 1).with_fields_2d(1);
        let err = SlabWriter::create(dir.path().join("x.bin"), geometry, StrideLayout::ReserveFields2D)
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let dir = TempDir::new().unwrap();
        let geometry = GridGeometry::new(2, 2, 2, 1, 1);
        let mut writer = SlabWriter::create(dir.path().join("x.bin"), geometry, StrideLayout::Packed).unwrap();
        assert!(writer.write_volume(0, 0, &[0.0; 7]).unwrap_err().is_configuration());
        assert!(matches!(
            writer.write_volume(1, 0, &[0.0; 8]),
            Err(SlabError::IndexOutOfRange { what: "timestep", .. })
        ));
    }
}
