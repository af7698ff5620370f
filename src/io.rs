//! File access for slab data: path resolution, the open handle and slice streaming

use crate::error::{Result, SlabError};
use crate::types::ByteOrder;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Turn a `file://` URL or plain path into a filesystem path
pub fn resolve_path(location: &str) -> PathBuf {
    PathBuf::from(location.strip_prefix("file://").unwrap_or(location))
}

/// How each slice is framed on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceFormat {
    /// Samples per slice
    pub samples: usize,
    /// Whether a 4-byte header and footer bracket the samples
    pub frame_markers: bool,
    /// Byte order of samples and markers
    pub byte_order: ByteOrder,
}

/// An open, read-only slab file
///
/// Owns the OS handle. Every read starts with an absolute seek, so the
/// position left behind by a previous call never matters.
#[derive(Debug)]
pub struct SliceFile {
    path: PathBuf,
    reader: BufReader<File>,
    len: u64,
}

impl SliceFile {
    /// Open a file for binary reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| SlabError::Open {
            path: path.clone(),
            source,
        })?;
        let len = file
            .metadata()
            .map_err(|source| SlabError::Open {
                path: path.clone(),
                source,
            })?
            .len();

        tracing::debug!(path = %path.display(), len, "Opened slab file");

        Ok(Self {
            path,
            reader: BufReader::new(file),
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File length in bytes, as of opening
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Seek to an absolute byte offset
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset > self.len {
            return Err(SlabError::SeekBeyondEnd {
                path: self.path.clone(),
                offset,
                file_len: self.len,
            });
        }
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|source| SlabError::Seek {
                path: self.path.clone(),
                offset,
                source,
            })?;
        Ok(())
    }

    /// Seek to `offset` and fill `out` with consecutive slices
    ///
    /// `out.len()` must be a multiple of `format.samples`. On error the
    /// contents of `out` are unspecified.
    pub fn read_slices(&mut self, offset: u64, format: SliceFormat, out: &mut [f32]) -> Result<()> {
        if format.samples == 0 || out.len() % format.samples != 0 {
            return Err(SlabError::InvalidGeometry(format!(
                "buffer of {} samples is not a whole number of {}-sample slices",
                out.len(),
                format.samples
            )));
        }

        self.seek_to(offset)?;

        let mut position = offset;
        for slice in out.chunks_exact_mut(format.samples) {
            position = self.read_slice(position, format, slice)?;
        }
        Ok(())
    }

    /// Read one slice at the current position, which is `position`
    ///
    /// Returns the position after the slice.
    fn read_slice(&mut self, position: u64, format: SliceFormat, out: &mut [f32]) -> Result<u64> {
        let mut next = position;

        let header = if format.frame_markers {
            let header = self.read_marker(next, format.byte_order)?;
            next += crate::layout::MARKER_BYTES;
            Some(header)
        } else {
            None
        };

        let bytes: &mut [u8] = bytemuck::cast_slice_mut(out);
        let payload = bytes.len();
        self.read_exact_at(next, bytes)?;
        format.byte_order.fix_samples(out);
        next += payload as u64;

        if let Some(header) = header {
            let footer = self.read_marker(next, format.byte_order)?;
            if footer != header {
                return Err(SlabError::FrameMarkerMismatch {
                    path: self.path.clone(),
                    offset: position,
                    header,
                    footer,
                });
            }
            next += crate::layout::MARKER_BYTES;
        }

        Ok(next)
    }

    fn read_marker(&mut self, position: u64, byte_order: ByteOrder) -> Result<u32> {
        let mut raw = [0u8; 4];
        self.read_exact_at(position, &mut raw)?;
        Ok(byte_order.read_u32(raw))
    }

    /// `read_exact` that reports truncation as a short read at `position`
    fn read_exact_at(&mut self, position: u64, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => SlabError::ShortRead {
                path: self.path.clone(),
                offset: position,
                expected: buf.len(),
            },
            _ => SlabError::Io(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn framed_slice(marker: u32, footer: u32, values: &[f32]) -> Vec<u8> {
        let mut bytes = marker.to_ne_bytes().to_vec();
        for v in values {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        bytes.extend_from_slice(&footer.to_ne_bytes());
        bytes
    }

    fn temp_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn format(samples: usize, frame_markers: bool) -> SliceFormat {
        SliceFormat {
            samples,
            frame_markers,
            byte_order: ByteOrder::Native,
        }
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("file:///data/wrf.bin"), PathBuf::from("/data/wrf.bin"));
        assert_eq!(resolve_path("relative/wrf.bin"), PathBuf::from("relative/wrf.bin"));
    }

    #[test]
    fn test_open_missing() {
        let err = SliceFile::open("/nonexistent/dir/wrf.bin").unwrap_err();
        assert!(matches!(err, SlabError::Open { .. }));
    }

    #[test]
    fn test_read_framed_slices() {
        let mut bytes = framed_slice(8, 8, &[1.0, 2.0]);
        bytes.extend(framed_slice(8, 8, &[3.0, 4.0]));
        let tmp = temp_file(&bytes);

        let mut file = SliceFile::open(tmp.path()).unwrap();
        assert_eq!(file.len(), 32);

        let mut out = [0.0f32; 4];
        file.read_slices(0, format(2, true), &mut out).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);

        let mut second = [0.0f32; 2];
        file.read_slices(16, format(2, true), &mut second).unwrap();
        assert_eq!(second, [3.0, 4.0]);
    }

    #[test]
    fn test_read_bare_slices() {
        let bytes: Vec<u8> = [5.0f32, 6.0, 7.0]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let tmp = temp_file(&bytes);

        let mut file = SliceFile::open(tmp.path()).unwrap();
        let mut out = [0.0f32; 2];
        file.read_slices(4, format(1, false), &mut out).unwrap();
        assert_eq!(out, [6.0, 7.0]);
    }

    #[test]
    fn test_marker_mismatch() {
        let tmp = temp_file(&framed_slice(8, 9, &[1.0, 2.0]));
        let mut file = SliceFile::open(tmp.path()).unwrap();
        let mut out = [0.0f32; 2];
        let err = file.read_slices(0, format(2, true), &mut out).unwrap_err();
        assert!(matches!(
            err,
            SlabError::FrameMarkerMismatch {
                offset: 0,
                header: 8,
                footer: 9,
                ..
            }
        ));
    }

    #[test]
    fn test_truncated() {
        let mut bytes = framed_slice(8, 8, &[1.0, 2.0]);
        bytes.truncate(10);
        let tmp = temp_file(&bytes);
        let mut file = SliceFile::open(tmp.path()).unwrap();
        let mut out = [0.0f32; 2];
        let err = file.read_slices(0, format(2, true), &mut out).unwrap_err();
        assert!(matches!(err, SlabError::ShortRead { offset: 4, expected: 8, .. }));
    }

    #[test]
    fn test_seek_past_end() {
        let tmp = temp_file(&[0u8; 8]);
        let mut file = SliceFile::open(tmp.path()).unwrap();
        let mut out = [0.0f32; 1];
        let err = file.read_slices(9, format(1, false), &mut out).unwrap_err();
        assert!(matches!(err, SlabError::SeekBeyondEnd { offset: 9, file_len: 8, .. }));
    }

    #[test]
    fn test_ragged_buffer_rejected() {
        let tmp = temp_file(&[0u8; 16]);
        let mut file = SliceFile::open(tmp.path()).unwrap();
        let mut out = [0.0f32; 3];
        let err = file.read_slices(0, format(2, false), &mut out).unwrap_err();
        assert!(err.is_configuration());
    }
}
