//! wrf-volume - random access to flat binary WRF volumes
//!
//! Reads time-series volumetric data (a 3D grid per channel per timestep,
//! plus trailing 2D fields) straight out of a flat binary file using
//! computed 64-bit offsets, without loading the whole file.
//!
//! # Features
//!
//! - Lazily opened, long-lived file handle per reader
//! - Optional per-slice header/footer frame markers, validated on read
//! - Both stride conventions found in WRF exports (packed, or reserving
//!   2D-field slots in every timestep)
//! - JSON dataset descriptors
//! - Async, cached loading on tokio's blocking pool
//!
//! # Example
//!
//! ```rust,no_run
//! use wrf_volume::{GridGeometry, SlabReader};
//!
//! # fn example() -> wrf_volume::Result<()> {
//! let geometry = GridGeometry::new(4, 4, 2, 1, 1);
//! let mut reader = SlabReader::new("/data/wrf_out.bin", geometry);
//!
//! let volume = reader.fetch_volume(0, 0)?;
//! println!("{:?}", volume.get(1, 2, 1));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod io;
pub mod layout;
pub mod loader;
pub mod metadata;
pub mod reader;
pub mod types;
pub mod utils;
pub mod volume;
pub mod writer;

// Re-exports
pub use cache::{CacheStats, VolumeCache};
pub use error::{Result, SlabError};
pub use layout::{GridGeometry, SlabLayout, StrideLayout};
pub use loader::VolumeLoader;
pub use metadata::DatasetDescriptor;
pub use reader::SlabReader;
pub use types::{ByteOrder, ChannelInfo, ValueRange, VolumeKey};
pub use volume::{Field2D, Volume};
pub use writer::SlabWriter;

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
