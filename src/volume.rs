//! Owned results of a fetch

use crate::error::{Result, SlabError};
use crate::types::{ValueRange, VolumeKey};
use crate::utils::{normalize_to_u8, scan_range};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

/// One (timestep, channel) volume, samples in `x`-fastest order
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    key: VolumeKey,
    dims: (usize, usize, usize),
    data: Vec<f32>,
}

impl Volume {
    /// Wrap a buffer of `x * y * z` samples
    pub fn new(key: VolumeKey, dims: (usize, usize, usize), data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), dims.0 * dims.1 * dims.2);
        Self { key, dims, data }
    }

    pub fn key(&self) -> VolumeKey {
        self.key
    }

    /// Extents as `(x, y, z)`
    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Sample at grid coordinate `(x, y, z)`
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        let (nx, ny, nz) = self.dims;
        if x >= nx || y >= ny || z >= nz {
            return None;
        }
        self.data.get(z * nx * ny + y * nx + x).copied()
    }

    /// The `z`-th horizontal slice
    pub fn slice(&self, z: usize) -> Option<&[f32]> {
        let len = self.dims.0 * self.dims.1;
        self.data.get(z * len..(z + 1) * len)
    }

    /// Minimum and maximum finite sample
    pub fn value_range(&self) -> Option<ValueRange> {
        scan_range(&self.data)
    }

    /// Map samples to 8-bit intensities over `range`
    pub fn normalized(&self, range: ValueRange) -> Vec<u8> {
        normalize_to_u8(&self.data, range)
    }

    /// Borrow as an array shaped `(z, y, x)`
    pub fn view(&self) -> Result<ArrayView3<'_, f32>> {
        let (nx, ny, nz) = self.dims;
        ArrayView3::from_shape((nz, ny, nx), self.data.as_slice()).map_err(shape_error)
    }

    /// Convert into an array shaped `(z, y, x)`
    pub fn to_array(&self) -> Result<Array3<f32>> {
        Ok(self.view()?.to_owned())
    }
}

/// One auxiliary 2D field, samples in `x`-fastest order
#[derive(Debug, Clone, PartialEq)]
pub struct Field2D {
    index: usize,
    dims: (usize, usize),
    data: Vec<f32>,
}

impl Field2D {
    /// Wrap a buffer of `x * y` samples
    pub fn new(index: usize, dims: (usize, usize), data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), dims.0 * dims.1);
        Self { index, dims, data }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Extents as `(x, y)`
    pub fn dims(&self) -> (usize, usize) {
        self.dims
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        let (nx, ny) = self.dims;
        if x >= nx || y >= ny {
            return None;
        }
        self.data.get(y * nx + x).copied()
    }

    pub fn value_range(&self) -> Option<ValueRange> {
        scan_range(&self.data)
    }

    pub fn normalized(&self, range: ValueRange) -> Vec<u8> {
        normalize_to_u8(&self.data, range)
    }

    /// Borrow as an array shaped `(y, x)`
    pub fn view(&self) -> Result<ArrayView2<'_, f32>> {
        let (nx, ny) = self.dims;
        ArrayView2::from_shape((ny, nx), self.data.as_slice()).map_err(shape_error)
    }

    pub fn to_array(&self) -> Result<Array2<f32>> {
        Ok(self.view()?.to_owned())
    }
}

fn shape_error(err: ndarray::ShapeError) -> SlabError {
    SlabError::InvalidGeometry(err.to_string())
}
