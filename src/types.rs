//! Core data types for WRF slab files

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte order of the samples and frame markers stored in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Whatever the reading machine uses (the producers wrote raw memory)
    #[default]
    Native,
    /// Little endian
    Little,
    /// Big endian
    Big,
}

impl ByteOrder {
    /// Check whether values in this order must be byte-swapped on this machine
    pub fn needs_swap(&self) -> bool {
        match self {
            ByteOrder::Native => false,
            ByteOrder::Little => cfg!(target_endian = "big"),
            ByteOrder::Big => cfg!(target_endian = "little"),
        }
    }

    /// Decode a 4-byte frame marker
    pub fn read_u32(&self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Native => u32::from_ne_bytes(bytes),
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Encode a 4-byte frame marker
    pub fn write_u32(&self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::Native => value.to_ne_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }

    /// Swap samples in place if the file order differs from the machine's
    pub fn fix_samples(&self, samples: &mut [f32]) {
        if self.needs_swap() {
            for v in samples.iter_mut() {
                *v = f32::from_bits(v.to_bits().swap_bytes());
            }
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Identifies one volume in a file: a (timestep, channel) pair
///
/// Ordering is timestep-major, matching the order volumes appear on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VolumeKey {
    pub timestep: usize,
    pub channel: usize,
}

impl VolumeKey {
    pub fn new(timestep: usize, channel: usize) -> Self {
        Self { timestep, channel }
    }
}

impl fmt::Display for VolumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}/c{}", self.timestep, self.channel)
    }
}

/// Value range of a channel or buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    /// Width of the range
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Smallest range covering both
    pub fn union(&self, other: &ValueRange) -> ValueRange {
        ValueRange::new(self.min.min(other.min), self.max.max(other.max))
    }
}

/// Description of one channel (physical variable) in a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Display name, e.g. "QCLOUD"
    pub name: String,
    /// Channel index within each timestep
    pub index: usize,
    /// Lower bound used when normalizing samples
    pub min: f64,
    /// Upper bound used when normalizing samples
    pub max: f64,
}

impl ChannelInfo {
    pub fn new(name: impl Into<String>, index: usize, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            index,
            min,
            max,
        }
    }

    /// The channel's normalization range
    pub fn range(&self) -> ValueRange {
        ValueRange::new(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_order_markers() {
        let v = 0x0102_0304u32;
        for order in [ByteOrder::Native, ByteOrder::Little, ByteOrder::Big] {
            assert_eq!(order.read_u32(order.write_u32(v)), v);
        }
        assert_eq!(ByteOrder::Big.write_u32(v), [1, 2, 3, 4]);
        assert_eq!(ByteOrder::Little.write_u32(v), [4, 3, 2, 1]);
    }

    #[test]
    fn test_native_never_swaps() {
        assert!(!ByteOrder::Native.needs_swap());
        assert_ne!(ByteOrder::Little.needs_swap(), ByteOrder::Big.needs_swap());

        let mut samples = [1.5f32, -2.0];
        ByteOrder::Native.fix_samples(&mut samples);
        assert_eq!(samples, [1.5, -2.0]);
    }

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![
            VolumeKey::new(1, 0),
            VolumeKey::new(0, 2),
            VolumeKey::new(0, 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![VolumeKey::new(0, 1), VolumeKey::new(0, 2), VolumeKey::new(1, 0)]
        );
        assert_eq!(VolumeKey::new(3, 1).to_string(), "t3/c1");
    }

    #[test]
    fn test_value_range() {
        let a = ValueRange::new(0.0, 10.0);
        assert!(a.is_valid());
        assert!(!ValueRange::new(1.0, 0.0).is_valid());
        assert!(!ValueRange::new(f64::NAN, 0.0).is_valid());
        assert_eq!(a.union(&ValueRange::new(-5.0, 3.0)), ValueRange::new(-5.0, 10.0));
        assert_eq!(a.span(), 10.0);
    }

    #[test]
    fn test_channel_range() {
        let info = ChannelInfo::new("QVAPOR", 2, 0.0, 0.02);
        assert_eq!(info.range(), ValueRange::new(0.0, 0.02));
    }
}
