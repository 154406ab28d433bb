//! Compact sampler descriptions.
//!
//! A [`SamplerFlags`] word packs the minification filter, magnification
//! filter and both wrap modes of a texture sampler into a single byte:
//!
//! ```text
//! bit  7 6 | 5 4 | 3   | 2 1 0
//!      wrapT wrapS mag   min
//! ```
//!
//! The min filter uses one bit for linear filtering and one bit each for
//! nearest/linear mipmap selection. Magnification has no mipmaps, so only the
//! linear bit is stored for it.

use crate::{device::GraphicsDevice, id::SamplerId};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FilterMode {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SamplerFlags(pub u8);

impl SamplerFlags {
    pub const FILTER_NEAREST: u8 = 0;
    pub const FILTER_LINEAR: u8 = 1 << 0;
    pub const FILTER_MIPMAP_NEAREST: u8 = 1 << 1;
    pub const FILTER_MIPMAP_LINEAR: u8 = 1 << 2;

    pub const WRAP_REPEAT: u8 = 0;
    pub const WRAP_CLAMP: u8 = 1 << 0;
    pub const WRAP_MIRROR: u8 = 1 << 1;

    pub const FILTER_MIN_BITS: u8 = 3;
    pub const FILTER_MIN_MASK: u8 = (1 << Self::FILTER_MIN_BITS) - 1;
    pub const FILTER_MAG_BITS: u8 = 1;
    pub const FILTER_MAG_SHIFT: u8 = Self::FILTER_MIN_BITS;
    pub const FILTER_MAG_MASK: u8 = (1 << Self::FILTER_MAG_BITS) - 1;
    pub const WRAP_S_BITS: u8 = 2;
    pub const WRAP_S_SHIFT: u8 = Self::FILTER_MAG_SHIFT + Self::FILTER_MAG_BITS;
    pub const WRAP_S_MASK: u8 = (1 << Self::WRAP_S_BITS) - 1;
    pub const WRAP_T_BITS: u8 = 2;
    pub const WRAP_T_SHIFT: u8 = Self::WRAP_S_SHIFT + Self::WRAP_S_BITS;
    pub const WRAP_T_MASK: u8 = (1 << Self::WRAP_T_BITS) - 1;

    pub const MIPMAP_MASK: u8 = Self::FILTER_MIPMAP_NEAREST | Self::FILTER_MIPMAP_LINEAR;

    /// Linear filtering, repeat wrapping.
    pub const DEFAULT: Self = Self(
        Self::FILTER_LINEAR
            | (Self::FILTER_LINEAR << Self::FILTER_MAG_SHIFT)
            | (Self::WRAP_REPEAT << Self::WRAP_S_SHIFT)
            | (Self::WRAP_REPEAT << Self::WRAP_T_SHIFT),
    );

    /// Used for synthesized 1x1 textures.
    pub const SINGLE_VALUE: Self = Self::encode(
        FilterMode::Nearest,
        FilterMode::Nearest,
        WrapMode::ClampToEdge,
        WrapMode::ClampToEdge,
    );

    pub const fn encode(
        min_filter: FilterMode,
        mag_filter: FilterMode,
        wrap_s: WrapMode,
        wrap_t: WrapMode,
    ) -> Self {
        Self(
            filter_bits(min_filter)
                | ((filter_bits(mag_filter) & Self::FILTER_MAG_MASK) << Self::FILTER_MAG_SHIFT)
                | (wrap_bits(wrap_s) << Self::WRAP_S_SHIFT)
                | (wrap_bits(wrap_t) << Self::WRAP_T_SHIFT),
        )
    }

    /// `None` when the min filter bits select no filter mode (patterns 6 and 7).
    pub fn min_filter(self) -> Option<FilterMode> {
        FILTER_MODES
            .get((self.0 & Self::FILTER_MIN_MASK) as usize)
            .copied()
    }

    pub fn mag_filter(self) -> Option<FilterMode> {
        FILTER_MODES
            .get(((self.0 >> Self::FILTER_MAG_SHIFT) & Self::FILTER_MAG_MASK) as usize)
            .copied()
    }

    /// `None` when both wrap bits are set.
    pub fn wrap_s(self) -> Option<WrapMode> {
        WRAP_MODES
            .get(((self.0 >> Self::WRAP_S_SHIFT) & Self::WRAP_S_MASK) as usize)
            .copied()
    }

    pub fn wrap_t(self) -> Option<WrapMode> {
        WRAP_MODES
            .get(((self.0 >> Self::WRAP_T_SHIFT) & Self::WRAP_T_MASK) as usize)
            .copied()
    }

    pub fn has_mipmaps(self) -> bool {
        self.0 & Self::MIPMAP_MASK != 0
    }

    pub fn descriptor(self) -> SamplerDescriptor {
        let defaults = SamplerDescriptor::default();
        let descriptor = SamplerDescriptor {
            min_filter: self.min_filter().unwrap_or(defaults.min_filter),
            mag_filter: self.mag_filter().unwrap_or(defaults.mag_filter),
            wrap_s: self.wrap_s().unwrap_or(defaults.wrap_s),
            wrap_t: self.wrap_t().unwrap_or(defaults.wrap_t),
            wrap_r: defaults.wrap_r,
        };
        if self.min_filter().is_none() || self.wrap_s().is_none() || self.wrap_t().is_none() {
            tracing::warn!(flags = self.0, "undecodable sampler flags, using defaults");
        }
        descriptor
    }

    pub fn make_sampler(self, device: &mut dyn GraphicsDevice) -> SamplerId {
        device.create_sampler(&self.descriptor())
    }
}

impl Default for SamplerFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SamplerDescriptor {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            wrap_r: WrapMode::Repeat,
        }
    }
}

// Indexed by the min filter bit pattern.
const FILTER_MODES: [FilterMode; 6] = [
    FilterMode::Nearest,
    FilterMode::Linear,
    FilterMode::NearestMipmapNearest,
    FilterMode::LinearMipmapNearest,
    FilterMode::NearestMipmapLinear,
    FilterMode::LinearMipmapLinear,
];

const WRAP_MODES: [WrapMode; 3] = [
    WrapMode::Repeat,
    WrapMode::ClampToEdge,
    WrapMode::MirroredRepeat,
];

const fn filter_bits(mode: FilterMode) -> u8 {
    match mode {
        FilterMode::Nearest => SamplerFlags::FILTER_NEAREST,
        FilterMode::Linear => SamplerFlags::FILTER_LINEAR,
        FilterMode::NearestMipmapNearest => {
            SamplerFlags::FILTER_NEAREST | SamplerFlags::FILTER_MIPMAP_NEAREST
        }
        FilterMode::LinearMipmapNearest => {
            SamplerFlags::FILTER_LINEAR | SamplerFlags::FILTER_MIPMAP_NEAREST
        }
        FilterMode::NearestMipmapLinear => {
            SamplerFlags::FILTER_NEAREST | SamplerFlags::FILTER_MIPMAP_LINEAR
        }
        FilterMode::LinearMipmapLinear => {
            SamplerFlags::FILTER_LINEAR | SamplerFlags::FILTER_MIPMAP_LINEAR
        }
    }
}

const fn wrap_bits(mode: WrapMode) -> u8 {
    match mode {
        WrapMode::Repeat => SamplerFlags::WRAP_REPEAT,
        WrapMode::ClampToEdge => SamplerFlags::WRAP_CLAMP,
        WrapMode::MirroredRepeat => SamplerFlags::WRAP_MIRROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;

    const FILTERS: [FilterMode; 6] = FILTER_MODES;
    const WRAPS: [WrapMode; 3] = WRAP_MODES;

    #[test]
    fn encode_decode_reproduces_modes() {
        for min in FILTERS {
            for mag in [FilterMode::Nearest, FilterMode::Linear] {
                for wrap_s in WRAPS {
                    for wrap_t in WRAPS {
                        let flags = SamplerFlags::encode(min, mag, wrap_s, wrap_t);
                        assert_eq!(flags.min_filter(), Some(min));
                        assert_eq!(flags.mag_filter(), Some(mag));
                        assert_eq!(flags.wrap_s(), Some(wrap_s));
                        assert_eq!(flags.wrap_t(), Some(wrap_t));
                    }
                }
            }
        }
    }

    #[test]
    fn mag_filter_drops_mipmap_selection() {
        let flags = SamplerFlags::encode(
            FilterMode::Nearest,
            FilterMode::LinearMipmapLinear,
            WrapMode::Repeat,
            WrapMode::Repeat,
        );
        assert_eq!(flags.mag_filter(), Some(FilterMode::Linear));
        assert!(!flags.has_mipmaps());
    }

    #[test]
    fn mipmap_bits_follow_min_filter() {
        let flags = SamplerFlags::encode(
            FilterMode::LinearMipmapNearest,
            FilterMode::Linear,
            WrapMode::ClampToEdge,
            WrapMode::Repeat,
        );
        assert!(flags.has_mipmaps());
        assert!(!SamplerFlags::DEFAULT.has_mipmaps());
        assert!(!SamplerFlags::SINGLE_VALUE.has_mipmaps());
    }

    #[test]
    fn unassigned_patterns_do_not_decode() {
        let flags = SamplerFlags(0b1111_0111);
        assert_eq!(flags.min_filter(), None);
        assert_eq!(flags.wrap_s(), None);
        assert_eq!(flags.wrap_t(), None);
        assert_eq!(flags.descriptor(), SamplerDescriptor {
            mag_filter: FilterMode::Nearest,
            ..SamplerDescriptor::default()
        });
    }

    #[test]
    fn make_sampler_creates_decoded_sampler() {
        let mut device = HeadlessDevice::new();
        let flags = SamplerFlags::encode(
            FilterMode::NearestMipmapLinear,
            FilterMode::Nearest,
            WrapMode::ClampToEdge,
            WrapMode::MirroredRepeat,
        );
        let id = flags.make_sampler(&mut device);
        let sampler = device.sampler(id).unwrap();
        assert_eq!(sampler.min_filter, FilterMode::NearestMipmapLinear);
        assert_eq!(sampler.mag_filter, FilterMode::Nearest);
        assert_eq!(sampler.wrap_s, WrapMode::ClampToEdge);
        assert_eq!(sampler.wrap_t, WrapMode::MirroredRepeat);
    }
}
