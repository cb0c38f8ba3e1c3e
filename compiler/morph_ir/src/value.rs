//! Opaque value types carried by IR operations.
//!
//! Pixel and vertex algorithms live outside this compiler; meshes and
//! images are treated here as payloads with just enough structure for
//! constant deduplication (counts, formats, similarity checks). Floats are
//! wrapped in [`Real`] so every value type can participate in the IR's
//! structural equality and hashing.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

/// An `f32` with bit-pattern equality and hashing.
///
/// IR nodes must be usable as hash-map keys for memoization, which plain
/// floats cannot. Comparing bit patterns means `NaN == NaN` and
/// `0.0 != -0.0`; both are acceptable for cache identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct Real(pub f32);

impl Real {
    pub const ZERO: Real = Real(0.0);
    pub const ONE: Real = Real(1.0);

    /// The wrapped value.
    #[inline]
    pub fn value(self) -> f32 {
        self.0
    }
}

impl PartialEq for Real {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Real {}

impl Hash for Real {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f32> for Real {
    fn from(value: f32) -> Self {
        Real(value)
    }
}

/// An RGBA color in linear space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Color {
    pub r: Real,
    pub g: Real,
    pub b: Real,
    pub a: Real,
}

impl Color {
    pub const BLACK: Color = Color {
        r: Real::ZERO,
        g: Real::ZERO,
        b: Real::ZERO,
        a: Real::ONE,
    };
    pub const WHITE: Color = Color {
        r: Real::ONE,
        g: Real::ONE,
        b: Real::ONE,
        a: Real::ONE,
    };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Color {
            r: Real(r),
            g: Real(g),
            b: Real(b),
            a: Real(a),
        }
    }

    pub fn from_array(v: [f32; 4]) -> Self {
        Color::new(v[0], v[1], v[2], v[3])
    }
}

/// A 4x4 matrix in column-major order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Matrix4(pub [Real; 16]);

impl Matrix4 {
    pub const IDENTITY: Matrix4 = {
        let mut m = [Real::ZERO; 16];
        m[0] = Real::ONE;
        m[5] = Real::ONE;
        m[10] = Real::ONE;
        m[15] = Real::ONE;
        Matrix4(m)
    };

    pub fn from_array(v: [f32; 16]) -> Self {
        let mut m = [Real::ZERO; 16];
        let mut i = 0;
        while i < 16 {
            m[i] = Real(v[i]);
            i += 1;
        }
        Matrix4(m)
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Matrix4::IDENTITY
    }
}

/// How a projector maps its volume onto a surface.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum ProjectionType {
    #[default]
    Planar,
    Cylindrical,
    Wrapping,
}

/// A texture projector volume.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Projector {
    pub projection: ProjectionType,
    pub position: [Real; 3],
    pub direction: [Real; 3],
    pub up: [Real; 3],
    pub scale: [Real; 3],
    /// Aperture angle in radians, cylindrical projectors only.
    pub angle: Real,
}

/// Pixel format of an image payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum ImageFormat {
    /// Single 8-bit luminance channel.
    L8,
    #[default]
    Rgb8,
    Rgba8,
    /// Block-compressed; opaque to this compiler.
    Compressed,
}

impl ImageFormat {
    /// Bytes per pixel, or `None` for block-compressed data.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            ImageFormat::L8 => Some(1),
            ImageFormat::Rgb8 => Some(3),
            ImageFormat::Rgba8 => Some(4),
            ImageFormat::Compressed => None,
        }
    }
}

/// An opaque image payload.
///
/// The compiler never inspects pixels beyond what mask construction for
/// block patches requires; everything else is done by the runtime.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Image {
    pub size: [u16; 2],
    pub format: ImageFormat,
    pub lods: u8,
    pub data: Arc<[u8]>,
}

impl Image {
    pub fn new(size: [u16; 2], format: ImageFormat, lods: u8, data: Vec<u8>) -> Self {
        Image {
            size,
            format,
            lods,
            data: data.into(),
        }
    }

    /// A zero-filled single-mip image of the given size and format.
    pub fn blank(size: [u16; 2], format: ImageFormat) -> Self {
        let bytes = format
            .bytes_per_pixel()
            .map_or(0, |bpp| usize::from(size[0]) * usize::from(size[1]) * bpp);
        Image::new(size, format, 1, vec![0; bytes])
    }
}

/// An opaque mesh payload.
///
/// Vertex streams are carried as a byte blob; only the counts and the
/// number of UV channels are visible to the compiler, which is enough for
/// the coarse constant-mesh dedup buckets.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Mesh {
    pub vertex_count: u32,
    pub index_count: u32,
    pub uv_channels: u8,
    pub data: Arc<[u8]>,
}

impl Mesh {
    pub fn new(vertex_count: u32, index_count: u32, uv_channels: u8, data: Vec<u8>) -> Self {
        Mesh {
            vertex_count,
            index_count,
            uv_channels,
            data: data.into(),
        }
    }

    /// A mesh with no geometry at all.
    pub fn empty() -> Self {
        Mesh::new(0, 0, 0, Vec::new())
    }

    /// Fine-grained match used inside a dedup bucket after the coarse
    /// (vertex count, index count) key already agreed.
    pub fn is_similar(&self, other: &Mesh) -> bool {
        self.vertex_count == other.vertex_count
            && self.index_count == other.index_count
            && self.uv_channels == other.uv_channels
            && self.data == other.data
    }

    /// Content hash used to seed unique mesh-id allocation.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Host-defined payload attached to an instance.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ExtensionData {
    pub name: String,
    pub data: Arc<[u8]>,
}

impl ExtensionData {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        ExtensionData {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Placeholder payload used when a required connection is missing.
    pub fn empty() -> Self {
        ExtensionData::new("", Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn real_compares_by_bits() {
        assert_eq!(Real(1.5), Real(1.5));
        assert_ne!(Real(0.0), Real(-0.0));
        assert_eq!(Real(f32::NAN), Real(f32::NAN));
    }

    #[test]
    fn mesh_similarity_requires_identical_payload() {
        let a = Mesh::new(4, 6, 1, vec![1, 2, 3]);
        let b = Mesh::new(4, 6, 1, vec![1, 2, 3]);
        let c = Mesh::new(4, 6, 1, vec![9, 9, 9]);
        assert!(a.is_similar(&b));
        assert!(!a.is_similar(&c));
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn blank_image_allocates_pixel_payload() {
        let img = Image::blank([4, 2], ImageFormat::Rgba8);
        assert_eq!(img.data.len(), 4 * 2 * 4);
        assert_eq!(Image::blank([4, 2], ImageFormat::Compressed).data.len(), 0);
    }
}
