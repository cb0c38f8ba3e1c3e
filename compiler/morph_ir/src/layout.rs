//! Texture layouts and layout blocks.
//!
//! A layout partitions a texture atlas into rectangular blocks, each
//! backing one UV island of a mesh. Block ids are absolute across the
//! whole compiled program: the high 32 bits are the owning mesh's unique
//! id prefix and the low 32 bits the block index, so constant meshes stay
//! reusable across contexts and overridden layouts agree with the parent
//! context's numbering. Id 0 is reserved and never valid.

/// The reserved, never-assigned block id.
pub const INVALID_BLOCK_ID: u64 = 0;

/// How blocks are packed into the atlas at runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum PackStrategy {
    /// Blocks keep their authored cells; the atlas may grow.
    #[default]
    Resizable,
    /// The atlas size is fixed; blocks shrink to fit.
    Fixed,
    /// Blocks overlap freely; used for decal-style layouts.
    Overlay,
}

/// How a block is shrunk when the atlas runs out of room.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum ReductionMethod {
    #[default]
    Halve,
    Unitary,
}

/// One rectangular atlas region backing a UV island.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LayoutBlock {
    /// Cell coordinates of the top-left corner.
    pub min: [u16; 2],
    /// Size in cells.
    pub size: [u16; 2],
    /// Higher priority blocks are reduced last.
    pub priority: i32,
    pub reduce_both_axes: bool,
    pub reduce_by_two: bool,
    /// Absolute id, see [`Layout::block_id`].
    pub id: u64,
}

/// A texture layout: a grid of cells and the blocks placed on it.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Layout {
    /// Grid size in cells.
    pub grid: [u16; 2],
    /// Maximum grid size the runtime packer may grow to.
    pub max_grid: [u16; 2],
    pub strategy: PackStrategy,
    pub reduction: ReductionMethod,
    pub blocks: Vec<LayoutBlock>,
}

impl Layout {
    /// Compose the absolute id of a block.
    ///
    /// `prefix` is the owning mesh's unique id and is always >= 1, so the
    /// result can never collide with [`INVALID_BLOCK_ID`].
    #[inline]
    pub fn block_id(prefix: u32, index: usize) -> u64 {
        (u64::from(prefix) << 32) | index as u64
    }
}

bitflags::bitflags! {
    /// Policies applied by a prepare-layout operation.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct MeshLayoutFlags: u8 {
        /// Emit absolute block ids. Always set: relative ids would make
        /// constant meshes context-dependent.
        const ABSOLUTE_BLOCK_IDS = 1;
        /// Normalize UVs into the unit square before block assignment.
        const NORMALIZE_UVS = 1 << 1;
        /// Keep every UV island inside its main block; used when a lower
        /// LOD reuses a higher LOD's layout and small vertex
        /// displacements could move an island across a block boundary.
        const CLAMP_UV_ISLANDS = 1 << 2;
        /// Assign a block to every vertex, even ones outside all blocks.
        const ENSURE_ALL_VERTICES_HAVE_BLOCK = 1 << 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn block_ids_are_absolute_and_nonzero() {
        assert_eq!(Layout::block_id(1, 0), 1u64 << 32);
        assert_eq!(Layout::block_id(7, 3), (7u64 << 32) | 3);
        assert_ne!(Layout::block_id(1, 0), INVALID_BLOCK_ID);
    }
}
