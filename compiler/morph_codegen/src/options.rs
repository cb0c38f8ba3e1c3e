//! Generation option types.
//!
//! Options travel with every generator call and, together with source
//! node identity, form the memoization key. Structural equality of these
//! types is the single correctness-critical invariant of the compiler:
//! any field that can change the produced IR must participate in `Eq`
//! and `Hash`, or stale IR would be reused across incompatible requests.

use std::sync::Arc;

use morph_ir::Layout;

/// Pointer identity of a shared source node, used as cache key.
pub(crate) type NodeKey = usize;

/// Context shared by every value-domain generator call.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct GenerationOptions {
    /// Index into the collected state list, or `None` outside the
    /// per-state main pass.
    pub state: Option<usize>,
    /// Tags considered active for the subtree being generated.
    pub active_tags: Vec<String>,
    /// Whether this subtree ultimately produces an image.
    pub is_image: bool,
}

/// Mesh-generation context that is known up front.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct MeshStaticOptions {
    pub component_id: Option<u16>,
    pub lod: usize,
    pub state: Option<usize>,
    pub active_tags: Vec<String>,
}

impl MeshStaticOptions {
    /// The value-domain options for children embedded in a mesh subtree
    /// (a morph factor is a scalar, etc.).
    pub fn generic(&self) -> GenerationOptions {
        GenerationOptions {
            state: self.state,
            active_tags: self.active_tags.clone(),
            is_image: false,
        }
    }
}

/// Mesh-generation context that may depend on a sibling subtree's
/// completed result, so it is delivered as a task rather than a value.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct MeshDynamicOptions {
    /// Assign texture layouts at all. Disabled for helper meshes (clip
    /// shapes, poses) that never carry textures.
    pub layouts: bool,
    pub normalize_uvs: bool,
    pub clamp_uv_islands: bool,
    pub ensure_all_vertices_have_block: bool,
    /// When re-entering a subtree whose layout must match a previously
    /// generated one, the layouts to use instead of the source's own.
    pub override_layouts: Vec<Arc<Layout>>,
}

impl MeshDynamicOptions {
    /// Options for a surface mesh: layouts on, everything else default.
    pub fn with_layouts() -> Self {
        MeshDynamicOptions {
            layouts: true,
            ..MeshDynamicOptions::default()
        }
    }
}

/// Image-generation context.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct ImageOptions {
    pub state: Option<usize>,
    pub active_tags: Vec<String>,
    pub component_id: Option<u16>,
    pub lod: usize,
    /// Target rectangle in pixels; `[0, 0]` keeps the source's natural
    /// size.
    pub rect_size: [u16; 2],
    /// Set while generating the contents of one layout block, so block
    /// patches can address it.
    pub layout_block_id: Option<u64>,
}

impl ImageOptions {
    /// The value-domain options for children embedded in an image
    /// subtree.
    pub fn generic(&self) -> GenerationOptions {
        GenerationOptions {
            state: self.state,
            active_tags: self.active_tags.clone(),
            is_image: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn options_equality_is_structural() {
        let a = GenerationOptions {
            state: Some(1),
            active_tags: vec!["Armor".to_owned()],
            is_image: false,
        };
        let b = a.clone();
        assert_eq!(a, b);

        let differing_state = GenerationOptions {
            state: Some(2),
            ..a.clone()
        };
        assert_ne!(a, differing_state);

        let differing_tags = GenerationOptions {
            active_tags: vec!["Cloth".to_owned()],
            ..a.clone()
        };
        assert_ne!(a, differing_tags);
    }

    #[test]
    fn dynamic_options_compare_override_layouts_by_content() {
        let layout = Arc::new(Layout {
            grid: [4, 4],
            max_grid: [8, 8],
            strategy: morph_ir::PackStrategy::Resizable,
            reduction: morph_ir::ReductionMethod::Halve,
            blocks: Vec::new(),
        });
        let a = MeshDynamicOptions {
            layouts: true,
            override_layouts: vec![Arc::clone(&layout)],
            ..MeshDynamicOptions::default()
        };
        let b = MeshDynamicOptions {
            layouts: true,
            override_layouts: vec![Arc::new((*layout).clone())],
            ..MeshDynamicOptions::default()
        };
        assert_eq!(a, b);
    }
}
