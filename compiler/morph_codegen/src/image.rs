//! Image-domain generator.
//!
//! Synchronous, unlike mesh generation: image subtrees are cheap to
//! lower and need no cross-sibling layout donation. Shares the mesh
//! path's fail-soft policy (placeholder plain colors), and provides the
//! helpers used by surface assembly: format coercion, resizing, tiling
//! of large targets into crop/patch grids, and block-patch masking for
//! surface-edit modifiers.

use std::sync::Arc;

use morph_diagnostic::{MessageContext, Severity, SpamBin};
use morph_graph::{node_identity, CellValue, ColumnType, ImageNode, ImageNodeRef, PatchRect,
    SwitchNode, TexturePatch, VariationNode};
use morph_ir::{
    BlendType, Color, ColorOp, Conditional, Image, ImageFormat, ImageOp, ImageOpRef, Switch,
    SwitchCase,
};

use crate::color::MISSING_COLOR;
use crate::options::ImageOptions;
use crate::scalar::case_value;
use crate::CodeGenerator;

/// Placeholder size when no target rectangle is known.
const PLACEHOLDER_SIZE: [u16; 2] = [4, 4];

impl CodeGenerator {
    pub(crate) fn generate_image(
        &self,
        options: &ImageOptions,
        node: Option<&ImageNodeRef>,
    ) -> ImageOpRef {
        let Some(node) = node else {
            return self.blank_image_op(options);
        };
        if self.options.disable_resource_generation {
            return self.blank_image_op(options);
        }
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.images.get(&key) {
            return hit;
        }
        let result = stacker::maybe_grow(crate::STACK_RED_ZONE, crate::STACK_GROW, || {
            self.image_dispatch(options, node)
        });
        self.caches.images.insert_shared(key, result)
    }

    /// Neutral blank constant for silently absent images.
    fn blank_image_op(&self, options: &ImageOptions) -> ImageOpRef {
        let size = placeholder_size(options);
        Arc::new(ImageOp::Constant {
            image: Arc::new(Image::blank(size, ImageFormat::Rgb8)),
        })
    }

    /// Report a missing required image connection and produce a loud
    /// plain-color placeholder in its place.
    pub(crate) fn missing_image(
        &self,
        what: &str,
        format: ImageFormat,
        context: &MessageContext,
        options: &ImageOptions,
    ) -> ImageOpRef {
        self.sink.add(
            format!("required {what} connection is missing"),
            Severity::Error,
            context.clone(),
            SpamBin::MissingConnection,
        );
        Arc::new(ImageOp::PlainColor {
            color: Arc::new(ColorOp::Constant(MISSING_COLOR)),
            size: placeholder_size(options),
            format,
            lods: 1,
        })
    }

    fn image_dispatch(&self, options: &ImageOptions, node: &ImageNodeRef) -> ImageOpRef {
        match &**node {
            ImageNode::Constant { image, .. } => Arc::new(ImageOp::Constant {
                image: Arc::clone(image),
            }),
            ImageNode::Reference { id, context } => self.image_reference(options, *id, context),
            ImageNode::Parameter(decl) => crate::params::image_parameter_op(
                &self.caches.params,
                &self.sink,
                node_identity(node),
                decl,
            ),
            ImageNode::PlainColor {
                color,
                size,
                format,
                context,
            } => {
                let color = match color {
                    Some(child) => self.generate_color(&options.generic(), Some(child)),
                    None => {
                        self.sink.add(
                            "required plain color connection is missing",
                            Severity::Error,
                            context.clone(),
                            SpamBin::MissingConnection,
                        );
                        Arc::new(ColorOp::Constant(MISSING_COLOR))
                    }
                };
                let size = if *size == [0, 0] {
                    placeholder_size(options)
                } else {
                    *size
                };
                Arc::new(ImageOp::PlainColor {
                    color,
                    size,
                    format: *format,
                    lods: 1,
                })
            }
            ImageNode::Switch(switch) => self.image_switch(options, switch),
            ImageNode::Variation(variation) => self.image_variation(options, variation),
            ImageNode::Table(table) => {
                let expanded =
                    self.expand_table(&options.generic(), table, ColumnType::Image, false, |cell, _| {
                        match cell {
                            CellValue::Image(Some(image)) => Some(Arc::new(ImageOp::Constant {
                                image: Arc::clone(image),
                            })),
                            CellValue::Image(None) => None,
                            _ => unreachable!("column type was validated by the expander"),
                        }
                    });
                match expanded {
                    Some(switch) => Arc::new(ImageOp::Switch(switch)),
                    None => self.blank_image_op(options),
                }
            }
            ImageNode::Layer {
                base,
                blend,
                mask,
                blend_type,
                context,
            } => {
                let base = match base {
                    Some(child) => self.generate_image(options, Some(child)),
                    None => self.missing_image("layer base image", ImageFormat::Rgb8, context, options),
                };
                let blend = match blend {
                    Some(child) => self.generate_image(options, Some(child)),
                    None => self.missing_image("layer blend image", ImageFormat::Rgb8, context, options),
                };
                let mask = mask
                    .as_ref()
                    .map(|child| self.image_format(self.generate_image(options, Some(child)), ImageFormat::L8));
                Arc::new(ImageOp::Layer {
                    base,
                    blend,
                    mask,
                    blend_type: *blend_type,
                    apply_to_alpha: false,
                })
            }
        }
    }

    fn image_reference(
        &self,
        options: &ImageOptions,
        id: u32,
        context: &MessageContext,
    ) -> ImageOpRef {
        if let Some(provider) = &self.options.resource_provider {
            return match provider.image(id) {
                Some(image) => Arc::new(ImageOp::Constant {
                    image: Arc::new(image),
                }),
                None => self.missing_image(
                    &format!("referenced image {id}"),
                    ImageFormat::Rgb8,
                    context,
                    options,
                ),
            };
        }
        Arc::new(ImageOp::Reference { id })
    }

    fn image_switch(&self, options: &ImageOptions, switch: &SwitchNode<ImageNode>) -> ImageOpRef {
        if switch.options.is_empty() {
            self.sink
                .error("image switch declares no options", switch.context.clone());
            return self.blank_image_op(options);
        }
        let selector = match &switch.parameter {
            Some(parameter) => self.generate_scalar(&options.generic(), Some(parameter)),
            None => self.missing_scalar("switch selector", 0.0, &switch.context),
        };
        let mut cases = Vec::with_capacity(switch.options.len());
        for (index, option) in switch.options.iter().enumerate() {
            let branch = match option {
                Some(child) => self.generate_image(options, Some(child)),
                None => self.missing_image("switch option", ImageFormat::Rgb8, &switch.context, options),
            };
            cases.push(SwitchCase::new(case_value(index), Some(branch)));
        }
        Arc::new(ImageOp::Switch(Switch {
            selector,
            cases,
            default: None,
        }))
    }

    fn image_variation(
        &self,
        options: &ImageOptions,
        variation: &VariationNode<ImageNode>,
    ) -> ImageOpRef {
        let mut current = self.generate_image(options, variation.default_value.as_ref());
        for branch in &variation.variations {
            let Some(condition) = self.tag_condition(&branch.tag, &variation.context) else {
                continue;
            };
            let content = self.generate_image(options, branch.value.as_ref());
            current = Arc::new(ImageOp::Conditional(Conditional {
                condition,
                yes: Some(content),
                no: Some(current),
            }));
        }
        current
    }

    /// Coerce an image op to a pixel format, skipping provably
    /// redundant wraps.
    pub(crate) fn image_format(&self, op: ImageOpRef, format: ImageFormat) -> ImageOpRef {
        match &*op {
            ImageOp::Constant { image } if image.format == format => op,
            ImageOp::Format { format: existing, .. } if *existing == format => op,
            ImageOp::PlainColor { format: existing, .. } if *existing == format => op,
            _ => Arc::new(ImageOp::Format { source: op, format }),
        }
    }

    /// Resize an image op to a target rectangle; `[0, 0]` keeps the
    /// natural size.
    pub(crate) fn image_resize(&self, op: ImageOpRef, size: [u16; 2]) -> ImageOpRef {
        if size == [0, 0] {
            return op;
        }
        match &*op {
            ImageOp::Constant { image } if image.size == size => op,
            ImageOp::PlainColor { size: existing, .. } if *existing == size => op,
            ImageOp::Resize { size: existing, .. } if *existing == size => op,
            _ => Arc::new(ImageOp::Resize { source: op, size }),
        }
    }

    /// Split a large target image into independently generated tiles
    /// recombined with crop/patch ops. Leaves small targets untouched.
    pub(crate) fn apply_tiling(
        &self,
        source: ImageOpRef,
        size: [u16; 2],
        format: ImageFormat,
    ) -> ImageOpRef {
        let tile = self.options.image_tiling;
        if tile == 0 || size == [0, 0] {
            return source;
        }
        let tiles_x = size[0].div_ceil(tile);
        let tiles_y = size[1].div_ceil(tile);
        if u32::from(tiles_x) * u32::from(tiles_y) <= 2 {
            return source;
        }

        let mut current: ImageOpRef = Arc::new(ImageOp::PlainColor {
            color: Arc::new(ColorOp::Constant(Color::BLACK)),
            size,
            format,
            lods: 1,
        });
        for y in 0..tiles_y {
            for x in 0..tiles_x {
                let min = [x * tile, y * tile];
                let tile_size = [
                    tile.min(size[0] - min[0]),
                    tile.min(size[1] - min[1]),
                ];
                let cropped = Arc::new(ImageOp::Crop {
                    source: Arc::clone(&source),
                    min,
                    size: tile_size,
                });
                current = Arc::new(ImageOp::Patch {
                    base: current,
                    patch: cropped,
                    location: min,
                });
            }
        }
        current
    }

    /// Apply one surface-edit texture patch to the image backing a
    /// layout block, masked to the patch rectangles and guarded by the
    /// modifier's condition.
    pub(crate) fn image_block_patch(
        &self,
        block_op: ImageOpRef,
        patch: &TexturePatch,
        patch_mask: Arc<Image>,
        condition: Option<&morph_ir::BoolOpRef>,
        context: &MessageContext,
        options: &ImageOptions,
    ) -> ImageOpRef {
        let blend = match &patch.image {
            Some(node) => self.generate_image(options, Some(node)),
            None => self.missing_image("patch blend image", ImageFormat::Rgb8, context, options),
        };
        let blend = self.image_resize(blend, options.rect_size);

        let rect_mask: ImageOpRef = Arc::new(ImageOp::Constant { image: patch_mask });
        let mask = match &patch.mask {
            Some(node) => {
                // Combine the block rect mask with the author's mask.
                let user_mask = self.generate_image(options, Some(node));
                Arc::new(ImageOp::Layer {
                    base: user_mask,
                    blend: rect_mask,
                    mask: None,
                    blend_type: BlendType::Multiply,
                    apply_to_alpha: false,
                })
            }
            None => rect_mask,
        };
        let mask = self.image_resize(self.image_format(mask, ImageFormat::L8), options.rect_size);

        let layered = Arc::new(ImageOp::Layer {
            base: Arc::clone(&block_op),
            blend,
            mask: Some(mask),
            blend_type: patch.blend_type,
            apply_to_alpha: patch.apply_to_alpha,
        });

        match condition {
            Some(condition) => Arc::new(ImageOp::Conditional(Conditional {
                condition: Arc::clone(condition),
                yes: Some(layered),
                no: Some(block_op),
            })),
            None => layered,
        }
    }
}

fn placeholder_size(options: &ImageOptions) -> [u16; 2] {
    if options.rect_size == [0, 0] {
        PLACEHOLDER_SIZE
    } else {
        options.rect_size
    }
}

/// Rasterize the intersection of a patch's rectangles with one layout
/// block into an L8 mask, or `None` when they do not overlap.
///
/// `grid` is the layout's cell grid, `block_pixels` the pixel size of a
/// cell, and `block_rect` the block's (min, size) in cells.
pub(crate) fn block_patch_mask(
    rects: &[PatchRect],
    grid: [u16; 2],
    block_pixels: [u16; 2],
    block_rect: ([u16; 2], [u16; 2]),
) -> Option<Image> {
    let texture_size = [
        u32::from(grid[0]) * u32::from(block_pixels[0]),
        u32::from(grid[1]) * u32::from(block_pixels[1]),
    ];
    let block_min = [
        u32::from(block_rect.0[0]) * u32::from(block_pixels[0]),
        u32::from(block_rect.0[1]) * u32::from(block_pixels[1]),
    ];
    let block_size = [
        u32::from(block_rect.1[0]) * u32::from(block_pixels[0]),
        u32::from(block_rect.1[1]) * u32::from(block_pixels[1]),
    ];
    let block_max = [block_min[0] + block_size[0], block_min[1] + block_size[1]];

    let mut data: Option<Vec<u8>> = None;
    for rect in rects {
        let rect_min = [
            scale_to_pixels(rect.min[0], texture_size[0]),
            scale_to_pixels(rect.min[1], texture_size[1]),
        ];
        let rect_max = [
            scale_to_pixels(rect.max[0], texture_size[0]),
            scale_to_pixels(rect.max[1], texture_size[1]),
        ];

        let clipped_min = [rect_min[0].max(block_min[0]), rect_min[1].max(block_min[1])];
        let clipped_max = [rect_max[0].min(block_max[0]), rect_max[1].min(block_max[1])];
        if clipped_min[0] >= clipped_max[0] || clipped_min[1] >= clipped_max[1] {
            continue;
        }

        let pixels = data.get_or_insert_with(|| {
            vec![0u8; block_size[0] as usize * block_size[1] as usize]
        });
        let offset = [clipped_min[0] - block_min[0], clipped_min[1] - block_min[1]];
        let extent = [clipped_max[0] - clipped_min[0], clipped_max[1] - clipped_min[1]];
        for row in offset[1]..offset[1] + extent[1] {
            let start = (row * block_size[0] + offset[0]) as usize;
            let end = start + extent[0] as usize;
            pixels[start..end].fill(255);
        }
    }

    data.map(|data| {
        Image::new(
            [block_size[0] as u16, block_size[1] as u16],
            ImageFormat::L8,
            1,
            data,
        )
    })
}

fn scale_to_pixels(normalized: f32, size: u32) -> u32 {
    let scaled = normalized * size as f32;
    if scaled <= 0.0 {
        0
    } else {
        (scaled as u32).min(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mask_covers_intersection_only() {
        let rects = [PatchRect {
            min: [0.0, 0.0],
            max: [0.5, 0.5],
        }];
        // 2x2 grid of 4x4-pixel cells; block is the top-left cell.
        let mask = block_patch_mask(&rects, [2, 2], [4, 4], ([0, 0], [1, 1]));
        let mask = mask.unwrap_or_else(|| Image::blank([0, 0], ImageFormat::L8));
        assert_eq!(mask.size, [4, 4]);
        // The patch covers the whole block.
        assert!(mask.data.iter().all(|&b| b == 255));
    }

    #[test]
    fn mask_is_none_without_overlap() {
        let rects = [PatchRect {
            min: [0.5, 0.5],
            max: [1.0, 1.0],
        }];
        // Block is the top-left cell, patch covers the bottom-right.
        let mask = block_patch_mask(&rects, [2, 2], [4, 4], ([0, 0], [1, 1]));
        assert!(mask.is_none());
    }

    #[test]
    fn partial_overlap_fills_partial_rows() {
        let rects = [PatchRect {
            min: [0.0, 0.0],
            max: [0.25, 1.0],
        }];
        let mask = block_patch_mask(&rects, [2, 2], [4, 4], ([0, 0], [1, 1]));
        let mask = mask.unwrap_or_else(|| Image::blank([0, 0], ImageFormat::L8));
        // Left half of each 4-pixel row is set.
        for row in 0..4 {
            let row_pixels = &mask.data[row * 4..row * 4 + 4];
            assert_eq!(row_pixels, &[255, 255, 0, 0]);
        }
    }
}
