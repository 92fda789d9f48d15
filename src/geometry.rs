//! Mapping between PDF user space, quad point regions and raster pixels.

use crate::model::{Glyph, Region};

/// Default slack, in user-space units, when testing glyph anchors against a region.
pub const DEFAULT_TOLERANCE: f32 = 2.0;

/// Default outward padding, in pixels, around a mapped crop.
pub const DEFAULT_PADDING: u32 = 5;

/// Rectangle in raster space (origin top-left, y down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Bounding box of one quadrilateral given as 8 numbers (4 x/y pairs).
///
/// Quads are not assumed to be axis-aligned or to list their corners in any
/// particular order, so min/max run over all four points on each axis.
pub fn quad_to_region(quad: &[f32; 8]) -> Region {
    let xs = [quad[0], quad[2], quad[4], quad[6]];
    let ys = [quad[1], quad[3], quad[5], quad[7]];
    let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
    let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min);
    let max_y = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    Region::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

/// Split a flat quad point array into one region per quadrilateral.
///
/// Returns `None` when the array length is not a multiple of 8.
pub fn quad_points_to_regions(quad_points: &[f32]) -> Option<Vec<Region>> {
    if quad_points.len() % 8 != 0 {
        return None;
    }
    let regions = quad_points
        .chunks_exact(8)
        .map(|chunk| {
            let mut quad = [0.0f32; 8];
            quad.copy_from_slice(chunk);
            quad_to_region(&quad)
        })
        .collect();
    Some(regions)
}

/// Map a user-space rectangle onto a rendered page image.
///
/// X and Y scale independently and Y is flipped. The result is clamped to
/// the image, then grown by `padding` pixels on each side and clamped again.
/// A rectangle that misses the image entirely maps to an empty rect.
pub fn pdf_rect_to_image_rect(
    rect: &Region,
    page_width: f32,
    page_height: f32,
    image_width: u32,
    image_height: u32,
    padding: u32,
) -> PixelRect {
    if page_width <= 0.0 || page_height <= 0.0 || image_width == 0 || image_height == 0 {
        return PixelRect::default();
    }
    let scale_x = image_width as f32 / page_width;
    let scale_y = image_height as f32 / page_height;
    let iw = image_width as f32;
    let ih = image_height as f32;

    let left = (rect.x * scale_x).floor();
    let right = (rect.upper_right_x() * scale_x).floor();
    let top = ((page_height - rect.upper_right_y()) * scale_y).floor();
    let bottom = ((page_height - rect.y) * scale_y).floor();
    if ![left, right, top, bottom].iter().all(|v| v.is_finite()) {
        return PixelRect::default();
    }
    if right <= 0.0 || bottom <= 0.0 || left >= iw || top >= ih {
        return PixelRect {
            x: left.clamp(0.0, iw - 1.0) as u32,
            y: top.clamp(0.0, ih - 1.0) as u32,
            width: 0,
            height: 0,
        };
    }

    let left = left.clamp(0.0, iw - 1.0);
    let top = top.clamp(0.0, ih - 1.0);
    let right = right.clamp(left, iw);
    let bottom = bottom.clamp(top, ih);
    if right <= left || bottom <= top {
        return PixelRect {
            x: left as u32,
            y: top as u32,
            width: 0,
            height: 0,
        };
    }

    let pad = padding as f32;
    let left = (left - pad).max(0.0);
    let top = (top - pad).max(0.0);
    let right = (right + pad).min(iw);
    let bottom = (bottom + pad).min(ih);
    PixelRect {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    }
}

/// Whether the glyph anchor lies inside `region` grown by `tolerance` on every side.
pub fn contains_with_tolerance(glyph: &Glyph, region: &Region, tolerance: f32) -> bool {
    glyph.x >= region.x - tolerance
        && glyph.x <= region.upper_right_x() + tolerance
        && glyph.y >= region.y - tolerance
        && glyph.y <= region.upper_right_y() + tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn quad_bounding_box_of_rotated_quad() {
        // Diamond: neither pair of opposite corners spans the box on both axes.
        let quad = [10.0, 20.0, 20.0, 30.0, 30.0, 20.0, 20.0, 10.0];
        assert_eq!(quad_to_region(&quad), Region::new(10.0, 10.0, 20.0, 20.0));
    }

    #[test]
    fn quad_points_must_be_groups_of_eight() {
        assert!(quad_points_to_regions(&[0.0; 7]).is_none());
        assert_eq!(quad_points_to_regions(&[]).map(|r| r.len()), Some(0));
        let regions = quad_points_to_regions(&[
            0.0, 10.0, 50.0, 10.0, 0.0, 0.0, 50.0, 0.0, //
            0.0, 30.0, 20.0, 30.0, 0.0, 20.0, 20.0, 20.0,
        ])
        .unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1], Region::new(0.0, 20.0, 20.0, 10.0));
    }

    #[test]
    fn maps_with_vertical_flip_and_padding() {
        // 612x792 page rendered at 2x.
        let rect = Region::new(100.0, 692.0, 50.0, 20.0);
        let px = pdf_rect_to_image_rect(&rect, 612.0, 792.0, 1224, 1584, 5);
        // top = (792 - 712) * 2 = 160, left = 200, size 100x40, padded by 5.
        assert_eq!(
            px,
            PixelRect {
                x: 195,
                y: 155,
                width: 110,
                height: 50
            }
        );
    }

    #[test]
    fn padding_is_clamped_at_image_edges() {
        let rect = Region::new(0.0, 0.0, 10.0, 10.0);
        let px = pdf_rect_to_image_rect(&rect, 100.0, 100.0, 100, 100, 5);
        assert_eq!(
            px,
            PixelRect {
                x: 0,
                y: 85,
                width: 15,
                height: 15
            }
        );
    }

    #[test]
    fn rect_outside_image_maps_to_empty() {
        let cases = [
            Region::new(-500.0, -500.0, 10.0, 10.0),
            Region::new(5000.0, 10.0, 10.0, 10.0),
            Region::new(10.0, 5000.0, 10.0, 10.0),
            Region::new(10.0, 10.0, 0.0, 0.0),
        ];
        for rect in cases {
            let px = pdf_rect_to_image_rect(&rect, 612.0, 792.0, 612, 792, 5);
            assert!(px.is_empty(), "{rect} mapped to {px:?}");
            assert!(px.x < 612 && px.y < 792);
        }
    }

    #[test]
    fn degenerate_page_or_image_maps_to_empty() {
        let rect = Region::new(10.0, 10.0, 10.0, 10.0);
        assert!(pdf_rect_to_image_rect(&rect, 0.0, 792.0, 612, 792, 5).is_empty());
        assert!(pdf_rect_to_image_rect(&rect, 612.0, 792.0, 0, 0, 5).is_empty());
    }

    #[test]
    fn containment_honours_tolerance() {
        let region = Region::new(10.0, 10.0, 10.0, 10.0);
        assert!(contains_with_tolerance(&Glyph::new("a", 8.5, 21.5), &region, 2.0));
        assert!(!contains_with_tolerance(&Glyph::new("a", 7.5, 15.0), &region, 2.0));
        assert!(!contains_with_tolerance(&Glyph::new("a", 15.0, 22.5), &region, 2.0));
    }

    proptest! {
        #[test]
        fn quad_box_is_invariant_under_corner_permutation(
            points in prop::array::uniform4((-1000.0f32..1000.0, -1000.0f32..1000.0)),
            perm in Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
        ) {
            let flatten = |order: &[usize]| {
                let mut quad = [0.0f32; 8];
                for (slot, &i) in order.iter().enumerate() {
                    quad[slot * 2] = points[i].0;
                    quad[slot * 2 + 1] = points[i].1;
                }
                quad
            };
            let original = quad_to_region(&flatten(&[0usize, 1, 2, 3][..]));
            let shuffled = quad_to_region(&flatten(perm.as_slice()));
            prop_assert_eq!(original, shuffled);
        }

        #[test]
        fn mapped_rect_stays_inside_image(
            x in -2000.0f32..2000.0,
            y in -2000.0f32..2000.0,
            w in 0.0f32..2000.0,
            h in 0.0f32..2000.0,
            iw in 1u32..3000,
            ih in 1u32..3000,
        ) {
            let px = pdf_rect_to_image_rect(&Region::new(x, y, w, h), 612.0, 792.0, iw, ih, 5);
            prop_assert!(px.x < iw && px.y < ih);
            prop_assert!(px.x + px.width <= iw);
            prop_assert!(px.y + px.height <= ih);
        }
    }
}
