/// Per-pixel rasterization: edge-function coverage with a top-left fill
/// rule, perspective-correct depth and varying interpolation, and fragment
/// shading.
///
/// One routine serves both draw paths: the single-threaded path hands it
/// the whole framebuffer and the viewport rectangle, the tiled path hands
/// it a `TileView` and the tile rectangle. Identical per-pixel math is what
/// keeps the two paths pixel-identical.
use glam::{Vec2, Vec4Swizzles};

use super::framebuffer::{pack_color, Framebuffer, TileView};
use super::renderer::ShaderProgram;
use super::varying::interpolate;
use super::vertex_stage::{det_2d, Triangle};
use super::viewport::Viewport;
use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;

/// Depth comparison deciding whether a new fragment replaces the stored one.
/// `Less` pairs with a depth buffer cleared to `f32::INFINITY`; `Greater`
/// expects `f32::NEG_INFINITY`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DepthCompare {
    #[default]
    Less,
    Greater,
}

impl DepthCompare {
    #[inline]
    pub fn passes(&self, new: f32, stored: f32) -> bool {
        match self {
            DepthCompare::Less => new < stored,
            DepthCompare::Greater => new > stored,
        }
    }
}

/// Render target surface for the pixel loop: depth test plus color write.
/// Implementations bound-check or trust their rectangle; both treat a
/// passing depth test as permission to write.
pub trait PixelTarget {
    /// Depth-test at pixel (x, y); on pass, store the depth and return the
    /// linear index to write color at.
    fn test_depth_and_get_index(
        &mut self,
        x: usize,
        y: usize,
        depth: f32,
        compare: DepthCompare,
    ) -> Option<usize>;

    fn write_color(&mut self, index: usize, color: u32);
}

impl PixelTarget for Framebuffer {
    #[inline]
    fn test_depth_and_get_index(
        &mut self,
        x: usize,
        y: usize,
        depth: f32,
        compare: DepthCompare,
    ) -> Option<usize> {
        let index = self.index(x, y);
        if compare.passes(depth, self.depth[index]) {
            self.depth[index] = depth;
            Some(index)
        } else {
            None
        }
    }

    #[inline]
    fn write_color(&mut self, index: usize, color: u32) {
        self.color[index] = color;
    }
}

impl PixelTarget for TileView {
    #[inline]
    fn test_depth_and_get_index(
        &mut self,
        x: usize,
        y: usize,
        depth: f32,
        compare: DepthCompare,
    ) -> Option<usize> {
        debug_assert!(x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1);
        let index = y * self.width + x;
        if compare.passes(depth, self.stored_depth(index)) {
            self.store_depth(index, depth);
            Some(index)
        } else {
            None
        }
    }

    #[inline]
    fn write_color(&mut self, index: usize, color: u32) {
        self.store_color(index, color);
    }
}

/// Inclusive pixel rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct PixelRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelRect {
    /// Viewport rectangle clamped to the framebuffer.
    pub fn from_viewport(viewport: &Viewport, width: usize, height: usize) -> Self {
        Self {
            x0: viewport.xmin.max(0),
            y0: viewport.ymin.max(0),
            x1: (viewport.xmax - 1).min(width as i32 - 1),
            y1: (viewport.ymax - 1).min(height as i32 - 1),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x0 > self.x1 || self.y0 > self.y1
    }

    #[inline]
    pub fn intersect(&self, other: &PixelRect) -> PixelRect {
        PixelRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }
}

/// Screen bounding box of a triangle clamped to `rect`. None when the two
/// do not overlap.
pub(crate) fn clamped_triangle_bounds(tri: &Triangle, rect: &PixelRect) -> Option<PixelRect> {
    let p0 = tri.v0.position;
    let p1 = tri.v1.position;
    let p2 = tri.v2.position;

    let bbox = PixelRect {
        x0: p0.x.min(p1.x).min(p2.x).floor() as i32,
        y0: p0.y.min(p1.y).min(p2.y).floor() as i32,
        x1: p0.x.max(p1.x).max(p2.x).ceil() as i32,
        y1: p0.y.max(p1.y).max(p2.y).ceil() as i32,
    };
    let clamped = bbox.intersect(rect);
    (!clamped.is_empty()).then_some(clamped)
}

/// Top-left fill rule for the directed edge `a -> b`.
///
/// With the canonical winding (positive area, y-down screen coordinates) a
/// top edge runs horizontally towards +X and a left edge points towards -Y.
/// Pixels exactly on such edges count as covered; on any other edge they do
/// not, so triangles sharing an edge neither double-draw nor leave gaps.
#[inline]
fn is_top_left(a: Vec2, b: Vec2) -> bool {
    let d = b - a;
    (d.y == 0.0 && d.x > 0.0) || d.y < 0.0
}

#[inline]
fn edge_accepts(e: f32, top_left: bool) -> bool {
    e > 0.0 || (e == 0.0 && top_left)
}

/// Scan-convert one triangle over `rect`, shading covered pixels.
///
/// `rect` is the caller's region of interest (viewport or tile bounds); the
/// triangle's own bounding box narrows it further.
pub(crate) fn rasterize_triangle<P: ShaderProgram, T: PixelTarget>(
    program: &P,
    tri: &Triangle,
    rect: &PixelRect,
    compare: DepthCompare,
    target: &mut T,
) {
    let Some(bounds) = clamped_triangle_bounds(tri, rect) else {
        return;
    };
    count_call!(FUNCTION_COUNTERS.triangles_rasterized);

    let p0 = tri.v0.position.xy();
    let p1 = tri.v1.position.xy();
    let p2 = tri.v2.position.xy();

    let rcp_area = 1.0 / tri.area;
    let tl01 = is_top_left(p0, p1);
    let tl12 = is_top_left(p1, p2);
    let tl20 = is_top_left(p2, p0);

    // Positions carry 1/w after projection.
    let w0_inv = tri.v0.position.w;
    let w1_inv = tri.v1.position.w;
    let w2_inv = tri.v2.position.w;

    let varying_count = tri.v0.varying_count();
    let mut tested: u64 = 0;
    let mut shaded: u64 = 0;

    for y in bounds.y0..=bounds.y1 {
        for x in bounds.x0..=bounds.x1 {
            tested += 1;
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);

            let e01 = det_2d(p1 - p0, p - p0);
            let e12 = det_2d(p2 - p1, p - p1);
            let e20 = det_2d(p0 - p2, p - p2);

            if !edge_accepts(e01, tl01)
                || !edge_accepts(e12, tl12)
                || !edge_accepts(e20, tl20)
            {
                continue;
            }

            let alpha = e12 * rcp_area;
            let beta = e20 * rcp_area;
            let gamma = e01 * rcp_area;

            // Interpolated 1/w inverts back to view depth.
            let one_over_w = alpha * w0_inv + beta * w1_inv + gamma * w2_inv;
            let w = 1.0 / one_over_w;

            let Some(index) =
                target.test_depth_and_get_index(x as usize, y as usize, w, compare)
            else {
                continue;
            };

            let mut fragment = tri.v0;
            fragment.position =
                (tri.v0.position * alpha + tri.v1.position * beta + tri.v2.position * gamma) * w;
            for slot in 0..varying_count {
                fragment.varyings[slot] = interpolate(
                    &tri.v0.varyings[slot],
                    &tri.v1.varyings[slot],
                    &tri.v2.varyings[slot],
                    alpha,
                    beta,
                    gamma,
                    w,
                );
            }

            let color = program.fs(&fragment);
            target.write_color(index, pack_color(color));
            shaded += 1;
        }
    }

    // One atomic add per triangle instead of per pixel.
    use std::sync::atomic::Ordering;
    FUNCTION_COUNTERS.fragments_tested.fetch_add(tested, Ordering::Relaxed);
    FUNCTION_COUNTERS.fragments_shaded.fetch_add(shaded, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::varying::{VsInput, VsOutput};
    use glam::{Vec3, Vec4};

    struct SolidWhite;

    impl ShaderProgram for SolidWhite {
        fn vs(&self, _input: &VsInput) -> VsOutput {
            VsOutput::default()
        }

        fn fs(&self, _input: &VsOutput) -> Vec4 {
            Vec4::ONE
        }
    }

    struct VaryingColor;

    impl ShaderProgram for VaryingColor {
        fn vs(&self, _input: &VsInput) -> VsOutput {
            VsOutput::default()
        }

        fn fs(&self, input: &VsOutput) -> Vec4 {
            input.varying::<Vec3>(0).extend(1.0)
        }
    }

    /// Screen-space triangle with w = 1 everywhere (no perspective).
    fn screen_triangle(p0: Vec2, p1: Vec2, p2: Vec2) -> Triangle {
        let v0 = VsOutput::new(Vec4::new(p0.x, p0.y, 0.0, 1.0));
        let v1 = VsOutput::new(Vec4::new(p1.x, p1.y, 0.0, 1.0));
        let v2 = VsOutput::new(Vec4::new(p2.x, p2.y, 0.0, 1.0));
        let area = det_2d(p1 - p0, p2 - p0);
        assert!(area > 0.0, "test triangles use canonical winding");
        Triangle { v0, v1, v2, area }
    }

    fn full_rect(fb: &Framebuffer) -> PixelRect {
        PixelRect {
            x0: 0,
            y0: 0,
            x1: fb.width() as i32 - 1,
            y1: fb.height() as i32 - 1,
        }
    }

    #[test]
    fn barycentric_weights_at_vertices_and_interior() {
        let p0 = Vec2::new(3.0, 2.0);
        let p1 = Vec2::new(21.0, 5.0);
        let p2 = Vec2::new(7.0, 18.0);
        let area = det_2d(p1 - p0, p2 - p0);
        assert!(area > 0.0);

        let weights = |p: Vec2| {
            let alpha = det_2d(p2 - p1, p - p1) / area;
            let beta = det_2d(p0 - p2, p - p2) / area;
            let gamma = det_2d(p1 - p0, p - p0) / area;
            (alpha, beta, gamma)
        };

        let eps = 1e-5;
        let corners = [
            (p0, (1.0, 0.0, 0.0)),
            (p1, (0.0, 1.0, 0.0)),
            (p2, (0.0, 0.0, 1.0)),
        ];
        for (point, expected) in corners {
            let (alpha, beta, gamma) = weights(point);
            assert!((alpha - expected.0).abs() < eps);
            assert!((beta - expected.1).abs() < eps);
            assert!((gamma - expected.2).abs() < eps);
        }

        // Any interior point: all weights positive, summing to 1.
        let centroid = (p0 + p1 + p2) / 3.0;
        let (alpha, beta, gamma) = weights(centroid);
        assert!(alpha > 0.0 && beta > 0.0 && gamma > 0.0);
        assert!((alpha + beta + gamma - 1.0).abs() < eps);
    }

    #[test]
    fn vertex_color_reaches_its_corner_pixel() {
        // v0 sits exactly on the (0, 0) pixel center; its top and left
        // edges both accept e == 0, so the corner pixel shades with v0's
        // color at full weight. Power-of-two area keeps the math exact.
        let mut tri = screen_triangle(
            Vec2::new(0.5, 0.5),
            Vec2::new(16.5, 0.5),
            Vec2::new(0.5, 16.5),
        );
        tri.v0.set_varying(0, Vec3::new(1.0, 0.0, 0.0));
        tri.v1.set_varying(0, Vec3::new(0.0, 1.0, 0.0));
        tri.v2.set_varying(0, Vec3::new(0.0, 0.0, 1.0));

        let mut fb = Framebuffer::new(16, 16);
        let rect = full_rect(&fb);
        rasterize_triangle(&VaryingColor, &tri, &rect, DepthCompare::Less, &mut fb);

        assert_eq!(fb.pixel(0, 0), 0xFFFF0000);
    }

    #[test]
    fn interior_pixel_weights_sum_to_one() {
        let mut tri = screen_triangle(
            Vec2::new(0.0, 0.0),
            Vec2::new(16.0, 0.0),
            Vec2::new(0.0, 16.0),
        );
        // Encoding (alpha, beta, gamma) as color sums to white wherever the
        // weights sum to 1.
        tri.v0.set_varying(0, Vec3::new(1.0, 1.0, 1.0));
        tri.v1.set_varying(0, Vec3::new(1.0, 1.0, 1.0));
        tri.v2.set_varying(0, Vec3::new(1.0, 1.0, 1.0));

        let mut fb = Framebuffer::new(16, 16);
        let rect = full_rect(&fb);
        rasterize_triangle(&VaryingColor, &tri, &rect, DepthCompare::Less, &mut fb);

        assert_eq!(fb.pixel(4, 4), 0xFFFFFFFF);
        assert_eq!(fb.pixel(1, 8), 0xFFFFFFFF);
    }

    #[test]
    fn abutting_triangles_cover_shared_edge_exactly_once() {
        // Two triangles splitting an 8x8 square along its diagonal. The
        // diagonal passes exactly through every (k+0.5, k+0.5) pixel
        // center, so without the fill rule those pixels would be claimed
        // twice or not at all. Every pixel center in the square must be
        // covered by exactly one of the two triangles.
        let lower = screen_triangle(
            Vec2::new(0.0, 0.0),
            Vec2::new(8.0, 8.0),
            Vec2::new(0.0, 8.0),
        );
        let upper = screen_triangle(
            Vec2::new(0.0, 0.0),
            Vec2::new(8.0, 0.0),
            Vec2::new(8.0, 8.0),
        );

        let mut fb_lower = Framebuffer::new(8, 8);
        let mut fb_upper = Framebuffer::new(8, 8);
        let rect = full_rect(&fb_lower);
        rasterize_triangle(&SolidWhite, &lower, &rect, DepthCompare::Less, &mut fb_lower);
        rasterize_triangle(&SolidWhite, &upper, &rect, DepthCompare::Less, &mut fb_upper);

        for y in 0..8 {
            for x in 0..8 {
                let in_lower = fb_lower.pixel(x, y) != 0;
                let in_upper = fb_upper.pixel(x, y) != 0;
                assert!(
                    in_lower ^ in_upper,
                    "pixel ({x}, {y}) covered by {} triangles",
                    in_lower as u32 + in_upper as u32
                );
            }
        }
    }

    #[test]
    fn depth_test_keeps_nearest_fragment() {
        // Two overlapping triangles at different depths; positions carry
        // 1/w, so a larger w component means nearer geometry under Less.
        let mut near = screen_triangle(
            Vec2::new(0.0, 0.0),
            Vec2::new(8.0, 0.0),
            Vec2::new(0.0, 8.0),
        );
        let mut far = near;

        // near at view depth 2 (1/w = 0.5), far at view depth 4.
        for v in [&mut near.v0, &mut near.v1, &mut near.v2] {
            v.position.w = 0.5;
        }
        for v in [&mut far.v0, &mut far.v1, &mut far.v2] {
            v.position.w = 0.25;
        }

        struct Solid(u32);
        impl ShaderProgram for Solid {
            fn vs(&self, _input: &VsInput) -> VsOutput {
                VsOutput::default()
            }
            fn fs(&self, _input: &VsOutput) -> Vec4 {
                crate::rendering::framebuffer::unpack_color(self.0)
            }
        }

        let mut fb = Framebuffer::new(8, 8);
        let rect = full_rect(&fb);

        // Far first, then near: near must win.
        rasterize_triangle(&Solid(0xFF0000FF), &far, &rect, DepthCompare::Less, &mut fb);
        rasterize_triangle(&Solid(0xFFFF0000), &near, &rect, DepthCompare::Less, &mut fb);
        assert_eq!(fb.pixel(1, 1), 0xFFFF0000);

        // Near first, then far: far loses the depth test.
        let mut fb = Framebuffer::new(8, 8);
        rasterize_triangle(&Solid(0xFFFF0000), &near, &rect, DepthCompare::Less, &mut fb);
        rasterize_triangle(&Solid(0xFF0000FF), &far, &rect, DepthCompare::Less, &mut fb);
        assert_eq!(fb.pixel(1, 1), 0xFFFF0000);
    }

    #[test]
    fn pixels_outside_rect_are_untouched() {
        let tri = screen_triangle(
            Vec2::new(0.0, 0.0),
            Vec2::new(16.0, 0.0),
            Vec2::new(0.0, 16.0),
        );

        let mut fb = Framebuffer::new(16, 16);
        let rect = PixelRect { x0: 0, y0: 0, x1: 7, y1: 7 };
        rasterize_triangle(&SolidWhite, &tri, &rect, DepthCompare::Less, &mut fb);

        assert_eq!(fb.pixel(4, 4), 0xFFFFFFFF);
        assert_eq!(fb.pixel(9, 2), 0, "outside the clip rectangle");
    }

    #[test]
    fn greater_compare_inverts_the_test() {
        let tri = screen_triangle(
            Vec2::new(0.0, 0.0),
            Vec2::new(8.0, 0.0),
            Vec2::new(0.0, 8.0),
        );

        let mut fb = Framebuffer::new(8, 8);
        fb.clear_depth_to(f32::NEG_INFINITY);
        let rect = full_rect(&fb);
        rasterize_triangle(&SolidWhite, &tri, &rect, DepthCompare::Greater, &mut fb);

        assert_eq!(fb.pixel(1, 1), 0xFFFFFFFF);
    }
}
