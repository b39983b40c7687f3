/// Near-plane clipping of shaded triangles.
///
/// The plane test happens in clip space: a vertex is inside iff
/// `z + w > 0`. A triangle is clipped as a polygon (Sutherland-Hodgman
/// against the single plane), which yields a 0-, 3- or 4-gon covering every
/// inside/outside pattern uniformly; the vertex stage fan-triangulates the
/// result into 0..=2 triangles. Winding is preserved.
use super::varying::{GenericValue, VsOutput, MAX_VARYINGS};

/// Maximum vertices a triangle can have after clipping against one plane.
pub(crate) const MAX_CLIP_VERTS: usize = 4;

/// Signed distance to the near plane; positive means inside.
#[inline]
fn near_distance(v: &VsOutput) -> f32 {
    v.position.z + v.position.w
}

/// Blend two shaded vertices at parameter `t` along `from -> to`, covering
/// the clip-space position and every varying.
fn lerp_vertex(from: &VsOutput, to: &VsOutput, t: f32) -> VsOutput {
    debug_assert_eq!(from.used, to.used);

    let mut out = VsOutput {
        position: from.position + (to.position - from.position) * t,
        used: from.used,
        varyings: [GenericValue::default(); MAX_VARYINGS],
    };
    for slot in 0..from.used {
        let a = &from.varyings[slot];
        let b = &to.varyings[slot];
        debug_assert_eq!(a.count, b.count);

        let mut blended = GenericValue {
            vals: [0.0; 4],
            count: a.count,
        };
        for i in 0..a.count {
            blended.vals[i] = a.vals[i] + (b.vals[i] - a.vals[i]) * t;
        }
        out.varyings[slot] = blended;
    }
    out
}

/// Clip a shaded triangle against the near plane, writing the surviving
/// polygon to `out` and returning its vertex count (0, 3 or 4).
///
/// Edge/plane intersections use `t = d_out / (d_out - d_in)` measured from
/// the outside vertex, so new vertices land on `z + w = 0` for position and
/// varyings alike.
pub(crate) fn clip_triangle_near(
    tri: &[VsOutput; 3],
    out: &mut [VsOutput; MAX_CLIP_VERTS],
) -> usize {
    let mut out_len = 0;
    let mut prev = &tri[2];
    let mut prev_d = near_distance(prev);

    for curr in tri.iter() {
        let curr_d = near_distance(curr);
        match (prev_d > 0.0, curr_d > 0.0) {
            (true, true) => {
                out[out_len] = *curr;
                out_len += 1;
            }
            (true, false) => {
                // Leaving the inside half-space: emit the crossing point.
                let t = curr_d / (curr_d - prev_d);
                out[out_len] = lerp_vertex(curr, prev, t);
                out_len += 1;
            }
            (false, true) => {
                // Entering: emit the crossing point, then the inside vertex.
                let t = prev_d / (prev_d - curr_d);
                out[out_len] = lerp_vertex(prev, curr, t);
                out_len += 1;
                out[out_len] = *curr;
                out_len += 1;
            }
            (false, false) => {}
        }
        prev = curr;
        prev_d = curr_d;
    }

    out_len
}
