/// Vertex stage: attribute extraction, vertex shading, near-plane clipping,
/// projection and backface culling for one indexed triangle at a time.
///
/// Output triangles are screen-space, winding-canonicalized and safe to
/// process out of submission order.
use glam::{Vec2, Vec4Swizzles};

use super::buffers::{extract_vertex_attribute, VertexBuffer};
use super::clip::{clip_triangle_near, MAX_CLIP_VERTS};
use super::renderer::ShaderProgram;
use super::varying::{VsInput, VsOutput};
use super::viewport::Viewport;
use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;

/// Triangles a single input triangle can clip into.
pub const MAX_TRIS_PER_INPUT: usize = 2;

/// A shaded, clipped, screen-space triangle ready for binning and
/// rasterization.
#[derive(Copy, Clone, Debug, Default)]
pub struct Triangle {
    pub v0: VsOutput,
    pub v1: VsOutput,
    pub v2: VsOutput,
    /// Doubled signed area of the screen-space triangle. Positive after
    /// winding canonicalization; the rasterizer divides by it to get
    /// barycentric weights.
    pub area: f32,
}

/// 2D cross product, the workhorse of area and edge-function math.
#[inline]
pub(crate) fn det_2d(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Run one indexed triangle through shade -> clip -> project -> cull.
///
/// Writes the survivors into `out` (capacity [`MAX_TRIS_PER_INPUT`]) and
/// returns how many were produced.
pub(crate) fn process_triangle<P: ShaderProgram>(
    program: &P,
    vertex_buffer: &VertexBuffer,
    indices: [u16; 3],
    viewport: &Viewport,
    out: &mut [Triangle],
) -> usize {
    count_call!(FUNCTION_COUNTERS.triangles_in);

    let mut inputs = [VsInput::default(); 3];
    for (input, &index) in inputs.iter_mut().zip(&indices) {
        let vertex = vertex_buffer.vertex_bytes(index as usize);
        for attrib in vertex_buffer.attribs() {
            input.set(attrib.slot, extract_vertex_attribute(vertex, attrib));
        }
    }

    let shaded = [
        program.vs(&inputs[0]),
        program.vs(&inputs[1]),
        program.vs(&inputs[2]),
    ];

    let mut clipped = [VsOutput::default(); MAX_CLIP_VERTS];
    let clipped_len = clip_triangle_near(&shaded, &mut clipped);
    if clipped_len < 3 {
        return 0;
    }
    if clipped_len > 3 {
        count_call!(FUNCTION_COUNTERS.triangles_clipped);
    }

    // Project every surviving vertex once; the fan below reuses them.
    for v in clipped[..clipped_len].iter_mut() {
        project_to_screen(v, viewport);
    }

    let mut produced = 0;
    for i in 1..clipped_len - 1 {
        if let Some(tri) = assemble_triangle(&clipped[0], &clipped[i], &clipped[i + 1]) {
            out[produced] = tri;
            produced += 1;
        } else {
            count_call!(FUNCTION_COUNTERS.triangles_culled);
        }
    }
    produced
}

/// Perspective divide followed by the viewport transform.
///
/// Afterwards the position's w component holds `1/w`, and every varying has
/// been multiplied by it; interpolating those pre-divided values linearly in
/// screen space and dividing by the interpolated `1/w` is what makes the
/// rasterizer perspective-correct.
fn project_to_screen(v: &mut VsOutput, viewport: &Viewport) {
    let w_inv = 1.0 / v.position.w;
    v.position.x *= w_inv;
    v.position.y *= w_inv;
    v.position.z *= w_inv;
    v.position.w = w_inv;
    v.position = viewport.transform(v.position);

    for slot in 0..v.used {
        let value = &mut v.varyings[slot];
        for i in 0..value.count {
            value.vals[i] *= w_inv;
        }
    }
}

/// Backface cull and winding canonicalization.
///
/// Counter-clockwise triangles in NDC come out of the Y-flipping viewport
/// transform with negative doubled area; those are front-facing here.
/// Survivors get v1/v2 swapped and the area negated so downstream code
/// always sees positive area. Returns None for back-facing or degenerate
/// triangles.
fn assemble_triangle(v0: &VsOutput, v1: &VsOutput, v2: &VsOutput) -> Option<Triangle> {
    let area = det_2d(
        v1.position.xy() - v0.position.xy(),
        v2.position.xy() - v0.position.xy(),
    );
    if area >= 0.0 {
        return None;
    }
    Some(Triangle {
        v0: *v0,
        v1: *v2,
        v2: *v1,
        area: -area,
    })
}
