/// The renderer: buffer lifecycle, pipeline state and the two draw paths.
///
/// `draw_indexed` runs the whole pipeline on the calling thread.
/// `draw_indexed_bin` runs two internally-parallel phases on the worker
/// pool (shade+clip+cull+bin over index ranges, then rasterize over tile
/// groups), separated by a full barrier so the rasterizers observe a
/// complete bin state. Both are synchronous: the call returns once every
/// pixel is resolved, and both produce pixel-identical framebuffers.
///
/// Buffer lifecycle calls are single-threaded by contract: they happen on
/// the render thread between draws, never concurrently with one.
use std::sync::Arc;

use glam::{IVec2, Vec4};

use crate::concurrency::WorkerPool;
use crate::count_call;
use crate::handle::{ResourceHandle, ResourceManager};
use crate::perf::FUNCTION_COUNTERS;

use super::binner::{TileBins, MAX_TRIS_PER_TILE};
use super::buffers::{IndexBuffer, VertexAttrib, VertexBuffer};
use super::framebuffer::{Framebuffer, TileView};
use super::raster::{clamped_triangle_bounds, rasterize_triangle, DepthCompare, PixelRect};
use super::varying::{VsInput, VsOutput};
use super::vertex_stage::{process_triangle, Triangle, MAX_TRIS_PER_INPUT};
use super::viewport::Viewport;

/// Vertex/index buffer pool size per renderer.
pub const MAX_BUFFERS: usize = 16;

/// A shader program: a vertex stage producing clip-space positions and
/// varyings, and a fragment stage producing colors. Bound statically per
/// renderer instantiation; the pixel loop never goes through dynamic
/// dispatch.
pub trait ShaderProgram {
    fn vs(&self, input: &VsInput) -> VsOutput;
    fn fs(&self, input: &VsOutput) -> Vec4;
}

pub struct Renderer<P: ShaderProgram> {
    framebuffer: Framebuffer,
    viewport: Viewport,
    pool: WorkerPool,
    vertex_buffers: ResourceManager<VertexBuffer, MAX_BUFFERS>,
    index_buffers: ResourceManager<IndexBuffer, MAX_BUFFERS>,
    bound_vertex_buffer: ResourceHandle,
    bound_index_buffer: ResourceHandle,
    program: Option<P>,
    depth_compare: DepthCompare,
    bins: TileBins,
    /// Per-draw triangle arena: two slots per input triangle, holes where
    /// clipping or culling produced fewer. Only binned indices are read.
    triangles: Vec<Triangle>,
}

impl<P> Renderer<P>
where
    P: ShaderProgram + Sync + 'static,
{
    /// Renderer with one worker per available hardware thread.
    pub fn new(width: usize, height: usize) -> Self {
        let threads = std::thread::available_parallelism().map_or(4, |n| n.get());
        Self::with_threads(width, height, threads)
    }

    pub fn with_threads(width: usize, height: usize, threads: usize) -> Self {
        Self {
            framebuffer: Framebuffer::new(width, height),
            viewport: Viewport::new(IVec2::ZERO, IVec2::new(width as i32, height as i32)),
            pool: WorkerPool::new(threads),
            vertex_buffers: ResourceManager::new(),
            index_buffers: ResourceManager::new(),
            bound_vertex_buffer: ResourceHandle::NULL,
            bound_index_buffer: ResourceHandle::NULL,
            program: None,
            depth_compare: DepthCompare::default(),
            bins: TileBins::new(width, height),
            triangles: Vec::new(),
        }
    }

    // --- Buffer lifecycle (render thread only, between draws) ---

    /// Copy `data` into a new vertex buffer. Returns the null handle when
    /// the pool is exhausted; callers must check.
    pub fn create_vertex_buffer(&mut self, data: &[u8], stride: usize) -> ResourceHandle {
        self.vertex_buffers.emplace(VertexBuffer::new(data, stride))
    }

    /// Copy `indices` into a new index buffer. Returns the null handle when
    /// the pool is exhausted.
    pub fn create_index_buffer(&mut self, indices: &[u16]) -> ResourceHandle {
        self.index_buffers.emplace(IndexBuffer::new(indices))
    }

    pub fn destroy_vertex_buffer(&mut self, handle: ResourceHandle) {
        self.vertex_buffers.free(handle);
    }

    pub fn destroy_index_buffer(&mut self, handle: ResourceHandle) {
        self.index_buffers.free(handle);
    }

    pub fn bind_vertex_buffer(&mut self, handle: ResourceHandle) {
        assert!(
            self.vertex_buffers.valid(handle),
            "bind_vertex_buffer(): invalid handle {handle:?}"
        );
        self.bound_vertex_buffer = handle;
    }

    pub fn bind_index_buffer(&mut self, handle: ResourceHandle) {
        assert!(
            self.index_buffers.valid(handle),
            "bind_index_buffer(): invalid handle {handle:?}"
        );
        self.bound_index_buffer = handle;
    }

    pub fn unbind_vertex_buffer(&mut self) {
        self.bound_vertex_buffer = ResourceHandle::NULL;
    }

    pub fn unbind_index_buffer(&mut self) {
        self.bound_index_buffer = ResourceHandle::NULL;
    }

    /// Attach an attribute descriptor to the bound vertex buffer.
    pub fn set_vertex_attribute(&mut self, attrib: VertexAttrib) {
        assert!(
            !self.bound_vertex_buffer.is_null(),
            "set_vertex_attribute(): no vertex buffer bound"
        );
        self.vertex_buffers
            .get_mut(self.bound_vertex_buffer)
            .add_attrib(attrib);
    }

    // --- Pipeline state ---

    pub fn bind_shader_program(&mut self, program: P) {
        self.program = Some(program);
    }

    pub fn program_mut(&mut self) -> Option<&mut P> {
        self.program.as_mut()
    }

    pub fn set_viewport(&mut self, origin: IVec2, size: IVec2) {
        self.viewport = Viewport::new(origin, size);
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_depth_compare(&mut self, compare: DepthCompare) {
        self.depth_compare = compare;
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        &mut self.framebuffer
    }

    /// Reallocate the framebuffer (and the matching tile grid).
    pub fn reset_framebuffer(&mut self, width: usize, height: usize) {
        self.framebuffer.reset(width, height);
        self.bins = TileBins::new(width, height);
    }

    // --- Draw paths ---

    /// Single-threaded path: shade, clip, cull and rasterize each triangle
    /// in submission order on the calling thread.
    pub fn draw_indexed(&mut self, num_indices: usize) {
        count_call!(FUNCTION_COUNTERS.draw_calls);
        self.validate_draw_state(num_indices);

        let clip = PixelRect::from_viewport(
            &self.viewport,
            self.framebuffer.width(),
            self.framebuffer.height(),
        );
        if clip.is_empty() || num_indices == 0 {
            return;
        }

        let program = self
            .program
            .as_ref()
            .expect("validate_draw_state checked the program");
        let vertex_buffer = self.vertex_buffers.get(self.bound_vertex_buffer);
        let index_buffer = self.index_buffers.get(self.bound_index_buffer);

        let triangle_count = num_indices / 3;
        let mut out = [Triangle::default(); MAX_TRIS_PER_INPUT];
        for ti in 0..triangle_count {
            let indices = &index_buffer.indices()[ti * 3..ti * 3 + 3];
            let produced = process_triangle(
                program,
                vertex_buffer,
                [indices[0], indices[1], indices[2]],
                &self.viewport,
                &mut out,
            );
            for tri in &out[..produced] {
                rasterize_triangle(program, tri, &clip, self.depth_compare, &mut self.framebuffer);
            }
        }
    }

    /// Tiled parallel path. Phase 1 shades index ranges and bins survivors;
    /// phase 2 rasterizes tiles with disjoint pixel ownership. The barrier
    /// between them is mandatory: rasterization must observe a fully
    /// populated bin state.
    pub fn draw_indexed_bin(&mut self, num_indices: usize) {
        count_call!(FUNCTION_COUNTERS.draw_calls);
        self.validate_draw_state(num_indices);

        let width = self.framebuffer.width();
        let height = self.framebuffer.height();
        let clip = PixelRect::from_viewport(&self.viewport, width, height);
        let triangle_count = num_indices / 3;
        if clip.is_empty() || triangle_count == 0 {
            return;
        }

        if self.bins.needs_rebuild(width, height) {
            self.bins = TileBins::new(width, height);
        }
        self.bins.clear();
        self.triangles.clear();
        self.triangles
            .resize(triangle_count * MAX_TRIS_PER_INPUT, Triangle::default());

        let threads = self.pool.thread_count();

        // Phase 1: shade + clip + cull + bin over contiguous index ranges.
        {
            crate::perf_scope!("shade_bin_phase");
            let phase = Arc::new(ShadePhase::<P> {
                program: self
                    .program
                    .as_ref()
                    .expect("validate_draw_state checked the program"),
                vertex_buffer: self.vertex_buffers.get(self.bound_vertex_buffer),
                indices: self.index_buffers.get(self.bound_index_buffer).indices().as_ptr(),
                num_indices,
                viewport: self.viewport,
                clip,
                triangles: self.triangles.as_mut_ptr(),
                bins: &self.bins,
            });
            let group_size = (triangle_count + threads - 1) / threads;
            self.pool
                .dispatch(triangle_count, group_size, move |ti| phase.shade_one(ti));
            self.pool.wait_for_all_done();
        }

        // Phase 2: rasterize tiles in parallel.
        {
            crate::perf_scope!("raster_tile_phase");
            let tile_count = self.bins.tile_count();
            let (color_ptr, depth_ptr) = self.framebuffer.raw_parts();
            let phase = Arc::new(RasterPhase::<P> {
                program: self
                    .program
                    .as_ref()
                    .expect("validate_draw_state checked the program"),
                triangles: self.triangles.as_ptr(),
                bins: &self.bins,
                width,
                color_ptr,
                depth_ptr,
                clip,
                compare: self.depth_compare,
            });
            let group_size = (tile_count + threads - 1) / threads;
            self.pool
                .dispatch(tile_count, group_size, move |tile| phase.rasterize_tile(tile));
            self.pool.wait_for_all_done();
        }

        log::trace!(
            "draw_indexed_bin: {} input triangles over {} tiles",
            triangle_count,
            self.bins.tile_count()
        );
    }

    fn validate_draw_state(&self, num_indices: usize) {
        assert!(self.program.is_some(), "draw: no shader program bound");
        assert!(
            !self.bound_vertex_buffer.is_null(),
            "draw: no vertex buffer bound"
        );
        assert!(
            !self.bound_index_buffer.is_null(),
            "draw: no index buffer bound"
        );
        assert!(
            num_indices % 3 == 0,
            "draw: index count {num_indices} is not a multiple of 3"
        );
        assert!(
            num_indices <= self.index_buffers.get(self.bound_index_buffer).len(),
            "draw: index count {num_indices} exceeds the bound index buffer"
        );
    }
}

/// Per-draw state shared with shading tasks.
///
/// Raw pointers stand in for the borrows the task `'static` bound cannot
/// express. Safety: the draw call blocks on the pool barrier before any
/// pointed-to data is dropped or touched again on the render thread,
/// shading tasks write disjoint two-slot ranges of `triangles`, and
/// `TileBins` appends are atomic. `P: Sync` because all workers shade
/// through the same program.
struct ShadePhase<P> {
    program: *const P,
    vertex_buffer: *const VertexBuffer,
    indices: *const u16,
    num_indices: usize,
    viewport: Viewport,
    clip: PixelRect,
    triangles: *mut Triangle,
    bins: *const TileBins,
}

unsafe impl<P: Sync> Send for ShadePhase<P> {}
unsafe impl<P: Sync> Sync for ShadePhase<P> {}

impl<P: ShaderProgram> ShadePhase<P> {
    fn shade_one(&self, ti: usize) {
        // Safety: see the struct-level note.
        let program = unsafe { &*self.program };
        let vertex_buffer = unsafe { &*self.vertex_buffer };
        let indices = unsafe { std::slice::from_raw_parts(self.indices, self.num_indices) };
        let bins = unsafe { &*self.bins };
        let out = unsafe {
            std::slice::from_raw_parts_mut(
                self.triangles.add(ti * MAX_TRIS_PER_INPUT),
                MAX_TRIS_PER_INPUT,
            )
        };

        let idx = [indices[ti * 3], indices[ti * 3 + 1], indices[ti * 3 + 2]];
        let produced = process_triangle(program, vertex_buffer, idx, &self.viewport, out);

        for (k, tri) in out[..produced].iter().enumerate() {
            // Off-viewport survivors simply go unbinned.
            if let Some(bounds) = clamped_triangle_bounds(tri, &self.clip) {
                bins.bin_triangle(
                    (ti * MAX_TRIS_PER_INPUT + k) as u32,
                    bounds.x0 as usize,
                    bounds.y0 as usize,
                    bounds.x1 as usize,
                    bounds.y1 as usize,
                );
            }
        }
    }
}

/// Per-draw state shared with tile rasterization tasks.
///
/// Safety: as for `ShadePhase`, plus each task owns whole tiles, so the raw
/// framebuffer pointers are only dereferenced inside disjoint pixel
/// rectangles.
struct RasterPhase<P> {
    program: *const P,
    triangles: *const Triangle,
    bins: *const TileBins,
    width: usize,
    color_ptr: *mut u32,
    depth_ptr: *mut f32,
    clip: PixelRect,
    compare: DepthCompare,
}

unsafe impl<P: Sync> Send for RasterPhase<P> {}
unsafe impl<P: Sync> Sync for RasterPhase<P> {}

impl<P: ShaderProgram> RasterPhase<P> {
    fn rasterize_tile(&self, tile: usize) {
        // Safety: see the struct-level note.
        let bins = unsafe { &*self.bins };

        let mut entries = [0u32; MAX_TRIS_PER_TILE];
        let count = bins.read_bin(tile, &mut entries);
        if count == 0 {
            return;
        }
        count_call!(FUNCTION_COUNTERS.tiles_rasterized);

        let (tx0, ty0, tx1, ty1) = bins.tile_rect(tile);
        let tile_rect = PixelRect {
            x0: tx0 as i32,
            y0: ty0 as i32,
            x1: tx1 as i32,
            y1: ty1 as i32,
        }
        .intersect(&self.clip);
        if tile_rect.is_empty() {
            return;
        }

        let program = unsafe { &*self.program };
        let mut view = TileView {
            width: self.width,
            x0: tile_rect.x0 as usize,
            y0: tile_rect.y0 as usize,
            x1: tile_rect.x1 as usize,
            y1: tile_rect.y1 as usize,
            color_ptr: self.color_ptr,
            depth_ptr: self.depth_ptr,
        };

        for &tri_index in &entries[..count] {
            let tri = unsafe { &*self.triangles.add(tri_index as usize) };
            rasterize_triangle(program, tri, &tile_rect, self.compare, &mut view);
        }
    }
}
