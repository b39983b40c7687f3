//! tilerast - multithreaded tile-binned software rasterization pipeline.
//! Turns vertex/index buffers and a user-supplied shader program into
//! pixels in a color+depth framebuffer, entirely on the CPU.

pub mod concurrency;
pub mod handle;
pub mod perf;
pub mod rendering;

pub use concurrency::{TaskFuture, WorkerPool};
pub use handle::{HandleAllocator, ResourceHandle, ResourceManager};
pub use perf::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};
pub use rendering::{
    AttribType, DepthCompare, Framebuffer, GenericValue, IndexBuffer, Renderer, ShaderProgram,
    Texture, VertexAttrib, VertexBuffer, Viewport, VsInput, VsOutput,
};
