/// Software rasterization pipeline: buffers, vertex stage, tile binning
/// and per-pixel scan conversion.
pub mod binner;
pub mod buffers;
pub mod clip;
pub mod framebuffer;
pub mod raster;
pub mod renderer;
pub mod texture;
pub mod varying;
pub mod vertex_stage;
pub mod viewport;

pub use binner::{TileBins, MAX_TRIS_PER_TILE, TILE_SIZE};
pub use buffers::{AttribType, IndexBuffer, VertexAttrib, VertexBuffer};
pub use framebuffer::{pack_color, unpack_color, Framebuffer, TileView};
pub use raster::{DepthCompare, PixelTarget};
pub use renderer::{Renderer, ShaderProgram, MAX_BUFFERS};
pub use texture::Texture;
pub use varying::{GenericValue, SlotValue, VsInput, VsOutput, MAX_ATTRIBS, MAX_VARYINGS};
pub use vertex_stage::Triangle;
pub use viewport::Viewport;
