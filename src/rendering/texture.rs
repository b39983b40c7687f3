/// In-memory ARGB8 texture sampled by fragment shaders.
///
/// Decoding image files into one of these is the application's job; the
/// pipeline only needs `sample(u, v)` and the dimensions.
use glam::Vec4;

use super::framebuffer::unpack_color;

pub struct Texture {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Texture {
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u32>) -> Self {
        assert!(width > 0 && height > 0, "texture size must be positive");
        assert_eq!(
            pixels.len(),
            width * height,
            "pixel count does not match texture dimensions"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Two-color checkerboard, handy for tests and debug materials.
    pub fn checkerboard(width: usize, height: usize, cell: usize, c0: u32, c1: u32) -> Self {
        assert!(cell > 0, "checkerboard cell size must be positive");
        let pixels = (0..width * height)
            .map(|i| {
                let x = i % width;
                let y = i / width;
                if ((x / cell) + (y / cell)) % 2 == 0 {
                    c0
                } else {
                    c1
                }
            })
            .collect();
        Self::from_pixels(width, height, pixels)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Nearest-neighbour sample with wrapping. `u` and `v` are nominally in
    /// 0..1; coordinates outside tile.
    pub fn sample(&self, u: f32, v: f32) -> Vec4 {
        let x = wrap(u, self.width);
        let y = wrap(v, self.height);
        unpack_color(self.pixels[y * self.width + x])
    }
}

#[inline]
fn wrap(coord: f32, size: usize) -> usize {
    let scaled = coord.rem_euclid(1.0) * size as f32;
    (scaled as usize).min(size - 1)
}
