/// Viewport: the pixel rectangle NDC coordinates are mapped into.
use glam::{IVec2, Vec4};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl Viewport {
    pub fn new(origin: IVec2, size: IVec2) -> Self {
        assert!(size.x > 0 && size.y > 0, "viewport size must be positive");
        Self {
            xmin: origin.x,
            ymin: origin.y,
            xmax: origin.x + size.x,
            ymax: origin.y + size.y,
        }
    }

    pub fn width(&self) -> i32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> i32 {
        self.ymax - self.ymin
    }

    /// Map an NDC point into this viewport's pixel rectangle. NDC +Y points
    /// up while raster +Y points down, hence the flipped Y term. Only x and
    /// y change; z and w pass through.
    #[inline]
    pub fn transform(&self, mut pt: Vec4) -> Vec4 {
        pt.x = self.xmin as f32 + (self.xmax - self.xmin) as f32 * (0.5 + 0.5 * pt.x);
        pt.y = self.ymin as f32 + (self.ymax - self.ymin) as f32 * (0.5 - 0.5 * pt.y);
        pt
    }
}
