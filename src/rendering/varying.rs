/// Type-erased shader input/output plumbing.
///
/// Vertex layouts and varying shapes differ per shader program, so values
/// travel through fixed-size `GenericValue` slots: up to four floats plus a
/// component count. Producer (vertex shader) and consumer (fragment shader)
/// agree on slot order and arity out-of-band; the in-order write contract on
/// `VsOutput` is what lets the interpolation and perspective-correction
/// loops walk `[0, used)` without per-slot type tags.
use glam::{Vec2, Vec3, Vec4};

/// Shader-input slots available per vertex.
pub const MAX_ATTRIBS: usize = 16;
/// Varying slots available between the vertex and fragment stages.
pub const MAX_VARYINGS: usize = 8;

/// Type-erased value: up to four floats plus the live component count.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GenericValue {
    pub vals: [f32; 4],
    pub count: usize,
}

/// Vector types that can pass through a [`GenericValue`] slot.
pub trait SlotValue: Copy {
    const COUNT: usize;

    fn write(self, out: &mut GenericValue);
    fn read(value: &GenericValue) -> Self;
}

impl SlotValue for Vec2 {
    const COUNT: usize = 2;

    fn write(self, out: &mut GenericValue) {
        out.vals = [self.x, self.y, 0.0, 0.0];
        out.count = 2;
    }

    fn read(value: &GenericValue) -> Self {
        assert_eq!(value.count, 2, "slot holds {} components, expected 2", value.count);
        Vec2::new(value.vals[0], value.vals[1])
    }
}

impl SlotValue for Vec3 {
    const COUNT: usize = 3;

    fn write(self, out: &mut GenericValue) {
        out.vals = [self.x, self.y, self.z, 0.0];
        out.count = 3;
    }

    fn read(value: &GenericValue) -> Self {
        assert_eq!(value.count, 3, "slot holds {} components, expected 3", value.count);
        Vec3::new(value.vals[0], value.vals[1], value.vals[2])
    }
}

impl SlotValue for Vec4 {
    const COUNT: usize = 4;

    fn write(self, out: &mut GenericValue) {
        out.vals = [self.x, self.y, self.z, self.w];
        out.count = 4;
    }

    fn read(value: &GenericValue) -> Self {
        assert_eq!(value.count, 4, "slot holds {} components, expected 4", value.count);
        Vec4::new(value.vals[0], value.vals[1], value.vals[2], value.vals[3])
    }
}

/// Per-vertex shader input: one slot per bound vertex attribute.
#[derive(Copy, Clone, Debug, Default)]
pub struct VsInput {
    attribs: [GenericValue; MAX_ATTRIBS],
}

impl VsInput {
    pub fn set(&mut self, slot: usize, value: GenericValue) {
        assert!(slot < MAX_ATTRIBS, "attribute slot {slot} out of range");
        self.attribs[slot] = value;
    }

    pub fn get<T: SlotValue>(&self, slot: usize) -> T {
        assert!(slot < MAX_ATTRIBS, "attribute slot {slot} out of range");
        T::read(&self.attribs[slot])
    }
}

/// Vertex-shader output: clip-space position plus ordered varying slots.
///
/// After projection the position's w component holds `1/w` and every
/// varying is pre-multiplied by it (see the vertex stage), which keeps
/// screen-space interpolation perspective-correct.
#[derive(Copy, Clone, Debug, Default)]
pub struct VsOutput {
    pub position: Vec4,
    pub(crate) used: usize,
    pub(crate) varyings: [GenericValue; MAX_VARYINGS],
}

impl VsOutput {
    pub fn new(position: Vec4) -> Self {
        Self {
            position,
            used: 0,
            varyings: [GenericValue::default(); MAX_VARYINGS],
        }
    }

    /// Store a varying. Slots must be written in increasing order starting
    /// at zero; writing out of order is a contract violation.
    pub fn set_varying<T: SlotValue>(&mut self, slot: usize, value: T) {
        assert!(slot < MAX_VARYINGS, "varying slot {slot} out of range");
        assert!(
            slot == self.used,
            "varying slots must be written in order: got {slot}, expected {}",
            self.used
        );
        value.write(&mut self.varyings[slot]);
        self.used += 1;
    }

    pub fn varying<T: SlotValue>(&self, slot: usize) -> T {
        assert!(slot < self.used, "varying slot {slot} was never written");
        T::read(&self.varyings[slot])
    }

    /// Number of varying slots the vertex shader wrote.
    pub fn varying_count(&self) -> usize {
        self.used
    }
}

/// Perspective-correct barycentric blend of three pre-divided values.
///
/// `w` is the view depth recovered at the pixel (the reciprocal of the
/// interpolated `1/w`); multiplying by it undoes the per-vertex
/// pre-division.
#[inline]
pub fn interpolate(
    a0: &GenericValue,
    a1: &GenericValue,
    a2: &GenericValue,
    alpha: f32,
    beta: f32,
    gamma: f32,
    w: f32,
) -> GenericValue {
    debug_assert!(a0.count == a1.count && a1.count == a2.count);

    let count = a0.count;
    let mut result = GenericValue {
        vals: [0.0; 4],
        count,
    };
    for i in 0..count {
        result.vals[i] = (a0.vals[i] * alpha + a1.vals[i] * beta + a2.vals[i] * gamma) * w;
    }
    result
}
