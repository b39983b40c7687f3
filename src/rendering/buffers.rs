/// Vertex and index buffers plus the attribute descriptors that tell the
/// pipeline how to slice interleaved vertex bytes into shader inputs.
use std::mem::size_of;

use super::varying::{GenericValue, MAX_ATTRIBS};

/// Element type of a vertex attribute. Only f32 components exist today.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttribType {
    Float,
}

/// Layout of one attribute inside an interleaved vertex.
#[derive(Copy, Clone, Debug)]
pub struct VertexAttrib {
    pub ty: AttribType,
    /// Components per element, 1..=4.
    pub element_count: usize,
    /// Byte offset from the start of the vertex.
    pub offset: usize,
    /// Shader-input slot this attribute feeds.
    pub slot: usize,
}

/// Interleaved vertex data and the descriptors indexing into it.
///
/// The buffer owns a copy of the caller's bytes; descriptors are immutable
/// once attached.
pub struct VertexBuffer {
    data: Vec<u8>,
    stride: usize,
    attribs: Vec<VertexAttrib>,
}

impl VertexBuffer {
    pub fn new(data: &[u8], stride: usize) -> Self {
        assert!(stride > 0, "vertex stride must be non-zero");
        assert!(
            data.len() % stride == 0,
            "vertex data length {} is not a multiple of stride {stride}",
            data.len()
        );
        Self {
            data: data.to_vec(),
            stride,
            attribs: Vec::new(),
        }
    }

    /// Attach an attribute descriptor. The described byte range must fit
    /// within one vertex and the slot must be a valid shader input.
    pub fn add_attrib(&mut self, attrib: VertexAttrib) {
        assert!(
            attrib.slot < MAX_ATTRIBS,
            "attribute slot {} out of range",
            attrib.slot
        );
        assert!(
            (1..=4).contains(&attrib.element_count),
            "attribute element count {} out of range",
            attrib.element_count
        );
        assert!(
            attrib.offset + attrib.element_count * size_of::<f32>() <= self.stride,
            "attribute at offset {} with {} floats exceeds stride {}",
            attrib.offset,
            attrib.element_count,
            self.stride
        );
        self.attribs.push(attrib);
    }

    pub fn attribs(&self) -> &[VertexAttrib] {
        &self.attribs
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.stride
    }

    /// Bytes of the vertex at `index`. Bounds violations are fatal.
    #[inline]
    pub fn vertex_bytes(&self, index: usize) -> &[u8] {
        let start = index * self.stride;
        &self.data[start..start + self.stride]
    }
}

/// Copy one attribute's components out of raw vertex bytes.
#[inline]
pub fn extract_vertex_attribute(vertex: &[u8], attrib: &VertexAttrib) -> GenericValue {
    debug_assert_eq!(attrib.ty, AttribType::Float);

    let mut value = GenericValue {
        vals: [0.0; 4],
        count: attrib.element_count,
    };
    for i in 0..attrib.element_count {
        let at = attrib.offset + i * size_of::<f32>();
        // Interleaved layouts make no alignment promises per component.
        value.vals[i] = bytemuck::pod_read_unaligned(&vertex[at..at + size_of::<f32>()]);
    }
    value
}

/// Triangle-list indices.
pub struct IndexBuffer {
    indices: Vec<u16>,
}

impl IndexBuffer {
    pub fn new(indices: &[u16]) -> Self {
        assert!(
            indices.len() % 3 == 0,
            "index count {} is not a multiple of 3",
            indices.len()
        );
        Self {
            indices: indices.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }
}
