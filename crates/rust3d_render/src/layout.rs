//! Interleaved vertex buffer layouts

use crate::error::RenderError;
use crate::shader::{ShaderVariable, VariableKind};

/// Size of one float component in bytes
const FLOAT_SIZE: u32 = 4;

/// One attribute inside an interleaved vertex
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: String,
    /// Float components (1-4)
    pub components: u32,
    /// Byte offset from the start of the vertex
    pub offset: u32,
}

impl VertexAttribute {
    /// Byte offset one past the last component
    pub fn end(&self) -> u32 {
        self.offset + self.components * FLOAT_SIZE
    }
}

/// Stride and attribute offsets of an interleaved vertex buffer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    stride: u32,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            attributes: Vec::new(),
        }
    }

    /// Add an attribute of `components` floats at byte `offset`
    pub fn with_attribute(mut self, name: impl Into<String>, components: u32, offset: u32) -> Self {
        self.attributes.push(VertexAttribute {
            name: name.into(),
            components,
            offset,
        });
        self
    }

    /// `[px, py, pz, nx, ny, nz]` records: 24-byte stride, normal at byte 12
    pub fn position_normal() -> Self {
        Self::new(6 * FLOAT_SIZE)
            .with_attribute("a_position", 3, 0)
            .with_attribute("a_normal", 3, 3 * FLOAT_SIZE)
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check the layout against a program's declared attributes
    ///
    /// Every declared attribute needs exactly one entry with a matching
    /// component count, every entry must belong to a declared attribute, and
    /// entries must be float-aligned, inside the stride and non-overlapping.
    pub fn validate(&self, declared: &[ShaderVariable]) -> Result<(), RenderError> {
        let invalid = |msg: String| Err(RenderError::InvalidLayout(msg));

        if self.stride == 0 {
            return invalid("stride must be non-zero".to_string());
        }
        if self.stride % FLOAT_SIZE != 0 {
            return invalid(format!("stride {} is not a multiple of {}", self.stride, FLOAT_SIZE));
        }

        for (i, entry) in self.attributes.iter().enumerate() {
            if self.attributes[..i].iter().any(|a| a.name == entry.name) {
                return invalid(format!("attribute '{}' appears twice", entry.name));
            }
            if !(1..=4).contains(&entry.components) {
                return invalid(format!(
                    "attribute '{}' has {} components",
                    entry.name, entry.components
                ));
            }
            if entry.offset % FLOAT_SIZE != 0 {
                return invalid(format!(
                    "attribute '{}' offset {} is not float-aligned",
                    entry.name, entry.offset
                ));
            }
            if entry.end() > self.stride {
                return invalid(format!(
                    "attribute '{}' ends at byte {} past stride {}",
                    entry.name,
                    entry.end(),
                    self.stride
                ));
            }
            if !declared.iter().any(|d| d.name == entry.name) {
                return invalid(format!(
                    "attribute '{}' is not declared by the program",
                    entry.name
                ));
            }
        }

        for var in declared {
            let entry = match self.attribute(&var.name) {
                Some(entry) => entry,
                None => return invalid(format!("declared attribute '{}' has no layout entry", var.name)),
            };
            if var.kind == VariableKind::Mat4 {
                return invalid(format!("attribute '{}' cannot be a matrix", var.name));
            }
            if entry.components != var.kind.components() {
                return invalid(format!(
                    "attribute '{}' is a {} but the layout gives {} components",
                    var.name, var.kind, entry.components
                ));
            }
        }

        let mut by_offset: Vec<&VertexAttribute> = self.attributes.iter().collect();
        by_offset.sort_by_key(|a| a.offset);
        for pair in by_offset.windows(2) {
            if pair[0].end() > pair[1].offset {
                return invalid(format!(
                    "attributes '{}' and '{}' overlap",
                    pair[0].name, pair[1].name
                ));
            }
        }

        Ok(())
    }

    /// Check that a vertex buffer of `len` bytes holds whole vertices
    pub fn validate_buffer(&self, len: usize) -> Result<(), RenderError> {
        if self.stride == 0 {
            return Err(RenderError::InvalidLayout("stride must be non-zero".to_string()));
        }
        if len % self.stride as usize != 0 {
            return Err(RenderError::InvalidLayout(format!(
                "buffer of {} bytes is not a whole number of {}-byte vertices",
                len, self.stride
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared() -> Vec<ShaderVariable> {
        vec![
            ShaderVariable::vec3("a_position"),
            ShaderVariable::vec3("a_normal"),
        ]
    }

    #[test]
    fn test_position_normal_is_valid() {
        let layout = VertexLayout::position_normal();
        assert_eq!(layout.stride(), 24);
        assert_eq!(layout.attribute("a_normal").unwrap().offset, 12);
        assert!(layout.validate(&declared()).is_ok());
    }

    #[test]
    fn test_offset_past_stride() {
        let layout = VertexLayout::new(12)
            .with_attribute("a_position", 3, 0)
            .with_attribute("a_normal", 3, 12);
        let err = layout.validate(&declared()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidLayout(msg) if msg.contains("past stride")));
    }

    #[test]
    fn test_overlapping_attributes() {
        let layout = VertexLayout::new(24)
            .with_attribute("a_position", 3, 0)
            .with_attribute("a_normal", 3, 8);
        let err = layout.validate(&declared()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidLayout(msg) if msg.contains("overlap")));
    }

    #[test]
    fn test_missing_declared_attribute() {
        let layout = VertexLayout::new(12).with_attribute("a_position", 3, 0);
        assert!(layout.validate(&declared()).is_err());
    }

    #[test]
    fn test_undeclared_entry() {
        let layout = VertexLayout::position_normal().with_attribute("a_color", 3, 0);
        assert!(layout.validate(&declared()).is_err());
    }

    #[test]
    fn test_component_mismatch() {
        let layout = VertexLayout::new(28)
            .with_attribute("a_position", 4, 0)
            .with_attribute("a_normal", 3, 16);
        assert!(layout.validate(&declared()).is_err());
    }

    #[test]
    fn test_zero_and_unaligned_stride() {
        assert!(VertexLayout::new(0).validate(&[]).is_err());
        assert!(VertexLayout::new(10).validate(&[]).is_err());
    }

    #[test]
    fn test_validate_buffer() {
        let layout = VertexLayout::position_normal();
        assert!(layout.validate_buffer(0).is_ok());
        assert!(layout.validate_buffer(48).is_ok());
        assert!(layout.validate_buffer(50).is_err());
    }
}
