//! Tensor element types and shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of a tensor.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    Str,
}

impl DType {
    /// Returns `true` for integer and floating-point dtypes.
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub const fn is_integer(self) -> bool {
        matches!(self, DType::Int32 | DType::Int64)
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    pub const fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Str => "str",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tensor shape.
///
/// `Unknown` means even the rank is unknown. In a `Known` shape each
/// dimension is `Some(size)` or `None` when only that dimension is unknown.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Unknown,
    Known(Vec<Option<u64>>),
}

impl Shape {
    /// Rank-0 shape.
    pub fn scalar() -> Self {
        Shape::Known(Vec::new())
    }

    /// Fully defined shape from concrete dimensions.
    pub fn of(dims: &[u64]) -> Self {
        Shape::Known(dims.iter().copied().map(Some).collect())
    }

    pub fn dims(&self) -> Option<&[Option<u64>]> {
        match self {
            Shape::Unknown => None,
            Shape::Known(dims) => Some(dims),
        }
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims().map(<[_]>::len)
    }

    pub fn is_scalar(&self) -> bool {
        self.rank() == Some(0)
    }

    /// Rank and every dimension are known.
    pub fn is_fully_defined(&self) -> bool {
        self.dims()
            .is_some_and(|dims| dims.iter().all(Option::is_some))
    }

    /// Number of elements, if the shape is fully defined.
    pub fn num_elements(&self) -> Option<u64> {
        self.dims()?
            .iter()
            .try_fold(1u64, |acc, dim| dim.and_then(|d| acc.checked_mul(d)))
    }
}

impl fmt::Display for Shape {
    /// Scalars render as nothing so `int32` reads naturally; other shapes
    /// render as `[2,?]` or `[*]` for unknown rank.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Unknown => f.write_str("[*]"),
            Shape::Known(dims) if dims.is_empty() => Ok(()),
            Shape::Known(dims) => {
                f.write_str("[")?;
                for (i, dim) in dims.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match dim {
                        Some(d) => write!(f, "{d}")?,
                        None => f.write_str("?")?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_elements_requires_full_definition() {
        assert_eq!(Shape::of(&[2, 3]).num_elements(), Some(6));
        assert_eq!(Shape::scalar().num_elements(), Some(1));
        assert_eq!(Shape::Known(vec![Some(2), None]).num_elements(), None);
        assert_eq!(Shape::Unknown.num_elements(), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Shape::scalar().to_string(), "");
        assert_eq!(Shape::Known(vec![Some(2), None]).to_string(), "[2,?]");
        assert_eq!(Shape::Unknown.to_string(), "[*]");
    }

    #[test]
    fn dtype_categories() {
        assert!(DType::Int64.is_integer());
        assert!(DType::Float32.is_floating());
        assert!(!DType::Bool.is_numeric());
        assert!(!DType::Str.is_numeric());
    }
}
