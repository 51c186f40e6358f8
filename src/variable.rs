//! Checkpoint variable representation
//!
//! A [`Variable`] is one named tensor read out of a checkpoint: a flat
//! row-major f32 buffer plus its shape. Shapes are validated on
//! construction so the rest of the pipeline can trust `size()` without
//! re-checking.

use crate::error::{Result, VolcarError};

/// One named tensor from a checkpoint
///
/// # Examples
///
/// ```
/// use volcar::Variable;
///
/// let v = Variable::new("model/wpe", vec![2, 3], vec![0.0; 6]).unwrap();
/// assert_eq!(v.shape(), &[2, 3]);
/// assert_eq!(v.size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Flat variable name as stored in the checkpoint
    name: String,
    /// Dimensions as stored (singleton dimensions not yet removed)
    shape: Vec<usize>,
    /// Values in row-major order
    data: Vec<f32>,
}

impl Variable {
    /// Create a variable, validating that the data length matches the shape
    ///
    /// An empty shape denotes a scalar holding exactly one element.
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if any dimension is zero or the data length
    /// does not equal the product of the dimensions.
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let name = name.into();

        if shape.contains(&0) {
            return Err(VolcarError::InvalidShape {
                reason: format!("{name}: shape {shape:?} contains a zero dimension"),
            });
        }

        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(VolcarError::InvalidShape {
                reason: format!(
                    "{name}: shape {shape:?} implies {expected} elements, got {}",
                    data.len()
                ),
            });
        }

        Ok(Self { name, shape, data })
    }

    /// Variable name as stored in the checkpoint
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape as stored, singleton dimensions included
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Values in row-major order
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Element count, computed from the original shape before normalization
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Shape with all singleton dimensions removed
    #[must_use]
    pub fn squeezed_shape(&self) -> Vec<usize> {
        squeeze_shape(&self.shape)
    }
}

/// Remove every dimension of size 1, preserving the order of the rest
///
/// An all-ones shape squeezes to an empty sequence (a scalar); the element
/// count is unaffected either way.
///
/// # Examples
///
/// ```
/// use volcar::variable::squeeze_shape;
///
/// assert_eq!(squeeze_shape(&[1, 768, 3072]), vec![768, 3072]);
/// assert_eq!(squeeze_shape(&[1, 1]), Vec::<usize>::new());
/// ```
#[must_use]
pub fn squeeze_shape(shape: &[usize]) -> Vec<usize> {
    shape.iter().copied().filter(|&d| d != 1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_variable() {
        let v = Variable::new("model/wte", vec![4, 8], vec![0.5; 32]).unwrap();
        assert_eq!(v.name(), "model/wte");
        assert_eq!(v.shape(), &[4, 8]);
        assert_eq!(v.size(), 32);
        assert_eq!(v.data().len(), 32);
    }

    #[test]
    fn test_scalar_variable() {
        // Empty shape is a scalar with one element
        let v = Variable::new("model/step", vec![], vec![7.0]).unwrap();
        assert_eq!(v.size(), 1);
        assert_eq!(v.squeezed_shape(), Vec::<usize>::new());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let result = Variable::new("model/bad", vec![2, 0], vec![]);
        assert!(matches!(
            result.unwrap_err(),
            VolcarError::InvalidShape { .. }
        ));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let result = Variable::new("model/bad", vec![2, 3], vec![1.0, 2.0]);
        assert!(matches!(
            result.unwrap_err(),
            VolcarError::InvalidShape { .. }
        ));
    }

    #[test]
    fn test_squeeze_removes_singletons() {
        assert_eq!(squeeze_shape(&[1, 768, 3072]), vec![768, 3072]);
        assert_eq!(squeeze_shape(&[768, 1, 3072, 1]), vec![768, 3072]);
        assert_eq!(squeeze_shape(&[1024, 768]), vec![1024, 768]);
    }

    #[test]
    fn test_squeeze_all_ones_to_scalar() {
        assert_eq!(squeeze_shape(&[1]), Vec::<usize>::new());
        assert_eq!(squeeze_shape(&[1, 1, 1]), Vec::<usize>::new());
    }

    #[test]
    fn test_squeeze_preserves_order() {
        assert_eq!(squeeze_shape(&[3, 1, 2, 1, 5]), vec![3, 2, 5]);
    }

    #[test]
    fn test_size_survives_squeeze() {
        let v = Variable::new("model/h0/attn/c_attn/w", vec![1, 8, 24], vec![0.0; 192]).unwrap();
        assert_eq!(v.squeezed_shape(), vec![8, 24]);
        assert_eq!(v.size(), 192);
    }
}
