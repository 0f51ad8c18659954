//! Vector type and operations

use crate::error::{LshError, Result};
use serde::{Deserialize, Serialize};

/// A dense feature vector in n-dimensional space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Reject empty vectors and vectors with NaN or infinite components.
    pub fn validate(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(LshError::InvalidVector {
                reason: "Vector has no components".to_string(),
            });
        }
        if let Some(pos) = self.data.iter().position(|x| !x.is_finite()) {
            return Err(LshError::InvalidVector {
                reason: format!("Component {} is not finite", pos),
            });
        }
        Ok(())
    }

    /// Parse a vector from whitespace- or comma-separated components
    pub fn parse(s: &str) -> Result<Self> {
        Self::from_tokens(s.split(|c: char| c == ',' || c.is_whitespace()))
    }

    /// Parse a vector from already split tokens, skipping empty ones
    pub fn from_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Self> {
        let data: Result<Vec<f32>> = tokens
            .filter(|t| !t.is_empty())
            .map(|x| {
                x.parse::<f32>().map_err(|_| LshError::InvalidVector {
                    reason: format!("Invalid float: {}", x),
                })
            })
            .collect();
        Ok(Vector::new(data?))
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_creation() {
        let v = Vector::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.dimension(), 3);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_parse_mixed_separators() {
        let v = Vector::parse("1.0, 2.0 3.0\t4.5").unwrap();
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0, 4.5]);
    }

    #[test]
    fn test_parse_invalid_float() {
        assert!(matches!(
            Vector::parse("1.0 abc"),
            Err(LshError::InvalidVector { .. })
        ));
    }

    #[test]
    fn test_validate() {
        assert!(Vector::new(vec![1.0, 2.0]).validate().is_ok());
        assert!(Vector::new(vec![]).validate().is_err());
        assert!(Vector::new(vec![1.0, f32::NAN]).validate().is_err());
        assert!(Vector::new(vec![f32::INFINITY]).validate().is_err());
    }
}
