//! Embedding vectors.

use serde::{Deserialize, Serialize};

/// A fixed-dimension embedding vector produced by [`crate::embedding::Embedder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Vector components.
    pub values: Vec<f32>,
    /// The embedding model that produced this vector.
    pub model: String,
    /// `values.len()`, kept alongside for cheap dimension checks.
    pub dimensions: usize,
}

impl Embedding {
    /// Construct an embedding, deriving `dimensions` from `values`.
    pub fn new(values: Vec<f32>, model: impl Into<String>) -> Self {
        let dimensions = values.len();
        Self {
            values,
            model: model.into(),
            dimensions,
        }
    }

    /// L2 norm of the vector.
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Return a copy of this embedding normalised to unit L2 norm.
    ///
    /// A zero vector is returned unchanged (dividing by a zero norm would
    /// produce `NaN`s, and there's no sensible unit-norm version of it).
    pub fn normalized(&self) -> Embedding {
        let norm = self.norm();
        if norm == 0.0 {
            return self.clone();
        }
        Embedding {
            values: self.values.iter().map(|v| v / norm).collect(),
            model: self.model.clone(),
            dimensions: self.dimensions,
        }
    }
}
