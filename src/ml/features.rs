//! Sparse feature vectors.
//!
//! Featurized text is overwhelmingly zero, so every vector column in a
//! [`DataView`](crate::data::DataView) stores a [`SparseVector`]: a logical
//! dimension plus the `(slot, value)` pairs that are non-zero, sorted by slot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Vector normalization applied after weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorNorm {
    /// Leave the vector as is.
    None,
    /// Divide by the sum of absolute values.
    L1,
    /// Divide by the Euclidean length.
    #[default]
    L2,
    /// Divide by the largest absolute value.
    LInf,
}

/// A sparse vector with a fixed logical dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    dim: usize,
    entries: Vec<(u32, f32)>,
}

impl SparseVector {
    /// Create an all-zero vector of the given dimension.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: Vec::new(),
        }
    }

    /// Build a vector from slot counts that are already known to be in range.
    pub(crate) fn from_sorted(dim: usize, values: BTreeMap<u32, f32>) -> Self {
        let entries = values.into_iter().filter(|(_, v)| *v != 0.0).collect();
        Self { dim, entries }
    }

    /// Build a vector from a dense slice.
    pub fn from_dense(values: &[f32]) -> Self {
        let entries = values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, v)| (i as u32, *v))
            .collect();
        Self {
            dim: values.len(),
            entries,
        }
    }

    /// Logical dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored entries sorted by slot.
    pub fn entries(&self) -> &[(u32, f32)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.entries.iter().copied()
    }

    /// Value at `slot`, zero when it is not stored.
    pub fn get(&self, slot: u32) -> f32 {
        self.entries
            .binary_search_by_key(&slot, |(s, _)| *s)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    /// Dot product with a dense weight row. Slots past the row are ignored.
    pub fn dot(&self, weights: &[f32]) -> f32 {
        self.entries
            .iter()
            .filter_map(|(slot, value)| weights.get(*slot as usize).map(|w| w * value))
            .sum()
    }

    /// The norm of this vector under `norm`.
    pub fn norm(&self, norm: VectorNorm) -> f32 {
        match norm {
            VectorNorm::None => 1.0,
            VectorNorm::L1 => self.entries.iter().map(|(_, v)| v.abs()).sum(),
            VectorNorm::L2 => self.entries.iter().map(|(_, v)| v * v).sum::<f32>().sqrt(),
            VectorNorm::LInf => self
                .entries
                .iter()
                .map(|(_, v)| v.abs())
                .fold(0.0_f32, f32::max),
        }
    }

    /// Scale the vector to unit norm. Zero vectors are left untouched.
    pub fn normalize(&mut self, norm: VectorNorm) {
        let length = self.norm(norm);
        if norm != VectorNorm::None && length > 0.0 {
            self.scale(1.0 / length);
        }
    }

    pub fn scale(&mut self, factor: f32) {
        for (_, value) in &mut self.entries {
            *value *= factor;
        }
    }

    /// Concatenate vectors, offsetting the slots of each part by the
    /// dimensions of the parts before it.
    pub fn concat(parts: &[&SparseVector]) -> SparseVector {
        let mut dim = 0usize;
        let mut entries = Vec::with_capacity(parts.iter().map(|p| p.nnz()).sum());
        for part in parts {
            entries.extend(part.iter().map(|(slot, v)| (slot + dim as u32, v)));
            dim += part.dim;
        }
        SparseVector { dim, entries }
    }
}
