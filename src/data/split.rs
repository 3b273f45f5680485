//! Seeded train/test split.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{QuillonError, Result};

/// Shuffle `items` with `seed` and split off `test_fraction` of them.
///
/// Returns `(train, test)`. The training side always keeps at least one item.
pub fn train_test_split<T: Clone>(
    items: &[T],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<T>, Vec<T>)> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(QuillonError::invalid_argument(format!(
            "test fraction must be in [0, 1), got {test_fraction}"
        )));
    }

    let mut indices: Vec<usize> = (0..items.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_len = ((items.len() as f64) * test_fraction).round() as usize;
    let test_len = test_len.min(items.len().saturating_sub(1));

    let (test_idx, train_idx) = indices.split_at(test_len);
    let pick = |idx: &[usize]| idx.iter().map(|&i| items[i].clone()).collect::<Vec<_>>();

    Ok((pick(train_idx), pick(test_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes_and_determinism() {
        let items: Vec<u32> = (0..20).collect();

        let (train, test) = train_test_split(&items, 0.25, 7).unwrap();
        assert_eq!(train.len(), 15);
        assert_eq!(test.len(), 5);

        let (train2, test2) = train_test_split(&items, 0.25, 7).unwrap();
        assert_eq!(train, train2);
        assert_eq!(test, test2);

        let mut all: Vec<u32> = train.into_iter().chain(test).collect();
        all.sort();
        assert_eq!(all, items);
    }

    #[test]
    fn test_split_keeps_one_training_item() {
        let (train, test) = train_test_split(&[1, 2], 0.9, 1).unwrap();
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn test_zero_fraction_and_invalid() {
        let (train, test) = train_test_split(&[1, 2, 3], 0.0, 1).unwrap();
        assert_eq!(train.len(), 3);
        assert!(test.is_empty());

        assert!(train_test_split(&[1], 1.0, 1).is_err());
    }
}
