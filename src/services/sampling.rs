use std::collections::BTreeMap;

use rand::seq::{index, SliceRandom};
use rand::Rng;

use crate::error::{AppError, AppResult};

/// Draws `n` distinct items uniformly at random
pub fn sample_without_replacement<'a, T, R>(
    items: &'a [T],
    n: usize,
    rng: &mut R,
    source: &str,
) -> AppResult<Vec<&'a T>>
where
    R: Rng + ?Sized,
{
    if n > items.len() {
        return Err(AppError::InsufficientRows(format!(
            "Cannot sample {} rows from {} ({} available)",
            n,
            source,
            items.len()
        )));
    }

    Ok(index::sample(rng, items.len(), n)
        .into_iter()
        .map(|i| &items[i])
        .collect())
}

/// A train/test partition of labelled items
#[derive(Debug, Clone)]
pub struct Split<T> {
    pub train: Vec<(T, u8)>,
    pub test: Vec<(T, u8)>,
}

impl<T> Split<T> {
    pub fn train_labels(&self) -> Vec<u8> {
        self.train.iter().map(|(_, label)| *label).collect()
    }
}

/// Splits labelled items into train and test sets, preserving each label's share
///
/// Every label contributes `ceil(count * test_fraction)` items to the test set,
/// clamped so both sets keep at least one item of that label.
pub fn stratified_split<T, R>(
    items: Vec<(T, u8)>,
    test_fraction: f64,
    rng: &mut R,
) -> AppResult<Split<T>>
where
    R: Rng + ?Sized,
{
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AppError::InvalidInput(format!(
            "Test fraction must be between 0 and 1, got {}",
            test_fraction
        )));
    }

    let mut by_label: BTreeMap<u8, Vec<T>> = BTreeMap::new();
    for (item, label) in items {
        by_label.entry(label).or_default().push(item);
    }

    let mut train = Vec::new();
    let mut test = Vec::new();

    for (label, mut group) in by_label {
        if group.len() < 2 {
            return Err(AppError::InsufficientRows(format!(
                "Label {} has {} rows; a stratified split needs at least 2",
                label,
                group.len()
            )));
        }

        group.shuffle(rng);

        let wanted = (group.len() as f64 * test_fraction).ceil() as usize;
        let n_test = wanted.clamp(1, group.len() - 1);

        let held_out = group.split_off(group.len() - n_test);
        test.extend(held_out.into_iter().map(|item| (item, label)));
        train.extend(group.into_iter().map(|item| (item, label)));
    }

    train.shuffle(rng);
    test.shuffle(rng);

    Ok(Split { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_sample_is_distinct_and_sized() {
        let items: Vec<u32> = (0..20).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let sample = sample_without_replacement(&items, 5, &mut rng, "catalog").unwrap();
        let distinct: HashSet<u32> = sample.iter().map(|v| **v).collect();

        assert_eq!(sample.len(), 5);
        assert_eq!(distinct.len(), 5);
    }

    #[test]
    fn test_sample_is_reproducible_with_seed() {
        let items: Vec<u32> = (0..50).collect();

        let first = sample_without_replacement(&items, 10, &mut StdRng::seed_from_u64(3), "x")
            .unwrap();
        let second = sample_without_replacement(&items, 10, &mut StdRng::seed_from_u64(3), "x")
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_sample_more_than_available_fails() {
        let items = vec![1, 2, 3];
        let mut rng = StdRng::seed_from_u64(1);
        let result = sample_without_replacement(&items, 4, &mut rng, "liked songs");

        match result {
            Err(AppError::InsufficientRows(msg)) => assert!(msg.contains("liked songs")),
            other => panic!("expected InsufficientRows, got {:?}", other),
        }
    }

    #[test]
    fn test_stratified_split_balances_labels() {
        let items: Vec<(u32, u8)> = (0..10).map(|i| (i, u8::from(i < 5))).collect();
        let mut rng = StdRng::seed_from_u64(11);

        let split = stratified_split(items, 0.2, &mut rng).unwrap();

        let train = split.train_labels();
        let test: Vec<u8> = split.test.iter().map(|(_, label)| *label).collect();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert_eq!(train.iter().filter(|&&l| l == 1).count(), 4);
        assert_eq!(test.iter().filter(|&&l| l == 1).count(), 1);
    }

    #[test]
    fn test_stratified_split_is_a_partition() {
        let items: Vec<(u32, u8)> = (0..30).map(|i| (i, u8::from(i % 3 == 0))).collect();
        let mut rng = StdRng::seed_from_u64(5);

        let split = stratified_split(items, 0.3, &mut rng).unwrap();
        let mut seen: Vec<u32> = split
            .train
            .iter()
            .chain(split.test.iter())
            .map(|(item, _)| *item)
            .collect();
        seen.sort_unstable();

        assert_eq!(seen, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_split_rejects_bad_fraction() {
        let items = vec![(1, 0u8), (2, 0), (3, 1), (4, 1)];
        let mut rng = StdRng::seed_from_u64(1);

        assert!(matches!(
            stratified_split(items.clone(), 0.0, &mut rng),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            stratified_split(items, 1.0, &mut rng),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_stratified_split_needs_two_rows_per_label() {
        let items = vec![(1, 0u8), (2, 1), (3, 1)];
        let mut rng = StdRng::seed_from_u64(1);

        assert!(matches!(
            stratified_split(items, 0.5, &mut rng),
            Err(AppError::InsufficientRows(_))
        ));
    }
}
