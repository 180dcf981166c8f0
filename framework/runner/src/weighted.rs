use rand::Rng;

/// Picks items with probability proportional to their weight.
#[derive(Debug, Clone)]
pub(crate) struct WeightedTable<T> {
    items: Vec<T>,
    cumulative: Vec<u64>,
    total: u64,
}

impl<T> WeightedTable<T> {
    /// Build a table from `(item, weight)` pairs. Items with a weight of 0 can never be picked
    /// and are left out. Returns `None` if nothing is left to pick from.
    pub(crate) fn new(entries: impl IntoIterator<Item = (T, u32)>) -> Option<Self> {
        let mut items = Vec::new();
        let mut cumulative = Vec::new();
        let mut total = 0u64;
        for (item, weight) in entries {
            if weight == 0 {
                continue;
            }
            total += u64::from(weight);
            items.push(item);
            cumulative.push(total);
        }

        if items.is_empty() {
            None
        } else {
            Some(Self {
                items,
                cumulative,
                total,
            })
        }
    }

    pub(crate) fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        let point = rng.gen_range(0..self.total);
        let index = self.cumulative.partition_point(|bound| *bound <= point);
        &self.items[index]
    }

    pub(crate) fn items(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn zero_weights_are_never_picked() {
        let table = WeightedTable::new([("a", 0), ("b", 3), ("c", 0)]).unwrap();
        assert_eq!(1, table.len());

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!("b", *table.sample(&mut rng));
        }
    }

    #[test]
    fn only_zero_weights_is_empty() {
        assert!(WeightedTable::new([("a", 0)]).is_none());
        assert!(WeightedTable::<&str>::new([]).is_none());
    }

    #[test]
    fn picks_roughly_follow_weights() {
        let table = WeightedTable::new([("light", 1), ("heavy", 3)]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let mut counts = HashMap::new();
        for _ in 0..4000 {
            *counts.entry(*table.sample(&mut rng)).or_insert(0u32) += 1;
        }

        let heavy = counts["heavy"];
        assert!(
            (2700..=3300).contains(&heavy),
            "heavy picked {heavy} times out of 4000"
        );
    }
}
