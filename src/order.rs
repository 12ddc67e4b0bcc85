//! Sorting helpers that remember where things came from.
//!
//! Extracting frames in a single forward pass requires visiting them in ascending order. These
//! helpers sort a request into that order and put the results back into the order of the
//! original request afterwards.

/// Returns the permutation that sorts `keys` in ascending order.
///
/// The sort is stable, so equal keys keep their relative order.
pub fn argsort<K: Ord>(keys: &[K]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..keys.len()).collect();
    indices.sort_by_key(|&i| &keys[i]);
    indices
}

/// Returns `seq` reordered ascending.
pub fn sort<T: Ord + Clone>(seq: &[T]) -> Vec<T> {
    let mut sorted = seq.to_vec();
    sorted.sort();
    sorted
}

/// Puts `sorted`, which is ordered according to the ascending sort of `original`, back into
/// the order of `original`.
///
/// The inverse of the sorting permutation is found by argsorting that permutation. If `sorted`
/// is shorter than `original`, it is taken to be a prefix of the sorted order: the positions
/// whose rank falls beyond its end are left out, and the rest keep their relative order.
///
/// ```
/// use xtcpick::order::{sort, unsort};
///
/// let original = [5, 2, 5, 0];
/// assert_eq!(unsort(sort(&original), &original), original);
///
/// let names = vec!["zero", "two", "five", "five"];
/// assert_eq!(unsort(names, &original), ["five", "two", "five", "zero"]);
/// ```
pub fn unsort<T, K: Ord>(sorted: Vec<T>, original: &[K]) -> Vec<T> {
    let rank = argsort(&argsort(original));
    let mut slots: Vec<Option<T>> = sorted.into_iter().map(Some).collect();
    rank.into_iter()
        .filter_map(|r| slots.get_mut(r).and_then(Option::take))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argsort_is_stable() {
        assert_eq!(argsort(&[3, 1, 3, 0, 1]), vec![3, 1, 4, 0, 2]);
        assert_eq!(argsort::<u8>(&[]), Vec::<usize>::new());
    }

    #[test]
    fn round_trip() {
        let cases: [&[usize]; 7] = [
            &[],
            &[7],
            &[0, 1, 2, 3],
            &[3, 2, 1, 0],
            &[5, 2, 5, 0],
            &[4, 4, 4, 4],
            &[9, 0, 3, 3, 8, 0, 1, 9, 2],
        ];
        for original in cases {
            assert_eq!(unsort(sort(original), original), original);
        }
    }

    #[test]
    fn unsort_other_values() {
        // The values only need to be in the sorted order of the keys.
        let keys = [30, 10, 20];
        let values = vec!['a', 'b', 'c']; // For keys 10, 20, 30.
        assert_eq!(unsort(values, &keys), vec!['c', 'a', 'b']);
    }

    #[test]
    fn unsort_prefix() {
        // The two requests for 9 never made it.
        let keys = [9, 2, 5, 9, 0];
        let found = vec!["0", "2", "5"];
        assert_eq!(unsort(found, &keys), vec!["2", "5", "0"]);
        assert_eq!(unsort(Vec::<&str>::new(), &keys), Vec::<&str>::new());
    }
}
