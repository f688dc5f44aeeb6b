//! k-element subsets of a slice.

/// All `k`-element combinations of `items`, preserving input order both
/// within each combination and across combinations.
///
/// `combinations(&[a, b, c], 2)` yields `[a, b]`, `[a, c]`, `[b, c]`.
pub fn combinations<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    if k == 0 || k > items.len() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (i, first) in items.iter().enumerate() {
        if k == 1 {
            out.push(vec![first.clone()]);
            continue;
        }
        for rest in combinations(&items[i + 1..], k - 1) {
            let mut combo = Vec::with_capacity(k);
            combo.push(first.clone());
            combo.extend(rest);
            out.push(combo);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::combinations;

    #[test]
    fn pairs_in_input_order() {
        let pairs = combinations(&["a", "b", "c"], 2);
        assert_eq!(pairs, vec![vec!["a", "b"], vec!["a", "c"], vec!["b", "c"]]);
    }

    #[test]
    fn degenerate_sizes() {
        assert!(combinations(&[1, 2], 3).is_empty());
        assert!(combinations(&[1, 2], 0).is_empty());
        assert_eq!(combinations(&[1], 1), vec![vec![1]]);
    }
}
