use std::collections::HashSet;
use std::hash::Hash;

/// Keep the first occurrence of every value, in input order.
///
/// Equality is exact: no case folding or URL normalisation. Empty strings are
/// values like any other, so several missing profile images collapse into a
/// single `""` entry.
pub fn remove_duplicates<T>(list: Vec<T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::with_capacity(list.len());
    let mut unique = Vec::with_capacity(list.len());

    for element in list {
        if seen.insert(element.clone()) {
            unique.push(element);
        }
    }

    unique
}
