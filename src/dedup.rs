use std::collections::BTreeSet;

/// Union of two name lists, each name kept once.
///
/// Matching is exact: "ABBA" and "Abba" are two different artists here.
/// Callers should treat the result as unordered; it happens to iterate
/// sorted, which keeps progress output stable between runs.
pub fn union_names<'a, A, B>(first: A, second: B) -> BTreeSet<String>
where
    A: IntoIterator<Item = &'a str>,
    B: IntoIterator<Item = &'a str>,
{
    first
        .into_iter()
        .chain(second)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
