/// Splits `items` into consecutive groups of `size`; the last group may be shorter.
///
/// Returns no groups when `size` is zero. Order is preserved exactly, so
/// concatenating the groups reproduces the input.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return Vec::new();
    }
    items.chunks(size).map(<[T]>::to_vec).collect()
}
