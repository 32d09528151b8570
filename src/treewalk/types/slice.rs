use crate::domain::utils::slice_indices;

/// Evaluated slice bounds, as produced by `x[a:b:c]` or `slice(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Self { start, stop, step }
    }

    /// The selected indices of a sequence of length `len`, or `None` for a zero step.
    pub fn indices(&self, len: usize) -> Option<Vec<usize>> {
        slice_indices(self.start, self.stop, self.step, len)
    }

    pub fn apply<T: Clone>(&self, items: &[T]) -> Option<Vec<T>> {
        Some(
            self.indices(items.len())?
                .into_iter()
                .map(|i| items[i].clone())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse() {
        let slice = Slice::new(None, None, Some(-1));
        assert_eq!(slice.apply(&[1, 2, 3]), Some(vec![3, 2, 1]));
    }

    #[test]
    fn bounded() {
        let slice = Slice::new(Some(1), Some(-1), None);
        assert_eq!(slice.apply(&['a', 'b', 'c', 'd']), Some(vec!['b', 'c']));
    }
}
