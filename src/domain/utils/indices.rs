pub fn wrap_negative(index: i64, len: usize) -> i64 {
    if index < 0 {
        len as i64 + index
    } else {
        index
    }
}

pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let idx = wrap_negative(index, len);

    if idx < 0 || idx >= len as i64 {
        None
    } else {
        Some(idx as usize)
    }
}

/// Resolve Python slice bounds against a sequence of `len` items, returning the indices selected.
pub fn slice_indices(
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
    len: usize,
) -> Option<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return None;
    }

    let len = len as i64;
    let clamp = |index: i64, low: i64, high: i64| wrap_negative(index, len as usize).clamp(low, high);

    let mut indices = vec![];
    if step > 0 {
        let start = start.map_or(0, |i| clamp(i, 0, len));
        let stop = stop.map_or(len, |i| clamp(i, 0, len));
        let mut i = start;
        while i < stop {
            indices.push(i as usize);
            i += step;
        }
    } else {
        let start = start.map_or(len - 1, |i| clamp(i, -1, len - 1));
        let stop = stop.map_or(-1, |i| clamp(i, -1, len - 1));
        let mut i = start;
        while i > stop {
            indices.push(i as usize);
            i += step;
        }
    }
    Some(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_indices_wrap() {
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }

    #[test]
    fn slices() {
        assert_eq!(slice_indices(None, None, None, 3), Some(vec![0, 1, 2]));
        assert_eq!(slice_indices(Some(1), None, None, 3), Some(vec![1, 2]));
        assert_eq!(slice_indices(None, Some(-1), None, 3), Some(vec![0, 1]));
        assert_eq!(slice_indices(None, None, Some(-1), 3), Some(vec![2, 1, 0]));
        assert_eq!(slice_indices(Some(-2), Some(10), Some(2), 5), Some(vec![3]));
        assert_eq!(slice_indices(None, None, Some(0), 3), None);
    }
}
