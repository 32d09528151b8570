use std::collections::VecDeque;

use crate::treewalk::{types::Range, TreewalkValue};

/// The state behind every iterator the sandbox hands out. Sequences are snapshotted when the
/// iterator is created; ranges are produced lazily so `range(10**9)` costs nothing until used.
#[derive(Clone)]
pub enum Iter {
    Items(VecDeque<TreewalkValue>),
    Range { next: i64, remaining: usize, step: i64 },
}

impl Iter {
    pub fn from_items(items: impl IntoIterator<Item = TreewalkValue>) -> Self {
        Iter::Items(items.into_iter().collect())
    }

    pub fn empty() -> Self {
        Iter::Items(VecDeque::new())
    }

    pub fn from_range(range: &Range) -> Self {
        Iter::Range {
            next: range.start,
            remaining: range.len(),
            step: range.step,
        }
    }
}

impl Iterator for Iter {
    type Item = TreewalkValue;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Iter::Items(items) => items.pop_front(),
            Iter::Range {
                next,
                remaining,
                step,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let value = *next;
                *next += *step;
                *remaining -= 1;
                Some(TreewalkValue::Int(value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_range() {
        let range = Range::new(10, 0, -4).expect("valid range");
        let values: Vec<_> = Iter::from_range(&range).collect();
        assert_eq!(
            values,
            vec![
                TreewalkValue::Int(10),
                TreewalkValue::Int(6),
                TreewalkValue::Int(2)
            ]
        );
    }

    #[test]
    fn items_are_consumed_once() {
        let mut iter = Iter::from_items(vec![TreewalkValue::None]);
        assert_eq!(iter.next(), Some(TreewalkValue::None));
        assert_eq!(iter.next(), None);
    }
}
