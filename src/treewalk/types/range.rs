use crate::treewalk::{types::Exception, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    pub fn new(start: i64, stop: i64, step: i64) -> DomainResult<Self> {
        if step == 0 {
            return Err(Exception::value_error("range() arg 3 must not be zero"));
        }
        Ok(Self { start, stop, step })
    }

    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            self.stop - self.start
        } else {
            self.start - self.stop
        };
        if span <= 0 {
            return 0;
        }
        let step = self.step.unsigned_abs() as i64;
        ((span + step - 1) / step) as usize
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        (index < self.len()).then(|| self.start + index as i64 * self.step)
    }

    pub fn contains(&self, value: i64) -> bool {
        let in_bounds = if self.step > 0 {
            value >= self.start && value < self.stop
        } else {
            value <= self.start && value > self.stop
        };
        in_bounds && (value - self.start) % self.step == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths() {
        assert_eq!(Range::new(0, 5, 1).map(|r| r.len()), Ok(5));
        assert_eq!(Range::new(0, 5, 2).map(|r| r.len()), Ok(3));
        assert_eq!(Range::new(5, 0, -2).map(|r| r.len()), Ok(3));
        assert_eq!(Range::new(5, 0, 1).map(|r| r.len()), Ok(0));
    }

    #[test]
    fn membership() {
        let r = Range::new(1, 10, 3).expect("valid range");
        assert!(r.contains(7));
        assert!(!r.contains(8));
        assert_eq!(r.get(2), Some(7));
        assert_eq!(r.get(3), None);
    }

    #[test]
    fn zero_step() {
        assert!(Range::new(0, 1, 0).is_err());
    }
}
