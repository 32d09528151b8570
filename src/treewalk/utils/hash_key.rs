/// The hashable projection of a value, used to key dicts and sets. Numbers that compare equal
/// share a key, so `{1: "a"}[True]` and `{2: "b"}[2.0]` both hit.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum HashKey {
    None,
    Ellipsis,
    Int(i64),
    Float(u64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<HashKey>),
    Type(String),
    Identity(usize),
}

impl HashKey {
    pub fn from_float(f: f64) -> Self {
        if f.fract() == 0.0 && f.is_finite() && f.abs() < i64::MAX as f64 {
            HashKey::Int(f as i64)
        } else {
            HashKey::Float(f.to_bits())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_floats_collapse() {
        assert_eq!(HashKey::from_float(3.0), HashKey::Int(3));
        assert_eq!(HashKey::from_float(0.5), HashKey::Float(0.5f64.to_bits()));
    }
}
