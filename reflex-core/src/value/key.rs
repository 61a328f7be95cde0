//! Property keys and hashable values.
//!
//! Records and lists are addressed by [`PropKey`]; map keys, set items and
//! collection dependency keys are arbitrary values wrapped in [`HashKey`],
//! which hashes and compares with SameValueZero semantics.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::{same_value_zero, Value};

/// Name of the list length property.
pub const LENGTH: &str = "length";

/// A key addressing a record property or a list slot.
///
/// Canonical integer strings (`"0"`, `"12"`, but not `"012"`) normalize to
/// [`PropKey::Index`], so `PropKey::from("3") == PropKey::from(3usize)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropKey {
    /// An integer index.
    Index(u32),
    /// Any other property name.
    Name(Rc<str>),
}

impl PropKey {
    /// The list `length` key.
    pub fn length() -> Self {
        Self::Name(Rc::from(LENGTH))
    }

    /// Whether this is the `length` key.
    pub fn is_length(&self) -> bool {
        matches!(self, Self::Name(name) if &**name == LENGTH)
    }

    /// The index, if this is an integer key.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i as usize),
            Self::Name(_) => None,
        }
    }

    fn parse(name: &str) -> Self {
        match name.parse::<u32>() {
            Ok(i) if i != u32::MAX && i.to_string() == name => Self::Index(i),
            _ => Self::Name(Rc::from(name)),
        }
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<String> for PropKey {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<Rc<str>> for PropKey {
    fn from(name: Rc<str>) -> Self {
        match Self::parse(&name) {
            Self::Name(_) => Self::Name(name),
            index => index,
        }
    }
}

impl From<usize> for PropKey {
    fn from(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(i) if i != u32::MAX => Self::Index(i),
            _ => Self::Name(Rc::from(index.to_string())),
        }
    }
}

impl From<u32> for PropKey {
    fn from(index: u32) -> Self {
        Self::from(index as usize)
    }
}

impl From<&PropKey> for PropKey {
    fn from(key: &PropKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// A value usable as a hash key.
///
/// Objects, wrappers and refs hash by identity. Numbers hash by value with
/// every NaN collapsed to one key and `-0` folded into `+0`.
#[derive(Clone)]
pub struct HashKey(pub Value);

impl HashKey {
    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        same_value_zero(&self.0, &other.0)
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Undefined => 0u8.hash(state),
            Value::Null => 1u8.hash(state),
            Value::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Number(n) => {
                3u8.hash(state);
                let bits = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Value::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::Object(obj) => {
                5u8.hash(state);
                obj.id().hash(state);
            }
            Value::Reactive(wrapper) => {
                6u8.hash(state);
                wrapper.id().hash(state);
            }
            Value::Ref(r) => {
                7u8.hash(state);
                r.addr().hash(state);
            }
        }
    }
}

impl fmt::Debug for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl From<Value> for HashKey {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn integer_strings_normalize_to_indices() {
        assert_eq!(PropKey::from("3"), PropKey::Index(3));
        assert_eq!(PropKey::from(3usize), PropKey::Index(3));
        assert!(matches!(PropKey::from("03"), PropKey::Name(_)));
        assert!(matches!(PropKey::from("-1"), PropKey::Name(_)));
        assert!(PropKey::from("length").is_length());
    }

    #[test]
    fn hash_keys_use_same_value_zero() {
        let mut set = HashSet::new();
        set.insert(HashKey(Value::Number(f64::NAN)));
        assert!(set.contains(&HashKey(Value::Number(f64::NAN))));

        set.insert(HashKey(Value::Number(0.0)));
        assert!(set.contains(&HashKey(Value::Number(-0.0))));

        set.insert(HashKey(Value::from("a")));
        assert!(!set.contains(&HashKey(Value::from(1))));
    }
}
