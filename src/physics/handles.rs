use std::hash::Hash;

/// Stable identity of a body. Handles are never reused after removal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BodyHandle(pub u32);

impl BodyHandle {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unordered pair of bodies, stored with the lower handle first.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BodyPairKey {
    pub a: BodyHandle,
    pub b: BodyHandle,
}

impl BodyPairKey {
    /// Creates the canonical key for the pair regardless of argument order.
    #[inline(always)]
    pub fn new(first: BodyHandle, second: BodyHandle) -> Self {
        if first <= second {
            Self { a: first, b: second }
        } else {
            Self { a: second, b: first }
        }
    }

    #[inline(always)]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.a == handle || self.b == handle
    }

    /// Returns the other member of the pair, if `handle` belongs to it.
    #[inline(always)]
    pub fn other(&self, handle: BodyHandle) -> Option<BodyHandle> {
        if self.a == handle {
            Some(self.b)
        } else if self.b == handle {
            Some(self.a)
        } else {
            None
        }
    }
}

impl std::fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "BodyHandle<{}>", self.0)
    }
}

impl std::fmt::Display for BodyPairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "BodyPair<{}, {}>", self.a.0, self.b.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_order_independent() {
        let key = BodyPairKey::new(BodyHandle(7), BodyHandle(3));
        assert_eq!(key, BodyPairKey::new(BodyHandle(3), BodyHandle(7)));
        assert_eq!(key.a, BodyHandle(3));
        assert_eq!(key.other(BodyHandle(3)), Some(BodyHandle(7)));
        assert_eq!(key.other(BodyHandle(4)), None);
    }
}
