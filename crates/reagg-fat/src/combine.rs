//! Combining partial aggregates
//!
//! The tree only needs the binary `combine` step of an aggregation operator.
//! It must be associative; it need not be commutative, and the tree always
//! passes the operand covering earlier leaves as `left`.

/// Associative binary combine over partial aggregates.
pub trait Combine<T> {
    /// Combine two partial aggregates, `left` covering the earlier leaves.
    fn combine(&self, left: &T, right: &T) -> T;
}

impl<T, F> Combine<T> for F
where
    F: Fn(&T, &T) -> T,
{
    #[inline]
    fn combine(&self, left: &T, right: &T) -> T {
        self(left, right)
    }
}

/// Combine two optional partials, treating `None` as the identity.
///
/// `None ⊕ x = x`, `x ⊕ None = x` and `None ⊕ None = None`; the combiner is
/// only consulted when both sides are present.
pub fn combine_optional<T, C>(combiner: &C, left: Option<&T>, right: Option<&T>) -> Option<T>
where
    T: Clone,
    C: Combine<T> + ?Sized,
{
    match (left, right) {
        (None, None) => None,
        (Some(l), None) => Some(l.clone()),
        (None, Some(r)) => Some(r.clone()),
        (Some(l), Some(r)) => Some(combiner.combine(l, r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_combiner() {
        let add = |a: &u64, b: &u64| a + b;
        assert_eq!(add.combine(&2, &3), 5);
    }

    #[test]
    fn test_absent_is_identity() {
        let add = |a: &u64, b: &u64| a + b;
        assert_eq!(combine_optional(&add, None, None), None);
        assert_eq!(combine_optional(&add, Some(&4), None), Some(4));
        assert_eq!(combine_optional(&add, None, Some(&9)), Some(9));
        assert_eq!(combine_optional(&add, Some(&4), Some(&9)), Some(13));
    }

    #[test]
    fn test_order_preserved() {
        let concat = |a: &String, b: &String| format!("{a}{b}");
        let l = "ab".to_string();
        let r = "cd".to_string();
        assert_eq!(combine_optional(&concat, Some(&l), Some(&r)).as_deref(), Some("abcd"));
    }
}
