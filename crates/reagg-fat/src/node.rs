//! Index arithmetic for the flat complete binary tree
//!
//! Node `i` has children `2i+1` and `2i+2`; the root lives at index 0.

/// Index of the root node.
pub const ROOT: usize = 0;

/// Parent of a non-root node.
#[inline]
pub fn parent(index: usize) -> usize {
    debug_assert!(index != ROOT, "the root has no parent");
    (index - 1) / 2
}

/// Root of the left subtree below `index`.
#[inline]
pub fn left(index: usize) -> usize {
    2 * index + 1
}

/// Root of the right subtree below `index`.
#[inline]
pub fn right(index: usize) -> usize {
    2 * index + 2
}

/// Returns true if `index` is the left child of its parent.
#[inline]
pub fn is_left_child(index: usize) -> bool {
    index != ROOT && index % 2 == 1
}

/// Returns true if `index` is the right child of its parent.
#[inline]
pub fn is_right_child(index: usize) -> bool {
    index != ROOT && index % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_and_parent() {
        assert_eq!(left(0), 1);
        assert_eq!(right(0), 2);
        assert_eq!(left(2), 5);
        assert_eq!(right(2), 6);
        for i in 0..64 {
            assert_eq!(parent(left(i)), i);
            assert_eq!(parent(right(i)), i);
        }
    }

    #[test]
    fn test_child_side() {
        assert!(is_left_child(1));
        assert!(is_right_child(2));
        assert!(is_left_child(5));
        assert!(is_right_child(6));
        assert!(!is_left_child(ROOT));
        assert!(!is_right_child(ROOT));
    }
}
