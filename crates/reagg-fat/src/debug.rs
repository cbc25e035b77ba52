//! FlatFat debug utilities
//!
//! Provides DOT export for visualization and debugging.

use crate::combine::Combine;
use crate::node::{left, right};
use crate::tree::FlatFat;
use std::fmt::{Debug, Write};

impl<T, C> FlatFat<T, C>
where
    T: Clone + Debug,
    C: Combine<T>,
{
    /// Export the tree to DOT format for visualization with Graphviz.
    ///
    /// Inner nodes are circles, leaves are boxes labelled with their
    /// position; absent slots are drawn grey.
    ///
    /// # Example
    /// ```
    /// use reagg_fat::FlatFat;
    ///
    /// let tree = FlatFat::new(vec![Some(1u64), None], |a: &u64, b: &u64| a + b).unwrap();
    /// let dot = tree.to_dot();
    /// assert!(dot.starts_with("digraph FlatFat"));
    /// // Save to file and run: dot -Tpng fat.dot -o fat.png
    /// ```
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let size = self.size();
        let first_leaf = self.capacity() - 1;

        writeln!(out, "digraph FlatFat {{").unwrap();
        writeln!(out, "  rankdir=TB;").unwrap();
        writeln!(out).unwrap();

        for index in 0..size {
            let label = match self.node(index) {
                Some(value) => format!("{:?}", value).replace('"', "\\\""),
                None => "∅".to_string(),
            };
            let shape = if index >= first_leaf { "box" } else { "circle" };
            let style = if self.node(index).is_none() {
                ", style=filled, fillcolor=lightgray"
            } else {
                ""
            };
            if index >= first_leaf {
                writeln!(
                    out,
                    "  N{} [shape={}, label=\"{}: {}\"{}];",
                    index,
                    shape,
                    index - first_leaf,
                    label,
                    style
                )
                .unwrap();
            } else {
                writeln!(
                    out,
                    "  N{} [shape={}, label=\"{}\"{}];",
                    index, shape, label, style
                )
                .unwrap();
                writeln!(out, "  N{} -> N{};", index, left(index)).unwrap();
                writeln!(out, "  N{} -> N{};", index, right(index)).unwrap();
            }
        }

        writeln!(out, "}}").unwrap();
        out
    }
}
