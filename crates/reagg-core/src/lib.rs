//! # reagg Core
//!
//! Foundational types shared by the reagg crates.
//!
//! Events carry their payload as a map of [`Value`]s, aggregation operators
//! read numeric or key fields out of them, and lowered window aggregates are
//! reported as a [`Value`] as well. Keeping the type in its own crate lets the
//! tree, runtime and CLI crates agree on a single representation.
//!
//! ## Quick Start
//!
//! ```rust
//! use reagg_core::Value;
//!
//! let count = Value::Int(42);
//! let mean = Value::Float(3.5);
//!
//! assert_eq!(count.as_float(), Some(42.0));
//! assert_eq!(mean.type_name(), "float");
//! assert!(Value::Null.is_null());
//! ```

pub mod value;

pub use value::Value;
