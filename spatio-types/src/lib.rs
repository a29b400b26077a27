//! # spatio-types
//!
//! Core object types shared by the Spatio fence engine and its collaborators.
//!
//! - **Object**: a stored value, either a `geo` geometry or a plain string
//! - **Fields**: named numeric values attached to an object
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use spatio_types::object::{Fields, Object};
//!
//! let truck = Object::point(-112.26, 33.46);
//! let fields = Fields::new().with("speed", 42.0);
//! assert_eq!(fields.get("speed"), 42.0);
//! assert!(truck.is_geometry());
//! ```

pub mod object;

pub use object::{Fields, Object};
