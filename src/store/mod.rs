pub mod container;

pub use container::{canonical_path, join_path, normalize_root, Container, PATH_SEPARATOR};
