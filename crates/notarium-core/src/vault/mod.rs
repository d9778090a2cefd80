//! Vault note model

pub mod frontmatter;

pub use frontmatter::{Frontmatter, Status};
