//! Track model, the metadata collaborator and cover-image references.

mod cover;
mod metadata;
mod model;

pub use cover::{CoverArt, CoverLease, CoverRegistry};
pub use metadata::{LoftyMetadata, MetadataProvider};
pub use model::*;
