pub mod client;
pub mod error;
pub mod version;

pub use client::{OwnerKind, PackageClient};
pub use version::PackageVersion;
