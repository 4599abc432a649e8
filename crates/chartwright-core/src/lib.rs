//! Chartwright Core - Core types shared by every chartwright crate
//!
//! This crate provides the foundational types used throughout chartwright:
//! - `Values`: Configuration values with deep merge support
//! - `ManifestSet`: The documents of one upstream release, split into CRDs and ordinary resources
//! - `ReleaseDescriptor` / `Rule`: What to fetch and how to rewrite it
//! - `resolve_version`: Chart version selection against an upstream tag
//! - `Config`: Layered tool configuration

pub mod config;
pub mod error;
pub mod manifest;
pub mod release;
pub mod values;
pub mod version;

pub use config::{
    Config, ConfigOverrides, GitSettings, HelmSettings, LogSettings, Mode, PullRequestSettings,
};
pub use error::{CoreError, Result};
pub use manifest::{Document, ManifestSet, document_kind, document_name, is_crd, parse_documents};
pub use release::{ReleaseDescriptor, Rule};
pub use values::{Values, merge};
pub use version::{parse_lenient, resolve_version};
