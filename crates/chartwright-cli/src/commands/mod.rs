//! CLI commands

pub mod lint;
pub mod package;
pub mod publish;
pub mod update;
