//! Command handlers for the Clipper CLI.

pub mod build;
pub mod parse;
pub mod show;

pub use build::BuildCommand;
pub use parse::ParseCommand;
pub use show::ShowCommand;
