//! Core data models for pexe
//!
//! Value types shared between the execution channel, the SGR parser and the
//! rendering collaborator.

pub mod shell_type;
pub mod styled_span;

// Re-exports for convenience
pub use shell_type::ShellType;
pub use styled_span::{Color, StyledSpan};
