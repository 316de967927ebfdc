//! Label parsing subsystem.
//!
//! # Data Flow
//! ```text
//! resource labels + template context
//!     → template.rs (variable substitution per value)
//!     → parser.rs (prefix filter, path → tree, proxy synthesis)
//!     → site directives keyed by address
//! ```

pub mod parser;
pub mod template;

pub use parser::{split_args, LabelParser, DEFAULT_LABEL_PREFIX};
pub use template::TemplateRenderer;
