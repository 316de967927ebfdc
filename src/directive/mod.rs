//! Directive tree subsystem.
//!
//! # Data Flow
//! ```text
//! labels (per resource)
//!     → node.rs (DirectiveNode trees, one per site)
//!     → merge.rs (fold trees from all resources by site key)
//!     → writer.rs (sorted, indented Caddyfile text)
//! ```
//!
//! # Design Decisions
//! - Children are keyed separately from their rendered name so that
//!   `tls` and `tls_1` can coexist and both render as `tls`
//! - Output order is always the sorted key order, never insertion order,
//!   so that unchanged input produces byte-identical output
//! - Merge decisions are made once per colliding child, without recursion

pub mod merge;
pub mod node;
pub mod suffix;
pub mod writer;

pub use merge::{merge_directives, merge_into, merge_map};
pub use node::{strip_suffix, DirectiveNode, DirectiveMap};
pub use suffix::{SuffixGenerator, SuffixSource};
pub use writer::{render, write_directives, EMPTY_DOCUMENT};
