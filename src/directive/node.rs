//! Directive tree node.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Top-level directives keyed by site name.
pub type DirectiveMap = HashMap<String, DirectiveNode>;

/// One configuration directive with ordered arguments and keyed children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveNode {
    /// Rendered name. Empty for grouping nodes and for nodes awaiting a name.
    pub name: String,
    /// Arguments in rendering order.
    pub args: Vec<String>,
    /// Child directives keyed by their (possibly suffixed) label segment.
    pub children: HashMap<String, DirectiveNode>,
}

impl DirectiveNode {
    /// Create an empty node with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style variant of [`DirectiveNode::add_args`].
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_args(args);
        self
    }

    /// Builder-style child insertion under `key`.
    pub fn with_child(mut self, key: impl Into<String>, child: DirectiveNode) -> Self {
        self.children.insert(key.into(), child);
        self
    }

    /// Append arguments.
    pub fn add_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    /// First argument, if any.
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// True when the node renders as nothing but its children.
    pub fn is_transparent(&self) -> bool {
        self.name.is_empty() && self.args.is_empty()
    }

    /// Walk a dot-separated path below `map`, creating missing nodes.
    ///
    /// New nodes are named after their segment with any `_<digits>` suffix
    /// removed. When `skip_first_name` is set the node for the first segment
    /// is left unnamed; label prefixes use this so the site name can be filled
    /// in later.
    pub fn get_or_create<'a>(
        map: &'a mut HashMap<String, DirectiveNode>,
        path: &str,
        skip_first_name: bool,
    ) -> &'a mut DirectiveNode {
        let mut segments = path.split('.');
        // split always yields at least one segment
        let first = segments.next().unwrap_or_default();
        let mut node = map.entry(first.to_string()).or_insert_with(|| {
            if skip_first_name {
                DirectiveNode::default()
            } else {
                DirectiveNode::new(strip_suffix(first))
            }
        });

        for segment in segments {
            node = node
                .children
                .entry(segment.to_string())
                .or_insert_with(|| DirectiveNode::new(strip_suffix(segment)));
        }
        node
    }

    /// Remove a child leaf and return its first argument.
    pub(crate) fn take_first_arg(&mut self, key: &str) -> Option<String> {
        self.children
            .remove(key)
            .and_then(|child| child.args.into_iter().next())
    }
}

fn suffix_regex() -> &'static Regex {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    SUFFIX.get_or_init(|| Regex::new(r"_\d+$").expect("static regex"))
}

/// Remove a trailing `_<digits>` disambiguation suffix.
pub fn strip_suffix(name: &str) -> &str {
    match suffix_regex().find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}
