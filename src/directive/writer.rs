//! Caddyfile rendering.
//!
//! # Grammar
//! ```text
//! <indent><name>[ <arg>...][ {
//! <children at level + 1>
//! <indent>}]
//! ```
//!
//! Indentation is two spaces per level. Children are written in sorted key
//! order at every level.

use std::collections::HashMap;
use std::fmt::Write;

use super::node::DirectiveNode;

/// Placeholder written instead of an empty document.
pub const EMPTY_DOCUMENT: &str = "# Empty caddyfile";

/// Render `directives` at `level` into `out`.
pub fn write_directives(out: &mut String, directives: &HashMap<String, DirectiveNode>, level: usize) {
    let mut keys: Vec<&String> = directives.keys().collect();
    keys.sort();
    for key in keys {
        write_directive(out, &directives[key], level);
    }
}

/// Render a single directive.
pub fn write_directive(out: &mut String, directive: &DirectiveNode, level: usize) {
    if directive.is_transparent() {
        write_directives(out, &directive.children, level);
        return;
    }

    let indent = "  ".repeat(level);
    out.push_str(&indent);
    out.push_str(&directive.name);
    for (i, arg) in directive.args.iter().enumerate() {
        if i > 0 || !directive.name.is_empty() {
            out.push(' ');
        }
        out.push_str(arg);
    }
    if !directive.children.is_empty() {
        out.push_str(" {\n");
        write_directives(out, &directive.children, level + 1);
        let _ = write!(out, "{}}}", indent);
    }
    out.push('\n');
}

/// Render top-level directives into a standalone string.
pub fn render(directives: &HashMap<String, DirectiveNode>) -> String {
    let mut out = String::new();
    write_directives(&mut out, directives, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_nested() {
        let mut map = HashMap::new();
        map.insert(
            "example.com".to_string(),
            DirectiveNode::new("example.com")
                .with_child("proxy", DirectiveNode::new("proxy").with_args(["/", "10.0.0.5:8080"]))
                .with_child(
                    "log",
                    DirectiveNode::new("log")
                        .with_args(["stdout"])
                        .with_child("format", DirectiveNode::new("format").with_args(["json"])),
                ),
        );

        assert_eq!(
            render(&map),
            "example.com {\n  log stdout {\n    format json\n  }\n  proxy / 10.0.0.5:8080\n}\n"
        );
    }

    #[test]
    fn test_sorted_by_key_not_name() {
        let mut map = HashMap::new();
        map.insert(
            "site".to_string(),
            DirectiveNode::new("site")
                .with_child("tls_9", DirectiveNode::new("tls").with_args(["off"]))
                .with_child("tls", DirectiveNode::new("tls").with_args(["internal"]))
                .with_child("gzip", DirectiveNode::new("gzip")),
        );

        assert_eq!(
            render(&map),
            "site {\n  gzip\n  tls internal\n  tls off\n}\n"
        );
    }

    #[test]
    fn test_transparent_root_flattens() {
        let mut map = HashMap::new();
        map.insert(
            String::new(),
            DirectiveNode::default()
                .with_child("b", DirectiveNode::new("b.com"))
                .with_child("a", DirectiveNode::new("a.com")),
        );
        assert_eq!(render(&map), "a.com\nb.com\n");
    }

    #[test]
    fn test_args_without_name() {
        let mut map = HashMap::new();
        map.insert(String::new(), DirectiveNode::default().with_args(["import", "common"]));
        assert_eq!(render(&map), "import common\n");
    }

    #[test]
    fn test_empty_node_renders_nothing() {
        let mut map = HashMap::new();
        map.insert("x".to_string(), DirectiveNode::default());
        assert_eq!(render(&map), "");
    }
}
