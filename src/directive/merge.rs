//! Merging directive trees from independent resources.
//!
//! # Collision Rules
//! For each child key of `b` that already exists in `a`:
//! 1. Both are `proxy` directives for the same source path: `b`'s backends
//!    are appended to `a`'s (one route, more upstreams).
//! 2. Both have the same arguments: duplicate definition, `a` wins.
//! 3. Anything else: `b`'s child is kept as a sibling under a fresh
//!    `<key>_<suffix>` key.
//!
//! Grandchildren are never merged individually; they travel with whichever
//! child they belong to.

use super::node::{strip_suffix, DirectiveMap, DirectiveNode};
use super::suffix::SuffixGenerator;

/// Fold `b` into `a`. A missing side yields the other one unchanged.
pub fn merge_directives(
    a: Option<DirectiveNode>,
    b: Option<DirectiveNode>,
    suffixes: &mut SuffixGenerator,
) -> Option<DirectiveNode> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(mut a), Some(b)) => {
            merge_into(&mut a, b, suffixes);
            Some(a)
        }
    }
}

/// Fold `b`'s children into `a` in place.
pub fn merge_into(a: &mut DirectiveNode, b: DirectiveNode, suffixes: &mut SuffixGenerator) {
    let mut incoming: Vec<(String, DirectiveNode)> = b.children.into_iter().collect();
    incoming.sort_by(|x, y| x.0.cmp(&y.0));

    for (key, child_b) in incoming {
        let key = match a.children.get_mut(&key) {
            None => key,
            Some(child_a) => {
                if is_same_route(child_a, &child_b) {
                    accumulate_backends(child_a, child_b);
                    continue;
                }
                if child_a.args == child_b.args {
                    continue;
                }
                unique_key(&a.children, &key, suffixes)
            }
        };
        a.children.insert(key, child_b);
    }
}

/// Merge a whole resource's top-level map into the accumulated one.
pub fn merge_map(target: &mut DirectiveMap, incoming: DirectiveMap, suffixes: &mut SuffixGenerator) {
    let mut incoming: Vec<(String, DirectiveNode)> = incoming.into_iter().collect();
    incoming.sort_by(|x, y| x.0.cmp(&y.0));

    for (key, node) in incoming {
        let merged = merge_directives(target.remove(&key), Some(node), suffixes);
        if let Some(merged) = merged {
            target.insert(key, merged);
        }
    }
}

fn is_same_route(a: &DirectiveNode, b: &DirectiveNode) -> bool {
    a.name == "proxy"
        && b.name == "proxy"
        && matches!((a.first_arg(), b.first_arg()), (Some(x), Some(y)) if x == y)
}

/// Append the backends of `b` that `a` does not already proxy to.
fn accumulate_backends(a: &mut DirectiveNode, b: DirectiveNode) {
    for backend in b.args.into_iter().skip(1) {
        if !a.args[1..].contains(&backend) {
            a.args.push(backend);
        }
    }
}

fn unique_key(
    existing: &std::collections::HashMap<String, DirectiveNode>,
    key: &str,
    suffixes: &mut SuffixGenerator,
) -> String {
    let base = strip_suffix(key);
    loop {
        let candidate = format!("{}_{}", base, suffixes.next_suffix());
        if !existing.contains_key(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::SuffixSource;

    fn site(children: Vec<(&str, DirectiveNode)>) -> DirectiveNode {
        children
            .into_iter()
            .fold(DirectiveNode::new("site.com"), |node, (k, c)| node.with_child(k, c))
    }

    fn seeded() -> SuffixGenerator {
        SuffixGenerator::new(SuffixSource::Seeded(1))
    }

    #[test]
    fn test_merge_with_missing_side() {
        let mut suffixes = seeded();
        let a = site(vec![("gzip", DirectiveNode::new("gzip"))]);

        let merged = merge_directives(Some(a.clone()), None, &mut suffixes);
        assert_eq!(merged, Some(a.clone()));

        let merged = merge_directives(None, Some(a.clone()), &mut suffixes);
        assert_eq!(merged, Some(a));

        assert_eq!(merge_directives(None, None, &mut suffixes), None);
    }

    #[test]
    fn test_proxy_accumulation() {
        let mut suffixes = seeded();
        let a = site(vec![(
            "proxy",
            DirectiveNode::new("proxy").with_args(["/", "10.0.0.1:80"]),
        )]);
        let b = site(vec![(
            "proxy",
            DirectiveNode::new("proxy").with_args(["/", "10.0.0.2:80", "10.0.0.1:80"]),
        )]);

        let merged = merge_directives(Some(a), Some(b), &mut suffixes).unwrap();
        assert_eq!(merged.children.len(), 1);
        assert_eq!(
            merged.children["proxy"].args,
            vec!["/", "10.0.0.1:80", "10.0.0.2:80"]
        );
    }

    #[test]
    fn test_proxy_different_paths_conflict() {
        let mut suffixes = seeded();
        let a = site(vec![("proxy", DirectiveNode::new("proxy").with_args(["/api", "a:80"]))]);
        let b = site(vec![("proxy", DirectiveNode::new("proxy").with_args(["/web", "b:80"]))]);

        let merged = merge_directives(Some(a), Some(b), &mut suffixes).unwrap();
        assert_eq!(merged.children.len(), 2);
        assert_eq!(merged.children["proxy"].args, vec!["/api", "a:80"]);
        let (key, other) = merged
            .children
            .iter()
            .find(|(k, _)| k.as_str() != "proxy")
            .unwrap();
        assert!(key.starts_with("proxy_"));
        assert_eq!(other.name, "proxy");
        assert_eq!(other.args, vec!["/web", "b:80"]);
    }

    #[test]
    fn test_identical_duplicate_is_dropped() {
        let mut suffixes = seeded();
        let a = site(vec![("tls", DirectiveNode::new("tls").with_args(["off"]))]);
        let b = site(vec![(
            "tls",
            DirectiveNode::new("tls")
                .with_args(["off"])
                .with_child("protocols", DirectiveNode::new("protocols")),
        )]);

        let merged = merge_directives(Some(a.clone()), Some(b), &mut suffixes).unwrap();
        assert_eq!(merged, a);
    }

    #[test]
    fn test_conflict_keeps_original_and_adds_sibling() {
        let mut suffixes = seeded();
        let a = site(vec![("tls_3", DirectiveNode::new("tls").with_args(["internal"]))]);
        let b = site(vec![("tls_3", DirectiveNode::new("tls").with_args(["off"]))]);

        let merged = merge_directives(Some(a), Some(b), &mut suffixes).unwrap();
        assert_eq!(merged.children.len(), 2);
        assert_eq!(merged.children["tls_3"].args, vec!["internal"]);

        let renamed: Vec<&String> = merged.children.keys().filter(|k| *k != "tls_3").collect();
        let key = renamed[0];
        let suffix = key.strip_prefix("tls_").unwrap();
        assert!(suffix.parse::<u64>().is_ok());
        assert_eq!(merged.children[key].args, vec!["off"]);
    }

    #[test]
    fn test_no_recursion_below_conflict() {
        let mut suffixes = seeded();
        let a = site(vec![(
            "log",
            DirectiveNode::new("log")
                .with_args(["stdout"])
                .with_child("format", DirectiveNode::new("format").with_args(["json"])),
        )]);
        let b = site(vec![(
            "log",
            DirectiveNode::new("log")
                .with_args(["stderr"])
                .with_child("format", DirectiveNode::new("format").with_args(["console"])),
        )]);

        let merged = merge_directives(Some(a), Some(b), &mut suffixes).unwrap();
        assert_eq!(merged.children["log"].children["format"].args, vec!["json"]);
        let other = merged.children.iter().find(|(k, _)| *k != "log").unwrap().1;
        assert_eq!(other.children["format"].args, vec!["console"]);
    }

    #[test]
    fn test_merge_map_folds_by_site() {
        let mut suffixes = seeded();
        let mut target = DirectiveMap::new();
        let mut first = DirectiveMap::new();
        first.insert(
            "a.com".into(),
            DirectiveNode::new("a.com").with_child("gzip", DirectiveNode::new("gzip")),
        );
        let mut second = DirectiveMap::new();
        second.insert(
            "a.com".into(),
            DirectiveNode::new("a.com").with_child("tls", DirectiveNode::new("tls").with_args(["off"])),
        );
        second.insert("b.com".into(), DirectiveNode::new("b.com"));

        merge_map(&mut target, first, &mut suffixes);
        merge_map(&mut target, second, &mut suffixes);

        assert_eq!(target.len(), 2);
        assert_eq!(target["a.com"].children.len(), 2);
    }
}
