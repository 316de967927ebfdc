//! Label → directive conversion.
//!
//! # Label Grammar
//! ```text
//! <prefix>(_<N>)?(.<segment>(_<N>)?)* = <value>
//! ```
//! Each dot-separated segment becomes a nested directive; `_<N>` suffixes
//! keep otherwise identical siblings apart and are dropped when rendering.
//! Values are template-substituted, then split on whitespace into arguments.
//!
//! # Proxy Synthesis
//! A group with an `address` leaf becomes a site block named after the
//! address. Unless the group already has a `proxy` with arguments, one is
//! generated from `sourcepath`, `targetprotocol`, `targetport`, `targetpath`
//! and the resource's resolved backend addresses.

use std::future::Future;

use regex::Regex;
use serde_json::Value;

use super::template::TemplateRenderer;
use crate::directive::{merge_directives, DirectiveMap, DirectiveNode, SuffixGenerator};
use crate::discovery::LabelSet;

/// Default label prefix.
pub const DEFAULT_LABEL_PREFIX: &str = "caddy";

const ADDRESS: &str = "address";
const SOURCE_PATH: &str = "sourcepath";
const TARGET_PORT: &str = "targetport";
const TARGET_PATH: &str = "targetpath";
const TARGET_PROTOCOL: &str = "targetprotocol";
const PROXY: &str = "proxy";

/// Converts a resource's labels into site directives.
#[derive(Debug)]
pub struct LabelParser {
    prefix: String,
    pattern: Regex,
    templates: TemplateRenderer,
}

impl LabelParser {
    pub fn new(prefix: &str) -> Self {
        let pattern = Regex::new(&format!(r"^{}(_\d+)?(\.|$)", regex::escape(prefix)))
            .expect("escaped prefix is a valid pattern");
        Self {
            prefix: prefix.to_string(),
            pattern,
            templates: TemplateRenderer::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether a label key belongs to this parser.
    pub fn matches(&self, key: &str) -> bool {
        self.pattern.is_match(key)
    }

    /// Build the raw directive tree from matching labels, keyed by the
    /// (suffixed) prefix segment.
    pub fn convert_labels(&self, labels: &LabelSet, context: &Value) -> DirectiveMap {
        let mut map = DirectiveMap::new();
        for (key, value) in labels.iter().filter(|(k, _)| self.matches(k)) {
            let node = DirectiveNode::get_or_create(&mut map, key, true);
            let text = self.templates.render(value, context);
            node.args = split_args(&text);
        }
        map
    }

    /// Parse labels into site directives keyed by site name.
    ///
    /// `resolve` is called at most once, and only if some group needs a
    /// generated `proxy`. Its error aborts the whole resource.
    pub async fn parse<F, Fut, E>(
        &self,
        labels: &LabelSet,
        context: &Value,
        suffixes: &mut SuffixGenerator,
        mut resolve: F,
    ) -> Result<DirectiveMap, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<String>, E>>,
    {
        let mut groups: Vec<(String, DirectiveNode)> =
            self.convert_labels(labels, context).into_iter().collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        let mut targets: Option<Vec<String>> = None;
        let mut sites = DirectiveMap::new();

        for (_, mut directive) in groups {
            let source_path = directive.take_first_arg(SOURCE_PATH);
            let target = TargetFormat {
                protocol: directive.take_first_arg(TARGET_PROTOCOL),
                port: directive.take_first_arg(TARGET_PORT),
                path: directive.take_first_arg(TARGET_PATH),
            };
            let address = directive
                .children
                .remove(ADDRESS)
                .map(|a| a.args)
                .filter(|args| !args.is_empty());

            if let Some(address) = address {
                directive.args = address;

                let proxy = directive
                    .children
                    .entry(PROXY.to_string())
                    .or_insert_with(|| DirectiveNode::new(PROXY));

                if proxy.args.is_empty() {
                    if targets.is_none() {
                        targets = Some(resolve().await?);
                    }
                    let backends = targets.as_deref().unwrap_or_default();
                    proxy.add_args([source_path.unwrap_or_else(|| "/".to_string())]);
                    proxy.add_args(backends.iter().map(|b| target.format(b)));
                }
            }

            directive.name = directive.args.join(" ");
            directive.args.clear();

            let name = directive.name.clone();
            if let Some(merged) = merge_directives(sites.remove(&name), Some(directive), suffixes) {
                sites.insert(name, merged);
            }
        }

        Ok(sites)
    }
}

impl Default for LabelParser {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_PREFIX)
    }
}

struct TargetFormat {
    protocol: Option<String>,
    port: Option<String>,
    path: Option<String>,
}

impl TargetFormat {
    fn format(&self, backend: &str) -> String {
        let mut arg = String::new();
        if let Some(protocol) = &self.protocol {
            arg.push_str(protocol);
            arg.push_str("://");
        }
        arg.push_str(backend);
        if let Some(port) = &self.port {
            arg.push(':');
            arg.push_str(port);
        }
        if let Some(path) = &self.path {
            arg.push_str(path);
        }
        arg
    }
}

/// Split on whitespace runs. Blank text yields no arguments.
pub fn split_args(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
