//! Document validation and activation.
//!
//! # Responsibilities
//! - `Applier`: the validate / activate seam the controller hands documents to
//! - `CaddyAdminApplier`: drives a running Caddy through its admin API
//! - `MemoryApplier`: structural checks only, for dry runs and tests
//! - `ActiveDocument`: the last document that was accepted, readable lock-free
//! - `process_document`: drops top-level blocks that fail validation on their own

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Errors from validating or activating a document.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The activation target could not be reached.
    #[error("caddy admin request failed: {0}")]
    Transport(String),

    /// The document was refused.
    #[error("document rejected: {0}")]
    Rejected(String),
}

/// Validates documents and makes them the active configuration.
#[async_trait]
pub trait Applier: Send + Sync {
    /// Check a document without activating it.
    async fn validate(&self, document: &[u8]) -> Result<(), ApplyError>;

    /// Activate a document.
    async fn activate(&self, document: &[u8]) -> Result<(), ApplyError>;

    async fn validate_and_activate(&self, document: &[u8]) -> Result<(), ApplyError> {
        self.validate(document).await?;
        self.activate(document).await
    }
}

/// Last accepted document, swapped atomically on every activation.
pub struct ActiveDocument {
    document: ArcSwap<Vec<u8>>,
    version: AtomicU64,
}

impl ActiveDocument {
    pub fn new() -> Self {
        Self {
            document: ArcSwap::from_pointee(Vec::new()),
            version: AtomicU64::new(0),
        }
    }

    /// Number of activations so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn get(&self) -> Arc<Vec<u8>> {
        self.document.load_full()
    }

    pub fn store(&self, document: &[u8]) {
        self.document.store(Arc::new(document.to_vec()));
        self.version.fetch_add(1, Ordering::Release);
    }
}

impl Default for ActiveDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Applier backed by the Caddy admin API.
///
/// Validation uses `POST /adapt`, activation `POST /load`, both with a
/// `text/caddyfile` body.
pub struct CaddyAdminApplier {
    client: reqwest::Client,
    base: Url,
    active: Arc<ActiveDocument>,
}

impl CaddyAdminApplier {
    pub fn new(admin_url: &str, timeout: Duration, active: Arc<ActiveDocument>) -> Result<Self, ApplyError> {
        let base = Url::parse(admin_url).map_err(|e| ApplyError::Transport(format!("invalid admin url {:?}: {}", admin_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApplyError::Transport(e.to_string()))?;
        Ok(Self { client, base, active })
    }

    async fn post(&self, path: &str, document: &[u8]) -> Result<(), ApplyError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ApplyError::Transport(e.to_string()))?;

        let resp = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/caddyfile")
            .body(document.to_vec())
            .send()
            .await
            .map_err(|e| ApplyError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(text);
        if status.is_client_error() {
            Err(ApplyError::Rejected(message))
        } else {
            Err(ApplyError::Transport(format!("status {}: {}", status, message)))
        }
    }
}

#[async_trait]
impl Applier for CaddyAdminApplier {
    async fn validate(&self, document: &[u8]) -> Result<(), ApplyError> {
        self.post("adapt", document).await
    }

    async fn activate(&self, document: &[u8]) -> Result<(), ApplyError> {
        self.post("load", document).await?;
        self.active.store(document);
        Ok(())
    }
}

/// Applier that only checks structure and keeps the document in memory.
#[derive(Default)]
pub struct MemoryApplier {
    active: Arc<ActiveDocument>,
}

impl MemoryApplier {
    pub fn new(active: Arc<ActiveDocument>) -> Self {
        Self { active }
    }
}

#[async_trait]
impl Applier for MemoryApplier {
    async fn validate(&self, document: &[u8]) -> Result<(), ApplyError> {
        check_structure(document)
    }

    async fn activate(&self, document: &[u8]) -> Result<(), ApplyError> {
        self.active.store(document);
        Ok(())
    }
}

/// UTF-8 and balanced braces outside quotes and comments.
pub fn check_structure(document: &[u8]) -> Result<(), ApplyError> {
    let text = std::str::from_utf8(document).map_err(|e| ApplyError::Rejected(e.to_string()))?;
    let mut depth: i64 = 0;
    for (line_no, line) in text.lines().enumerate() {
        for token in Tokens::new(line) {
            match token {
                "{" => depth += 1,
                "}" => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(ApplyError::Rejected(format!("line {}: unexpected '}}'", line_no + 1)));
                    }
                }
                _ => {}
            }
        }
    }
    if depth != 0 {
        return Err(ApplyError::Rejected(format!("{} unclosed block(s)", depth)));
    }
    Ok(())
}

/// Split a document into top-level blocks, validate each on its own and
/// keep the ones that pass. Each dropped block adds an `[ERROR]` line to `log`.
pub async fn process_document(applier: &dyn Applier, document: &[u8], log: &mut String) -> Vec<u8> {
    let text = String::from_utf8_lossy(document);
    let mut out = Vec::with_capacity(document.len());
    for block in split_blocks(&text) {
        match applier.validate(block.as_bytes()).await {
            Ok(()) => out.extend_from_slice(block.as_bytes()),
            Err(e) => {
                let first = block.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
                let _ = writeln!(log, "[ERROR] Removing invalid block {:?}: {}", first, e);
            }
        }
    }
    out
}

/// Top-level blocks in order. Text outside braces at depth 0 belongs to the
/// block that follows it; a trailing remainder is its own block.
pub fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut depth: i64 = 0;

    for line in text.split_inclusive('\n') {
        current.push_str(line);
        for token in Tokens::new(line) {
            match token {
                "{" => depth += 1,
                "}" => depth -= 1,
                _ => {}
            }
        }
        if depth < 0 || (depth == 0 && current.contains('{')) {
            blocks.push(std::mem::take(&mut current));
            depth = 0;
        }
    }
    if !current.trim().is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Brace tokens of one line, skipping quoted text and `#` comments.
struct Tokens<'a> {
    chars: std::str::CharIndices<'a>,
    line: &'a str,
    quoted: bool,
    prev: char,
}

impl<'a> Tokens<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            chars: line.char_indices(),
            line,
            quoted: false,
            prev: ' ',
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        for (i, c) in self.chars.by_ref() {
            let prev = std::mem::replace(&mut self.prev, c);
            match c {
                '"' if prev != '\\' => self.quoted = !self.quoted,
                '#' if !self.quoted && prev.is_whitespace() => return None,
                '{' | '}' if !self.quoted => return Some(&self.line[i..i + 1]),
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_structure() {
        assert!(check_structure(b"a.com {\n  proxy / b:80\n}\n").is_ok());
        assert!(check_structure(b"# only a comment { \n").is_ok());
        assert!(check_structure(b"a.com {\n  respond \"}\"\n}\n").is_ok());
        assert!(check_structure(b"a.com {\n").is_err());
        assert!(check_structure(b"}\n").is_err());
        assert!(check_structure(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_split_blocks() {
        let text = "{\n  debug\n}\n\na.com {\n  proxy / x\n}\nb.com {\n}\ntrailing\n";
        let blocks = split_blocks(text);
        assert_eq!(
            blocks,
            vec![
                "{\n  debug\n}\n",
                "\na.com {\n  proxy / x\n}\n",
                "b.com {\n}\n",
                "trailing\n",
            ]
        );
        assert_eq!(blocks.concat(), text);
    }

    /// Rejects any block mentioning `bad`.
    struct RejectBad;

    #[async_trait]
    impl Applier for RejectBad {
        async fn validate(&self, document: &[u8]) -> Result<(), ApplyError> {
            if String::from_utf8_lossy(document).contains("bad") {
                return Err(ApplyError::Rejected("unknown directive bad".into()));
            }
            Ok(())
        }

        async fn activate(&self, _document: &[u8]) -> Result<(), ApplyError> {
            Ok(())
        }
    }

    #[test]
    fn test_split_blocks_stray_close() {
        assert_eq!(split_blocks("a.com {\n}\n}\nb.com {\n}\n"), vec!["a.com {\n}\n", "}\n", "b.com {\n}\n"]);
    }

    #[tokio::test]
    async fn test_process_document_drops_invalid_blocks() {
        let mut log = String::new();
        let out = process_document(&RejectBad, b"a.com {\n}\nb.com {\n  bad\n}\nc.com {\n}\n", &mut log).await;

        assert_eq!(String::from_utf8(out).unwrap(), "a.com {\n}\nc.com {\n}\n");
        assert_eq!(log, "[ERROR] Removing invalid block \"b.com {\": document rejected: unknown directive bad\n");
    }

    #[tokio::test]
    async fn test_memory_applier_stores_on_success() {
        let active = Arc::new(ActiveDocument::new());
        let applier = MemoryApplier::new(active.clone());

        applier.validate_and_activate(b"a.com {\n}\n").await.unwrap();
        assert_eq!(active.version(), 1);
        assert_eq!(active.get().as_slice(), b"a.com {\n}\n");

        assert!(applier.validate_and_activate(b"a.com {\n").await.is_err());
        assert_eq!(active.version(), 1);
    }
}
