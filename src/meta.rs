//! `?go-get=1` discovery metadata.
//!
//! Hosts that serve Go packages answer `https://{path}?go-get=1` with HTML
//! carrying two kinds of meta tags:
//!
//! - `go-import`: `prefix vcs repo-root` — where the repository lives.
//! - `go-source`: `prefix home dir-template file-template` — how to link to
//!   a directory or file inside it. Only the file template is kept.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use reqwest::Client;
use tokio::sync::Mutex;

use crate::error::AuditResult;

#[derive(Debug, Clone, PartialEq)]
pub struct MetaImport {
    pub prefix: String,
    pub vcs: String,
    pub repo_root: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceMeta {
    pub prefix: String,
    pub file_template: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct GoMeta {
    pub imports: Vec<MetaImport>,
    pub sources: Vec<SourceMeta>,
}

impl GoMeta {
    /// The `go-import` entry with the longest prefix covering `import_path`.
    /// Module-proxy entries (`mod`) name no repository and are skipped.
    pub fn import_for(&self, import_path: &str) -> Option<&MetaImport> {
        self.imports
            .iter()
            .filter(|m| m.vcs != "mod")
            .filter(|m| is_path_prefix(&m.prefix, import_path))
            .max_by_key(|m| m.prefix.len())
    }

    pub fn source_for(&self, import_path: &str) -> Option<&SourceMeta> {
        self.sources
            .iter()
            .filter(|m| is_path_prefix(&m.prefix, import_path))
            .max_by_key(|m| m.prefix.len())
    }
}

impl SourceMeta {
    /// Expand the file template for `file` inside `dir` (relative to the
    /// prefix, `""` for the repository root). `None` when the host publishes
    /// no file template.
    pub fn file_url(&self, dir: &str, file: &str) -> Option<String> {
        let template = self.file_template.trim();
        if template.is_empty() || template == "_" {
            return None;
        }

        // No line number to offer, so drop any `#L{line}` style anchor.
        let template = match template.find('#') {
            Some(idx) if template[idx..].contains("{line}") => &template[..idx],
            _ => template,
        };

        let dir = dir.trim_matches('/');
        let slash_dir = if dir.is_empty() {
            String::new()
        } else {
            format!("/{}", dir)
        };
        let slash_file = if file.is_empty() {
            String::new()
        } else {
            format!("/{}", file)
        };

        Some(
            template
                .replace("{/dir}", &slash_dir)
                .replace("{dir}", dir)
                .replace("{/file}", &slash_file)
                .replace("{file}", file),
        )
    }
}

/// `prefix` equals `path` or names one of its ancestor directories.
pub fn is_path_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Extract every `go-import` and `go-source` tag from an HTML body.
pub fn parse_meta_go(body: &str) -> AuditResult<GoMeta> {
    let tag_re = Regex::new(r"(?is)<meta\s[^>]*>")?;
    let attr_re = Regex::new(r#"(?is)\b(name|content)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?;

    let mut meta = GoMeta::default();

    for tag in tag_re.find_iter(body) {
        let mut name = None;
        let mut content = None;
        for caps in attr_re.captures_iter(tag.as_str()) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string());
            match caps[1].to_ascii_lowercase().as_str() {
                "name" => name = value,
                "content" => content = value,
                _ => {}
            }
        }

        let (Some(name), Some(content)) = (name, content) else {
            continue;
        };
        let fields: Vec<&str> = content.split_whitespace().collect();

        match name.as_str() {
            "go-import" if fields.len() == 3 => meta.imports.push(MetaImport {
                prefix: fields[0].to_string(),
                vcs: fields[1].to_string(),
                repo_root: fields[2].to_string(),
            }),
            "go-source" if fields.len() == 4 => meta.sources.push(SourceMeta {
                prefix: fields[0].to_string(),
                file_template: fields[3].to_string(),
            }),
            _ => {}
        }
    }

    Ok(meta)
}

/// Fetch and parse `https://{import_path}?go-get=1`.
pub async fn fetch_go_meta(client: &Client, import_path: &str) -> AuditResult<GoMeta> {
    let url = format!("https://{}?go-get=1", import_path);
    tracing::debug!(%url, "fetching go-get metadata");

    let body = client
        .get(&url)
        .header("User-Agent", "supplychain-audit/0.1.0")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    parse_meta_go(&body)
}

/// Per-run cache of `?go-get=1` pages keyed by import path. Repository
/// resolution and link discovery ask for the same page; it is fetched once.
/// Failures are not cached.
pub struct MetaCache {
    client: Client,
    pages: Mutex<HashMap<String, Arc<GoMeta>>>,
}

impl MetaCache {
    pub fn new(client: Client) -> Self {
        MetaCache {
            client,
            pages: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, import_path: &str) -> AuditResult<Arc<GoMeta>> {
        let cached = self.pages.lock().await.get(import_path).cloned();
        if let Some(meta) = cached {
            tracing::trace!(import_path, "go-get metadata cache hit");
            return Ok(meta);
        }

        let meta = Arc::new(fetch_go_meta(&self.client, import_path).await?);
        self.pages
            .lock()
            .await
            .insert(import_path.to_string(), meta.clone());
        Ok(meta)
    }

    #[cfg(test)]
    pub async fn insert(&self, import_path: &str, meta: GoMeta) {
        self.pages
            .lock()
            .await
            .insert(import_path.to_string(), Arc::new(meta));
    }
}
