//! Hosts-file store.
//!
//! The daemon owns a delimited block inside a shared hosts-file:
//!
//! ```text
//! 127.0.0.1       localhost
//!
//! # === DOCKER CONTAINERS START ===
//! 172.17.0.2      web.docker
//! 172.17.0.3      db.docker
//! # === DOCKER CONTAINERS END ===
//! ```
//!
//! Only lines carrying a hostname under the configured domain suffix are
//! ever added or removed.  Comment and blank lines pass through verbatim.
//! Every mutation re-reads the whole file, filters it and writes it back
//! in one piece; nothing is cached between calls.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::fs;

use crate::error::HostsError;
use crate::types::HostEntry;

pub const BLOCK_START: &str = "# === DOCKER CONTAINERS START ===";
pub const BLOCK_END: &str = "# === DOCKER CONTAINERS END ===";

#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
    domain: String,
}

impl HostsFile {
    pub fn new(path: impl Into<PathBuf>, domain: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            domain: domain.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Removes the entry for `hostname`, or every entry under the domain
    /// suffix when `hostname` is `None`.
    ///
    /// Returns the number of lines dropped.  The file is left untouched
    /// when nothing matches.
    pub async fn remove_host(&self, hostname: Option<&str>) -> Result<usize, HostsError> {
        let mut doc = self.read().await?;
        let removed = self.drop_entries(&mut doc, hostname);
        if removed > 0 {
            self.write(&doc).await?;
            debug!(
                "Removed {} line(s) for {} from {}",
                removed,
                hostname.unwrap_or("all hosts"),
                self.path.display()
            );
        }
        Ok(removed)
    }

    /// Adds an entry for `hostname` at `ip`.
    ///
    /// The line is inserted just before the block's END marker when one
    /// exists, otherwise appended.  No deduplication happens here.
    pub async fn add_host(&self, hostname: &str, ip: &str) -> Result<HostEntry, HostsError> {
        let entry = self.entry(hostname, ip)?;
        let mut doc = self.read().await?;
        doc.insert_entry(&entry);
        self.write(&doc).await?;
        Ok(entry)
    }

    /// Drops any existing entry for `hostname` and adds the new one, in a
    /// single rewrite.  Returns the entry and the number of lines replaced.
    pub async fn replace_host(
        &self,
        hostname: &str,
        ip: &str,
    ) -> Result<(HostEntry, usize), HostsError> {
        let entry = self.entry(hostname, ip)?;
        let mut doc = self.read().await?;
        let replaced = self.drop_entries(&mut doc, Some(hostname));
        doc.insert_entry(&entry);
        self.write(&doc).await?;
        Ok((entry, replaced))
    }

    /// Makes sure the START/END marker pair is present, appending whichever
    /// is missing.  Returns `true` if the file was changed.
    pub async fn ensure_markers(&self) -> Result<bool, HostsError> {
        let mut doc = self.read().await?;
        let has_start = doc.lines.iter().any(|l| is_marker(l, BLOCK_START));
        let has_end = doc.lines.iter().any(|l| is_marker(l, BLOCK_END));

        if has_start && has_end {
            return Ok(false);
        }

        if !has_start {
            // A stray END without START would sit above the new block.
            doc.lines.retain(|l| !is_marker(l, BLOCK_END));
            if doc.lines.last().is_some_and(|l| !l.trim().is_empty()) {
                doc.push("");
            }
            doc.push(BLOCK_START);
        }
        doc.push(BLOCK_END);

        self.write(&doc).await?;
        info!("Initialized managed block in {}", self.path.display());
        Ok(true)
    }

    /// Entries under the domain suffix currently present in the file.
    pub async fn entries(&self) -> Result<Vec<HostEntry>, HostsError> {
        let suffix = format!(".{}", self.domain);
        let doc = self.read().await?;
        Ok(doc
            .lines
            .iter()
            .filter(|line| !is_passthrough(line))
            .filter_map(|line| {
                let ip = line.split_whitespace().next()?;
                let hostname = host_fields(line).find(|f| f.ends_with(&suffix))?;
                Some(HostEntry {
                    ip: ip.to_string(),
                    hostname: hostname.to_string(),
                })
            })
            .collect())
    }

    fn entry(&self, hostname: &str, ip: &str) -> Result<HostEntry, HostsError> {
        let name = hostname.trim();
        let addr = ip.trim();
        if name.is_empty() || addr.is_empty() || name.contains(char::is_whitespace) {
            return Err(HostsError::Validation {
                hostname: hostname.to_string(),
                ip: ip.to_string(),
            });
        }
        Ok(HostEntry::new(name, addr, &self.domain))
    }

    fn drop_entries(&self, doc: &mut Document, hostname: Option<&str>) -> usize {
        let target = hostname.map(|name| format!("{}.{}", name.trim(), self.domain));
        let suffix = format!(".{}", self.domain);

        let before = doc.lines.len();
        doc.lines.retain(|line| {
            if is_passthrough(line) {
                return true;
            }
            let matched = match &target {
                Some(fqdn) => host_fields(line).any(|field| field == fqdn),
                None => host_fields(line).any(|field| field.ends_with(&suffix)),
            };
            !matched
        });
        before - doc.lines.len()
    }

    async fn read(&self) -> Result<Document, HostsError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Document::parse(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::parse("")),
            Err(e) => Err(HostsError::io(&self.path, e)),
        }
    }

    /// Writes the whole file: temp file plus rename, falling back to an
    /// in-place rewrite where rename is refused (bind-mounted /etc/hosts).
    /// A symlinked path is resolved first so the link survives.
    async fn write(&self, doc: &Document) -> Result<(), HostsError> {
        let content = doc.render();
        let target = self.resolve_target().await;
        let tmp = temp_path(&target);

        match replace_via(&target, &tmp, &content).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(
                    "Atomic replace of {} failed ({}), rewriting in place",
                    target.display(),
                    e
                );
                let _ = fs::remove_file(&tmp).await;
                fs::write(&target, content)
                    .await
                    .map_err(|e| HostsError::io(&self.path, e))
            }
        }
    }

    async fn resolve_target(&self) -> PathBuf {
        if let Ok(real) = fs::canonicalize(&self.path).await {
            return real;
        }
        // Dangling link: write where it points, not over it.
        match (fs::read_link(&self.path).await, self.path.parent()) {
            (Ok(dest), Some(dir)) if dest.is_relative() => dir.join(dest),
            (Ok(dest), _) => dest,
            (Err(_), _) => self.path.clone(),
        }
    }
}

/// File content split into lines that keep their own terminators, so
/// untouched lines are written back byte for byte.
struct Document {
    lines: Vec<String>,
    eol: &'static str,
}

impl Document {
    fn parse(content: &str) -> Self {
        Self {
            lines: content.split_inclusive('\n').map(str::to_string).collect(),
            eol: if content.contains("\r\n") { "\r\n" } else { "\n" },
        }
    }

    fn push(&mut self, line: &str) {
        self.terminate_last();
        self.lines.push(format!("{}{}", line, self.eol));
    }

    fn insert_entry(&mut self, entry: &HostEntry) {
        match self.lines.iter().rposition(|line| is_marker(line, BLOCK_END)) {
            Some(pos) => {
                let line = format!("{}{}", entry, self.eol);
                self.lines.insert(pos, line);
            }
            None => self.push(&entry.to_string()),
        }
    }

    fn terminate_last(&mut self) {
        if let Some(last) = self.lines.last_mut() {
            if !last.ends_with('\n') {
                last.push_str(self.eol);
            }
        }
    }

    fn render(&self) -> String {
        self.lines.concat()
    }
}

fn is_passthrough(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn is_marker(line: &str, marker: &str) -> bool {
    line.trim_start().starts_with(marker)
}

/// Hostname fields of a data line: everything after the address, up to an
/// inline comment.
fn host_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split_whitespace()
        .skip(1)
        .take_while(|field| !field.starts_with('#'))
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "hosts".to_string());
    target.with_file_name(format!(".{}.dockerdns.tmp", name))
}

async fn replace_via(target: &Path, tmp: &Path, content: &str) -> std::io::Result<()> {
    fs::write(tmp, content).await?;
    if let Ok(meta) = fs::metadata(target).await {
        fs::set_permissions(tmp, meta.permissions()).await?;
    }
    fs::rename(tmp, target).await
}
