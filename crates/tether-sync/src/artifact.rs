//! The context artifact the host reads before each prompt.
//!
//! The file is rebuilt in full every cycle and replaced atomically, so a
//! reader never sees a half-written document.

use std::io::Write;
use std::path::Path;

use tether_types::{MemoryContextResponse, Section, Timestamp, now};

use crate::enhance::EnhancedContext;
use crate::error::{Result, SyncError};

/// Shown under "Key facts" when the store returned no free text.
pub const NO_MEMORIES_PLACEHOLDER: &str = "No stored memories yet.";

const INSTRUCTIONS: &str = "\
- Treat this file as background knowledge about the user and this workspace.
- Prefer approaches listed under Proven Solutions; do not repeat Known Issues.
- Do not quote this file back verbatim or mention that it exists.
- If it contradicts the current request, the request wins.";

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Context {
        enhanced: EnhancedContext,
        context_text: String,
    },
    Notice(String),
}

/// A fully rendered-in-memory context document.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextArtifact {
    updated_at: Timestamp,
    memories: u64,
    body: Body,
}

impl ContextArtifact {
    /// Enhance a store response into an artifact.
    pub fn from_response(response: &MemoryContextResponse) -> Self {
        Self {
            updated_at: now(),
            memories: response.stats.memories,
            body: Body::Context {
                enhanced: EnhancedContext::from_response(response),
                context_text: response.context_text.trim().to_string(),
            },
        }
    }

    /// Placeholder written when the interaction was stored but reading it
    /// back failed.
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::notice(format!("Memory not yet available: {}", reason))
    }

    /// Placeholder written when the interaction could not be stored.
    pub fn sync_failed(reason: impl std::fmt::Display) -> Self {
        Self::notice(format!("Memory sync failed: {}", reason))
    }

    fn notice(text: String) -> Self {
        Self {
            updated_at: now(),
            memories: 0,
            body: Body::Notice(text),
        }
    }

    pub fn memories(&self) -> u64 {
        self.memories
    }

    /// Whether this is a placeholder rather than real context.
    pub fn is_degraded(&self) -> bool {
        matches!(self.body, Body::Notice(_))
    }

    /// Render the markdown document.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# Memory Context\n");
        out.push_str(&format!("_Updated: {}_  \n", self.updated_at.to_rfc3339()));
        out.push_str(&format!("Memories found: {}\n\n", self.memories));

        let (guidance, facts) = match &self.body {
            Body::Context {
                enhanced,
                context_text,
            } => {
                for section in &enhanced.sections {
                    render_section(&mut out, section);
                }
                (enhanced.guidance.as_str(), context_text.as_str())
            }
            Body::Notice(text) => {
                out.push_str(text);
                out.push_str("\n\n");
                ("", "")
            }
        };

        out.push_str("## Guidance\n");
        if !guidance.is_empty() {
            out.push_str(guidance.trim_end());
            out.push('\n');
        }
        out.push('\n');

        out.push_str("## Key facts\n");
        out.push_str(if facts.is_empty() {
            NO_MEMORIES_PLACEHOLDER
        } else {
            facts
        });
        out.push_str("\n\n");

        out.push_str("## Instructions\n");
        out.push_str(INSTRUCTIONS);
        out.push('\n');
        out
    }

    /// Render and atomically replace the file at `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.render())
    }
}

fn render_section(out: &mut String, section: &Section) {
    out.push_str(&format!("## {}\n", section.title.trim()));
    for item in &section.items {
        out.push_str(&format!("- **{}**: {}\n", item.label, item.values.join("; ")));
    }
    out.push('\n');
}

/// Write `contents` to `path` through a sibling temp file and a rename.
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let io_err = |source| SyncError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    let result = std::fs::File::create(&tmp)
        .and_then(|mut f| {
            f.write_all(contents.as_bytes())?;
            f.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp, path));

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result.map_err(io_err)
}
