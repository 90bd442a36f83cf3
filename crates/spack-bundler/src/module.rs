//! Module content and its deferred (lazy) form.

use std::borrow::Cow;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::adapter::Directive;

/// Raw or spliced content of a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    /// UTF-8 text (markup, script, style, data).
    Text(String),
    /// Binary asset bytes (images, audio).
    Binary(Vec<u8>),
}

impl Content {
    /// View the content as text, replacing invalid UTF-8 sequences.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// View the content as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// Resolved module: content plus the newest modification time observed
/// across the module and everything spliced into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleData {
    pub content: Content,
    pub mtime: SystemTime,
}

/// A directive paired with the resolved path of the module it references.
#[derive(Debug)]
pub(crate) struct Splice {
    pub directive: Directive,
    pub target: PathBuf,
}

/// Output of the eager scan phase.
#[derive(Debug)]
pub(crate) enum Pending {
    /// No directives: the raw content is the final result.
    Ready(ModuleData),
    /// Content that must be assembled once every splice target is resolved.
    Spliced {
        source: String,
        mtime: SystemTime,
        splices: Vec<Splice>,
    },
}

/// Resolution state of a loaded module.
///
/// Modules enter the map as `Loaded` after their eager scan; `Resolving`
/// marks an in-flight lazy computation and is how cycles are detected.
#[derive(Debug)]
pub(crate) enum ModuleState {
    Loaded(Pending),
    Resolving,
    Resolved(std::sync::Arc<ModuleData>),
}
