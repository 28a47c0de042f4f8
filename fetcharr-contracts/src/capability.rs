use std::fmt;

/// String keys identifying a capability in the registry. Kept as an enum
/// over raw strings so the registry and the state machine can't typo a key,
/// while `as_str`/`FromStr` still give the parameterized string form the
/// requirements doc's open question asks for (over the alternative of
/// hardcoding distinct Rust types per emitting service).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKey {
    TraktIndexer,
    Scraping,
    Downloader,
    Symlinker,
    Updater,
    PostProcessing,
}

impl CapabilityKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKey::TraktIndexer => "TraktIndexer",
            CapabilityKey::Scraping => "Scraping",
            CapabilityKey::Downloader => "Downloader",
            CapabilityKey::Symlinker => "Symlinker",
            CapabilityKey::Updater => "Updater",
            CapabilityKey::PostProcessing => "PostProcessing",
        }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CapabilityKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TraktIndexer" => Ok(CapabilityKey::TraktIndexer),
            "Scraping" => Ok(CapabilityKey::Scraping),
            "Downloader" => Ok(CapabilityKey::Downloader),
            "Symlinker" => Ok(CapabilityKey::Symlinker),
            "Updater" => Ok(CapabilityKey::Updater),
            "PostProcessing" => Ok(CapabilityKey::PostProcessing),
            other => Err(format!("unrecognized capability key: {other}")),
        }
    }
}

/// Names an emitting service that can start an item through the pipeline.
/// `started_by` is threaded through the workflow as a plain string
/// (per the requirements doc's parameterized two-argument start
/// signature), but every producer in this codebase constructs it from one
/// of these variants so the set stays closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmitterKind {
    Overseerr,
    PlexWatchlist,
    Listrr,
    Mdblist,
    SymlinkLibrary,
    TraktContent,
    RetryLibrary,
}

impl EmitterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmitterKind::Overseerr => "Overseerr",
            EmitterKind::PlexWatchlist => "PlexWatchlist",
            EmitterKind::Listrr => "Listrr",
            EmitterKind::Mdblist => "Mdblist",
            EmitterKind::SymlinkLibrary => "SymlinkLibrary",
            EmitterKind::TraktContent => "TraktContent",
            EmitterKind::RetryLibrary => "RetryLibrary",
        }
    }

    /// Whether this emitter is in the "source set" from §4.2: submissions
    /// from these always force a `TraktIndexer` pass, regardless of the
    /// incoming item's current state. `RetryLibrary` (the sweeper) is
    /// deliberately excluded — it only forces a re-index when the item's
    /// own state is `Requested`/`Unknown`, same as any other resubmission.
    pub fn is_source_emitter(&self) -> bool {
        !matches!(self, EmitterKind::RetryLibrary)
    }
}

impl fmt::Display for EmitterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What triggered the current pass through `transition`: either one of the
/// §4.2 source emitters (a fresh external request, forcing a full
/// re-index) or the capability the *previous* pass in the same workflow run
/// invoked. The original's `process_event` reassigns `started_by` to
/// `next_service` after every step it drives; `EmitterKind` alone can't
/// carry that because a capability isn't a request source, so the engine
/// threads this instead — without it a source-emitted item never leaves the
/// top-level `TraktIndexer` branch and the run stalls at `Indexed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionEmitter {
    Source(EmitterKind),
    Capability(CapabilityKey),
}

impl TransitionEmitter {
    /// Mirrors `EmitterKind::is_source_emitter`, but only a `Source` value
    /// can ever qualify — a capability-originated pass always falls through
    /// to the ordinary state-keyed branches in §4.2.
    pub fn is_source_emitter(&self) -> bool {
        matches!(self, TransitionEmitter::Source(kind) if kind.is_source_emitter())
    }
}

impl From<EmitterKind> for TransitionEmitter {
    fn from(kind: EmitterKind) -> Self {
        TransitionEmitter::Source(kind)
    }
}

impl From<CapabilityKey> for TransitionEmitter {
    fn from(key: CapabilityKey) -> Self {
        TransitionEmitter::Capability(key)
    }
}

impl fmt::Display for TransitionEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionEmitter::Source(kind) => write!(f, "{kind}"),
            TransitionEmitter::Capability(key) => write!(f, "{key}"),
        }
    }
}
