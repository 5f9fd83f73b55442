//! Per-file encode strategy chain
//!
//! Up to three tiers run in fixed order and the first success wins:
//!
//! 1. **library**: media library, platform codec, full tuning
//! 2. **library-minimal**: media library, H.264 with no rate/profile tuning
//! 3. **direct**: ffmpeg subprocess with explicit arguments
//!
//! A failed tier is never retried. A tier that claims success without leaving
//! a non-empty output file fails the job outright instead of falling through.

pub mod direct;
pub mod library;

use crate::events::{BatchEvent, EventSink};
use crate::media::MediaLibrary;
use crate::settings::ConversionSettings;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub use direct::DirectTier;
pub use library::LibraryTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierKind {
    Library,
    LibraryMinimal,
    Direct,
}

impl TierKind {
    pub fn number(self) -> u8 {
        match self {
            TierKind::Library => 1,
            TierKind::LibraryMinimal => 2,
            TierKind::Direct => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TierKind::Library => "library",
            TierKind::LibraryMinimal => "library-minimal",
            TierKind::Direct => "direct",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {} ({})", self.number(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{tier} failed: {detail}")]
pub struct TierFailure {
    pub tier: TierKind,
    pub detail: String,
}

impl TierFailure {
    pub fn new(tier: TierKind, detail: impl Into<String>) -> Self {
        Self {
            tier,
            detail: detail.into(),
        }
    }
}

/// What one tier needs to encode one file.
#[derive(Debug, Clone, Copy)]
pub struct TierContext<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub settings: &'a ConversionSettings,
}

pub trait EncodeTier: Send + Sync {
    fn kind(&self) -> TierKind;
    fn attempt(&self, ctx: &TierContext<'_>) -> Result<(), TierFailure>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    Succeeded {
        tier: TierKind,
        output: PathBuf,
        output_bytes: u64,
        /// Tiers that failed before the winning one
        fallbacks: Vec<TierFailure>,
    },
    Failed {
        reason: String,
        failures: Vec<TierFailure>,
    },
}

impl ChainOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ChainOutcome::Succeeded { .. })
    }
}

pub struct EncodeStrategyChain {
    tiers: Vec<Box<dyn EncodeTier>>,
}

impl EncodeStrategyChain {
    pub fn new(tiers: Vec<Box<dyn EncodeTier>>) -> Self {
        Self { tiers }
    }

    /// library → library-minimal → direct.
    pub fn standard(library: Arc<dyn MediaLibrary>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self::new(vec![
            Box::new(LibraryTier::primary(Arc::clone(&library))),
            Box::new(LibraryTier::minimal(library)),
            Box::new(DirectTier::new(ffmpeg)),
        ])
    }

    pub fn tiers(&self) -> impl Iterator<Item = TierKind> + '_ {
        self.tiers.iter().map(|t| t.kind())
    }

    pub fn run(&self, ctx: &TierContext<'_>, job: usize, sink: &dyn EventSink) -> ChainOutcome {
        let mut failures = Vec::new();

        for tier in &self.tiers {
            let kind = tier.kind();
            sink.emit(BatchEvent::TierStarted { job, tier: kind });
            info!(tier = %kind, input = %ctx.input.display(), "▶️  attempting");

            match tier.attempt(ctx) {
                Ok(()) => return verify_output(kind, ctx.output, failures),
                Err(failure) => {
                    warn!(tier = %kind, error = %failure.detail, "⚠️  tier failed, falling back");
                    sink.emit(BatchEvent::TierFallback {
                        job,
                        tier: kind,
                        reason: failure.detail.clone(),
                    });
                    failures.push(failure);
                }
            }
        }

        let reason = failures
            .last()
            .map(|f| format!("all tiers failed; last: {}", f))
            .unwrap_or_else(|| "no encode tiers configured".to_string());
        ChainOutcome::Failed { reason, failures }
    }
}

fn verify_output(tier: TierKind, output: &Path, fallbacks: Vec<TierFailure>) -> ChainOutcome {
    match std::fs::metadata(output) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => ChainOutcome::Succeeded {
            tier,
            output: output.to_path_buf(),
            output_bytes: meta.len(),
            fallbacks,
        },
        Ok(_) => ChainOutcome::Failed {
            reason: format!("{} reported success but {} is empty", tier, output.display()),
            failures: fallbacks,
        },
        Err(_) => ChainOutcome::Failed {
            reason: format!("{} reported success but {} is missing", tier, output.display()),
            failures: fallbacks,
        },
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What a scripted tier does when attempted.
    #[derive(Debug, Clone, Copy)]
    pub enum Script {
        /// Write `bytes` to the output and succeed
        Write(usize),
        /// Succeed without touching the output
        ClaimOnly,
        Fail,
    }

    pub struct ScriptedTier {
        pub kind: TierKind,
        pub script: Script,
        pub calls: Arc<AtomicUsize>,
    }

    impl ScriptedTier {
        pub fn boxed(kind: TierKind, script: Script) -> (Box<dyn EncodeTier>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let tier = ScriptedTier {
                kind,
                script,
                calls: Arc::clone(&calls),
            };
            (Box::new(tier), calls)
        }
    }

    impl EncodeTier for ScriptedTier {
        fn kind(&self) -> TierKind {
            self.kind
        }

        fn attempt(&self, ctx: &TierContext<'_>) -> Result<(), TierFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Write(n) => {
                    std::fs::write(ctx.output, vec![0u8; n])
                        .map_err(|e| TierFailure::new(self.kind, e.to_string()))
                }
                Script::ClaimOnly => Ok(()),
                Script::Fail => Err(TierFailure::new(self.kind, "scripted failure")),
            }
        }
    }
}
