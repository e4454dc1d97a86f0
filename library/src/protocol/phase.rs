//! Bootstrap Phases
//!
//! Both environment bootstraps walk the same terminal-state machine; the
//! restricted variant skips the image-handling phases. The current phase
//! is carried for diagnostics so a failure names the step it died on.

/// Progress of one bootstrap attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    Idle,
    /// Full environment: raw bytes located in the firmware store.
    Discovered,
    Mapped,
    Relocated,
    /// Restricted environment: constructor token retrieved.
    TokenLocated,
    EntryResolved,
    SizeQueried,
    Constructed,
    Installed,
    Failed,
}

impl BootstrapPhase {
    pub fn name(self) -> &'static str {
        match self {
            BootstrapPhase::Idle => "Idle",
            BootstrapPhase::Discovered => "Discovered",
            BootstrapPhase::Mapped => "Mapped",
            BootstrapPhase::Relocated => "Relocated",
            BootstrapPhase::TokenLocated => "TokenLocated",
            BootstrapPhase::EntryResolved => "EntryResolved",
            BootstrapPhase::SizeQueried => "SizeQueried",
            BootstrapPhase::Constructed => "Constructed",
            BootstrapPhase::Installed => "Installed",
            BootstrapPhase::Failed => "Failed",
        }
    }
}
