//! Pattern-driven profile enabling.
//!
//! Given an entry's patterns, enable every host profile whose name matches
//! at least one of them and leave all other profiles alone. Matching is a
//! case-insensitive, unanchored search, so `deb` matches `Debug`,
//! `MyDebugConfig` and `debug-arm`.
//!
//! The engine never fails toward its caller: invalid patterns are skipped
//! and every host interaction goes through the capability probe in
//! [`crate::host::Integrations`], whose failures only reach the log.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::dispatch::DispatchHandle;
use crate::error::MuxError;
use crate::host::BuildHost;

/// Compiled-size ceiling for a single pattern.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Outcome of one enabling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnableReport {
    /// Profiles switched from disabled to enabled by this pass.
    pub flipped: usize,
    /// Profiles whose name matched, including already-enabled ones.
    pub matched: usize,
    /// Patterns skipped because they failed to compile.
    pub skipped_patterns: Vec<String>,
    /// Strategy that supplied the profile collection, if any.
    pub source: Option<&'static str>,
    /// Strategy that accepted the write-back, if any.
    pub stored_via: Option<&'static str>,
    /// Strategy that accepted the reload request, if any.
    pub reload_via: Option<&'static str>,
}

/// A pattern that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedPattern {
    pub pattern: String,
    pub reason: String,
}

impl RejectedPattern {
    /// The error this rejection stands for.
    pub fn to_error(&self) -> MuxError {
        MuxError::PatternCompile {
            pattern: self.pattern.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Compiled profile-selection patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    regexes: Vec<Regex>,
    rejected: Vec<RejectedPattern>,
}

impl PatternSet {
    /// Compile `patterns`, keeping the ones that compile.
    pub fn compile(patterns: &[String]) -> Self {
        let mut set = Self::default();
        for pattern in patterns {
            match compile_pattern(pattern) {
                Ok(regex) => set.regexes.push(regex),
                Err(e) => {
                    warn!(error = %e, "Skipping pattern");
                    let reason = match e {
                        MuxError::PatternCompile { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    set.rejected.push(RejectedPattern {
                        pattern: pattern.clone(),
                        reason,
                    });
                }
            }
        }
        set
    }

    /// True if no pattern compiled.
    pub fn is_empty(&self) -> bool {
        self.regexes.is_empty()
    }

    /// True if any pattern matches somewhere in `name`.
    pub fn matches(&self, name: &str) -> bool {
        self.regexes.iter().any(|re| re.is_match(name))
    }

    /// Patterns that were skipped, in input order.
    pub fn rejected(&self) -> &[RejectedPattern] {
        &self.rejected
    }

    fn rejected_patterns(&self) -> Vec<String> {
        self.rejected.iter().map(|r| r.pattern.clone()).collect()
    }
}

/// Compile one pattern as a case-insensitive search expression.
pub fn compile_pattern(pattern: &str) -> Result<Regex, MuxError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| MuxError::PatternCompile {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Enables matching profiles on one host.
#[derive(Clone)]
pub struct ProfileEngine {
    host: Arc<dyn BuildHost>,
}

impl std::fmt::Debug for ProfileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileEngine")
            .field("host", &self.host.name())
            .finish()
    }
}

impl ProfileEngine {
    pub fn new(host: Arc<dyn BuildHost>) -> Self {
        Self { host }
    }

    /// Run the enabling pass on a later dispatcher turn.
    pub fn schedule(&self, dispatch: &DispatchHandle, patterns: Vec<String>) {
        let engine = self.clone();
        dispatch.invoke_later(move || {
            engine.enable_matching(&patterns);
        });
    }

    /// Run the enabling pass now.
    ///
    /// 1. No patterns, or none that compile: nothing is touched.
    /// 2. Ask the host to import presets (best effort).
    /// 3. Read the profile collection from the first source that has one;
    ///    without one, report zero and stop.
    /// 4. Enable matching profiles that are not enabled yet.
    /// 5. Write the collection back and request a reload; neither is awaited.
    #[instrument(skip(self, patterns), fields(host = self.host.name(), patterns = patterns.len()))]
    pub fn enable_matching(&self, patterns: &[String]) -> EnableReport {
        let mut report = EnableReport::default();
        if patterns.is_empty() {
            debug!("No patterns, nothing to enable");
            return report;
        }

        let set = PatternSet::compile(patterns);
        report.skipped_patterns = set.rejected_patterns();
        if set.is_empty() {
            warn!("No usable patterns");
            return report;
        }

        let integrations = self.host.integrations();

        match integrations.import_presets() {
            Some((strategy, added)) => debug!(strategy, added, "Presets imported"),
            None => debug!("No preset importer applied, continuing"),
        }

        let Some(mut collection) = integrations.fetch_profiles() else {
            warn!("Could not obtain the host's profile list");
            return report;
        };
        report.source = Some(collection.source);

        for profile in &mut collection.profiles {
            let Some(name) = profile.resolved_name() else {
                continue;
            };
            if !set.matches(name) {
                continue;
            }
            report.matched += 1;
            if profile.is_enabled() {
                continue;
            }
            debug!(profile = name, "Enabling profile");
            profile.enabled = Some(true);
            report.flipped += 1;
        }

        report.stored_via = integrations.store_profiles(&collection);
        if report.stored_via.is_none() {
            warn!("No write-back strategy accepted the profile list");
        }
        report.reload_via = integrations.schedule_reload();
        if report.reload_via.is_none() {
            debug!("No reload strategy applied");
        }

        info!(
            flipped = report.flipped,
            matched = report.matched,
            "Enabled profiles by pattern"
        );
        report
    }
}
