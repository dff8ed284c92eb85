//! Run admission and concurrency gating.
//!
//! A run is admitted when its trigger event and ref match the pipeline's
//! trigger configuration and the originating repository is the owning
//! repository. Admitted runs join a concurrency group; a newer run for the
//! same group cancels the in-flight one. The key is advisory: it cancels,
//! never blocks.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use glob::Pattern;
use url::Url;

use crate::core::pipeline::{TriggerConfig, TriggerEvent};
use crate::util::process::CancelToken;

/// Why a run was not admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The event kind is not in the trigger's event list.
    EventNotConfigured(TriggerEvent),
    /// The ref matches none of the branch patterns.
    RefNotMatched(String),
    /// The origin repository is not the owning repository.
    ForeignRepository { origin: String, owning: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::EventNotConfigured(event) => {
                write!(f, "event `{}` is not configured to trigger this pipeline", event)
            }
            RejectReason::RefNotMatched(r) => {
                write!(f, "ref `{}` matches no configured branch pattern", r)
            }
            RejectReason::ForeignRepository { origin, owning } => {
                write!(f, "origin `{}` is not the owning repository `{}`", origin, owning)
            }
        }
    }
}

/// Outcome of trigger evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Run admitted under the given concurrency group.
    Admitted { group: String },
    /// Run rejected; nothing executes.
    Rejected(RejectReason),
}

/// Evaluate the trigger gate for one prospective run.
///
/// `origin` is the URL of the repository the run originates from; when it
/// cannot be determined the owning-repository check is skipped, since the
/// comparison needs both sides.
pub fn evaluate(
    trigger: &TriggerConfig,
    workflow: &str,
    event: TriggerEvent,
    ref_name: &str,
    origin: Option<&str>,
) -> Result<Admission> {
    if !trigger.events.contains(&event) {
        return Ok(Admission::Rejected(RejectReason::EventNotConfigured(event)));
    }

    let mut matched = false;
    for pattern in &trigger.branches {
        let pattern = Pattern::new(pattern)
            .with_context(|| format!("invalid branch pattern: {}", pattern))?;
        if pattern.matches(ref_name) {
            matched = true;
            break;
        }
    }
    if !matched {
        return Ok(Admission::Rejected(RejectReason::RefNotMatched(
            ref_name.to_string(),
        )));
    }

    if let (Some(owning), Some(origin)) = (trigger.repository.as_deref(), origin) {
        if !same_repository(owning, origin) {
            return Ok(Admission::Rejected(RejectReason::ForeignRepository {
                origin: origin.to_string(),
                owning: owning.to_string(),
            }));
        }
    }

    let group = trigger
        .concurrency
        .replace("{workflow}", workflow)
        .replace("{ref}", ref_name);

    Ok(Admission::Admitted { group })
}

/// Compare repository URLs ignoring scheme, credentials, case of the host,
/// and a trailing `.git`.
pub fn same_repository(a: &str, b: &str) -> bool {
    match (normalize_repo_url(a), normalize_repo_url(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Reduce a repository URL to `(host, path)`.
///
/// Handles both proper URLs (`https://...`, `ssh://git@...`) and scp-like
/// remotes (`git@github.com:owner/repo.git`).
fn normalize_repo_url(raw: &str) -> Option<(String, String)> {
    fn clean_path(path: &str) -> String {
        path.trim_matches('/')
            .trim_end_matches(".git")
            .to_lowercase()
    }

    if let Ok(url) = Url::parse(raw) {
        let host = url.host_str()?.to_lowercase();
        return Some((host, clean_path(url.path())));
    }

    // scp-like remote: [user@]host:path
    let (userhost, path) = raw.split_once(':')?;
    let host = userhost.split('@').next_back()?.to_lowercase();
    if host.is_empty() || path.is_empty() {
        return None;
    }
    Some((host, clean_path(path)))
}

/// Ref and origin of the repository enclosing a directory.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Short name of HEAD (branch name, or abbreviated commit if detached)
    pub ref_name: String,
    /// URL of the `origin` remote, if configured
    pub origin: Option<String>,
}

/// Detect the ref and origin of the git repository containing `dir`.
pub fn detect_repository(dir: &Path) -> Option<RepoInfo> {
    let repo = git2::Repository::discover(dir).ok()?;
    let head = repo.head().ok()?;
    let ref_name = head.shorthand()?.to_string();
    let origin = repo
        .find_remote("origin")
        .ok()
        .and_then(|r| r.url().map(String::from));
    Some(RepoInfo { ref_name, origin })
}

/// Tracks the active run per concurrency group, canceling superseded runs.
///
/// Replacement of the active run is atomic under the map lock; cancellation
/// itself is cooperative and takes effect at the superseded run's next
/// check.
#[derive(Debug, Default)]
pub struct ConcurrencyGate {
    active: Mutex<HashMap<String, CancelToken>>,
}

impl ConcurrencyGate {
    /// Create an empty gate.
    pub fn new() -> Self {
        ConcurrencyGate::default()
    }

    /// Register a run for `group`, canceling any in-flight run holding it.
    pub fn admit(&self, group: &str) -> CancelToken {
        let token = CancelToken::new();
        let mut active = self.active.lock().unwrap();
        if let Some(previous) = active.insert(group.to_string(), token.clone()) {
            tracing::info!("canceling superseded run for group `{}`", group);
            previous.cancel();
        }
        token
    }

    /// Release a finished run, if it is still the active one for `group`.
    pub fn release(&self, group: &str, token: &CancelToken) {
        let mut active = self.active.lock().unwrap();
        if active.get(group).is_some_and(|t| t.same(token)) {
            active.remove(group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger() -> TriggerConfig {
        TriggerConfig {
            events: vec![TriggerEvent::Push],
            branches: vec!["master".to_string(), "release/*".to_string()],
            repository: Some("https://github.com/acme/widget".to_string()),
            concurrency: "{workflow}-{ref}".to_string(),
        }
    }

    #[test]
    fn test_admits_matching_push() {
        let admission = evaluate(
            &trigger(),
            "packaging",
            TriggerEvent::Push,
            "master",
            Some("git@github.com:acme/widget.git"),
        )
        .unwrap();
        assert_eq!(
            admission,
            Admission::Admitted {
                group: "packaging-master".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_unconfigured_event() {
        let admission = evaluate(
            &trigger(),
            "packaging",
            TriggerEvent::PullRequest,
            "master",
            None,
        )
        .unwrap();
        assert!(matches!(
            admission,
            Admission::Rejected(RejectReason::EventNotConfigured(TriggerEvent::PullRequest))
        ));
    }

    #[test]
    fn test_rejects_unmatched_ref() {
        let admission =
            evaluate(&trigger(), "packaging", TriggerEvent::Push, "feature/x", None).unwrap();
        assert!(matches!(
            admission,
            Admission::Rejected(RejectReason::RefNotMatched(_))
        ));
    }

    #[test]
    fn test_branch_glob_matches() {
        let admission = evaluate(
            &trigger(),
            "packaging",
            TriggerEvent::Push,
            "release/1.2",
            None,
        )
        .unwrap();
        assert!(matches!(admission, Admission::Admitted { .. }));
    }

    #[test]
    fn test_rejects_foreign_repository() {
        let admission = evaluate(
            &trigger(),
            "packaging",
            TriggerEvent::Push,
            "master",
            Some("https://github.com/fork/widget"),
        )
        .unwrap();
        assert!(matches!(
            admission,
            Admission::Rejected(RejectReason::ForeignRepository { .. })
        ));
    }

    #[test]
    fn test_same_repository_across_url_styles() {
        assert!(same_repository(
            "https://github.com/Acme/Widget.git",
            "git@github.com:acme/widget"
        ));
        assert!(same_repository(
            "ssh://git@github.com/acme/widget.git",
            "https://github.com/acme/widget"
        ));
        assert!(!same_repository(
            "https://github.com/acme/widget",
            "https://github.com/acme/gadget"
        ));
    }

    #[test]
    fn test_admit_cancels_previous_run() {
        let gate = ConcurrencyGate::new();

        let first = gate.admit("packaging-master");
        assert!(!first.is_canceled());

        let second = gate.admit("packaging-master");
        assert!(first.is_canceled());
        assert!(!second.is_canceled());
    }

    #[test]
    fn test_distinct_groups_do_not_interfere() {
        let gate = ConcurrencyGate::new();

        let master = gate.admit("packaging-master");
        let _release = gate.admit("packaging-release/1.2");
        assert!(!master.is_canceled());
    }

    #[test]
    fn test_release_only_removes_own_token() {
        let gate = ConcurrencyGate::new();

        let first = gate.admit("g");
        let second = gate.admit("g");

        // The superseded run releasing must not evict the newer one.
        gate.release("g", &first);
        let third = gate.admit("g");
        assert!(second.is_canceled());
        assert!(!third.is_canceled());
    }
}
