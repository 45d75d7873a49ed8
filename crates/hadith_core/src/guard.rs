//! crates/hadith_core/src/guard.rs
//!
//! Page-level route protection. Given the request path and whether a valid
//! session exists, decide whether to serve the page or redirect.

/// Where the guard sends a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    PassThrough,
    RedirectToSignIn,
    RedirectToDashboard,
}

/// Path rules for the guard.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Any path under this prefix needs a session.
    pub protected_prefix: &'static str,
    /// Paths matched exactly that signed-in users are bounced from.
    pub entry_paths: &'static [&'static str],
    /// Prefixes that signed-in users are bounced from.
    pub entry_prefixes: &'static [&'static str],
    pub sign_in_path: &'static str,
    pub dashboard_path: &'static str,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            protected_prefix: "/dashboard",
            entry_paths: &["/"],
            entry_prefixes: &["/sign-in", "/sign-up"],
            sign_in_path: "/sign-in",
            dashboard_path: "/dashboard",
        }
    }
}

impl GuardConfig {
    pub fn decide(&self, path: &str, has_session: bool) -> GuardDecision {
        if !has_session && path.starts_with(self.protected_prefix) {
            return GuardDecision::RedirectToSignIn;
        }
        if has_session && self.is_entry(path) {
            return GuardDecision::RedirectToDashboard;
        }
        GuardDecision::PassThrough
    }

    /// The redirect target for a decision, `None` for pass-through.
    pub fn location(&self, decision: GuardDecision) -> Option<&'static str> {
        match decision {
            GuardDecision::PassThrough => None,
            GuardDecision::RedirectToSignIn => Some(self.sign_in_path),
            GuardDecision::RedirectToDashboard => Some(self.dashboard_path),
        }
    }

    fn is_entry(&self, path: &str) -> bool {
        self.entry_paths.contains(&path)
            || self.entry_prefixes.iter().any(|p| path.starts_with(p))
    }
}
