//! Security utilities for credential handling
//!
//! Provides:
//! - SecureString with zeroize
//! - Audit logging of pull-secret reads (never logs secret values)
//! - Error sanitization for text that may echo a payload

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secure string that is automatically zeroed on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    pub fn new(value: String) -> Self {
        Self { inner: value }
    }

    /// Get the string value (use with caution)
    pub fn expose(&self) -> &str {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString([REDACTED {} bytes])", self.len())
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Audit entry for one pull-secret lookup
#[derive(Debug, Clone)]
pub struct AuditLog {
    pub operation: &'static str,
    pub namespace: String,
    pub secret_name: String,
    pub store: &'static str,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditLog {
    pub fn new(
        operation: &'static str,
        namespace: impl Into<String>,
        secret_name: impl Into<String>,
        store: &'static str,
    ) -> Self {
        Self {
            operation,
            namespace: namespace.into(),
            secret_name: secret_name.into(),
            store,
            success: true,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(sanitize_error(&error.into()));
        self
    }

    /// Log the audit entry (never logs secret values)
    pub fn log(&self) {
        if self.success {
            tracing::debug!(
                operation = self.operation,
                namespace = %self.namespace,
                secret_name = %self.secret_name,
                store = self.store,
                "Pull secret lookup succeeded"
            );
        } else {
            tracing::warn!(
                operation = self.operation,
                namespace = %self.namespace,
                secret_name = %self.secret_name,
                store = self.store,
                error = ?self.error,
                "Pull secret lookup failed"
            );
        }
    }
}

static REDACTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r#"(?i)"(password|auth|identitytoken|registrytoken)"\s*:\s*"[^"]*""#,
            r#""$1":"[REDACTED]""#,
        ),
        (r"(?i)(token|password|secret)[=:]\s*[^\s,]+", "$1=[REDACTED]"),
        (r"[A-Za-z0-9+/]{32,}={0,2}", "[REDACTED_BASE64]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Remove anything in `error` that looks like credential material
pub fn sanitize_error(error: &str) -> String {
    let mut sanitized = error.to_string();
    for (re, replacement) in REDACTIONS.iter() {
        sanitized = re.replace_all(&sanitized, *replacement).into_owned();
    }
    sanitized
}
