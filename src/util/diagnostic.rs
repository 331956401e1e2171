//! Diagnostics and fatal errors.
//!
//! Two tiers: [`SynthError`] stops the run because the catalog is
//! inconsistent and any output would be silently wrong. [`Diagnostic`] is a
//! soft finding that is logged, collected into the report, and the run
//! continues.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Bundle the finding is about, if any
    pub bundle: Option<String>,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            bundle: None,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, message)
    }

    /// Create a new note.
    pub fn note(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Note, message)
    }

    /// Attach the bundle this finding is about.
    pub fn for_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Log the diagnostic through tracing and return it for collection.
    pub fn logged(self) -> Self {
        let subject = self.bundle.as_deref().unwrap_or("-");
        match self.severity {
            Severity::Error => tracing::error!("[{}] {}", subject, self.message),
            Severity::Warning => tracing::warn!("[{}] {}", subject, self.message),
            Severity::Note => tracing::debug!("[{}] {}", subject, self.message),
        }
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
                Severity::Note => "\x1b[1;36mnote\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
            }
        };

        match &self.bundle {
            Some(bundle) => output.push_str(&format!(
                "{}: [{}] {}\n",
                severity_str, bundle, self.message
            )),
            None => output.push_str(&format!("{}: {}\n", severity_str, self.message)),
        }

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push_str("  help: consider:\n");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("    {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Conditions that make any further output untrustworthy.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum SynthError {
    #[error("ambiguous source for `{target}` in bundle `{bundle}`")]
    #[diagnostic(
        code(srclink::reconcile::ambiguous),
        help("Add an explicit [sources] entry to srclink.toml naming the right root")
    )]
    AmbiguousMatch {
        bundle: String,
        target: String,
        candidates: Vec<String>,
    },

    #[error("no source directory left for bundle `{bundle}`")]
    #[diagnostic(
        code(srclink::catalog::missing_roots),
        help("Fix the [sources] roots in srclink.toml or check out the library")
    )]
    MissingLibraryRoots { bundle: String, roots: Vec<String> },

    #[error("refusing to delete `{}` outside project `{}`", path.display(), project.display())]
    #[diagnostic(code(srclink::emit::path_escape))]
    PathEscape { path: PathBuf, project: PathBuf },
}

impl SynthError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            SynthError::AmbiguousMatch {
                bundle,
                target,
                candidates,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "`{}` matches several source roots equally well",
                    target
                ))
                .for_bundle(bundle.clone());
                for candidate in candidates {
                    diag = diag.with_context(format!("candidate: {}", candidate));
                }
                diag.with_suggestion(format!(
                    "Pin the source root of `{}` in srclink.toml",
                    bundle
                ))
            }
            SynthError::MissingLibraryRoots { bundle, roots } => {
                let mut diag = Diagnostic::error("none of the configured source roots exist")
                    .for_bundle(bundle.clone());
                for root in roots {
                    diag = diag.with_context(format!("missing: {}", root));
                }
                diag.with_suggestion("Check out the library or update srclink.toml")
            }
            SynthError::PathEscape { path, project } => {
                Diagnostic::error(format!("refusing to delete {}", path.display()))
                    .with_context(format!("project folder: {}", project.display()))
            }
        }
    }
}
