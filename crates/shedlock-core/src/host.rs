//! Best-effort holder labels written to `locked_by`.

/// Resolves the label stored in `locked_by`.
///
/// The label is purely diagnostic. Implementations must not fail; return an
/// empty string when nothing better is available.
pub trait HostIdentity: Send + Sync {
    fn resolve(&self) -> String;
}

/// Uses the machine's host name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostIdentity;

impl HostIdentity for SystemHostIdentity {
    fn resolve(&self) -> String {
        match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                tracing::debug!(error = %e, "failed to resolve host name");
                String::new()
            }
        }
    }
}

/// A fixed label, e.g. a pod name taken from the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticHostIdentity(pub String);

impl StaticHostIdentity {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }
}

impl HostIdentity for StaticHostIdentity {
    fn resolve(&self) -> String {
        self.0.clone()
    }
}
