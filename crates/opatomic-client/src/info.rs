//! Library build information.

use opatomic_num::{BigInt, NumInt};

/// Compile-time facts about this build, for diagnostics and version
/// handshakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    /// Crate version.
    pub version: &'static str,
    /// Name of the default big-integer backend.
    pub bigint_backend: &'static str,
}

/// Build information for this library.
#[must_use]
pub fn build_info() -> BuildInfo {
    BuildInfo { version: env!("CARGO_PKG_VERSION"), bigint_backend: NumInt::NAME }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_backend_and_version() {
        let info = build_info();
        assert_eq!(info.bigint_backend, "num-bigint");
        assert!(!info.version.is_empty());
    }
}
