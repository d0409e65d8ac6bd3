//! Operating system and architecture detection.
use std::fmt;

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux.
    Linux,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
    /// Any other target; carries the compiler's name for it.
    Other(&'static str),
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::MacOs => write!(f, "macos"),
            Self::Windows => write!(f, "windows"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Platform information for the current system.
///
/// Host identity is not detected here; it is a configured value that the
/// caller pairs with the platform when building template parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
    /// CPU architecture as named by the compiler (`x86_64`, `aarch64`).
    pub arch: String,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            os: Self::detect_os(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// Create a platform with explicit values.
    #[must_use]
    pub fn new(os: Os, arch: &str) -> Self {
        Self {
            os,
            arch: arch.to_string(),
        }
    }

    /// Whether this is a Windows platform.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    fn detect_os() -> Os {
        match std::env::consts::OS {
            "linux" => Os::Linux,
            "macos" => Os::MacOs,
            "windows" => Os::Windows,
            other => Os::Other(other),
        }
    }
}
