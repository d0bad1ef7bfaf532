//! Target platform and architecture.
//!
//! Names follow the `<platform>/<arch>` convention used by hook keys and the
//! `--platform` flag, e.g. `darwin/universal` or `windows/amd64`.

use std::fmt;
use std::str::FromStr;

/// Operating system a build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Darwin,
    Linux,
    Windows,
}

impl Platform {
    /// Returns the platform name as used in hook keys.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Platform::Darwin => "darwin",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
        }
    }

    /// The platform this process is running on, if it is a supported target.
    pub fn host() -> Option<Self> {
        host_platform_name().parse().ok()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "darwin" | "macos" => Ok(Platform::Darwin),
            "linux" => Ok(Platform::Linux),
            "windows" => Ok(Platform::Windows),
            _ => Err(format!(
                "unknown platform '{}'; expected 'darwin', 'linux', or 'windows'",
                s
            )),
        }
    }
}

/// CPU architecture a build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
    Arm,
    X86,
    /// Sentinel for a fused amd64 + arm64 binary.
    Universal,
}

impl Arch {
    /// Architectures fused into a universal binary, in compile order.
    pub const UNIVERSAL_SLICES: [Arch; 2] = [Arch::Amd64, Arch::Arm64];

    /// Returns the architecture name as used in hook keys and compiler environments.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
            Arch::Arm => "arm",
            Arch::X86 => "386",
            Arch::Universal => "universal",
        }
    }

    /// The architecture this process was compiled for.
    pub fn host() -> Self {
        match std::env::consts::ARCH {
            "aarch64" => Arch::Arm64,
            "arm" => Arch::Arm,
            "x86" => Arch::X86,
            _ => Arch::Amd64,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amd64" | "x86_64" => Ok(Arch::Amd64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "arm" => Ok(Arch::Arm),
            "386" | "x86" | "i386" => Ok(Arch::X86),
            "universal" => Ok(Arch::Universal),
            _ => Err(format!(
                "unknown architecture '{}'; expected one of amd64, arm64, arm, 386, universal",
                s
            )),
        }
    }
}

/// Name of the host operating system, in hook-key form.
///
/// Unlike [`Platform::host`] this never fails: unsupported hosts report their
/// raw OS name so that hook filtering still has something to compare against.
pub fn host_platform_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Parse a `<platform>[/<arch>]` target string.
///
/// A missing architecture defaults to the host architecture.
pub fn parse_target(s: &str) -> Result<(Platform, Arch), String> {
    match s.split_once('/') {
        Some((platform, arch)) => Ok((platform.parse()?, arch.parse()?)),
        None => Ok((s.parse()?, Arch::host())),
    }
}
