//! Target platforms named by a descriptor token such as `linux/arm/v7`.

use std::fmt;

use crate::artifact::ArtifactError;
use crate::consts::DEFAULT_DISTRO;

/// Operating systems an artifact can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  Darwin,
  Windows,
}

impl Os {
  pub fn parse(value: &str) -> Option<Self> {
    match value {
      "linux" => Some(Self::Linux),
      "darwin" => Some(Self::Darwin),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// The lowercase identifier, matching `GOOS`.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Darwin => "darwin",
      Self::Windows => "windows",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

const ARCHITECTURES: &[&str] = &["amd64", "arm64", "arm", "386", "s390x", "riscv64"];

/// An `os/arch[/variant]` platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Distribution {
  pub os: Os,
  pub arch: String,
  pub variant: Option<String>,
}

impl Distribution {
  /// Parse a single `os/arch[/variant]` token.
  pub fn parse(token: &str) -> Result<Self, String> {
    let mut parts = token.split('/');
    let os = parts.next().unwrap_or_default();
    let arch = parts.next().unwrap_or_default();
    let variant = parts.next().map(str::to_string);
    if parts.next().is_some() {
      return Err(format!("'{token}' has too many components"));
    }

    let os = Os::parse(os).ok_or_else(|| format!("unknown operating system '{os}'"))?;
    if !ARCHITECTURES.contains(&arch) {
      return Err(format!("unknown architecture '{arch}'"));
    }
    if variant.as_deref().is_some_and(str::is_empty) {
      return Err(format!("'{token}' has an empty variant"));
    }

    Ok(Self {
      os,
      arch: arch.to_string(),
      variant,
    })
  }

  /// The distribution named in `descriptor`, or the default when none is.
  pub fn from_descriptor(descriptor: &str) -> Result<Self, ArtifactError> {
    let invalid = |message: String| ArtifactError::InvalidDescriptor {
      descriptor: descriptor.to_string(),
      message,
    };

    let mut tokens = descriptor.split(':').filter(|token| token.contains('/'));
    let token = tokens.next().unwrap_or(DEFAULT_DISTRO);
    if let Some(extra) = tokens.next() {
      return Err(invalid(format!("more than one distribution ('{token}', '{extra}')")));
    }
    Self::parse(token).map_err(invalid)
  }

  /// Filename-safe form, e.g. `linux-arm-7`.
  pub fn slug(&self) -> String {
    match &self.variant {
      Some(variant) => format!("{}-{}-{}", self.os, self.arch, variant.trim_start_matches('v')),
      None => format!("{}-{}", self.os, self.arch),
    }
  }

  /// `GOARM` for 32-bit arm targets.
  pub fn goarm(&self) -> Option<&str> {
    match (self.arch.as_str(), &self.variant) {
      ("arm", Some(variant)) => Some(variant.trim_start_matches('v')),
      ("arm", None) => Some("7"),
      _ => None,
    }
  }

  /// Architecture name used by Debian packages.
  pub fn deb_arch(&self) -> &str {
    match (self.arch.as_str(), self.goarm()) {
      ("arm", Some("6")) => "armel",
      ("arm", _) => "armhf",
      ("386", _) => "i386",
      (arch, _) => arch,
    }
  }

  /// Architecture name used by RPM packages.
  pub fn rpm_arch(&self) -> &str {
    match self.arch.as_str() {
      "amd64" => "x86_64",
      "arm64" => "aarch64",
      "arm" => "armhfp",
      "386" => "i386",
      arch => arch,
    }
  }

  pub fn is_windows(&self) -> bool {
    self.os == Os::Windows
  }
}

impl fmt::Display for Distribution {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.os, self.arch)?;
    if let Some(variant) = &self.variant {
      write!(f, "/{variant}")?;
    }
    Ok(())
  }
}
