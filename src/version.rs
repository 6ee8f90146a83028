use crate::error::ExifToolError;
use std::fmt;
use std::str::FromStr;

/// Version of an `exiftool` executable, as printed by `exiftool -ver`.
///
/// Only the major part is mandatory: `"12"`, `"12.40"` and `"12.40.1"` are all valid,
/// missing parts default to zero. Versions are ordered by `(major, minor, patch)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }
}

impl FromStr for Version {
    type Err = ExifToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() {
            return Err(ExifToolError::Validation(
                "Version number should be set".to_string(),
            ));
        }

        let invalid = |reason: String| ExifToolError::InvalidVersion {
            value: value.to_string(),
            reason,
        };

        let parts: Vec<&str> = value.split('.').collect();
        if parts.len() > 3 {
            return Err(invalid(format!("expected at most 3 parts, got {}", parts.len())));
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|e| invalid(format!("'{}' is not a number ({})", part, e)))?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
