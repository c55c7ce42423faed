//! Version of the program that wrote a document, and the format quirks
//! that depend on it.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};

/// A dotted numeric version such as `0.7.3`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    segments: Vec<u32>,
}

impl Version {
    pub fn new(segments: &[u32]) -> Self {
        Self {
            segments: segments.to_vec(),
        }
    }

    /// Parse the leading dotted numeric segments of `text`. Anything after
    /// the last numeric segment (e.g. "beta") is ignored. Fails if no
    /// segment can be read at all.
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for part in text.trim().split('.') {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            let Ok(value) = digits.parse::<u32>() else {
                break;
            };
            segments.push(value);
            if digits.len() != part.len() {
                break;
            }
        }
        if segments.is_empty() {
            return Err(ImportError::Version(text.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    fn segment(&self, i: usize) -> u32 {
        self.segments.get(i).copied().unwrap_or(0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| self.segment(i).cmp(&other.segment(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: Vec<String> = self.segments.iter().map(u32::to_string).collect();
        write!(f, "{}", text.join("."))
    }
}

/// First version that writes notes, rests, tempo marks and function
/// marks in the nested shape.
const NESTED_SHAPE_SINCE: [u32; 2] = [0, 6];
/// Last version that wrote a constant colour for every element.
const BROKEN_COLOR_UNTIL: [u32; 3] = [0, 7, 3];

/// The declared document version, set once from the version element and
/// consulted by every version-dependent import branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionGate {
    version: Option<Version>,
}

impl VersionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Record the declared version. Returns `Ok(false)` without changing
    /// anything if a version was already declared.
    pub fn declare(&mut self, text: &str) -> Result<bool> {
        let parsed = Version::parse(text)?;
        if self.version.is_some() {
            return Ok(false);
        }
        self.version = Some(parsed);
        Ok(true)
    }

    pub fn is_at_or_before(&self, segments: &[u32]) -> bool {
        self.version.as_ref().is_some_and(|v| *v <= Version::new(segments))
    }

    pub fn is_at_or_after(&self, segments: &[u32]) -> bool {
        self.version.as_ref().is_some_and(|v| *v >= Version::new(segments))
    }

    /// Whether notes, rests, tempo marks and function marks carry their
    /// pitch/length/key directly as attributes instead of nested elements.
    pub fn uses_attribute_shape(&self) -> bool {
        self.version.as_ref().is_some_and(|v| *v < Version::new(&NESTED_SHAPE_SINCE))
    }

    /// Whether the `color` attribute can be trusted. Older writers stored
    /// black for every element; undeclared versions are treated as old.
    pub fn colors_are_reliable(&self) -> bool {
        self.version.is_some() && !self.is_at_or_before(&BROKEN_COLOR_UNTIL)
    }
}
