//! Consistency scan results.

use std::fmt;
use std::path::{Path, PathBuf};

use coffer_types::FileKind;

/// An entry present in only one of the two stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// On disk, but no record describes it.
    NotInDb { location: PathBuf },
    /// Recorded, but nothing exists on disk.
    NotInOs { location: PathBuf, kind: FileKind },
}

impl Mismatch {
    pub fn location(&self) -> &Path {
        match self {
            Mismatch::NotInDb { location } | Mismatch::NotInOs { location, .. } => location,
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::NotInDb { location } => write!(f, "NOT IN DB: {}", location.display()),
            Mismatch::NotInOs { location, .. } => write!(f, "NOT IN OS: {}", location.display()),
        }
    }
}

/// Every mismatch found by one full scan, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    mismatches: Vec<Mismatch>,
}

impl IntegrityReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mismatch: Mismatch) {
        self.mismatches.push(mismatch);
    }

    /// Returns true if both stores agree.
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mismatches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// Locations of every mismatch.
    pub fn locations(&self) -> impl Iterator<Item = &Path> {
        self.mismatches.iter().map(Mismatch::location)
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mismatched location(s)", self.mismatches.len())?;
        for mismatch in &self.mismatches {
            write!(f, "\n{mismatch}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lists_every_location() {
        let mut report = IntegrityReport::new();
        assert!(report.is_clean());

        report.push(Mismatch::NotInDb {
            location: "/stray.pdf".into(),
        });
        report.push(Mismatch::NotInOs {
            location: "/docs/gone.png".into(),
            kind: FileKind::Png,
        });

        assert!(!report.is_clean());
        assert_eq!(report.len(), 2);
        assert_eq!(
            report.to_string(),
            "2 mismatched location(s)\nNOT IN DB: /stray.pdf\nNOT IN OS: /docs/gone.png"
        );
        let locations: Vec<_> = report.locations().collect();
        assert_eq!(locations, [Path::new("/stray.pdf"), Path::new("/docs/gone.png")]);
    }
}
