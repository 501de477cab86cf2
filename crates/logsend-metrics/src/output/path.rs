//! Sequential, zero-padded output paths.

use std::path::{Path, PathBuf};

use crate::error::{MetricsError, Result};

/// Widest counter the generator supports; `10^19` still fits in a `u64`.
const MAX_DIGITS: usize = 19;

/// Produces `{dir}/{base}.{counter}{extension}` paths, skipping any that
/// already exist.
#[derive(Debug, Clone)]
pub struct RotatingPathGenerator {
    dir: PathBuf,
    base: String,
    extension: String,
    digits: usize,
    counter: u64,
}

impl RotatingPathGenerator {
    /// Creates a generator with a counter `digits` wide.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` is empty or `digits` is outside `1..=19`.
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>, digits: usize) -> Result<Self> {
        let base = base.into();
        if base.is_empty() {
            return Err(MetricsError::InvalidConfig(
                "path base must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_DIGITS).contains(&digits) {
            return Err(MetricsError::InvalidConfig(format!(
                "path digits must be between 1 and {MAX_DIGITS}, got {digits}"
            )));
        }
        Ok(Self {
            dir: dir.into(),
            base,
            extension: String::new(),
            digits,
            counter: 0,
        })
    }

    /// Sets the extension appended after the counter, e.g. `.lsb`.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Returns the output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path for a given counter value.
    #[must_use]
    pub fn path_for(&self, counter: u64) -> PathBuf {
        self.dir.join(format!(
            "{}.{counter:0width$}{}",
            self.base,
            self.extension,
            width = self.digits
        ))
    }

    /// Returns the next path that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::PathSpaceExhausted`] once the counter no
    /// longer fits in `digits` digits. This is not retried.
    pub fn next_path(&mut self) -> Result<PathBuf> {
        let limit = 10u64.pow(self.digits as u32);
        while self.counter < limit {
            let path = self.path_for(self.counter);
            self.counter += 1;
            if !path.try_exists()? {
                return Ok(path);
            }
        }
        Err(MetricsError::PathSpaceExhausted {
            base: self.base.clone(),
            digits: self.digits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tempdir() -> TempDir {
        TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"))
    }

    #[test]
    fn pads_counter_to_width() {
        let generator = RotatingPathGenerator::new("/data", "samples", 4)
            .map(|g| g.with_extension(".lsb"))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(generator.path_for(7), PathBuf::from("/data/samples.0007.lsb"));
    }

    #[test]
    fn skips_existing_files() {
        let dir = tempdir();
        let mut generator =
            RotatingPathGenerator::new(dir.path(), "out", 2).unwrap_or_else(|e| panic!("{e}"));
        assert!(fs::write(generator.path_for(0), b"x").is_ok());
        assert!(fs::write(generator.path_for(1), b"x").is_ok());

        let next = generator.next_path().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(next, dir.path().join("out.02"));
    }

    #[test]
    fn exhausts_after_digit_width() {
        let dir = tempdir();
        let mut generator =
            RotatingPathGenerator::new(dir.path(), "out", 1).unwrap_or_else(|e| panic!("{e}"));
        for expected in 0..10 {
            let path = generator.next_path().unwrap_or_else(|e| panic!("{e}"));
            assert_eq!(path, dir.path().join(format!("out.{expected}")));
        }
        assert!(matches!(
            generator.next_path(),
            Err(MetricsError::PathSpaceExhausted { digits: 1, .. })
        ));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(RotatingPathGenerator::new("/d", "", 3).is_err());
        assert!(RotatingPathGenerator::new("/d", "b", 0).is_err());
        assert!(RotatingPathGenerator::new("/d", "b", 20).is_err());
    }
}
