//! Staleness validation: does an exception's target still exist?
//!
//! Only `path` and `folder` records are checked against the filesystem. An
//! inconclusive check (permission denied, name too long, ...) is never stale;
//! it produces a warning for the product's `errors` instead.

use crate::model::{ExceptionKind, ExceptionRecord};
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Filesystem access used by the validator
pub trait PathProbe: Send + Sync {
    /// `Ok(())` if the entry exists. Follows symlinks.
    fn probe(&self, path: &Path) -> io::Result<()>;
}

/// Real filesystem probe
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn probe(&self, path: &Path) -> io::Result<()> {
        std::fs::metadata(path).map(|_| ())
    }
}

impl<P: PathProbe + ?Sized> PathProbe for Box<P> {
    fn probe(&self, path: &Path) -> io::Result<()> {
        (**self).probe(path)
    }
}

impl<P: PathProbe + ?Sized> PathProbe for Arc<P> {
    fn probe(&self, path: &Path) -> io::Result<()> {
        (**self).probe(path)
    }
}

/// Whether `target` is present. Only `NotFound` counts as absent.
pub fn target_exists<P: PathProbe + ?Sized>(probe: &P, target: &str) -> bool {
    match probe.probe(Path::new(trim_trailing_separators(target))) {
        Ok(()) => true,
        Err(e) => e.kind() != io::ErrorKind::NotFound,
    }
}

/// Outcome of validating one record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
    pub is_stale: bool,
    pub warning: Option<String>,
}

pub struct StalenessValidator<P: PathProbe = FsProbe> {
    probe: P,
}

impl Default for StalenessValidator<FsProbe> {
    fn default() -> Self {
        Self { probe: FsProbe }
    }
}

impl<P: PathProbe> StalenessValidator<P> {
    pub fn with_probe(probe: P) -> Self {
        Self { probe }
    }

    pub fn validate(&self, record: &ExceptionRecord) -> bool {
        self.assess(record).is_stale
    }

    pub fn assess(&self, record: &ExceptionRecord) -> Verdict {
        match record.kind() {
            ExceptionKind::Path | ExceptionKind::Folder => self.assess_path(record.target()),
            ExceptionKind::Process | ExceptionKind::Extension | ExceptionKind::FirewallRule => {
                Verdict::default()
            }
        }
    }

    fn assess_path(&self, target: &str) -> Verdict {
        let path = Path::new(trim_trailing_separators(target));
        match self.probe.probe(path) {
            Ok(()) => Verdict::default(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Verdict {
                is_stale: true,
                warning: None,
            },
            Err(e) => {
                let message = if e.kind() == io::ErrorKind::PermissionDenied {
                    format!("Permission denied checking '{}'; treated as existing", target)
                } else {
                    format!("Could not check '{}' ({}); treated as existing", target, e)
                };
                tracing::warn!(target, error = %e, "Path existence inconclusive");
                Verdict {
                    is_stale: false,
                    warning: Some(message),
                }
            }
        }
    }
}

/// Drop trailing `/` or `\`, never reducing a root (`/`, `C:\`) to nothing.
pub fn trim_trailing_separators(target: &str) -> &str {
    let trimmed = target.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        return &target[..target.len().min(1)];
    }
    let bytes = trimmed.as_bytes();
    if trimmed.len() == 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() && target.len() > 2 {
        return &target[..3];
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Product;

    fn record(kind: ExceptionKind, target: &str) -> ExceptionRecord {
        ExceptionRecord::new(Product::Defender, kind, target).unwrap()
    }

    struct FixedProbe(io::ErrorKind);

    impl PathProbe for FixedProbe {
        fn probe(&self, _path: &Path) -> io::Result<()> {
            Err(io::Error::from(self.0))
        }
    }

    #[test]
    fn test_missing_path_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("old").join("app");
        let validator = StalenessValidator::default();
        assert!(validator.validate(&record(ExceptionKind::Path, &gone.to_string_lossy())));
    }

    #[test]
    fn test_existing_folder_with_trailing_separator() {
        let dir = tempfile::tempdir().unwrap();
        let target = format!("{}{}", dir.path().display(), std::path::MAIN_SEPARATOR);
        let validator = StalenessValidator::default();
        assert!(!validator.validate(&record(ExceptionKind::Folder, &target)));
        assert!(!validator.validate(&record(ExceptionKind::Folder, &format!("{}//", dir.path().display()))));
    }

    #[test]
    fn test_non_filesystem_kinds_never_stale() {
        let validator = StalenessValidator::with_probe(FixedProbe(io::ErrorKind::NotFound));
        for kind in [ExceptionKind::Process, ExceptionKind::Extension, ExceptionKind::FirewallRule] {
            let verdict = validator.assess(&record(kind, "/definitely/not/here"));
            assert_eq!(verdict, Verdict::default());
        }
    }

    #[test]
    fn test_permission_denied_is_not_stale_but_warns() {
        let validator = StalenessValidator::with_probe(FixedProbe(io::ErrorKind::PermissionDenied));
        let verdict = validator.assess(&record(ExceptionKind::Path, "C:\\Secret\\tool.exe"));
        assert!(!verdict.is_stale);
        assert!(verdict.warning.unwrap().contains("Permission denied"));
    }

    #[test]
    fn test_other_io_errors_are_inconclusive() {
        let validator = StalenessValidator::with_probe(FixedProbe(io::ErrorKind::InvalidInput));
        let verdict = validator.assess(&record(ExceptionKind::Folder, "/very/long/name"));
        assert!(!verdict.is_stale);
        assert!(verdict.warning.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("missing"), &link).unwrap();
        let validator = StalenessValidator::default();
        assert!(validator.validate(&record(ExceptionKind::Path, &link.to_string_lossy())));
    }

    #[test]
    fn test_trim_trailing_separators() {
        assert_eq!(trim_trailing_separators("/opt/py/"), "/opt/py");
        assert_eq!(trim_trailing_separators("D:\\Projects\\\\"), "D:\\Projects");
        assert_eq!(trim_trailing_separators("/"), "/");
        assert_eq!(trim_trailing_separators("///"), "/");
        assert_eq!(trim_trailing_separators("C:\\"), "C:\\");
        assert_eq!(trim_trailing_separators("C:"), "C:");
        assert_eq!(trim_trailing_separators("relative"), "relative");
    }
}
