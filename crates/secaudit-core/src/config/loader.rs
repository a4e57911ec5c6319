//! Environment variable loading helpers.
//!
//! Keeps the fallback logic in one place so callers never repeat `or_else` chains.

use std::env;
use std::path::Path;

/// Load `.env` from the current directory into the process environment
/// (existing variables are never overwritten). Runs at most once.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let path = env::current_dir()
            .map(|d| d.join(".env"))
            .unwrap_or_else(|_| std::path::PathBuf::from(".env"));
        for (key, value) in read_dotenv(&path) {
            if env::var(&key).is_err() {
                #[allow(unsafe_code)]
                unsafe {
                    env::set_var(&key, &value);
                }
            }
        }
    });
}

/// Parse a `.env` file into key/value pairs. Missing or unreadable files yield nothing.
pub fn read_dotenv(path: &Path) -> Vec<(String, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content.lines().filter_map(parse_dotenv_line).collect()
}

fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let mut value = line[eq_pos + 1..].trim();
    // Strip inline comment (# not inside quotes)
    if let Some(hash_pos) = value.find('#') {
        let before_hash = value[..hash_pos].trim_end();
        if !before_hash.contains('"') && !before_hash.contains('\'') {
            value = before_hash;
        }
    }
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = &value[1..value.len() - 1];
    }
    if key.is_empty() {
        None
    } else {
        Some((key.to_string(), value.to_string()))
    }
}

/// Read a variable, falling back to `default` when unset or empty.
pub fn env_or<F>(key: &str, default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(default)
}

/// Read a variable as `Option` (empty counts as unset).
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|s| {
        let s = s.trim().to_string();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    })
}

/// Parse a boolean variable: 0/false/no/off are false, anything else true.
pub fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key).ok().as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_dotenv_line_variants() {
        assert_eq!(
            parse_dotenv_line("SECAUDIT_QUIET=1"),
            Some(("SECAUDIT_QUIET".to_string(), "1".to_string()))
        );
        assert_eq!(
            parse_dotenv_line("KEY = \"quoted value\""),
            Some(("KEY".to_string(), "quoted value".to_string()))
        );
        assert_eq!(
            parse_dotenv_line("KEY=value # trailing"),
            Some(("KEY".to_string(), "value".to_string()))
        );
        assert_eq!(parse_dotenv_line("# comment"), None);
        assert_eq!(parse_dotenv_line("no_equals_sign"), None);
        assert_eq!(parse_dotenv_line("=orphan"), None);
    }

    #[test]
    fn test_read_dotenv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "# settings").unwrap();
        writeln!(f, "SECAUDIT_LOG_LEVEL=secaudit=debug").unwrap();
        writeln!(f, "SECAUDIT_PARALLEL='0'").unwrap();
        drop(f);

        let pairs = read_dotenv(&path);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1, "secaudit=debug");
        assert_eq!(pairs[1].1, "0");
    }

    #[test]
    fn test_read_dotenv_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_dotenv(&dir.path().join("absent.env")).is_empty());
    }

    #[test]
    fn test_env_helpers_fallbacks() {
        let key = "SECAUDIT_TEST_LOADER_UNSET_KEY";
        assert_eq!(env_or(key, || "fallback".to_string()), "fallback");
        assert_eq!(env_optional(key), None);
        assert!(env_bool(key, true));
        assert!(!env_bool(key, false));
    }
}
