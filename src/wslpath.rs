//! Path translation between Windows and WSL
//!
//! Drive-letter paths map to `/mnt/<lowercase-drive>/...` and back. Anything
//! else is rejected with a descriptive error rather than silently guessed:
//! a UNC share has no stable `/mnt` mapping, and a WSL-internal path (the
//! distribution's own home directory) has no Windows equivalent.

use crate::error::DetectError;

/// Which world a path string belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Drive-letter Windows path (`C:\...` or `C:/...`).
    Windows,
    /// Absolute WSL path (`/mnt/c/...` or distro-internal `/home/...`).
    Wsl,
    /// Neither recognizable form (relative, UNC, empty).
    Unknown,
}

/// Translate a drive-letter Windows path into its WSL mount path.
///
/// `C:\Users\dev\proj` becomes `/mnt/c/Users/dev/proj`. UNC and relative
/// paths are rejected with `InvalidConfiguration`.
pub fn windows_to_wsl(path: &str) -> Result<String, DetectError> {
    let path = path.trim();

    if path.is_empty() {
        return Err(DetectError::InvalidConfiguration {
            reason: "Cannot translate an empty path".to_string(),
        });
    }

    if path.starts_with("\\\\") || path.starts_with("//") {
        return Err(DetectError::InvalidConfiguration {
            reason: format!("UNC path '{path}' has no WSL mount equivalent"),
        });
    }

    let mut chars = path.chars();
    let drive = chars.next().unwrap_or('\0');
    if !drive.is_ascii_alphabetic() || chars.next() != Some(':') {
        return Err(DetectError::InvalidConfiguration {
            reason: format!("'{path}' is not an absolute drive-letter path"),
        });
    }

    let rest = &path[2..];
    let rest = rest
        .replace('\\', "/")
        .trim_start_matches('/')
        .to_string();

    let drive = drive.to_ascii_lowercase();
    if rest.is_empty() {
        Ok(format!("/mnt/{drive}"))
    } else {
        Ok(format!("/mnt/{drive}/{rest}"))
    }
}

/// Translate a `/mnt/<drive>/...` WSL path back into a Windows path.
///
/// A WSL path without the `/mnt/<drive>` prefix (e.g. `/home/dev`) lives
/// only inside the distribution's filesystem and fails explicitly.
pub fn wsl_to_windows(path: &str) -> Result<String, DetectError> {
    let path = path.trim();

    let Some(stripped) = path.strip_prefix("/mnt/") else {
        return Err(DetectError::InvalidConfiguration {
            reason: format!("'{path}' is not under /mnt/ and has no Windows equivalent"),
        });
    };

    let (drive_part, rest) = match stripped.split_once('/') {
        Some((drive, rest)) => (drive, rest),
        None => (stripped, ""),
    };

    let mut drive_chars = drive_part.chars();
    let drive = drive_chars.next().unwrap_or('\0');
    if !drive.is_ascii_alphabetic() || drive_chars.next().is_some() {
        return Err(DetectError::InvalidConfiguration {
            reason: format!("'{path}' has no single-letter drive after /mnt/"),
        });
    }

    let drive = drive.to_ascii_uppercase();
    let rest = rest.trim_matches('/');
    if rest.is_empty() {
        Ok(format!("{drive}:\\"))
    } else {
        Ok(format!("{drive}:\\{}", rest.replace('/', "\\")))
    }
}

/// Classify a path string without translating it.
#[must_use]
pub fn detect_path_kind(path: &str) -> PathKind {
    let path = path.trim();

    if path.starts_with("\\\\") || path.starts_with("//") {
        return PathKind::Unknown;
    }

    let mut chars = path.chars();
    if let (Some(first), Some(':')) = (chars.next(), chars.clone().next())
        && first.is_ascii_alphabetic()
    {
        return PathKind::Windows;
    }

    if path.starts_with('/') {
        return PathKind::Wsl;
    }

    PathKind::Unknown
}

/// Convert in whichever direction the input calls for.
pub fn smart_convert(path: &str) -> Result<String, DetectError> {
    match detect_path_kind(path) {
        PathKind::Windows => windows_to_wsl(path),
        PathKind::Wsl => wsl_to_windows(path),
        PathKind::Unknown => Err(DetectError::InvalidConfiguration {
            reason: format!("'{path}' is neither a Windows drive path nor a WSL path"),
        }),
    }
}

/// Canonical spelling of a drive-letter Windows path: uppercase drive,
/// backslash separators, no trailing separator (except the drive root).
/// This is the fixed point of a translation round trip.
#[must_use]
pub fn normalize_windows(path: &str) -> String {
    let path = path.trim();
    let mut chars = path.chars();
    let Some(drive) = chars.next() else {
        return String::new();
    };

    let rest: String = path[drive.len_utf8()..]
        .trim_start_matches(':')
        .replace('/', "\\");
    let rest = rest.trim_matches('\\');

    let drive = drive.to_ascii_uppercase();
    if rest.is_empty() {
        format!("{drive}:\\")
    } else {
        format!("{drive}:\\{rest}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_to_wsl_basic() {
        assert_eq!(
            windows_to_wsl("C:\\Users\\dev\\project").unwrap(),
            "/mnt/c/Users/dev/project"
        );
    }

    #[test]
    fn test_windows_to_wsl_lowercases_drive() {
        assert_eq!(windows_to_wsl("D:\\Tools").unwrap(), "/mnt/d/Tools");
        assert_eq!(windows_to_wsl("d:\\Tools").unwrap(), "/mnt/d/Tools");
    }

    #[test]
    fn test_windows_to_wsl_forward_and_mixed_slashes() {
        assert_eq!(
            windows_to_wsl("C:/Users/dev/file.txt").unwrap(),
            "/mnt/c/Users/dev/file.txt"
        );
        assert_eq!(
            windows_to_wsl("C:\\Users/dev\\file.txt").unwrap(),
            "/mnt/c/Users/dev/file.txt"
        );
    }

    #[test]
    fn test_windows_to_wsl_drive_root() {
        assert_eq!(windows_to_wsl("C:\\").unwrap(), "/mnt/c");
        assert_eq!(windows_to_wsl("C:").unwrap(), "/mnt/c");
    }

    #[test]
    fn test_windows_to_wsl_preserves_spaces() {
        assert_eq!(
            windows_to_wsl("C:\\Program Files\\Git").unwrap(),
            "/mnt/c/Program Files/Git"
        );
    }

    #[test]
    fn test_windows_to_wsl_rejects_unc() {
        let err = windows_to_wsl("\\\\server\\share\\file").unwrap_err();
        assert!(matches!(err, DetectError::InvalidConfiguration { .. }));

        let err = windows_to_wsl("//server/share").unwrap_err();
        assert!(matches!(err, DetectError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_windows_to_wsl_rejects_relative() {
        assert!(windows_to_wsl("relative\\path").is_err());
        assert!(windows_to_wsl("./file.txt").is_err());
        assert!(windows_to_wsl("").is_err());
    }

    #[test]
    fn test_wsl_to_windows_basic() {
        assert_eq!(
            wsl_to_windows("/mnt/c/Users/dev/project").unwrap(),
            "C:\\Users\\dev\\project"
        );
    }

    #[test]
    fn test_wsl_to_windows_drive_root() {
        assert_eq!(wsl_to_windows("/mnt/c").unwrap(), "C:\\");
        assert_eq!(wsl_to_windows("/mnt/c/").unwrap(), "C:\\");
    }

    #[test]
    fn test_wsl_to_windows_rejects_internal_paths() {
        let err = wsl_to_windows("/home/dev/.local/bin/claude").unwrap_err();
        assert!(matches!(err, DetectError::InvalidConfiguration { .. }));

        assert!(wsl_to_windows("/usr/local/bin").is_err());
    }

    #[test]
    fn test_wsl_to_windows_rejects_bad_drive_segment() {
        assert!(wsl_to_windows("/mnt/disk1/data").is_err());
        assert!(wsl_to_windows("/mnt/").is_err());
    }

    #[test]
    fn test_round_trip_is_normalized_identity() {
        for path in [
            "C:\\Users\\dev\\project",
            "c:/Users/dev",
            "D:\\Program Files\\Git\\bin",
            "E:\\",
        ] {
            let there = windows_to_wsl(path).unwrap();
            let back = wsl_to_windows(&there).unwrap();
            assert_eq!(back, normalize_windows(path), "round trip of {path}");
        }
    }

    #[test]
    fn test_detect_path_kind() {
        assert_eq!(detect_path_kind("C:\\Users"), PathKind::Windows);
        assert_eq!(detect_path_kind("c:/users"), PathKind::Windows);
        assert_eq!(detect_path_kind("/mnt/c/Users"), PathKind::Wsl);
        assert_eq!(detect_path_kind("/home/dev"), PathKind::Wsl);
        assert_eq!(detect_path_kind("relative/path"), PathKind::Unknown);
        assert_eq!(detect_path_kind("\\\\server\\share"), PathKind::Unknown);
        assert_eq!(detect_path_kind(""), PathKind::Unknown);
    }

    #[test]
    fn test_smart_convert_picks_direction() {
        assert_eq!(
            smart_convert("C:\\Users\\dev").unwrap(),
            "/mnt/c/Users/dev"
        );
        assert_eq!(smart_convert("/mnt/c/Users/dev").unwrap(), "C:\\Users\\dev");
        assert!(smart_convert("not-a-path").is_err());
    }

    #[test]
    fn test_normalize_windows() {
        assert_eq!(normalize_windows("c:/users/dev/"), "C:\\users\\dev");
        assert_eq!(normalize_windows("C:\\"), "C:\\");
        assert_eq!(normalize_windows("C:"), "C:\\");
    }
}
