//! Canonical POSIX form for paths stored in plans
//!
//! Plans are written and compared using forward-slash paths regardless of the
//! platform that produced them. A Windows drive prefix becomes a leading
//! segment (`C:\Videos` is stored as `/C/Videos`). Executors convert back with
//! [`to_platform`] right before touching the filesystem.

use std::path::PathBuf;

/// Normalize a path to its canonical POSIX representation
///
/// Backslashes become slashes, repeated separators collapse, `.` segments are
/// dropped and `..` segments are folded into their parent where one exists.
pub fn to_posix(path: &str) -> String {
    let mut raw = path.replace('\\', "/");

    if let Some(drive) = drive_letter(&raw) {
        raw = format!("/{}{}", drive, &raw[2..]);
    }

    let absolute = raw.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // Cannot climb above the root of an absolute path
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Convert a canonical POSIX path back to the native form of this platform
pub fn to_platform(posix: &str) -> PathBuf {
    if cfg!(windows) {
        let trimmed = posix.trim_start_matches('/');
        let mut parts = trimmed.splitn(2, '/');
        if let Some(first) = parts.next()
            && posix.starts_with('/')
            && first.len() == 1
            && first.chars().all(|c| c.is_ascii_alphabetic())
        {
            let rest = parts.next().unwrap_or("").replace('/', "\\");
            return PathBuf::from(format!("{}:\\{}", first, rest));
        }
        PathBuf::from(posix.replace('/', "\\"))
    } else {
        PathBuf::from(posix)
    }
}

/// Return the drive letter if `path` begins with `X:` followed by a separator or nothing
fn drive_letter(path: &str) -> Option<char> {
    let mut chars = path.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_alphabetic() || chars.next()? != ':' {
        return None;
    }
    match chars.next() {
        None | Some('/') => Some(letter.to_ascii_uppercase()),
        _ => None,
    }
}
