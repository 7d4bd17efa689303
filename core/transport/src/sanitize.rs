//! Sanitization of repository identities and file names.
//!
//! Everything that ends up in a remote path or a local file name goes
//! through these functions first.

use gitbox_common::GitRepository;

/// Longest owner login kept by [`sanitize_owner`].
pub const MAX_OWNER_LEN: usize = 38;

/// Longest file name kept by [`sanitize_filename`], in characters.
pub const MAX_FILENAME_LEN: usize = 100;

const REPLACEMENT: char = '-';

/// Keep only ASCII alphanumerics, cap the length, never return empty.
pub fn sanitize_owner(owner: &str) -> String {
    let cleaned: String = owner
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_OWNER_LEN)
        .collect();

    if cleaned.is_empty() {
        "f".to_string()
    } else {
        cleaned
    }
}

/// Replace everything outside `[A-Za-z0-9-_.]` with `-` and lowercase.
pub fn sanitize_repo_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c.to_ascii_lowercase()
            } else {
                REPLACEMENT
            }
        })
        .collect()
}

/// Branch names are passed through unchanged.
pub fn sanitize_branch(branch: &str) -> String {
    branch.to_string()
}

/// Sanitize every part of a repository identity.
pub fn sanitize_repository(repository: &GitRepository) -> GitRepository {
    GitRepository {
        owner: sanitize_owner(&repository.owner),
        name: sanitize_repo_name(&repository.name),
        branch: sanitize_branch(&repository.branch),
    }
}

/// Make `name` safe to use as a single path segment on common filesystems.
///
/// Reserved and control characters become `-` (runs collapse to one),
/// leading and trailing dots and spaces are trimmed, and the result is capped
/// at [`MAX_FILENAME_LEN`] characters. Never returns an empty string, `.` or `..`.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_replaced = false;

    for c in name.chars() {
        if c.is_control() || matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
            if !last_replaced {
                out.push(REPLACEMENT);
            }
            last_replaced = true;
        } else {
            out.push(c);
            last_replaced = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == ' ');
    let capped: String = trimmed.chars().take(MAX_FILENAME_LEN).collect();

    match capped.as_str() {
        "" | "." | ".." => REPLACEMENT.to_string(),
        _ => capped,
    }
}

/// Check the hosting username grammar: alphanumerics or single hyphens
/// between alphanumerics, 1 to 39 characters.
pub fn is_valid_username(username: &str) -> bool {
    let bytes = username.as_bytes();
    if bytes.is_empty() || bytes.len() > 39 {
        return false;
    }
    if !bytes[0].is_ascii_alphanumeric() {
        return false;
    }

    bytes.windows(2).all(|pair| match pair {
        [b'-', next] => next.is_ascii_alphanumeric(),
        [_, b'-'] => true,
        [_, next] => next.is_ascii_alphanumeric(),
        _ => false,
    }) && bytes[bytes.len() - 1] != b'-'
}

/// Check `[A-Za-z0-9._-]+` segments separated by single slashes.
pub fn is_valid_repo_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        })
}
