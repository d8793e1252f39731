use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Characters allowed in ids that end up in URLs.
const URL_PROOF_CHARS: &str = "0123456789abcdefghijklmnopqrstuvwxyz@._-";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("a file with the same name as the desired directory, '{0}', already exists.")]
    FileInTheWay(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reasons an id is rejected by [`check_for_url_proof_id`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("The character '{0}' is not allowed")]
    ForbiddenCharacter(char),
    #[error("ID already exists")]
    AlreadyExists,
    #[error("Must at least have {0} characters")]
    TooShort(usize),
    #[error("Must have less than {0} characters")]
    TooLong(usize),
}

/// Produce a unique identifier made of lowercase hex digits only.
pub fn generate_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Create `path` and any missing parents.
///
/// Succeeds quietly when the directory already exists and fails when a
/// regular file occupies the path.
pub fn mkdir(path: impl AsRef<Path>) -> Result<(), ToolError> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(());
    }
    if path.is_file() {
        return Err(ToolError::FileInTheWay(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            mkdir(parent)?;
        }
    }
    std::fs::create_dir(path)?;
    Ok(())
}

/// Check that `id` can be used verbatim inside a URL.
///
/// The id is trimmed first, so callers should keep the returned value rather
/// than the one they passed in. `existing_ids` are expected in lowercase.
pub fn check_for_url_proof_id<S: AsRef<str>>(
    id: &str,
    existing_ids: &[S],
    min_id_length: usize,
    max_id_length: usize,
) -> Result<String, IdError> {
    let id = id.trim();

    if let Some(c) = id
        .chars()
        .find(|c| !c.to_lowercase().all(|l| URL_PROOF_CHARS.contains(l)))
    {
        return Err(IdError::ForbiddenCharacter(c));
    }

    let lowered = id.to_lowercase();
    if existing_ids.iter().any(|e| e.as_ref() == lowered) {
        return Err(IdError::AlreadyExists);
    }
    let len = id.chars().count();
    if len < min_id_length {
        return Err(IdError::TooShort(min_id_length));
    }
    if len > max_id_length {
        return Err(IdError::TooLong(max_id_length));
    }
    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn uid_is_plain_hex() {
        let uid = generate_uid();
        assert_eq!(uid.len(), 32);
        assert!(uid.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(uid, generate_uid());
    }

    #[test]
    fn id_is_trimmed() {
        assert_eq!(check_for_url_proof_id("  Bob.Smith@home ", NONE, 1, 21).unwrap(), "Bob.Smith@home");
    }

    #[test]
    fn forbidden_character_reported() {
        assert_eq!(
            check_for_url_proof_id("a b", NONE, 1, 21),
            Err(IdError::ForbiddenCharacter(' '))
        );
        assert_eq!(
            check_for_url_proof_id("ümlaut", NONE, 1, 21).unwrap_err().to_string(),
            "The character 'ü' is not allowed"
        );
    }

    #[test]
    fn existing_ids_compared_lowercase() {
        let existing = ["admin"];
        assert_eq!(
            check_for_url_proof_id("Admin", &existing, 1, 21),
            Err(IdError::AlreadyExists)
        );
    }

    #[test]
    fn length_limits() {
        assert_eq!(check_for_url_proof_id("  ", NONE, 1, 21), Err(IdError::TooShort(1)));
        let long = "a".repeat(22);
        assert_eq!(
            check_for_url_proof_id(&long, NONE, 1, 21).unwrap_err().to_string(),
            "Must have less than 21 characters"
        );
        assert!(check_for_url_proof_id(&"a".repeat(21), NONE, 1, 21).is_ok());
    }
}
