//! Upload validation
//!
//! Checks one incoming file against a [`Policy`]. Checks run in a fixed
//! order and the first failure wins:
//!
//! 1. file presence
//! 2. transport error code
//! 3. upload directory writability
//! 4. minimum size
//! 5. maximum size
//! 6. MIME type
//! 7. file extension
//!
//! Validation never touches the incoming file.

use super::codes::{ErrorKind, UPLOAD_ERR_OK};
use super::naming::{sanitize_client_filename, split_basename};
use super::IncomingFile;
use crate::policy::{is_writable_dir, AllowList, Policy};

/// Pass, or the kind of the first violated rule.
pub type ValidationOutcome = Result<(), ErrorKind>;

/// Validate `file` against `policy`.
pub fn validate(file: &IncomingFile, policy: &Policy) -> ValidationOutcome {
    // A missing source with a transport status is reported as that status.
    if file.source.is_none() && file.transport_error == UPLOAD_ERR_OK {
        return Err(ErrorKind::NoFile);
    }

    if file.transport_error != UPLOAD_ERR_OK {
        return Err(ErrorKind::from_code(file.transport_error));
    }

    if !is_writable_dir(&policy.upload_dir) {
        tracing::error!(
            policy = %policy.name,
            upload_dir = %policy.upload_dir.display(),
            "Upload directory is not writable"
        );
        return Err(ErrorKind::CantWrite);
    }

    if file.size < policy.min_file_size {
        return Err(ErrorKind::MinFileSize);
    }

    if file.size > policy.max_file_size {
        return Err(ErrorKind::MaxFileSize);
    }

    if !validate_mime_type(&file.declared_mime_type, &policy.mime_types) {
        return Err(ErrorKind::InvalidMimeType);
    }

    let client_filename = sanitize_client_filename(&file.client_filename);
    let (_, ext, _) = split_basename(&client_filename);
    if !validate_file_extension(&ext, &policy.file_extensions) {
        return Err(ErrorKind::InvalidFileExtension);
    }

    Ok(())
}

/// Match a MIME type against an allow-list.
///
/// Major types must match exactly; the allowed minor type must match exactly
/// or be `*`. Parameters (`; charset=...`) on the candidate are ignored.
pub fn validate_mime_type(mime: &str, allowed: &AllowList) -> bool {
    let entries = match allowed {
        AllowList::Any => return true,
        AllowList::Only(entries) => entries,
    };

    let essence = mime.split(';').next().unwrap_or_default().trim().to_lowercase();
    let (major, minor) = split_mime(&essence);

    entries.iter().any(|entry| {
        let (allowed_major, allowed_minor) = split_mime(entry);
        major == allowed_major && (allowed_minor == "*" || minor == allowed_minor)
    })
}

/// Case-insensitive membership test of `ext` (without dot) in the allow-list.
pub fn validate_file_extension(ext: &str, allowed: &AllowList) -> bool {
    match allowed {
        AllowList::Any => true,
        AllowList::Only(entries) => {
            let ext = ext.to_lowercase();
            entries.iter().any(|entry| *entry == ext)
        }
    }
}

fn split_mime(mime: &str) -> (&str, &str) {
    mime.split_once('/').unwrap_or((mime, ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::codes;

    fn policy_in(dir: &std::path::Path) -> Policy {
        Policy::new(dir)
    }

    fn text_file(size: u64) -> IncomingFile {
        IncomingFile::new("Upload File 1.txt", "text/plain", size, "/tmp/upload1.txt")
    }

    #[test]
    fn test_validate_mime_type() {
        assert!(validate_mime_type("text/plain", &"text/plain".into()));
        assert!(validate_mime_type("text/plain", &"text/*".into()));
        assert!(validate_mime_type("text/plain", &"*".into()));
        assert!(validate_mime_type("text/plain", &vec!["text/plain"].into()));
        assert!(validate_mime_type("text/plain", &vec!["text/*"].into()));
        assert!(validate_mime_type("TEXT/Plain; charset=utf-8", &"text/plain".into()));

        assert!(!validate_mime_type("text/plain", &"image/png".into()));
        assert!(!validate_mime_type("text/plain", &"image/*".into()));
        assert!(!validate_mime_type("textual", &"text/*".into()));
        assert!(!validate_mime_type("", &"text/*".into()));
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension("txt", &"txt".into()));
        assert!(validate_file_extension("TXT", &vec!["txt"].into()));
        assert!(validate_file_extension("txt", &"*".into()));
        assert!(validate_file_extension("", &"*".into()));

        assert!(!validate_file_extension("txt", &"jpg,png".into()));
        assert!(!validate_file_extension("txt", &vec!["*"].into()));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = text_file(12);
        file.source = None;
        assert_eq!(validate(&file, &policy_in(dir.path())), Err(ErrorKind::NoFile));
    }

    #[test]
    fn test_transport_error_bypasses_other_checks() {
        let file = IncomingFile::failed_transfer(codes::UPLOAD_ERR_PARTIAL);
        let policy = Policy::new("/non-existent-path");
        assert_eq!(validate(&file, &policy), Err(ErrorKind::Partial));

        let file = text_file(0).with_transport_error(42);
        assert_eq!(validate(&file, &policy), Err(ErrorKind::Unknown(42)));
    }

    #[test]
    fn test_unwritable_upload_dir() {
        let policy = Policy::new("/non-existent-path");
        assert_eq!(validate(&text_file(12), &policy), Err(ErrorKind::CantWrite));
    }

    #[test]
    fn test_unwritable_dir_wins_over_size() {
        let policy = Policy::new("/non-existent-path");
        assert_eq!(validate(&text_file(0), &policy), Err(ErrorKind::CantWrite));
    }

    #[test]
    fn test_max_size_wins_over_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = policy_in(dir.path());
        policy.set_max_file_size(10).set_mime_types("image/*");

        assert_eq!(validate(&text_file(11), &policy), Err(ErrorKind::MaxFileSize));
        assert_eq!(validate(&text_file(10), &policy), Err(ErrorKind::InvalidMimeType));
    }

    #[test]
    fn test_size_bounds_are_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = policy_in(dir.path());
        policy.set_min_file_size(5).set_max_file_size(10);

        assert_eq!(validate(&text_file(4), &policy), Err(ErrorKind::MinFileSize));
        assert_eq!(validate(&text_file(5), &policy), Ok(()));
        assert_eq!(validate(&text_file(10), &policy), Ok(()));
        assert_eq!(validate(&text_file(11), &policy), Err(ErrorKind::MaxFileSize));
    }

    #[test]
    fn test_min_size_wins_over_later_checks() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = policy_in(dir.path());
        policy
            .set_mime_types("image/*")
            .set_file_extensions("jpg");

        assert_eq!(validate(&text_file(0), &policy), Err(ErrorKind::MinFileSize));
    }

    #[test]
    fn test_mime_checked_before_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = policy_in(dir.path());
        policy
            .set_mime_types(vec!["image/*"])
            .set_file_extensions(vec!["jpg", "png"]);

        assert_eq!(validate(&text_file(12), &policy), Err(ErrorKind::InvalidMimeType));

        policy.set_mime_types("*");
        assert_eq!(
            validate(&text_file(12), &policy),
            Err(ErrorKind::InvalidFileExtension)
        );
    }

    #[test]
    fn test_extension_uses_trimmed_client_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = policy_in(dir.path());
        policy.set_file_extensions("txt");

        let file = IncomingFile::new("  notes.TXT  ", "text/plain", 3, "/tmp/notes");
        assert_eq!(validate(&file, &policy), Ok(()));
    }
}
