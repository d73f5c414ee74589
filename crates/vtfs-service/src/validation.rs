//! Parameter validation shared by all operations.

use vtfs_core::FsError;
use vtfs_core::constants::MAX_NAME_LEN;
use vtfs_core::constants::MAX_TOKEN_LEN;

/// Reject empty or oversized namespace tokens.
pub fn validate_token(token: &str) -> Result<(), FsError> {
    if token.is_empty() {
        return Err(FsError::invalid("token must not be empty"));
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(FsError::invalid(format!("token exceeds {MAX_TOKEN_LEN} bytes")));
    }
    Ok(())
}

/// Reject names that cannot exist in any directory.
pub fn validate_name(name: &str) -> Result<(), FsError> {
    if name.is_empty() {
        return Err(FsError::invalid("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::invalid(format!("name exceeds {MAX_NAME_LEN} bytes")));
    }
    Ok(())
}

/// Reject names that must not be bound by create or link.
pub fn validate_new_name(name: &str) -> Result<(), FsError> {
    validate_name(name)?;
    if is_dot_name(name) {
        return Err(FsError::invalid(format!("'{name}' is reserved")));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(FsError::invalid("name contains '/' or NUL"));
    }
    Ok(())
}

/// `.` or `..`
pub fn is_dot_name(name: &str) -> bool {
    name == "." || name == ".."
}

#[cfg(test)]
mod tests {
    use vtfs_core::Errno;

    use super::*;

    #[test]
    fn test_token_bounds() {
        assert!(validate_token("tok").is_ok());
        assert_eq!(validate_token("").unwrap_err().errno(), Errno::Einval);
        assert!(validate_token(&"t".repeat(MAX_TOKEN_LEN)).is_ok());
        assert!(validate_token(&"t".repeat(MAX_TOKEN_LEN + 1)).is_err());
    }

    #[test]
    fn test_name_bounds() {
        assert!(validate_name(&"n".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_name(&"n".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_name("").is_err());
        // Lookups may carry dot names; they simply won't resolve.
        assert!(validate_name("..").is_ok());
    }

    #[test]
    fn test_new_name_rejects_reserved_and_separators() {
        assert!(validate_new_name("f.txt").is_ok());
        assert!(validate_new_name(".hidden").is_ok());
        for bad in [".", "..", "a/b", "nul\0byte"] {
            assert_eq!(validate_new_name(bad).unwrap_err().errno(), Errno::Einval, "{bad:?}");
        }
    }
}
