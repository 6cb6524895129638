//! Name rules for secrets and vaults.
//!
//! Secret names are also the remote store's keys, so they follow the
//! Key Vault naming rules rather than anything looser.

use crate::errors::{PawError, Result};

/// Validate that a secret name is acceptable to the remote store.
///
/// Allowed: ASCII letters, digits, hyphens. 1 to 127 characters.
pub fn validate_secret_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| PawError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("secret name cannot be empty"));
    }
    if name.len() > 127 {
        return Err(invalid("secret name cannot exceed 127 characters"));
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(invalid(
            "only ASCII letters, digits, and hyphens are allowed",
        ));
    }
    Ok(())
}

/// Validate a vault name.
///
/// 3 to 24 characters of ASCII letters, digits and hyphens. Must start
/// with a letter and must not end with a hyphen.
pub fn validate_vault_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| PawError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.len() < 3 || name.len() > 24 {
        return Err(invalid("vault name must be 3 to 24 characters"));
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(invalid(
            "only ASCII letters, digits, and hyphens are allowed",
        ));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(invalid("vault name must start with a letter"));
    }
    if name.ends_with('-') {
        return Err(invalid("vault name cannot end with a hyphen"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_secret_names() {
        assert!(validate_secret_name("gmail").is_ok());
        assert!(validate_secret_name("db-password-2").is_ok());
        assert!(validate_secret_name(&"a".repeat(127)).is_ok());
    }

    #[test]
    fn rejects_bad_secret_names() {
        assert!(validate_secret_name("").is_err());
        assert!(validate_secret_name(&"a".repeat(128)).is_err());
        assert!(validate_secret_name("has space").is_err());
        assert!(validate_secret_name("under_score").is_err());
        assert!(validate_secret_name("dot.ted").is_err());
    }

    #[test]
    fn valid_vault_names() {
        assert!(validate_vault_name("default").is_ok());
        assert!(validate_vault_name("team-vault-01").is_ok());
    }

    #[test]
    fn rejects_bad_vault_names() {
        assert!(validate_vault_name("ab").is_err());
        assert!(validate_vault_name(&"a".repeat(25)).is_err());
        assert!(validate_vault_name("1vault").is_err());
        assert!(validate_vault_name("vault-").is_err());
        assert!(validate_vault_name("my_vault").is_err());
    }
}
