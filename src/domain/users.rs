//! Credential rules for registration and login.

use super::error::DomainError;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 32;
pub const PASSWORD_MIN_CHARS: usize = 8;
pub const PASSWORD_MAX_CHARS: usize = 64;

pub fn validate_username(username: &str) -> Result<(), DomainError> {
    let length = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&length) {
        return Err(DomainError::validation(
            "username",
            format!("must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters"),
        ));
    }
    if !username.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(DomainError::validation(
            "username",
            "must contain only letters and numbers",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    let length = password.chars().count();
    if !(PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&length) {
        return Err(DomainError::validation(
            "password",
            format!("must be between {PASSWORD_MIN_CHARS} and {PASSWORD_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_must_be_alphanumeric() {
        assert!(validate_username("alice42").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("alice_42").is_err());
        assert!(validate_username(&"a".repeat(USERNAME_MAX_CHARS + 1)).is_err());
    }

    #[test]
    fn password_length_is_bounded() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
        assert!(validate_password(&"p".repeat(PASSWORD_MAX_CHARS + 1)).is_err());
    }
}
