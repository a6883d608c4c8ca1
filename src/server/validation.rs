use crate::server::response::ApiError;
use crate::types::UserRole;

const MAX_USERNAME_LEN: usize = 64;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 64;

fn is_valid_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

pub fn validate_username(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("Username can not be empty"));
    }
    if name.len() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Username can not exceed {MAX_USERNAME_LEN} characters"
        )));
    }
    if !name.chars().all(is_valid_username_char) {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, hyphens, underscores and periods",
        ));
    }
    if name.starts_with('.') || name.starts_with('-') {
        return Err(ApiError::bad_request(
            "Username can not start with a period or a hyphen",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::bad_request("Password can not be empty"));
    }

    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(ApiError::bad_request(format!(
            "Password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        )));
    }

    let lower = password.chars().any(char::is_lowercase);
    let upper = password.chars().any(char::is_uppercase);
    let digit = password.chars().any(|c| c.is_ascii_digit());
    let symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if !(lower && upper && digit && symbol) {
        return Err(ApiError::bad_request(
            "Password must contain a lowercase letter, an uppercase letter, a number and a symbol",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::bad_request("Email can not be empty"));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ApiError::bad_request(format!("Invalid email address: {email}")));
    }
    Ok(())
}

pub fn parse_role(role: &str) -> Result<UserRole, ApiError> {
    UserRole::parse(role)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid user role: {role}")))
}
