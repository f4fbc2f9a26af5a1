use std::fmt;

/// Passwords rejected outright regardless of composition.
/// Matched case-insensitively against the whole password.
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "123456",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty",
    "qwerty123",
    "abc123",
    "letmein",
    "welcome",
    "welcome1",
    "monkey",
    "dragon",
    "master",
    "shadow",
    "superman",
    "michael",
    "football",
    "baseball",
    "iloveyou",
    "trustno1",
    "sunshine",
    "princess",
    "admin",
    "admin123",
    "root",
    "passw0rd",
    "p@ssword",
    "p@ssw0rd",
    "secret",
    "login",
    "starwars",
    "whatever",
    "freedom",
    "hello123",
    "charlie",
    "donald",
    "zaq12wsx",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordViolation {
    TooShort { min_length: usize },
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecial,
    CommonPassword,
    ContainsUsername,
    ContainsEmail,
}

impl fmt::Display for PasswordViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { min_length } => {
                write!(f, "must be at least {min_length} characters long")
            }
            Self::MissingUppercase => f.write_str("must contain an uppercase letter"),
            Self::MissingLowercase => f.write_str("must contain a lowercase letter"),
            Self::MissingDigit => f.write_str("must contain a digit"),
            Self::MissingSpecial => f.write_str("must contain a special character"),
            Self::CommonPassword => f.write_str("is too common"),
            Self::ContainsUsername => f.write_str("cannot contain your username"),
            Self::ContainsEmail => f.write_str("cannot contain your email address"),
        }
    }
}

/// Pure composition check. All rules are evaluated so the caller gets the
/// complete violation list in one pass; an empty result means the password
/// is acceptable.
pub fn validate_password(
    password: &str,
    min_length: usize,
    username: Option<&str>,
    email: Option<&str>,
) -> Vec<PasswordViolation> {
    let mut violations = Vec::new();
    let lowered = password.to_lowercase();

    if password.chars().count() < min_length {
        violations.push(PasswordViolation::TooShort { min_length });
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        violations.push(PasswordViolation::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        violations.push(PasswordViolation::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordViolation::MissingDigit);
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        violations.push(PasswordViolation::MissingSpecial);
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        violations.push(PasswordViolation::CommonPassword);
    }
    if let Some(username) = username {
        if !username.is_empty() && lowered.contains(&username.to_lowercase()) {
            violations.push(PasswordViolation::ContainsUsername);
        }
    }
    if let Some(email) = email {
        let local_part = email.split('@').next().unwrap_or("");
        if !local_part.is_empty() && lowered.contains(&local_part.to_lowercase()) {
            violations.push(PasswordViolation::ContainsEmail);
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptable_password_yields_no_violations() {
        let violations =
            validate_password("Tr0ub4dor&3", 8, Some("alice"), Some("alice@x.com"));
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn all_rules_reported_not_short_circuited() {
        let violations = validate_password("aaaa", 12, None, None);
        assert!(violations.contains(&PasswordViolation::TooShort { min_length: 12 }));
        assert!(violations.contains(&PasswordViolation::MissingUppercase));
        assert!(violations.contains(&PasswordViolation::MissingDigit));
        assert!(violations.contains(&PasswordViolation::MissingSpecial));
        assert!(!violations.contains(&PasswordViolation::MissingLowercase));
    }

    #[test]
    fn username_leak_is_rejected() {
        let violations = validate_password("alice123", 8, Some("alice"), None);
        assert!(violations.contains(&PasswordViolation::ContainsUsername));
        assert_eq!(
            PasswordViolation::ContainsUsername.to_string(),
            "cannot contain your username"
        );
    }

    #[test]
    fn username_match_is_case_insensitive() {
        let violations = validate_password("xXaLiCe99!Zz", 8, Some("Alice"), None);
        assert!(violations.contains(&PasswordViolation::ContainsUsername));
    }

    #[test]
    fn email_local_part_is_rejected() {
        let violations = validate_password("Bob.Smith#1234", 8, None, Some("bob.smith@x.com"));
        assert!(violations.contains(&PasswordViolation::ContainsEmail));
    }

    #[test]
    fn common_passwords_rejected_case_insensitively() {
        let violations = validate_password("P@ssw0rd", 8, None, None);
        assert!(violations.contains(&PasswordViolation::CommonPassword));
    }

    #[test]
    fn referentially_transparent() {
        let a = validate_password("Sp1ky!fence", 8, Some("kai"), Some("kai@x.com"));
        let b = validate_password("Sp1ky!fence", 8, Some("kai"), Some("kai@x.com"));
        assert_eq!(a, b);
    }
}
