//! Form payloads posted by the HTML pages.
//!
//! Every field defaults so a missing input reaches the handler's validation
//! instead of failing extraction.

use serde::Deserialize;

pub const MESSAGE_MAX_CHARS: usize = 140;
pub const PASSWORD_MIN_CHARS: usize = 6;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: String,
    pub csrf_token: Option<String>,
}

impl SignupForm {
    pub fn errors(&self) -> Vec<&'static str> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push("Username is required.");
        }
        if !looks_like_email(&self.email) {
            errors.push("Invalid email address.");
        }
        if self.password.chars().count() < PASSWORD_MIN_CHARS {
            errors.push("Password must be at least 6 characters.");
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub csrf_token: Option<String>,
}

impl LoginForm {
    pub fn errors(&self) -> Vec<&'static str> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push("Username is required.");
        }
        if self.password.chars().count() < PASSWORD_MIN_CHARS {
            errors.push("Password must be at least 6 characters.");
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageForm {
    pub text: String,
    pub csrf_token: Option<String>,
}

impl MessageForm {
    pub fn errors(&self) -> Vec<&'static str> {
        let len = self.text.trim().chars().count();
        if len == 0 {
            vec!["Message text is required."]
        } else if len > MESSAGE_MAX_CHARS {
            vec!["Messages are limited to 140 characters."]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: String,
    pub location: String,
    pub password: String,
    pub csrf_token: Option<String>,
}

impl ProfileForm {
    pub fn errors(&self) -> Vec<&'static str> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push("Username is required.");
        }
        if !looks_like_email(&self.email) {
            errors.push("Invalid email address.");
        }
        errors
    }
}

/// Body of the button-only forms (follow, like, delete).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CsrfForm {
    pub csrf_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: Option<String>,
}

fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_requires_fields() {
        let form = SignupForm::default();
        assert_eq!(form.errors().len(), 3);

        let form = SignupForm {
            username: "testuser".into(),
            email: "test@test.com".into(),
            password: "testuser".into(),
            ..Default::default()
        };
        assert!(form.errors().is_empty());
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("test@test.com"));
        assert!(!looks_like_email("test.com"));
        assert!(!looks_like_email("@test.com"));
        assert!(!looks_like_email("test@localhost"));
    }

    #[test]
    fn message_length_limit() {
        let ok = MessageForm {
            text: "x".repeat(MESSAGE_MAX_CHARS),
            csrf_token: None,
        };
        assert!(ok.errors().is_empty());

        let long = MessageForm {
            text: "x".repeat(MESSAGE_MAX_CHARS + 1),
            csrf_token: None,
        };
        assert_eq!(long.errors().len(), 1);

        assert_eq!(MessageForm::default().errors().len(), 1);
    }
}
