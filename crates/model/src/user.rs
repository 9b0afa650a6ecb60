use crate::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::OffsetDateTime;

crate::identifier!(
    /// Opaque user identifier issued by the authentication service.
    UserId
);

/// Bearer token for authenticated backend requests.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);
impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("AccessToken(***)")
    }
}

/// Role attached to a user profile. Only ever read by this client; the
/// backend decides what each role may do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
}
impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}
impl FromStr for Role {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "member" | "user" => Role::Member,
            "admin" => Role::Admin,
            _ => exn::bail!(ErrorKind::ParseError { field: "role", value: s.to_string() }),
        })
    }
}
impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Preferred colour scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}
impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}
impl FromStr for Theme {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "light" => Theme::Light,
            "dark" => Theme::Dark,
            "system" | "auto" => Theme::System,
            _ => exn::bail!(ErrorKind::ParseError { field: "theme", value: s.to_string() }),
        })
    }
}
impl Display for Theme {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A row of the `user_profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub theme: Theme,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
impl UserProfile {
    /// The name to greet the user with: display name if set, otherwise the
    /// local part of the email address.
    pub fn greeting_name(&self) -> &str {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("Ada"), "ada@example.com", "Ada")]
    #[case(Some("   "), "ada@example.com", "ada")]
    #[case(None, "grace@example.com", "grace")]
    #[case(None, "no-at-sign", "no-at-sign")]
    fn test_greeting_name(#[case] display: Option<&str>, #[case] email: &str, #[case] expected: &str) {
        let profile = UserProfile {
            id: uuid::Uuid::nil().into(),
            email: email.to_string(),
            display_name: display.map(str::to_string),
            role: Role::Member,
            theme: Theme::System,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        assert_eq!(profile.greeting_name(), expected);
    }

    #[test]
    fn test_access_token_is_redacted() {
        let token = AccessToken::new("secret-jwt");
        assert_eq!(format!("{token:?}"), "AccessToken(***)");
        assert_eq!(token.expose(), "secret-jwt");
    }

    #[test]
    fn test_theme_and_role_parse() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert_eq!("auto".parse::<Theme>().unwrap(), Theme::System);
        assert!("sepia".parse::<Theme>().is_err());
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
