use docshelf_model::{AccessToken, UserId};
use time::OffsetDateTime;

/// The authenticated user, as far as the auth service describes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

/// An active session. Lives in memory only, for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: AuthUser,
    pub access_token: AccessToken,
    pub refresh_token: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
}
impl Session {
    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Result of a successful sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The project auto-confirms accounts; the user is signed in.
    SignedIn(Session),
    /// A confirmation email was sent; the user can sign in after confirming.
    ConfirmationRequired { email: String },
}

const AUTH_MESSAGES: [(&str, &str); 6] = [
    ("invalid login credentials", "Invalid email or password. Please try again."),
    (
        "email not confirmed",
        "Please check your email and confirm your account before signing in.",
    ),
    (
        "user already registered",
        "An account with this email already exists. Please sign in instead.",
    ),
    ("password should be at least", "Password must be at least 6 characters long."),
    ("invalid email", "Please enter a valid email address."),
    ("unable to validate email address", "Please enter a valid email address."),
];

/// Turn a raw auth service error into copy fit for users.
///
/// Known messages are matched case-insensitively by substring; anything else
/// passes through unchanged.
///
/// ```
/// use docshelf_client::auth_message;
///
/// assert_eq!(auth_message("Invalid login credentials"), "Invalid email or password. Please try again.");
/// assert_eq!(auth_message("Database is on fire"), "Database is on fire");
/// ```
pub fn auth_message(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    AUTH_MESSAGES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map_or_else(|| raw.to_string(), |(_, message)| message.to_string())
}
