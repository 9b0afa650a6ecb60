//! Session and preference state.
//!
//! Three small state objects, each with a single owner: the auth flow owns
//! [`AuthState`], preferences own [`ThemeState`], and the signed-in profile
//! decides [`RoleState`]. [`AppState`] groups them and is passed explicitly
//! to whatever needs it.

use crate::Context;
use crate::error::{ErrorKind, Result};
use docshelf_client::{ProfileChanges, Session, SignUpOutcome};
use docshelf_model::{Role, Theme, UserProfile};
use time::OffsetDateTime;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct AuthState {
    session: Option<Session>,
}
impl AuthState {
    /// The current session, or [`NotSignedIn`](ErrorKind::NotSignedIn).
    pub fn session(&self) -> Result<&Session> {
        match &self.session {
            Some(session) => Ok(session),
            None => exn::bail!(ErrorKind::NotSignedIn),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    /// Signed in with a session that hasn't passed its expiry yet.
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        self.session.as_ref().is_some_and(|session| !session.is_expired_at(now))
    }

    pub fn set(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn clear(&mut self) -> Option<Session> {
        self.session.take()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThemeState {
    preference: Theme,
}
impl ThemeState {
    pub fn preference(&self) -> Theme {
        self.preference
    }

    /// Returns whether the preference changed.
    pub fn set(&mut self, theme: Theme) -> bool {
        std::mem::replace(&mut self.preference, theme) != theme
    }

    /// The theme to render with, resolving `system` against the platform.
    pub fn effective(&self, system_prefers_dark: bool) -> Theme {
        match self.preference {
            Theme::System if system_prefers_dark => Theme::Dark,
            Theme::System => Theme::Light,
            theme => theme,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleState {
    role: Role,
}
impl RoleState {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set(&mut self, role: Role) {
        self.role = role;
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub auth: AuthState,
    pub theme: ThemeState,
    pub role: RoleState,
    /// Loaded on sign-in; absent when the backend had no profile row.
    pub profile: Option<UserProfile>,
}

impl AppState {
    pub fn session(&self) -> Result<&Session> {
        self.auth.session()
    }

    /// Sign in and load the user's profile. A missing or unreadable profile
    /// is not fatal: preferences fall back to their defaults.
    #[instrument(level = "debug", skip(self, ctx, password))]
    pub async fn sign_in(&mut self, ctx: &Context, email: &str, password: &str) -> Result<&Session> {
        let session = ctx.backend.sign_in(email.trim(), password).await.map_err(ErrorKind::backend)?;
        tracing::info!(user = %session.user_id(), "Signed in");
        self.start(ctx, session).await;
        self.auth.session()
    }

    #[instrument(level = "debug", skip(self, ctx, password))]
    pub async fn sign_up(&mut self, ctx: &Context, email: &str, password: &str) -> Result<SignUpOutcome> {
        let outcome = ctx.backend.sign_up(email.trim(), password).await.map_err(ErrorKind::backend)?;
        match &outcome {
            SignUpOutcome::SignedIn(session) => self.start(ctx, session.clone()).await,
            SignUpOutcome::ConfirmationRequired { email } => {
                tracing::info!(email, "Account created, awaiting email confirmation");
            },
        }
        Ok(outcome)
    }

    async fn start(&mut self, ctx: &Context, session: Session) {
        match ctx.backend.profile(&session).await {
            Ok(profile) => {
                self.theme.set(profile.theme);
                self.role.set(profile.role);
                self.profile = Some(profile);
            },
            Err(err) => {
                tracing::warn!(error = ?err, "Could not load profile, using defaults");
                self.theme = ThemeState::default();
                self.role = RoleState::default();
                self.profile = None;
            },
        }
        self.auth.set(session);
    }

    /// Local state is always cleared, even if revoking the session
    /// server-side fails.
    #[instrument(level = "debug", skip_all)]
    pub async fn sign_out(&mut self, ctx: &Context) -> Result<()> {
        self.theme = ThemeState::default();
        self.role = RoleState::default();
        self.profile = None;
        match self.auth.clear() {
            Some(session) => ctx.backend.sign_out(&session).await.map_err(ErrorKind::backend),
            None => Ok(()),
        }
    }

    /// Change the theme preference, persisting it to the profile when signed
    /// in.
    pub async fn set_theme(&mut self, ctx: &Context, theme: Theme) -> Result<()> {
        if !self.theme.set(theme) {
            return Ok(());
        }
        let Ok(session) = self.auth.session() else {
            return Ok(());
        };
        let changes = ProfileChanges {
            theme: Some(theme),
            ..Default::default()
        };
        let profile = ctx.backend.update_profile(session, &changes).await.map_err(ErrorKind::backend)?;
        self.profile = Some(profile);
        Ok(())
    }
}
