//! Share links.
//!
//! A share link is `<origin>/share/<document id>?token=<token>&access=<level>`.
//! The token is 13 random base-36 characters. It is never stored nor checked:
//! whoever opens the link sees the document only if the backend lets them
//! (public documents, or the owner). It exists so links look like the ones
//! users expect, and so a future server-side check has something to verify.

use crate::error::{ErrorKind, Result};
use docshelf_model::{AccessLevel, DocumentId};
use exn::{OptionExt, ResultExt};
use rand::Rng;
use std::fmt::{Display, Formatter, Result as FmtResult};
use url::Url;

pub const TOKEN_LENGTH: usize = 13;
const TOKEN_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SHARE_SEGMENT: &str = "share";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub document: DocumentId,
    pub token: String,
    pub access: AccessLevel,
}

impl ShareLink {
    pub fn new(document: DocumentId, access: AccessLevel) -> Self {
        Self::with_rng(document, access, &mut rand::rng())
    }

    pub fn with_rng(document: DocumentId, access: AccessLevel, rng: &mut impl Rng) -> Self {
        let token = (0..TOKEN_LENGTH)
            .map(|_| char::from(TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())]))
            .collect();
        Self { document, token, access }
    }

    /// The full link under `origin`. A trailing slash on the origin is
    /// ignored.
    pub fn to_url(&self, origin: &str) -> String {
        format!(
            "{}/{SHARE_SEGMENT}/{}?token={}&access={}",
            origin.trim_end_matches('/'),
            self.document,
            self.token,
            self.access
        )
    }

    /// Parse a link produced by [`to_url`](Self::to_url). A missing `access`
    /// means view access; a missing token is an empty one.
    pub fn parse(link: &str) -> Result<Self> {
        let invalid = || ErrorKind::invalid(format!("'{link}' is not a share link."));
        let url = Url::parse(link.trim()).or_raise(invalid)?;
        let segments: Vec<&str> = url.path_segments().ok_or_raise(invalid)?.filter(|s| !s.is_empty()).collect();
        let [SHARE_SEGMENT, id] = segments.as_slice() else {
            exn::bail!(invalid());
        };
        let document = id.parse::<DocumentId>().or_raise(invalid)?;
        let mut token = String::new();
        let mut access = AccessLevel::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "token" => token = value.into_owned(),
                "access" => access = value.parse::<AccessLevel>().or_raise(invalid)?,
                _ => {},
            }
        }
        Ok(Self { document, token, access })
    }
}

impl Display for ShareLink {
    /// Origin-relative form, e.g. `/share/<id>?token=...&access=view`.
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "/{SHARE_SEGMENT}/{}?token={}&access={}",
            self.document, self.token, self.access
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;

    const DOCUMENT: &str = "6c0f1c43-5d4e-4d1c-9c1e-2b3f1c6a9f10";

    #[test]
    fn test_token_shape() {
        let link = ShareLink::new(DOCUMENT.parse().unwrap(), AccessLevel::Edit);
        assert_eq!(link.token.len(), TOKEN_LENGTH);
        assert!(link.token.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }

    #[test]
    fn test_seeded_tokens_are_reproducible() {
        let a = ShareLink::with_rng(DOCUMENT.parse().unwrap(), AccessLevel::View, &mut StdRng::seed_from_u64(7));
        let b = ShareLink::with_rng(DOCUMENT.parse().unwrap(), AccessLevel::View, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_url_layout() {
        let link = ShareLink {
            document: DOCUMENT.parse().unwrap(),
            token: "abc123def456g".to_string(),
            access: AccessLevel::Comment,
        };
        assert_eq!(
            link.to_url("https://docs.example.com/"),
            format!("https://docs.example.com/share/{DOCUMENT}?token=abc123def456g&access=comment")
        );
        assert_eq!(link.to_string(), format!("/share/{DOCUMENT}?token=abc123def456g&access=comment"));
        assert_eq!(ShareLink::parse(&link.to_url("https://docs.example.com")).unwrap(), link);
    }

    #[test]
    fn test_parse_defaults_to_view() {
        let link = ShareLink::parse(&format!("http://localhost:5173/share/{DOCUMENT}")).unwrap();
        assert_eq!(link.access, AccessLevel::View);
        assert!(link.token.is_empty());
    }

    #[rstest]
    #[case("not a url")]
    #[case("https://docs.example.com/document/6c0f1c43-5d4e-4d1c-9c1e-2b3f1c6a9f10")]
    #[case("https://docs.example.com/share/not-an-id?token=x")]
    #[case("https://docs.example.com/share/6c0f1c43-5d4e-4d1c-9c1e-2b3f1c6a9f10?access=own")]
    fn test_parse_rejects(#[case] link: &str) {
        let err = ShareLink::parse(link).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }
}
