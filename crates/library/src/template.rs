//! Object path templating for uploads.
//!
//! Converts upload metadata into bucket object paths using user-configured
//! [upon] templates. The template syntax follows upon's Mustache-like
//! conventions (`{{ variable }}`, `{{ value|formatter }}`), extended with:
//!
//! - **`slug`**: Converts strings to URL-safe slugs, stripping quotation
//!   marks first to avoid artifacts like leading/trailing hyphens. A string
//!   with nothing sluggable left becomes `file`.
//! - **`truncate`**: Truncates strings to a maximum byte length at a
//!   character boundary, usable as either `truncate(value, n)` or
//!   `{{ value|truncate: n }}`.
//!
//! # Template Variables
//!
//! | Variable | Type     | Description                                  |
//! |----------|----------|----------------------------------------------|
//! | `user`   | `String` | Owning user id                               |
//! | `millis` | `i64`    | Upload time, milliseconds since Unix epoch   |
//! | `stem`   | `String` | Original file name without its extension     |
//! | `kind`   | `String` | `pdf` or `image`                             |
//!
//! # Example
//!
//! ```
//! use docshelf_library::{PathGenerator, PathParameters};
//! use docshelf_model::{FileKind, UserId};
//!
//! let generator: PathGenerator = "{{ kind }}/{{ millis }}_{{ stem|slug }}".parse().unwrap();
//! let parameters = PathParameters {
//!     user: UserId::new(uuid::Uuid::nil()),
//!     millis: 1_700_000_000_000,
//!     stem: "Tax Return 2024",
//!     kind: FileKind::Pdf,
//! };
//! let path = generator.generate_with_ext(&parameters, "pdf").unwrap();
//! assert_eq!(path, "pdf/1700000000000_tax-return-2024.pdf");
//! ```

use crate::error::{Error, ErrorKind, Result};
use docshelf_model::{FileKind, UserId};
use docshelf_storage::validate_path;
use exn::ResultExt;
use std::str::FromStr;
use tracing::instrument;
use upon::{Engine, Template};

/// Everything a path template can refer to.
#[derive(Debug, Clone, Copy)]
pub struct PathParameters<'a> {
    pub user: UserId,
    pub millis: i64,
    pub stem: &'a str,
    pub kind: FileKind,
}

/// Generates bucket object paths from upload metadata and a user-defined
/// template string.
///
/// Constructed via [`FromStr`], which compiles the template eagerly so that
/// syntax errors surface at creation time rather than at render time.
///
/// Generated paths are normalized (trimmed, deduplicated separators) and
/// validated by [`docshelf_storage::validate_path`] so they can never escape
/// the bucket root.
pub struct PathGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for PathGenerator {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }
}
impl PathGenerator {
    /// Renders the template, returning the normalized path without any file
    /// extension.
    #[instrument(level = "debug", skip_all, fields(stem = parameters.stem))]
    pub fn generate(&self, parameters: &PathParameters<'_>) -> Result<String> {
        let path = self
            .template
            .render(&self.engine, Self::parameters(parameters))
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        Self::normalize(path)
    }

    /// Renders the template and appends a file extension. Both `"pdf"` and
    /// `".pdf"` produce the same result.
    pub fn generate_with_ext(&self, parameters: &PathParameters<'_>, ext: impl AsRef<str>) -> Result<String> {
        let path = self.generate(parameters)?;
        Ok(format!("{path}.{}", ext.as_ref().trim().trim_matches('.')))
    }

    fn normalize(s: impl Into<String>) -> Result<String> {
        let path = s.into().trim().split('/').map(str::trim).collect::<Vec<_>>().join("/");
        let path = validate_path(&path).or_raise(|| ErrorKind::Template)?;
        if path.is_empty() {
            exn::bail!(ErrorKind::Template);
        }
        Ok(path)
    }

    fn parameters(parameters: &PathParameters<'_>) -> upon::Value {
        upon::value! {
            user: parameters.user.to_string(),
            millis: parameters.millis,
            stem: parameters.stem,
            kind: parameters.kind.as_str(),
        }
    }
}

/// Custom [`upon`] extensions for path-safe string manipulation.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    const EMPTY_SLUG: &str = "file";

    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                // Various quotation marks: '"''""„"`«»
                let marks = [
                    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}',
                    '\u{0060}', '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
                ];
                let stripped: String = s.chars().filter(|c| !marks.contains(c)).collect();
                let slug = slugify!(&stripped);
                write!(f, "{}", if slug.is_empty() { EMPTY_SLUG } else { slug.as_str() })?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> String {
        s[..s.floor_char_boundary(max_bytes)].to_string()
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("slug", slug_formatter);
        engine.add_function("truncate", truncate_to_char_boundary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshelf_config::DEFAULT_PATH_TEMPLATE;
    use rstest::rstest;

    const USER: &str = "0b7a4b9e-1d33-4b8a-8f0e-52c9e8b1a7d2";

    fn parameters(stem: &str) -> PathParameters<'_> {
        PathParameters {
            user: USER.parse().unwrap(),
            millis: 1_700_000_000_000,
            stem,
            kind: FileKind::Image,
        }
    }

    #[test]
    fn test_default_layout() {
        let generator: PathGenerator = DEFAULT_PATH_TEMPLATE.parse().unwrap();
        let path = generator.generate_with_ext(&parameters("Tax Return 2024"), "pdf").unwrap();
        assert_eq!(path, format!("{USER}/1700000000000_tax-return-2024.pdf"));
    }

    #[rstest]
    #[case("\"Hello\" World's 'Test'", "hello-worlds-test")]
    #[case("Scan 001 (final)", "scan-001-final")]
    #[case("???", "file")]
    #[case("", "file")]
    fn test_slug(#[case] stem: &str, #[case] expected: &str) {
        let generator: PathGenerator = "{{ stem|slug }}".parse().unwrap();
        assert_eq!(generator.generate(&parameters(stem)).unwrap(), expected);
    }

    #[test]
    fn test_truncate_filter_function() {
        let generator: PathGenerator = "{{ stem|truncate: 10|slug }}".parse().unwrap();
        // "A Very Lon" truncated to 10 bytes, then slugified
        assert_eq!(generator.generate(&parameters("A Very Long Title Indeed")).unwrap(), "a-very-lon");
    }

    #[test]
    fn test_extension_is_normalized() {
        let generator: PathGenerator = "{{ kind }}/{{ millis }}".parse().unwrap();
        let path = generator.generate_with_ext(&parameters("x"), ".png").unwrap();
        assert_eq!(path, "image/1700000000000.png");
    }

    #[test]
    fn test_syntax_errors_fail_early() {
        let err = "{{ stem".parse::<PathGenerator>().err().unwrap();
        assert_eq!(&*err, &ErrorKind::Template);
    }

    #[rstest]
    #[case("../{{ stem|slug }}")]
    #[case("{{ missing }}")]
    #[case("  /  ")]
    fn test_unusable_paths(#[case] template: &str) {
        let generator: PathGenerator = template.parse().unwrap();
        let err = generator.generate(&parameters("x")).unwrap_err();
        assert_eq!(&*err, &ErrorKind::Template);
    }
}
