//! Layered configuration for docshelf.
//!
//! Values are merged, later layers winning:
//!
//! 1. built-in defaults;
//! 2. `config.toml`, `config.yaml`/`config.yml` and `config.json` in the
//!    platform config directory, or a single explicitly requested file;
//! 3. environment variables prefixed `DOCSHELF_`, with `__` separating
//!    nested keys (`DOCSHELF_UPLOAD__CONCURRENCY=2`).
//!
//! Every validation failure names the dotted key at fault.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use docshelf_extract::MAX_UPLOAD_BYTES;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Default object path layout: `<user id>/<unix millis>_<slugified stem>`.
/// The file extension is appended after rendering.
pub const DEFAULT_PATH_TEMPLATE: &str = "{{ user }}/{{ millis }}_{{ stem|slug }}";
pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_SHARE_ORIGIN: &str = "http://localhost:5173";
pub const ENV_PREFIX: &str = "DOCSHELF_";

const FILE_STEM: &str = "config";
const FILE_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub share: ShareConfig,
    pub ocr: OcrConfig,
}

/// Where the backend-as-a-service lives. Both values are required by every
/// command that talks to it, but not by local ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}
impl BackendConfig {
    pub fn url(&self) -> Result<&str> {
        match self.url.as_deref() {
            Some(url) => Ok(url),
            None => exn::bail!(ErrorKind::Missing("backend.url")),
        }
    }

    pub fn anon_key(&self) -> Result<&str> {
        match self.anon_key.as_deref() {
            Some(key) => Ok(key),
            None => exn::bail!(ErrorKind::Missing("backend.anon_key")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub pdf_bucket: String,
    pub image_bucket: String,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pdf_bucket: "pdf-documents".to_string(),
            image_bucket: "image-documents".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Per-file limit, never above the hard 50 MiB ceiling.
    pub max_size_bytes: u64,
    pub path_template: String,
    /// How many files upload at once.
    pub concurrency: usize,
}
impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: MAX_UPLOAD_BYTES,
            path_template: DEFAULT_PATH_TEMPLATE.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Origin of the web application that share links point to.
    pub origin: String,
}
impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_SHARE_ORIGIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub language: String,
    /// Recognition engine binary; looked up on `PATH` when unset.
    pub executable: Option<PathBuf>,
}
impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            executable: None,
        }
    }
}

/// Platform config directory, e.g. `~/.config/docshelf` on Linux.
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "docshelf").map(|dirs| dirs.config_dir().to_path_buf())
}

impl Config {
    /// Load and validate configuration from every layer.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(explicit)?)
    }

    /// The merged, unvalidated layers. Callers may merge further providers
    /// (command-line overrides, tests) before calling
    /// [`from_figment`](Self::from_figment).
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = merge_file(figment, path)?;
            },
            None => {
                for path in config_dir().into_iter().flat_map(|dir| {
                    FILE_EXTENSIONS.map(|extension| dir.join(format!("{FILE_STEM}.{extension}")))
                }) {
                    if path.is_file() {
                        tracing::debug!(path = %path.display(), "Found config file");
                        figment = merge_file(figment, &path)?;
                    }
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = match figment.extract() {
            Ok(config) => config,
            Err(err) => {
                let key = if err.path.is_empty() {
                    "<root>".to_string()
                } else {
                    err.path.join(".")
                };
                let kind = ErrorKind::invalid(key, err.kind.to_string());
                return Err(err).or_raise(|| kind);
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.backend.url {
            http_url("backend.url", url)?;
        }
        if self.backend.anon_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            exn::bail!(ErrorKind::invalid("backend.anon_key", "must not be empty"));
        }
        bucket("storage.pdf_bucket", &self.storage.pdf_bucket)?;
        bucket("storage.image_bucket", &self.storage.image_bucket)?;
        if !(1..=MAX_UPLOAD_BYTES).contains(&self.upload.max_size_bytes) {
            exn::bail!(ErrorKind::invalid(
                "upload.max_size_bytes",
                format!("must be between 1 and {MAX_UPLOAD_BYTES}"),
            ));
        }
        if self.upload.path_template.trim().is_empty() {
            exn::bail!(ErrorKind::invalid("upload.path_template", "must not be empty"));
        }
        if self.upload.concurrency == 0 {
            exn::bail!(ErrorKind::invalid("upload.concurrency", "must be at least 1"));
        }
        let origin = http_url("share.origin", &self.share.origin)?;
        if origin.query().is_some() || origin.fragment().is_some() {
            exn::bail!(ErrorKind::invalid("share.origin", "must not carry a query or fragment"));
        }
        if self.ocr.language.trim().is_empty() {
            exn::bail!(ErrorKind::invalid("ocr.language", "must not be empty"));
        }
        Ok(())
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|extension| extension.to_str()).unwrap_or_default();
    Ok(match extension.to_ascii_lowercase().as_str() {
        "toml" => figment.merge(Toml::file_exact(path)),
        "yaml" | "yml" => figment.merge(Yaml::file_exact(path)),
        "json" => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}

fn http_url(key: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).or_raise(|| ErrorKind::invalid(key, format!("'{value}' is not a URL")))?;
    if !matches!(url.scheme(), "http" | "https") {
        exn::bail!(ErrorKind::invalid(key, "must be an http or https URL"));
    }
    Ok(url)
}

fn bucket(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() || value.contains('/') {
        exn::bail!(ErrorKind::invalid(key, "must be a non-empty bucket name without '/'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn key_of(err: &crate::error::Error) -> String {
        match &**err {
            ErrorKind::Invalid { key, .. } => key.clone(),
            other => panic!("expected an invalid key, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.upload.max_size_bytes, 52_428_800);
        assert_eq!(config.storage.pdf_bucket, "pdf-documents");
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(&*config.backend.url().unwrap_err(), &ErrorKind::Missing("backend.url"));
    }

    #[rstest]
    #[case(
        "config.toml",
        "[backend]\nurl = \"https://project.example.co\"\nanon_key = \"anon\"\n[upload]\nconcurrency = 5\n"
    )]
    #[case(
        "config.yaml",
        "backend:\n  url: https://project.example.co\n  anon_key: anon\nupload:\n  concurrency: 5\n"
    )]
    #[case(
        "config.json",
        r#"{"backend": {"url": "https://project.example.co", "anon_key": "anon"}, "upload": {"concurrency": 5}}"#
    )]
    fn test_load_file_formats(#[case] name: &str, #[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, name, contents);
        let config = Config::from_figment(Config::figment(Some(&path)).unwrap()).unwrap();
        assert_eq!(config.backend.url().unwrap(), "https://project.example.co");
        assert_eq!(config.backend.anon_key().unwrap(), "anon");
        assert_eq!(config.upload.concurrency, 5);
        // Untouched keys keep their defaults.
        assert_eq!(config.upload.path_template, DEFAULT_PATH_TEMPLATE);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = Config::figment(Some(&path)).unwrap_err();
        assert_eq!(&*err, &ErrorKind::NotFound(path));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.ini", "[backend]\n");
        let err = Config::figment(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_type_errors_name_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.toml", "[upload]\nconcurrency = \"many\"\n");
        let err = Config::from_figment(Config::figment(Some(&path)).unwrap()).unwrap_err();
        assert_eq!(key_of(&err), "upload.concurrency");
    }

    #[test]
    fn test_later_layers_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.toml", "[ocr]\nlanguage = \"deu\"\n");
        let figment = Config::figment(Some(&path)).unwrap().merge(("ocr.language", "eng+fra"));
        assert_eq!(Config::from_figment(figment).unwrap().ocr.language, "eng+fra");
    }

    #[rstest]
    #[case("upload.max_size_bytes", 52_428_801)]
    #[case("upload.max_size_bytes", 0)]
    #[case("upload.concurrency", 0)]
    fn test_numeric_validation_names_the_key(#[case] key: &str, #[case] value: u64) {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge((key, value));
        let err = Config::from_figment(figment).unwrap_err();
        assert_eq!(key_of(&err), key);
    }

    #[rstest]
    #[case("upload.path_template", " ")]
    #[case("backend.url", "ftp://project.example.co")]
    #[case("backend.url", "not a url")]
    #[case("backend.anon_key", "")]
    #[case("storage.pdf_bucket", "a/b")]
    #[case("share.origin", "https://app.example.co/?x=1")]
    #[case("ocr.language", "")]
    fn test_validation_names_the_key(#[case] key: &str, #[case] value: &str) {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge((key, value));
        let err = Config::from_figment(figment).unwrap_err();
        assert_eq!(key_of(&err), key);
    }
}
