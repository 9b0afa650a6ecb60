use docshelf_model::FileKind;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Storage category. Every uploaded file lands in exactly one bucket, chosen
/// from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Pdf,
    Image,
}
impl Bucket {
    pub fn for_kind(kind: FileKind) -> Self {
        match kind {
            FileKind::Pdf => Bucket::Pdf,
            FileKind::Image => Bucket::Image,
        }
    }

    /// `application/pdf` goes to [`Bucket::Pdf`], any `image/*` type to
    /// [`Bucket::Image`]; everything else has no bucket.
    pub fn for_mime(mime: &str) -> Option<Self> {
        FileKind::from_mime(mime).map(Self::for_kind)
    }
}
impl Display for Bucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Bucket::Pdf => "pdf",
            Bucket::Image => "image",
        })
    }
}

/// Bucket names as configured on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketNames {
    pub pdf: String,
    pub image: String,
}
impl Default for BucketNames {
    fn default() -> Self {
        Self {
            pdf: "pdf-documents".to_string(),
            image: "image-documents".to_string(),
        }
    }
}
impl BucketNames {
    pub fn name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Pdf => &self.pdf,
            Bucket::Image => &self.image,
        }
    }

    /// Reverse lookup from a bucket name.
    pub fn resolve(&self, name: &str) -> Option<Bucket> {
        [Bucket::Pdf, Bucket::Image].into_iter().find(|bucket| self.name(*bucket) == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("application/pdf", Some(Bucket::Pdf))]
    #[case("image/png", Some(Bucket::Image))]
    #[case("image/tiff", Some(Bucket::Image))]
    #[case("application/zip", None)]
    fn test_bucket_for_mime(#[case] mime: &str, #[case] expected: Option<Bucket>) {
        assert_eq!(Bucket::for_mime(mime), expected);
    }

    #[test]
    fn test_default_names() {
        let names = BucketNames::default();
        assert_eq!(names.name(Bucket::Pdf), "pdf-documents");
        assert_eq!(names.name(Bucket::Image), "image-documents");
        assert_eq!(names.resolve("image-documents"), Some(Bucket::Image));
        assert_eq!(names.resolve("avatars"), None);
    }
}
