use crate::error::{Error, ErrorKind, Result};
use docshelf_model::FileKind;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

/// Hard upper bound on upload size: 50 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";
/// PDF readers accept the header anywhere in the first kilobyte.
const PDF_HEADER_WINDOW: usize = 1024;
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";
const BMP_MAGIC: &[u8] = b"BM";
const TIFF_LE_MAGIC: [u8; 4] = [0x49, 0x49, 0x2A, 0x00];
const TIFF_BE_MAGIC: [u8; 4] = [0x4D, 0x4D, 0x00, 0x2A];
const RIFF_MAGIC: &[u8] = b"RIFF";
const WEBP_MAGIC: &[u8] = b"WEBP";

/// One of the accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Pdf,
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Webp,
}

impl MediaType {
    pub const ALL: [MediaType; 7] = [
        MediaType::Pdf,
        MediaType::Png,
        MediaType::Jpeg,
        MediaType::Gif,
        MediaType::Bmp,
        MediaType::Tiff,
        MediaType::Webp,
    ];

    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Gif => "image/gif",
            MediaType::Bmp => "image/bmp",
            MediaType::Tiff => "image/tiff",
            MediaType::Webp => "image/webp",
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Pdf => "pdf",
            MediaType::Png => "png",
            MediaType::Jpeg => "jpg",
            MediaType::Gif => "gif",
            MediaType::Bmp => "bmp",
            MediaType::Tiff => "tiff",
            MediaType::Webp => "webp",
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            MediaType::Pdf => FileKind::Pdf,
            _ => FileKind::Image,
        }
    }

    /// Guess from a file extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_ascii_lowercase().as_str() {
                "pdf" => Some(MediaType::Pdf),
                "png" => Some(MediaType::Png),
                "jpg" | "jpeg" | "jpe" => Some(MediaType::Jpeg),
                "gif" => Some(MediaType::Gif),
                "bmp" => Some(MediaType::Bmp),
                "tif" | "tiff" => Some(MediaType::Tiff),
                "webp" => Some(MediaType::Webp),
                _ => None,
            })
    }

    /// Detect the format from magic bytes.
    ///
    /// Image signatures sit at offset zero and win over a `%PDF-` that merely
    /// appears somewhere in the first kilobyte.
    ///
    /// Returns `None` if no signature matches or the input is too short.
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&PNG_MAGIC) {
            return Some(MediaType::Png);
        }
        if bytes.starts_with(&JPEG_MAGIC) {
            return Some(MediaType::Jpeg);
        }
        if bytes.starts_with(GIF87_MAGIC) || bytes.starts_with(GIF89_MAGIC) {
            return Some(MediaType::Gif);
        }
        if bytes.starts_with(&TIFF_LE_MAGIC) || bytes.starts_with(&TIFF_BE_MAGIC) {
            return Some(MediaType::Tiff);
        }
        if bytes.starts_with(RIFF_MAGIC) && bytes.get(8..12) == Some(WEBP_MAGIC) {
            return Some(MediaType::Webp);
        }
        // Two bytes is a weak signature; require a plausible header length.
        if bytes.starts_with(BMP_MAGIC) && bytes.len() >= 26 {
            return Some(MediaType::Bmp);
        }
        let head = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
        memchr::memmem::find(head, PDF_MAGIC).map(|_| MediaType::Pdf)
    }
}

impl FromStr for MediaType {
    type Err = Error;
    /// Parses a MIME type. Parameters (`; charset=...`) are ignored.
    fn from_str(s: &str) -> Result<Self> {
        let essence = s.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        Ok(match essence.as_str() {
            "application/pdf" => MediaType::Pdf,
            "image/png" => MediaType::Png,
            "image/jpeg" | "image/jpg" | "image/pjpeg" => MediaType::Jpeg,
            "image/gif" => MediaType::Gif,
            "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => MediaType::Bmp,
            "image/tiff" => MediaType::Tiff,
            "image/webp" => MediaType::Webp,
            _ => exn::bail!(ErrorKind::UnsupportedType(s.trim().to_string())),
        })
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.mime())
    }
}

/// Checks an upload before anything touches the network.
///
/// The type comes from `declared_mime` when the caller knows it, otherwise
/// from the file name's extension. It must be one of the accepted formats,
/// the content must be non-empty and within `max_size` (never more than
/// [`MAX_UPLOAD_BYTES`]), and the content's magic bytes must agree with the
/// type.
#[tracing::instrument(level = "debug", skip(data), fields(size = data.len()))]
pub fn validate_upload(file_name: &str, declared_mime: Option<&str>, data: &[u8], max_size: u64) -> Result<MediaType> {
    let declared = match declared_mime.map(str::trim).filter(|mime| !mime.is_empty()) {
        // Browsers and tools fall back to octet-stream when they don't know.
        Some(mime) if !mime.eq_ignore_ascii_case("application/octet-stream") => mime.parse::<MediaType>()?,
        _ => MediaType::from_path(file_name).ok_or_else(|| {
            let extension = Path::new(file_name).extension().and_then(|ext| ext.to_str()).unwrap_or("unknown");
            Error::from(ErrorKind::UnsupportedType(format!(".{extension}")))
        })?,
    };
    let size = data.len() as u64;
    if size == 0 {
        exn::bail!(ErrorKind::Empty);
    }
    let limit = max_size.min(MAX_UPLOAD_BYTES);
    if size > limit {
        exn::bail!(ErrorKind::TooLarge { size, limit });
    }
    match MediaType::from_magic_bytes(data) {
        Some(detected) if detected == declared => Ok(declared),
        Some(detected) => exn::bail!(ErrorKind::ContentMismatch {
            declared: declared.mime(),
            detected: detected.mime(),
        }),
        None => exn::bail!(ErrorKind::ContentMismatch {
            declared: declared.mime(),
            detected: "unrecognised data",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample(media: MediaType) -> Vec<u8> {
        let mut bytes = match media {
            MediaType::Pdf => b"%PDF-1.7\n".to_vec(),
            MediaType::Png => PNG_MAGIC.to_vec(),
            MediaType::Jpeg => vec![0xFF, 0xD8, 0xFF, 0xE0],
            MediaType::Gif => b"GIF89a".to_vec(),
            MediaType::Bmp => b"BM".to_vec(),
            MediaType::Tiff => TIFF_LE_MAGIC.to_vec(),
            MediaType::Webp => b"RIFF\x10\x00\x00\x00WEBPVP8 ".to_vec(),
        };
        bytes.resize(64, 0);
        bytes
    }

    #[rstest]
    #[case("report.pdf", Some(MediaType::Pdf))]
    #[case("SCAN.JPEG", Some(MediaType::Jpeg))]
    #[case("photo.jpg", Some(MediaType::Jpeg))]
    #[case("dir/page.tif", Some(MediaType::Tiff))]
    #[case("anim.webp", Some(MediaType::Webp))]
    #[case("notes.txt", None)]
    #[case("no_extension", None)]
    fn test_from_path(#[case] name: &str, #[case] expected: Option<MediaType>) {
        assert_eq!(MediaType::from_path(name), expected);
    }

    #[rstest]
    #[case("application/pdf", MediaType::Pdf)]
    #[case("image/jpg", MediaType::Jpeg)]
    #[case("IMAGE/PNG", MediaType::Png)]
    #[case("image/webp; q=0.9", MediaType::Webp)]
    fn test_parse_mime(#[case] mime: &str, #[case] expected: MediaType) {
        assert_eq!(mime.parse::<MediaType>().unwrap(), expected);
    }

    #[test]
    fn test_magic_bytes_detect_every_type() {
        for media in MediaType::ALL {
            assert_eq!(MediaType::from_magic_bytes(&sample(media)), Some(media), "{media}");
        }
        assert_eq!(MediaType::from_magic_bytes(b"plain text"), None);
        assert_eq!(MediaType::from_magic_bytes(b""), None);
        // PDF header after some leading garbage.
        assert_eq!(MediaType::from_magic_bytes(b"\r\n\r\n%PDF-1.4"), Some(MediaType::Pdf));
    }

    #[test]
    fn test_image_with_pdf_marker_in_metadata() {
        let mut png = PNG_MAGIC.to_vec();
        png.extend_from_slice(b"\0\0\0\x10tEXtComment\0%PDF-x");
        png.resize(64, 0);
        assert_eq!(MediaType::from_magic_bytes(&png), Some(MediaType::Png));
        assert_eq!(validate_upload("scan.png", Some("image/png"), &png, MAX_UPLOAD_BYTES).unwrap(), MediaType::Png);

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xFE, 0x00, 0x0A];
        jpeg.extend_from_slice(b"%PDF-1.7");
        jpeg.resize(64, 0);
        assert_eq!(MediaType::from_magic_bytes(&jpeg), Some(MediaType::Jpeg));
    }

    #[rstest]
    #[case("a.pdf", None)]
    #[case("upload", Some("application/pdf"))]
    #[case("a.pdf", Some("application/octet-stream"))]
    #[case("a.pdf", Some(""))]
    fn test_validate_accepts(#[case] name: &str, #[case] mime: Option<&str>) {
        let data = sample(MediaType::Pdf);
        assert_eq!(validate_upload(name, mime, &data, MAX_UPLOAD_BYTES).unwrap(), MediaType::Pdf);
    }

    #[test]
    fn test_octet_stream_falls_back_to_extension() {
        let data = sample(MediaType::Pdf);
        let err = validate_upload("upload.bin", Some("application/octet-stream"), &data, MAX_UPLOAD_BYTES).unwrap_err();
        assert_eq!(&*err, &ErrorKind::UnsupportedType(".bin".to_string()));
    }

    #[test]
    fn test_validate_rejects_unsupported() {
        let err = validate_upload("notes.txt", None, b"hello", MAX_UPLOAD_BYTES).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedType(_)));
        let err = validate_upload("a.svg", Some("image/svg+xml"), b"<svg/>", MAX_UPLOAD_BYTES).unwrap_err();
        assert_eq!(&*err, &ErrorKind::UnsupportedType("image/svg+xml".to_string()));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let err = validate_upload("a.pdf", None, b"", MAX_UPLOAD_BYTES).unwrap_err();
        assert_eq!(&*err, &ErrorKind::Empty);
    }

    #[test]
    fn test_validate_size_limit() {
        let data = sample(MediaType::Png);
        let err = validate_upload("a.png", None, &data, 63).unwrap_err();
        assert_eq!(&*err, &ErrorKind::TooLarge { size: 64, limit: 63 });
        assert!(validate_upload("a.png", None, &data, 64).is_ok());
        // Configured limits can't raise the hard cap.
        let mut huge = sample(MediaType::Png);
        huge.resize(MAX_UPLOAD_BYTES as usize + 1, 0);
        let err = validate_upload("a.png", None, &huge, u64::MAX).unwrap_err();
        assert!(matches!(&*err, ErrorKind::TooLarge { limit: MAX_UPLOAD_BYTES, .. }));
    }

    #[test]
    fn test_validate_rejects_mismatch() {
        let err = validate_upload("a.png", None, &sample(MediaType::Jpeg), MAX_UPLOAD_BYTES).unwrap_err();
        assert_eq!(
            &*err,
            &ErrorKind::ContentMismatch {
                declared: "image/png",
                detected: "image/jpeg"
            }
        );
        let err = validate_upload("a.pdf", None, b"not really a pdf", MAX_UPLOAD_BYTES).unwrap_err();
        assert!(matches!(&*err, ErrorKind::ContentMismatch { detected: "unrecognised data", .. }));
    }
}
