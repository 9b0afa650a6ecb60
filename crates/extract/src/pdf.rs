//! Heuristic PDF text scraping.
//!
//! This is not a PDF parser. It finds content streams in the raw bytes,
//! inflates the ones it can, and collects the string operands of the text
//! showing operators inside `BT … ET` blocks. Fonts, encodings and layout
//! are ignored; what can't be read is skipped.

use crate::consts::{
    DICTIONARY_LOOKBEHIND, END_STREAM_KEYWORD, FILTER_REGEX, MAX_INFLATED_STREAM_BYTES, MAX_INFLATED_TOTAL_BYTES,
    OBJ_KEYWORD, PAGE_TYPE_REGEX, STREAM_KEYWORD, TJ_WORD_GAP,
};
use crate::error::{ErrorKind, Result};
use crate::media::MediaType;
use flate2::read::ZlibDecoder;
use memchr::memmem;
use std::borrow::Cow;
use std::io::Read;

/// Scrape the visible text out of a PDF.
///
/// Lines are separated by `\n` and whitespace within each line is collapsed.
/// A PDF with no readable text yields an empty string, not an error.
#[tracing::instrument(level = "debug", skip(bytes), fields(size = bytes.len()))]
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    if MediaType::from_magic_bytes(bytes) != Some(MediaType::Pdf) {
        exn::bail!(ErrorKind::NotPdf);
    }
    let mut text = TextBuilder::default();
    let streams = content_streams(bytes);
    for stream in &streams {
        scan_content(stream, &mut text);
    }
    if text.is_blank() {
        tracing::debug!(streams = streams.len(), "No text found in streams, scanning whole file");
        scan_content(bytes, &mut text);
    }
    let text = text.finish();
    tracing::debug!(chars = text.len(), "Scraped PDF text");
    Ok(text)
}

/// Best-effort page count, or zero when no page objects can be found.
pub fn count_pdf_pages(bytes: &[u8]) -> usize {
    let direct = PAGE_TYPE_REGEX.find_iter(bytes).count();
    if direct > 0 {
        return direct;
    }
    // Page dictionaries may be packed into compressed object streams.
    content_streams(bytes).iter().map(|stream| PAGE_TYPE_REGEX.find_iter(stream).count()).sum()
}

/// All `stream … endstream` payloads that are either unfiltered or inflate
/// cleanly.
fn content_streams(bytes: &[u8]) -> Vec<Cow<'_, [u8]>> {
    collect_streams(bytes, MAX_INFLATED_STREAM_BYTES, MAX_INFLATED_TOTAL_BYTES)
}

/// Inflated streams are cut at `per_stream` bytes each, and collection stops
/// once `total` inflated bytes are held.
fn collect_streams(bytes: &[u8], per_stream: u64, total: u64) -> Vec<Cow<'_, [u8]>> {
    let mut remaining = total;
    let stream_finder = memmem::Finder::new(STREAM_KEYWORD);
    let end_finder = memmem::Finder::new(END_STREAM_KEYWORD);
    let mut streams = Vec::new();
    let mut cursor = 0;
    while let Some(found) = stream_finder.find(&bytes[cursor..]) {
        let keyword = cursor + found;
        cursor = keyword + STREAM_KEYWORD.len();
        if keyword >= 3 && &bytes[keyword - 3..keyword] == b"end" {
            continue;
        }
        let start = match &bytes[cursor..] {
            [b'\r', b'\n', ..] => cursor + 2,
            [b'\n' | b'\r', ..] => cursor + 1,
            _ => continue,
        };
        let Some(length) = end_finder.find(&bytes[start..]) else {
            break;
        };
        let end = start + length;
        cursor = end + END_STREAM_KEYWORD.len();
        let data = trim_trailing_eol(&bytes[start..end]);
        let dictionary = dictionary_before(bytes, keyword);
        let filter = FILTER_REGEX.captures(dictionary).and_then(|captures| captures.get(1));
        match filter.map(|name| name.as_bytes()) {
            None => streams.push(Cow::Borrowed(data)),
            Some(name) if name == b"FlateDecode" => {
                if remaining == 0 {
                    tracing::debug!(total, "Inflated size limit reached, ignoring remaining streams");
                    break;
                }
                if let Some(inflated) = inflate(data, per_stream.min(remaining)) {
                    remaining = remaining.saturating_sub(inflated.len() as u64);
                    streams.push(Cow::Owned(inflated));
                }
            },
            // Image and font encodings never carry text operators.
            Some(_) => {},
        }
    }
    streams
}

fn dictionary_before(bytes: &[u8], keyword: usize) -> &[u8] {
    let window = &bytes[keyword.saturating_sub(DICTIONARY_LOOKBEHIND)..keyword];
    match memmem::rfind(window, OBJ_KEYWORD) {
        Some(position) => &window[position..],
        None => window,
    }
}

fn trim_trailing_eol(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n").or_else(|| data.strip_suffix(b"\n")).or_else(|| data.strip_suffix(b"\r")).unwrap_or(data)
}

fn inflate(data: &[u8], limit: u64) -> Option<Vec<u8>> {
    let mut inflated = Vec::new();
    match ZlibDecoder::new(data).take(limit).read_to_end(&mut inflated) {
        Ok(read) => {
            if read as u64 == limit {
                tracing::trace!(limit, "Stream truncated at inflated size limit");
            }
            Some(inflated)
        },
        // Damaged streams still carry whatever decoded before the damage.
        Err(_) if !inflated.is_empty() => Some(inflated),
        Err(error) => {
            tracing::trace!(%error, "Skipping undecodable stream");
            None
        },
    }
}

#[derive(Debug, PartialEq)]
enum Operand {
    String(Vec<u8>),
    Number(f64),
    Array(Vec<Operand>),
    Other,
}

fn scan_content(content: &[u8], text: &mut TextBuilder) {
    let mut in_text = false;
    let mut operands: Vec<Operand> = Vec::new();
    let mut array: Option<Vec<Operand>> = None;
    for token in Lexer::new(content) {
        let operand = match token {
            Token::Operator(operator) => {
                array = None;
                match operator {
                    b"BT" => in_text = true,
                    b"ET" => {
                        in_text = false;
                        text.new_line();
                    },
                    _ if !in_text => {},
                    b"Tj" => text.show(operands.last()),
                    b"'" | b"\"" => {
                        text.new_line();
                        text.show(operands.last());
                    },
                    b"TJ" => text.show(operands.last()),
                    b"T*" | b"Td" | b"TD" => text.new_line(),
                    _ => {},
                }
                operands.clear();
                continue;
            },
            Token::ArrayStart => {
                array = Some(Vec::new());
                continue;
            },
            Token::ArrayEnd => match array.take() {
                Some(items) => Operand::Array(items),
                None => continue,
            },
            Token::String(bytes) => Operand::String(bytes),
            Token::Number(number) => Operand::Number(number),
            Token::Other => Operand::Other,
        };
        match &mut array {
            Some(items) => items.push(operand),
            None => operands.push(operand),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    String(Vec<u8>),
    Number(f64),
    ArrayStart,
    ArrayEnd,
    Operator(&'a [u8]),
    /// Names, dictionary delimiters and anything else that can't be shown.
    Other,
}

struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' | b'\0')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

impl<'a> Lexer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn regular(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if is_whitespace(byte) || is_delimiter(byte) {
                break;
            }
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    /// Literal string, opening parenthesis already consumed.
    fn literal(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut depth = 1usize;
        while let Some(byte) = self.peek() {
            self.pos += 1;
            match byte {
                b'\\' => {
                    let Some(escaped) = self.peek() else {
                        break;
                    };
                    self.pos += 1;
                    match escaped {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        // Line continuation.
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        },
                        b'\n' => {},
                        b'0'..=b'7' => {
                            let mut value = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(digit @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(digit - b'0');
                                        self.pos += 1;
                                    },
                                    _ => break,
                                }
                            }
                            out.push((value & 0xff) as u8);
                        },
                        other => out.push(other),
                    }
                },
                b'(' => {
                    depth += 1;
                    out.push(byte);
                },
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(byte);
                },
                _ => out.push(byte),
            }
        }
        out
    }

    /// Hex string, opening angle bracket already consumed.
    fn hex(&mut self) -> Vec<u8> {
        let mut nibbles = Vec::new();
        while let Some(byte) = self.peek() {
            self.pos += 1;
            if byte == b'>' {
                break;
            }
            if let Some(nibble) = char::from(byte).to_digit(16) {
                nibbles.push(nibble as u8);
            }
        }
        if nibbles.len() % 2 == 1 {
            nibbles.push(0);
        }
        nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let byte = self.peek()?;
            if is_whitespace(byte) {
                self.pos += 1;
                continue;
            }
            if byte == b'%' {
                while let Some(byte) = self.peek() {
                    if byte == b'\r' || byte == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            self.pos += 1;
            return Some(match byte {
                b'(' => Token::String(self.literal()),
                b'<' if self.peek() == Some(b'<') => {
                    self.pos += 1;
                    Token::Other
                },
                b'<' => Token::String(self.hex()),
                b'>' => {
                    if self.peek() == Some(b'>') {
                        self.pos += 1;
                    }
                    Token::Other
                },
                b'[' => Token::ArrayStart,
                b']' => Token::ArrayEnd,
                b'/' => {
                    self.regular();
                    Token::Other
                },
                b')' | b'{' | b'}' => Token::Other,
                _ => {
                    self.pos -= 1;
                    let word = self.regular();
                    match std::str::from_utf8(word).ok().and_then(|word| word.parse::<f64>().ok()) {
                        Some(number) if number.is_finite() => Token::Number(number),
                        _ => Token::Operator(word),
                    }
                },
            });
        }
    }
}

#[derive(Debug, Default)]
struct TextBuilder {
    lines: Vec<String>,
    current: String,
}

impl TextBuilder {
    fn show(&mut self, operand: Option<&Operand>) {
        match operand {
            Some(Operand::String(bytes)) => self.current.push_str(&decode(bytes)),
            Some(Operand::Array(items)) => {
                for item in items {
                    match item {
                        Operand::String(bytes) => self.current.push_str(&decode(bytes)),
                        Operand::Number(adjustment) if -adjustment > TJ_WORD_GAP => self.current.push(' '),
                        _ => {},
                    }
                }
            },
            _ => {},
        }
    }

    fn new_line(&mut self) {
        let line = std::mem::take(&mut self.current);
        if !line.trim().is_empty() {
            self.lines.push(line);
        }
    }

    fn is_blank(&self) -> bool {
        self.lines.is_empty() && self.current.trim().is_empty()
    }

    fn finish(mut self) -> String {
        self.new_line();
        self.lines
            .iter()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// UTF-16BE when the string carries a byte order mark, Latin-1 otherwise.
/// Control characters are dropped and line breaks become spaces.
fn decode(bytes: &[u8]) -> String {
    let chars: Box<dyn Iterator<Item = char>> = match bytes.strip_prefix(&[0xfe, 0xff]) {
        Some(utf16) => Box::new(
            char::decode_utf16(utf16.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])))
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)),
        ),
        None => Box::new(bytes.iter().map(|byte| char::from(*byte))),
    };
    chars
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use rstest::rstest;
    use std::io::Write;

    fn pdf(streams: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        for (index, (dictionary, data)) in streams.iter().enumerate() {
            out.extend(format!("{} 0 obj\n<< {dictionary} /Length {} >>\nstream\n", index + 1, data.len()).as_bytes());
            out.extend_from_slice(data);
            out.extend(b"\nendstream\nendobj\n");
        }
        out.extend(b"%%EOF\n");
        out
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[rstest]
    #[case::simple("BT /F1 12 Tf 72 712 Td (Hello World) Tj ET", "Hello World")]
    #[case::lines("BT (Line one) Tj T* (Line two) Tj ET", "Line one\nLine two")]
    #[case::td("BT (a) Tj 0 -14 Td (b) Tj 0 -14 TD (c) Tj ET", "a\nb\nc")]
    #[case::quote("BT (first) Tj (second) ' 1 2 (third) \" ET", "first\nsecond\nthird")]
    #[case::kerning("BT [(Spa) -20 (ced) -300 (word)] TJ ET", "Spaced word")]
    #[case::escapes(r"BT (a\(b\)c \\ \101\n) Tj ET", r"a(b)c \ A")]
    #[case::nested("BT (f(x) = y) Tj ET", "f(x) = y")]
    #[case::hex("BT <48656C6C6F> Tj <20 5> Tj ET", "Hello P")]
    #[case::utf16("BT <FEFF00480069> Tj ET", "Hi")]
    #[case::whitespace("BT (  lots    of   space  ) Tj ET", "lots of space")]
    #[case::outside_text_object("(not shown) Tj BT (shown) Tj ET", "shown")]
    #[case::comments("BT % (ignored) Tj\n(kept) Tj ET", "kept")]
    fn test_content_operators(#[case] content: &str, #[case] expected: &str) {
        let bytes = pdf(&[("", content.as_bytes())]);
        assert_eq!(extract_pdf_text(&bytes).unwrap(), expected);
    }

    #[test]
    fn test_flate_stream() {
        let compressed = deflate(b"BT (Compressed text) Tj ET");
        let bytes = pdf(&[("/Filter /FlateDecode", &compressed)]);
        assert_eq!(extract_pdf_text(&bytes).unwrap(), "Compressed text");
        let bytes = pdf(&[("/Filter [/FlateDecode]", &compressed)]);
        assert_eq!(extract_pdf_text(&bytes).unwrap(), "Compressed text");
    }

    #[test]
    fn test_inflated_size_is_capped() {
        const MIB: usize = 1024 * 1024;
        let zeros = deflate(&vec![0u8; 4 * MIB]);
        let bytes = pdf(&[("/Filter /FlateDecode", &zeros), ("/Filter /FlateDecode", &zeros), ("/Filter /FlateDecode", &zeros)]);

        let streams = collect_streams(&bytes, MIB as u64, (3 * MIB / 2) as u64);
        let sizes: Vec<usize> = streams.iter().map(|stream| stream.len()).collect();
        assert_eq!(sizes, [MIB, MIB / 2]);

        let streams = content_streams(&bytes);
        assert_eq!(streams.len(), 3);
        assert!(streams.iter().all(|stream| stream.len() as u64 <= MAX_INFLATED_STREAM_BYTES));
    }

    #[test]
    fn test_skips_unreadable_streams() {
        let bytes = pdf(&[
            ("/Filter /FlateDecode", b"definitely not zlib"),
            ("/Filter /DCTDecode", b"BT (jpeg noise) Tj ET"),
            ("", b"BT (Readable) Tj ET"),
        ]);
        assert_eq!(extract_pdf_text(&bytes).unwrap(), "Readable");
    }

    #[test]
    fn test_multiple_streams_in_order() {
        let page_two = deflate(b"BT (Page two) Tj ET");
        let bytes = pdf(&[("", b"BT (Page one) Tj ET"), ("/Filter /FlateDecode", &page_two)]);
        assert_eq!(extract_pdf_text(&bytes).unwrap(), "Page one\nPage two");
    }

    #[test]
    fn test_falls_back_to_whole_file() {
        let bytes = b"%PDF-1.1\nBT (Loose text) Tj ET\n%%EOF";
        assert_eq!(extract_pdf_text(bytes).unwrap(), "Loose text");
    }

    #[test]
    fn test_no_text_is_not_an_error() {
        let bytes = pdf(&[("/Filter /DCTDecode", b"\xff\xd8\xff")]);
        assert_eq!(extract_pdf_text(&bytes).unwrap(), "");
    }

    #[test]
    fn test_rejects_non_pdf() {
        let err = extract_pdf_text(b"\x89PNG\r\n\x1a\n").unwrap_err();
        assert_eq!(&*err, &ErrorKind::NotPdf);
    }

    #[test]
    fn test_count_pages() {
        let bytes = b"%PDF-1.4\n1 0 obj << /Type /Pages /Count 2 >> endobj\n\
            2 0 obj << /Type /Page /Parent 1 0 R >> endobj\n\
            3 0 obj << /Type/Page /Parent 1 0 R >> endobj\n";
        assert_eq!(count_pdf_pages(bytes), 2);
        let packed = deflate(b"<< /Type /Page >> << /Type /Page >> << /Type /Page >>");
        assert_eq!(count_pdf_pages(&pdf(&[("/Type /ObjStm /Filter /FlateDecode", &packed)])), 3);
        assert_eq!(count_pdf_pages(b"%PDF-1.4\n"), 0);
    }
}
