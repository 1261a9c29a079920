//! Per-page text extraction.
//!
//! Text comes from `pdf-extract`, which resolves font encodings and ToUnicode
//! maps. Pages it cannot read, or reads as garbage, fall back to a walk over
//! the content stream's text operands.

use doccheck_core::{Corpus, CorpusKind, Error, Result, TextNormalizer, Unit};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::panic;
use std::path::Path;

/// Kerning adjustments below this (in thousandths of an em) read as a word gap.
const KERNING_SPACE_THRESHOLD: i64 = -100;

/// Share of replacement, private-use and control characters above which
/// extracted text is treated as unreadable.
const GARBAGE_THRESHOLD: f64 = 0.15;

/// A PDF document opened for reading.
pub struct PdfExtractor {
    doc: Document,
    source: String,
    /// Page texts from `pdf-extract`, in page order; empty when it failed.
    extracted: Vec<String>,
    normalizer: TextNormalizer,
    trim_headers_footers: bool,
}

impl PdfExtractor {
    /// Load a PDF from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::from_bytes(&bytes, source)
    }

    /// Parse a PDF from memory.
    pub fn from_bytes(bytes: &[u8], source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let doc = Document::load_mem(bytes)
            .map_err(|e| Error::PdfParseError(format!("{}: {}", source, e)))?;
        if doc.is_encrypted() {
            return Err(Error::EncryptedPdf(source));
        }
        log::debug!("{}: {} pages", source, doc.get_pages().len());
        let extracted = extract_pages(bytes, &source);

        Ok(Self {
            doc,
            source,
            extracted,
            normalizer: TextNormalizer::new(),
            trim_headers_footers: false,
        })
    }

    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Drop the first and last line of pages with more than two lines.
    pub fn with_trim_headers_footers(mut self, enabled: bool) -> Self {
        self.trim_headers_footers = enabled;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    pub(crate) fn document(&self) -> &Document {
        &self.doc
    }

    /// Raw text of one page (1-based).
    ///
    /// Prefers the `pdf-extract` text; the operand walk is used when that
    /// text is missing or fails the readability check.
    pub fn page_text(&self, page_number: u32) -> Result<String> {
        let extracted = page_number
            .checked_sub(1)
            .and_then(|i| self.extracted.get(i as usize));
        if let Some(text) = extracted.filter(|t| is_readable(t)) {
            return Ok(text.clone());
        }

        log::debug!(
            "{}: page {} read from content stream operands",
            self.source,
            page_number
        );
        match (extracted, self.operand_text(page_number)) {
            (_, Ok(text)) if is_readable(&text) => Ok(text),
            (Some(text), _) if !text.trim().is_empty() => Ok(text.clone()),
            (_, walked) => walked,
        }
    }

    /// Text shown by the page's `Tj`/`TJ` operands, without font decoding.
    fn operand_text(&self, page_number: u32) -> Result<String> {
        let pages = self.doc.get_pages();
        let page_id = pages
            .get(&page_number)
            .copied()
            .ok_or_else(|| Error::PdfParseError(format!("No page {}", page_number)))?;
        let content = self
            .doc
            .get_page_content(page_id)
            .map_err(|e| Error::PdfParseError(format!("Page {}: {}", page_number, e)))?;
        let content = Content::decode(&content)
            .map_err(|e| Error::PdfParseError(format!("Page {}: {}", page_number, e)))?;
        Ok(content_text(&content))
    }

    /// One unit per page, keyed by page number.
    ///
    /// A page whose text cannot be decoded is kept as an empty unit with an issue.
    pub fn pages(&self) -> Corpus {
        let mut corpus = Corpus::new(self.source.clone(), CorpusKind::Pdf);
        for &page_number in self.doc.get_pages().keys() {
            let label = format!("Page {}", page_number);
            let mut unit = match self.page_text(page_number) {
                Ok(raw) => {
                    let mut text = self.normalizer.normalize(&raw);
                    if self.trim_headers_footers {
                        text = trim_headers_footers(&text);
                    }
                    Unit::new(page_number, text)
                }
                Err(e) => {
                    log::warn!("{}", e);
                    Unit::unreadable(page_number, e)
                }
            };
            unit.label = label;
            unit.flag_if_empty();
            corpus.push(unit);
        }
        corpus
    }
}

/// Per-page text from `pdf-extract`. Failures (including panics on fonts it
/// does not support) leave every page to the operand walk.
fn extract_pages(bytes: &[u8], source: &str) -> Vec<String> {
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes)) {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            log::warn!("{}: text extraction failed, reading operands instead: {}", source, e);
            Vec::new()
        }
        Err(_) => {
            log::warn!("{}: text extraction aborted, reading operands instead", source);
            Vec::new()
        }
    }
}

/// Whether extracted text is non-blank and mostly printable.
pub(crate) fn is_readable(text: &str) -> bool {
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return false;
    }
    let garbage = text
        .chars()
        .filter(|&c| {
            matches!(c, '\u{FFFD}' | '\u{E000}'..='\u{F8FF}')
                || (c.is_control() && !c.is_whitespace())
        })
        .count();
    (garbage as f64 / total as f64) <= GARBAGE_THRESHOLD
}

/// Drop the first and last line when a page has more than two lines.
pub fn trim_headers_footers(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() > 2 {
        lines[1..lines.len() - 1].join("\n")
    } else {
        text.to_string()
    }
}

/// Text shown by a decoded content stream, with line breaks at text
/// block ends and line moves.
pub(crate) fn content_text(content: &Content) -> String {
    let mut text = String::new();
    for op in &content.operations {
        match op.operator.as_str() {
            "Tj" | "TJ" => {
                for operand in &op.operands {
                    push_operand_text(&mut text, operand);
                }
            }
            "'" | "\"" => {
                text.push('\n');
                if let Some(operand) = op.operands.last() {
                    push_operand_text(&mut text, operand);
                }
            }
            "T*" | "ET" => newline(&mut text),
            "Td" | "TD" => {
                let moves_line = op
                    .operands
                    .get(1)
                    .and_then(|ty| ty.as_float().ok())
                    .is_some_and(|ty| ty != 0.0);
                if moves_line {
                    newline(&mut text);
                }
            }
            _ => {}
        }
    }
    text
}

fn newline(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

fn push_operand_text(text: &mut String, operand: &Object) {
    match operand {
        Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
        Object::Array(items) => {
            for item in items {
                match item {
                    Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                    Object::Integer(n) if *n < KERNING_SPACE_THRESHOLD => text.push(' '),
                    Object::Real(n) if (*n as i64) < KERNING_SPACE_THRESHOLD => text.push(' '),
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

/// Decode a PDF string: UTF-16BE with BOM, UTF-8, else Latin-1.
pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&units) {
            return s;
        }
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Follow a reference to its object; other objects are returned as is.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Resolve a dictionary entry that may be stored by reference.
pub(crate) fn resolve_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
}

/// The page's resource dictionary, inherited from parent page tree nodes
/// when the page has none.
pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // Page trees are shallow; the bound stops reference cycles
    for _ in 0..32 {
        if let Some(resources) = resolve_dict(doc, node, b"Resources") {
            return Some(resources);
        }
        node = resolve_dict(doc, node, b"Parent")?;
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{Stream, StringFormat};

    /// Content of one test page.
    pub(crate) struct TestPage<'a> {
        pub lines: &'a [&'a str],
        /// Names drawn with `Do`; each must be an image in `images`.
        pub draws: &'a [&'a str],
        pub images: &'a [&'a str],
    }

    fn image_stream() -> Stream {
        let dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(1)),
            ("Height", Object::Integer(1)),
            ("ColorSpace", Object::Name(b"DeviceGray".to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
        ]);
        Stream::new(dict, vec![0])
    }

    fn helvetica() -> Dictionary {
        Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ])
    }

    const TO_UNICODE_CMAP: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Test-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0001> <0048>
<0002> <0069>
endbfchar
endcmap
CMapName currentdict /CMap defineresource pop
end
end
";

    /// One page showing glyph ids 1 and 2 through a Type0 Identity-H font
    /// whose ToUnicode map reads them as "Hi".
    fn build_identity_h_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let to_unicode_id = doc.add_object(Stream::new(
            Dictionary::new(),
            TO_UNICODE_CMAP.as_bytes().to_vec(),
        ));
        let cid_font_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", Object::Name(b"TestSans".to_vec())),
            (
                "CIDSystemInfo",
                Object::Dictionary(Dictionary::from_iter(vec![
                    ("Registry", Object::string_literal("Adobe")),
                    ("Ordering", Object::string_literal("Identity")),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("DW", Object::Integer(600)),
        ]));
        let font = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(b"TestSans".to_vec())),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)])),
            ("ToUnicode", Object::Reference(to_unicode_id)),
        ]);

        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(vec![0x00, 0x01, 0x00, 0x02], StringFormat::Hexadecimal)],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let fonts = Dictionary::from_iter(vec![("F1", Object::Dictionary(font))]);
        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
            (
                "Resources",
                Object::Dictionary(Dictionary::from_iter(vec![("Font", Object::Dictionary(fonts))])),
            ),
        ]));
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Count", Object::Integer(1)),
                ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    pub(crate) fn build_pdf(pages: &[TestPage]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut page_ids = Vec::new();

        for page in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
            ];
            for (i, line) in page.lines.iter().enumerate() {
                if i > 0 {
                    operations.push(Operation::new("Td", vec![Object::Integer(0), Object::Integer(-14)]));
                }
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(line.as_bytes().to_vec(), StringFormat::Literal)],
                ));
            }
            operations.push(Operation::new("ET", vec![]));
            for name in page.draws {
                operations.push(Operation::new("q", vec![]));
                operations.push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
                operations.push(Operation::new("Q", vec![]));
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

            let mut xobjects = Dictionary::new();
            for name in page.images {
                let image_id = doc.add_object(image_stream());
                xobjects.set(name.as_bytes().to_vec(), Object::Reference(image_id));
            }
            let fonts = Dictionary::from_iter(vec![("F1", Object::Dictionary(helvetica()))]);
            let resources = Dictionary::from_iter(vec![
                ("Font", Object::Dictionary(fonts)),
                ("XObject", Object::Dictionary(xobjects)),
            ]);

            let page_dict = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ]),
                ),
                ("Contents", Object::Reference(content_id)),
                ("Resources", Object::Dictionary(resources)),
            ]);
            page_ids.push(doc.add_object(page_dict));
        }

        let pages_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(pages.len() as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn text_page<'a>(lines: &'a [&'a str]) -> TestPage<'a> {
        TestPage {
            lines,
            draws: &[],
            images: &[],
        }
    }

    #[test]
    fn test_pages_keyed_by_number() {
        let bytes = build_pdf(&[text_page(&["Hello world"]), text_page(&["Second", "page"])]);
        let pdf = PdfExtractor::from_bytes(&bytes, "doc.pdf").unwrap();
        assert_eq!(pdf.page_count(), 2);

        let corpus = pdf.pages();
        let texts: Vec<&str> = corpus.units().iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello world", "Second\npage"]);
        assert_eq!(corpus.units()[1].label, "Page 2");
    }

    #[test]
    fn test_trim_headers_footers() {
        let bytes = build_pdf(&[text_page(&["Header", "Body one", "Body two", "Footer 1"])]);
        let pdf = PdfExtractor::from_bytes(&bytes, "doc.pdf")
            .unwrap()
            .with_trim_headers_footers(true);
        assert_eq!(pdf.pages().units()[0].text, "Body one\nBody two");

        assert_eq!(trim_headers_footers("a\nb"), "a\nb");
    }

    #[test]
    fn test_empty_page_flagged() {
        let bytes = build_pdf(&[text_page(&[])]);
        let corpus = PdfExtractor::from_bytes(&bytes, "doc.pdf").unwrap().pages();
        assert!(corpus.units()[0].is_empty());
        assert_eq!(corpus.units()[0].issues[0].message, "No content found");
    }

    #[test]
    fn test_corrupt_pdf_is_error() {
        let result = PdfExtractor::from_bytes(b"%PDF-1.7 garbage", "bad.pdf");
        assert!(matches!(result, Err(Error::PdfParseError(_))));
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string(b"plain"), "plain");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "A\u{e9}");
        assert_eq!(decode_pdf_string(&[0x63, 0x61, 0x66, 0xE9]), "caf\u{e9}");
    }

    #[test]
    fn test_kerning_gap_becomes_space() {
        let content = Content {
            operations: vec![Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::String(b"Hello".to_vec(), StringFormat::Literal),
                    Object::Integer(-250),
                    Object::String(b"world".to_vec(), StringFormat::Literal),
                    Object::Integer(-20),
                    Object::String(b"!".to_vec(), StringFormat::Literal),
                ])],
            )],
        };
        assert_eq!(content_text(&content), "Hello world!");
    }

    #[test]
    fn test_identity_h_font_uses_to_unicode() {
        let bytes = build_identity_h_pdf();
        let pdf = PdfExtractor::from_bytes(&bytes, "cid.pdf").unwrap();
        let corpus = pdf.pages();
        assert_eq!(corpus.units()[0].text, "Hi");
        assert!(corpus.units()[0].issues.is_empty());
    }

    #[test]
    fn test_is_readable() {
        assert!(is_readable("Plain page text"));
        assert!(!is_readable(""));
        assert!(!is_readable(" \n "));
        assert!(!is_readable("\u{1}\u{2}"));
        assert!(!is_readable("\u{E001}\u{E002}\u{E003}ab"));
    }
}
