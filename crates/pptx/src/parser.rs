//! PPTX file parser implementation.

use crate::shapes::{attr, local_name, parse_shapes, Shape, ShapeContent};
use doccheck_core::{Error, Extracted, ImageRef, Issue, Paragraph, Result, Table, UnitMeta};
use quick_xml::events::Event;
use quick_xml::Reader;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const REL_SLIDE: &str = "/relationships/slide";
const REL_NOTES: &str = "/relationships/notesSlide";
const REL_IMAGE: &str = "/relationships/image";

/// Placeholders in notes pages that are not part of the notes text.
const NOTES_SKIPPED_PLACEHOLDERS: &[&str] = &["sldNum", "hdr", "ftr", "dt", "sldImg"];

/// One relationship from a `.rels` part.
#[derive(Debug, Clone)]
struct Relationship {
    rel_type: String,
    target: String,
    external: bool,
}

/// A parsed slide.
#[derive(Debug, Clone)]
pub struct Slide {
    /// 1-based position in the presentation.
    pub number: u32,
    /// Path of the slide part inside the archive.
    pub part: String,
    pub hidden: bool,
    pub shapes: Vec<Shape>,
    pub notes: Extracted<String>,
    pub issues: Vec<Issue>,
}

impl Slide {
    /// Text of the first title placeholder.
    pub fn title(&self) -> Option<String> {
        self.shapes
            .iter()
            .find(|s| s.is_title())
            .map(|s| s.text().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Text shapes other than the title.
    pub fn body_shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes
            .iter()
            .filter(|s| !s.is_title() && matches!(s.content, ShapeContent::Text(_)))
    }

    /// All paragraphs of non-title text shapes.
    pub fn body_paragraphs(&self) -> Vec<&Paragraph> {
        self.body_shapes().flat_map(|s| s.paragraphs()).collect()
    }

    /// Non-empty texts of non-title text shapes.
    pub fn body_texts(&self) -> Vec<String> {
        self.body_shapes()
            .map(|s| s.text().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn tables(&self) -> Vec<&Table> {
        self.shapes
            .iter()
            .filter_map(|s| match &s.content {
                ShapeContent::Table(table) => Some(table),
                _ => None,
            })
            .collect()
    }

    /// Pictures with their content hash and geometry.
    pub fn images(&self) -> Vec<ImageRef> {
        self.shapes
            .iter()
            .filter_map(|s| match &s.content {
                ShapeContent::Picture { embed, hash } => Some(ImageRef {
                    hash: hash.clone().unwrap_or_else(|| embed.clone()),
                    left: s.left,
                    top: s.top,
                    width: s.width,
                    height: s.height,
                }),
                _ => None,
            })
            .collect()
    }

    /// Side-channel data for the unit built from this slide.
    pub fn meta(&self) -> UnitMeta {
        let images = self.images();
        UnitMeta {
            title: self.title(),
            notes: self.notes.found().cloned(),
            image_count: Some(images.len()),
            images,
            tables: self.tables().into_iter().cloned().collect(),
            paragraphs: self.body_paragraphs().into_iter().cloned().collect(),
        }
    }
}

/// A parsed presentation.
#[derive(Debug, Clone)]
pub struct Deck {
    pub filename: String,
    pub slides: Vec<Slide>,
}

impl Deck {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser {
    hash_images: bool,
    include_notes: bool,
}

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self {
            hash_images: true,
            include_notes: true,
        }
    }

    /// Skip reading media parts; pictures are identified by relationship id.
    pub fn with_hash_images(mut self, enabled: bool) -> Self {
        self.hash_images = enabled;
        self
    }

    pub fn with_notes(mut self, enabled: bool) -> Self {
        self.include_notes = enabled;
        self
    }

    /// Parse a PPTX file from disk.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Deck> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.parse(BufReader::new(file), &filename)
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R, filename: &str) -> Result<Deck> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let slide_order = self.get_slide_order(&mut archive)?;
        log::debug!("{}: {} slides", filename, slide_order.len());

        let mut slides = Vec::with_capacity(slide_order.len());
        for (idx, slide_path) in slide_order.iter().enumerate() {
            slides.push(self.parse_slide(&mut archive, slide_path, idx as u32 + 1)?);
        }

        Ok(Deck {
            filename: filename.to_string(),
            slides,
        })
    }

    /// Ordered slide part paths.
    ///
    /// Uses the `sldIdLst` of `presentation.xml`; falls back to the slide
    /// relationships sorted by number when the list is missing.
    fn get_slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let rels = self.read_relationships(archive, "ppt/presentation.xml")?;

        let presentation = read_file_from_archive(archive, "ppt/presentation.xml")?;
        let mut ordered = Vec::new();
        let mut reader = Reader::from_str(&presentation);
        reader.trim_text(true);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if local_name(e.name().as_ref()) == b"sldId" =>
                {
                    // `r:id` points at the relationship, the bare `id` is a numeric slide id
                    let rel_id = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() != b"id" && local_name(a.key.as_ref()) == b"id")
                        .map(|a| String::from_utf8_lossy(&a.value).to_string());
                    if let Some(rel) = rel_id.and_then(|id| rels.get(&id)) {
                        ordered.push(resolve_part("ppt", &rel.target));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!("Error parsing presentation.xml: {}", e)));
                }
                _ => {}
            }
        }
        if !ordered.is_empty() {
            return Ok(ordered);
        }

        log::debug!("No slide id list, ordering slides by relationship number");
        let mut slides: Vec<(String, Option<usize>)> = rels
            .iter()
            .filter(|(_, rel)| rel.rel_type.ends_with(REL_SLIDE))
            .map(|(id, rel)| {
                let order = extract_slide_number(&rel.target).or_else(|| extract_slide_number(id));
                (resolve_part("ppt", &rel.target), order)
            })
            .collect();
        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });
        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: u32,
    ) -> Result<Slide> {
        let content = read_file_from_archive(archive, slide_path)?;
        let parsed = parse_shapes(&content)
            .map_err(|e| Error::PptxParseError(format!("Slide {}: {}", slide_number, e)))?;

        let rels = match self.read_relationships(archive, slide_path) {
            Ok(rels) => rels,
            Err(e) => {
                log::warn!("Slide {} relationships unreadable: {}", slide_number, e);
                HashMap::new()
            }
        };

        let mut slide = Slide {
            number: slide_number,
            part: slide_path.to_string(),
            hidden: parsed.hidden,
            shapes: parsed.shapes,
            notes: Extracted::Unsupported("no notes page".to_string()),
            issues: Vec::new(),
        };

        if self.hash_images {
            self.hash_pictures(archive, slide_path, &rels, &mut slide);
        }
        if self.include_notes {
            slide.notes = self.read_notes(archive, slide_path, &rels);
            if let Extracted::Failed(reason) = &slide.notes {
                slide.issues.push(Issue::warning(format!("Notes unreadable: {}", reason)));
            }
        }

        Ok(slide)
    }

    /// Resolve picture relationships and hash the media bytes.
    fn hash_pictures<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        rels: &HashMap<String, Relationship>,
        slide: &mut Slide,
    ) {
        let base = part_dir(slide_path);
        for shape in &mut slide.shapes {
            let ShapeContent::Picture { embed, hash } = &mut shape.content else {
                continue;
            };
            let Some(rel) = rels.get(embed.as_str()).filter(|r| r.rel_type.ends_with(REL_IMAGE)) else {
                slide
                    .issues
                    .push(Issue::warning(format!("Picture '{}' has no image relationship", shape.name)));
                continue;
            };
            if rel.external {
                *hash = Some(rel.target.clone());
                continue;
            }
            let media_path = resolve_part(base, &rel.target);
            match read_bytes_from_archive(archive, &media_path) {
                Ok(bytes) => *hash = Some(format!("{:x}", Sha256::digest(&bytes))),
                Err(e) => slide
                    .issues
                    .push(Issue::warning(format!("Picture '{}' unreadable: {}", shape.name, e))),
            }
        }
    }

    /// Notes text from the slide's notes page.
    fn read_notes<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        rels: &HashMap<String, Relationship>,
    ) -> Extracted<String> {
        let Some(rel) = rels.values().find(|r| r.rel_type.ends_with(REL_NOTES)) else {
            return Extracted::Unsupported("no notes page".to_string());
        };
        let notes_path = resolve_part(part_dir(slide_path), &rel.target);

        let content = match read_file_from_archive(archive, &notes_path) {
            Ok(content) => content,
            Err(e) => return Extracted::Failed(e.to_string()),
        };
        match parse_shapes(&content) {
            Ok(parsed) => {
                let text = parsed
                    .shapes
                    .iter()
                    .filter(|s| {
                        !s.placeholder
                            .as_deref()
                            .is_some_and(|ph| NOTES_SKIPPED_PLACEHOLDERS.contains(&ph))
                    })
                    .map(|s| s.text().trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                Extracted::Found(text)
            }
            Err(e) => Extracted::Failed(e.to_string()),
        }
    }

    /// Relationships of a part, keyed by id. A missing `.rels` part is empty.
    fn read_relationships<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        part: &str,
    ) -> Result<HashMap<String, Relationship>> {
        let (dir, file) = part.rsplit_once('/').unwrap_or(("", part));
        let rels_path = if dir.is_empty() {
            format!("_rels/{}.rels", file)
        } else {
            format!("{}/_rels/{}.rels", dir, file)
        };

        if archive.by_name(&rels_path).is_err() {
            return Ok(HashMap::new());
        }
        let content = read_file_from_archive(archive, &rels_path)?;
        parse_relationships(&content)
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_relationships(content: &str) -> Result<HashMap<String, Relationship>> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                if let Some(id) = attr(e, b"Id") {
                    rels.insert(
                        id,
                        Relationship {
                            rel_type: attr(e, b"Type").unwrap_or_default(),
                            target: attr(e, b"Target").unwrap_or_default(),
                            external: attr(e, b"TargetMode").is_some_and(|m| m == "External"),
                        },
                    );
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing relationships: {}", e)));
            }
            _ => {}
        }
    }
    Ok(rels)
}

/// Directory of a part path (`ppt/slides/slide1.xml` -> `ppt/slides`).
fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_part(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Read a text file from the ZIP archive.
fn read_file_from_archive<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

fn read_bytes_from_archive<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;
    Ok(bytes)
}

/// Extract a slide number from a string like "rId2" or "slides/slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    /// A slide for the test deck builder.
    pub(crate) struct TestSlide<'a> {
        pub title: &'a str,
        pub body: &'a [&'a str],
        pub notes: Option<&'a str>,
        pub image: Option<&'a [u8]>,
    }

    fn text_shape(id: usize, placeholder: &str, paragraphs: &[&str]) -> String {
        let paras: String = paragraphs
            .iter()
            .map(|p| format!("<a:p><a:r><a:rPr lang=\"en-US\"/><a:t>{}</a:t></a:r></a:p>", p))
            .collect();
        format!(
            "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"Shape {id}\"/><p:cNvSpPr/><p:nvPr>{placeholder}</p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/>{paras}</p:txBody></p:sp>"
        )
    }

    /// Build an in-memory PPTX. Slides are listed in `sldIdLst` in the
    /// given order but stored under reversed part names, so the list order
    /// must win over part numbering.
    pub(crate) fn build_pptx(slides: &[TestSlide]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        let count = slides.len();

        let mut ids = String::new();
        let mut rels = String::new();
        for i in 0..count {
            let part = count - i;
            ids.push_str(&format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 256 + i, 10 + i));
            rels.push_str(&format!(
                "<Relationship Id=\"rId{}\" Type=\"{}/slide\" Target=\"slides/slide{}.xml\"/>",
                10 + i,
                REL_NS,
                part
            ));
        }
        zip.start_file("ppt/presentation.xml", options).unwrap();
        zip.write_all(
            format!("<p:presentation {NS}><p:sldIdLst>{ids}</p:sldIdLst></p:presentation>").as_bytes(),
        )
        .unwrap();
        zip.start_file("ppt/_rels/presentation.xml.rels", options).unwrap();
        zip.write_all(format!("<Relationships>{rels}</Relationships>").as_bytes())
            .unwrap();

        for (i, slide) in slides.iter().enumerate() {
            let part = count - i;
            let mut shapes = text_shape(2, "<p:ph type=\"title\"/>", &[slide.title]);
            if !slide.body.is_empty() {
                shapes.push_str(&text_shape(3, "<p:ph idx=\"1\"/>", slide.body));
            }
            let mut slide_rels = String::new();
            if let Some(bytes) = slide.image {
                shapes.push_str(
                    "<p:pic><p:nvPicPr><p:cNvPr id=\"4\" name=\"Picture\"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed=\"rId2\"/></p:blipFill><p:spPr><a:xfrm><a:off x=\"10\" y=\"20\"/><a:ext cx=\"30\" cy=\"40\"/></a:xfrm></p:spPr></p:pic>",
                );
                slide_rels.push_str(&format!(
                    "<Relationship Id=\"rId2\" Type=\"{}/image\" Target=\"../media/image{}.png\"/>",
                    REL_NS, part
                ));
                zip.start_file(format!("ppt/media/image{}.png", part), options).unwrap();
                zip.write_all(bytes).unwrap();
            }
            if let Some(notes) = slide.notes {
                slide_rels.push_str(&format!(
                    "<Relationship Id=\"rId3\" Type=\"{}/notesSlide\" Target=\"../notesSlides/notesSlide{}.xml\"/>",
                    REL_NS, part
                ));
                let notes_shapes = format!(
                    "{}{}",
                    text_shape(2, "<p:ph type=\"body\" idx=\"1\"/>", &[notes]),
                    text_shape(3, "<p:ph type=\"sldNum\" idx=\"5\"/>", &["7"])
                );
                zip.start_file(format!("ppt/notesSlides/notesSlide{}.xml", part), options)
                    .unwrap();
                zip.write_all(
                    format!("<p:notes {NS}><p:cSld><p:spTree>{notes_shapes}</p:spTree></p:cSld></p:notes>")
                        .as_bytes(),
                )
                .unwrap();
            }

            zip.start_file(format!("ppt/slides/slide{}.xml", part), options).unwrap();
            zip.write_all(
                format!("<p:sld {NS}><p:cSld><p:spTree>{shapes}</p:spTree></p:cSld></p:sld>").as_bytes(),
            )
            .unwrap();
            zip.start_file(format!("ppt/slides/_rels/slide{}.xml.rels", part), options)
                .unwrap();
            zip.write_all(format!("<Relationships>{slide_rels}</Relationships>").as_bytes())
                .unwrap();
        }

        zip.finish().unwrap().into_inner()
    }

    fn sample_deck() -> Deck {
        let bytes = build_pptx(&[
            TestSlide {
                title: "Welcome",
                body: &["First point", "Second point"],
                notes: Some("Say hello"),
                image: Some(b"png-bytes"),
            },
            TestSlide {
                title: "Agenda",
                body: &["Topics"],
                notes: None,
                image: None,
            },
        ]);
        PptxParser::new().parse(Cursor::new(bytes), "deck.pptx").unwrap()
    }

    #[test]
    fn test_slide_order_follows_id_list() {
        let deck = sample_deck();
        assert_eq!(deck.slide_count(), 2);
        assert_eq!(deck.slides[0].number, 1);
        assert_eq!(deck.slides[0].title().as_deref(), Some("Welcome"));
        assert_eq!(deck.slides[0].part, "ppt/slides/slide2.xml");
        assert_eq!(deck.slides[1].title().as_deref(), Some("Agenda"));
    }

    #[test]
    fn test_body_and_notes() {
        let deck = sample_deck();
        let slide = &deck.slides[0];
        assert_eq!(slide.body_texts(), vec!["First point\nSecond point"]);
        assert_eq!(slide.notes, Extracted::Found("Say hello".to_string()));
        assert!(matches!(deck.slides[1].notes, Extracted::Unsupported(_)));
    }

    #[test]
    fn test_picture_hash() {
        let deck = sample_deck();
        let images = deck.slides[0].images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].hash, format!("{:x}", Sha256::digest(b"png-bytes")));
        assert_eq!((images[0].left, images[0].top), (10, 20));
        assert_eq!(deck.slides[0].meta().image_count, Some(1));
        assert!(deck.slides[1].images().is_empty());
    }

    #[test]
    fn test_not_a_zip() {
        let result = PptxParser::new().parse(Cursor::new(b"not a zip".to_vec()), "bad.pptx");
        assert!(matches!(result, Err(Error::ZipError(_))));
    }

    #[test]
    fn test_resolve_part() {
        assert_eq!(resolve_part("ppt/slides", "../media/image1.png"), "ppt/media/image1.png");
        assert_eq!(resolve_part("ppt", "slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(resolve_part("ppt/slides", "/ppt/media/a.png"), "ppt/media/a.png");
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slides/slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }
}
