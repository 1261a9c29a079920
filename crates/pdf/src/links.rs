//! Link annotations per page.

use crate::extract::{decode_pdf_string, resolve, resolve_dict, PdfExtractor};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Named destinations nested deeper than this are not followed.
const MAX_DEST_DEPTH: usize = 4;

/// Where a link annotation points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum LinkTarget {
    /// `/A << /S /URI /URI (...) >>`
    Uri(String),
    /// A page of the same document, 1-based.
    Page(u32),
    /// A named destination that is not resolved to a page.
    Named(String),
}

impl LinkTarget {
    pub fn uri(&self) -> Option<&str> {
        match self {
            LinkTarget::Uri(uri) => Some(uri),
            _ => None,
        }
    }
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkTarget::Uri(uri) => f.write_str(uri),
            LinkTarget::Page(page) => write!(f, "page {}", page),
            LinkTarget::Named(name) => write!(f, "#{}", name),
        }
    }
}

/// One `/Subtype /Link` annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfLink {
    pub page: u32,
    pub target: LinkTarget,
    /// The annotation's `/Contents`, when the producer wrote one.
    pub text: String,
}

impl PdfExtractor {
    /// Link annotations on every page, keyed by 1-based page number.
    ///
    /// Pages without links are left out. Annotations whose target cannot be
    /// read (JavaScript, launch actions, broken references) are skipped.
    pub fn link_annotations(&self) -> BTreeMap<u32, Vec<PdfLink>> {
        let doc = self.document();
        let pages = doc.get_pages();
        let page_numbers: HashMap<ObjectId, u32> = pages.iter().map(|(n, id)| (*id, *n)).collect();
        let mut links = BTreeMap::new();

        for (&page, &page_id) in &pages {
            let found: Vec<PdfLink> = page_annotations(doc, page_id)
                .into_iter()
                .filter(|annot| annot.get(b"Subtype").and_then(Object::as_name_str).ok() == Some("Link"))
                .filter_map(|annot| {
                    let Some(target) = link_target(doc, annot, &page_numbers) else {
                        log::debug!("Page {}: link annotation without a readable target", page);
                        return None;
                    };
                    let text = annot
                        .get(b"Contents")
                        .ok()
                        .and_then(|o| resolve(doc, o))
                        .and_then(|o| o.as_str().ok())
                        .map(|bytes| decode_pdf_string(bytes).trim().to_string())
                        .unwrap_or_default();
                    Some(PdfLink { page, target, text })
                })
                .collect();
            if !found.is_empty() {
                links.insert(page, found);
            }
        }
        links
    }
}

/// Annotation dictionaries of a page, stored inline or by reference.
fn page_annotations(doc: &Document, page_id: ObjectId) -> Vec<&Dictionary> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let Some(Object::Array(annots)) = page.get(b"Annots").ok().and_then(|o| resolve(doc, o)) else {
        return Vec::new();
    };
    annots
        .iter()
        .filter_map(|entry| resolve(doc, entry))
        .filter_map(|obj| obj.as_dict().ok())
        .collect()
}

fn link_target(doc: &Document, annot: &Dictionary, pages: &HashMap<ObjectId, u32>) -> Option<LinkTarget> {
    if let Some(action) = resolve_dict(doc, annot, b"A") {
        return match action.get(b"S").and_then(Object::as_name_str).ok()? {
            "URI" => {
                let uri = action.get(b"URI").ok().and_then(|o| resolve(doc, o))?.as_str().ok()?;
                let uri = decode_pdf_string(uri).trim().to_string();
                (!uri.is_empty()).then_some(LinkTarget::Uri(uri))
            }
            "GoTo" => destination(doc, action.get(b"D").ok()?, pages, 0),
            _ => None,
        };
    }
    destination(doc, annot.get(b"Dest").ok()?, pages, 0)
}

/// Resolve an explicit destination array to a page, or keep a name.
fn destination(doc: &Document, dest: &Object, pages: &HashMap<ObjectId, u32>, depth: usize) -> Option<LinkTarget> {
    if depth > MAX_DEST_DEPTH {
        return None;
    }
    match resolve(doc, dest)? {
        Object::Array(items) => match items.first()? {
            Object::Reference(id) => pages.get(id).map(|page| LinkTarget::Page(*page)),
            // Remote destinations count pages from zero
            Object::Integer(index) => u32::try_from(index + 1).ok().map(LinkTarget::Page),
            _ => None,
        },
        Object::Name(name) => Some(LinkTarget::Named(String::from_utf8_lossy(name).into_owned())),
        Object::String(bytes, _) => Some(LinkTarget::Named(decode_pdf_string(bytes))),
        Object::Dictionary(dict) => destination(doc, dict.get(b"D").ok()?, pages, depth + 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::{build_pdf, TestPage};
    use lopdf::StringFormat;

    fn page(lines: &'static [&'static str]) -> TestPage<'static> {
        TestPage {
            lines,
            draws: &[],
            images: &[],
        }
    }

    fn uri_annotation(uri: &str) -> Dictionary {
        Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Annot".to_vec())),
            ("Subtype", Object::Name(b"Link".to_vec())),
            (
                "A",
                Object::Dictionary(Dictionary::from_iter(vec![
                    ("S", Object::Name(b"URI".to_vec())),
                    ("URI", Object::String(uri.as_bytes().to_vec(), StringFormat::Literal)),
                ])),
            ),
        ])
    }

    /// Attach annotations to pages of a built PDF.
    fn annotate(bytes: &[u8], annotations: Vec<(u32, Dictionary)>) -> Vec<u8> {
        let mut doc = Document::load_mem(bytes).unwrap();
        let pages = doc.get_pages();
        let mut per_page: BTreeMap<u32, Vec<Object>> = BTreeMap::new();
        for (page, annot) in annotations {
            let id = doc.add_object(annot);
            per_page.entry(page).or_default().push(Object::Reference(id));
        }
        for (page, annots) in per_page {
            let page_dict = doc.get_object_mut(pages[&page]).unwrap().as_dict_mut().unwrap();
            page_dict.set("Annots", Object::Array(annots));
        }
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_uri_and_page_links() {
        let bytes = build_pdf(&[page(&["Links"]), page(&["Target"])]);
        let pages = Document::load_mem(&bytes).unwrap().get_pages();
        let goto_second = Dictionary::from_iter(vec![
            ("Subtype", Object::Name(b"Link".to_vec())),
            (
                "Dest",
                Object::Array(vec![Object::Reference(pages[&2]), Object::Name(b"Fit".to_vec())]),
            ),
        ]);
        let mut described = uri_annotation(" https://example.com/docs ");
        described.set("Contents", Object::string_literal("Product docs"));
        let bytes = annotate(&bytes, vec![(1, described), (1, goto_second)]);

        let pdf = PdfExtractor::from_bytes(&bytes, "doc.pdf").unwrap();
        let links = pdf.link_annotations();
        assert_eq!(links.len(), 1);
        assert_eq!(
            links[&1],
            vec![
                PdfLink {
                    page: 1,
                    target: LinkTarget::Uri("https://example.com/docs".to_string()),
                    text: "Product docs".to_string(),
                },
                PdfLink {
                    page: 1,
                    target: LinkTarget::Page(2),
                    text: String::new(),
                },
            ]
        );
    }

    #[test]
    fn test_named_goto_and_other_annotations() {
        let bytes = build_pdf(&[page(&["Links"])]);
        let goto_named = Dictionary::from_iter(vec![
            ("Subtype", Object::Name(b"Link".to_vec())),
            (
                "A",
                Object::Dictionary(Dictionary::from_iter(vec![
                    ("S", Object::Name(b"GoTo".to_vec())),
                    ("D", Object::string_literal("chapter-2")),
                ])),
            ),
        ]);
        let javascript = Dictionary::from_iter(vec![
            ("Subtype", Object::Name(b"Link".to_vec())),
            (
                "A",
                Object::Dictionary(Dictionary::from_iter(vec![
                    ("S", Object::Name(b"JavaScript".to_vec())),
                    ("JS", Object::string_literal("app.alert(1)")),
                ])),
            ),
        ]);
        let note = Dictionary::from_iter(vec![
            ("Subtype", Object::Name(b"Text".to_vec())),
            ("Contents", Object::string_literal("A sticky note")),
        ]);
        let bytes = annotate(&bytes, vec![(1, goto_named), (1, javascript), (1, note)]);

        let links = PdfExtractor::from_bytes(&bytes, "doc.pdf").unwrap().link_annotations();
        assert_eq!(links[&1].len(), 1);
        assert_eq!(links[&1][0].target, LinkTarget::Named("chapter-2".to_string()));
        assert_eq!(links[&1][0].target.to_string(), "#chapter-2");
        assert_eq!(links[&1][0].target.uri(), None);
    }

    #[test]
    fn test_pages_without_links_are_absent() {
        let bytes = build_pdf(&[page(&["No links"])]);
        let links = PdfExtractor::from_bytes(&bytes, "doc.pdf").unwrap().link_annotations();
        assert!(links.is_empty());
    }
}
