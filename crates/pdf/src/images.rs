//! Per-page image counting.

use crate::extract::{page_resources, resolve, resolve_dict, PdfExtractor};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Form XObjects nested deeper than this are not followed.
const MAX_FORM_DEPTH: usize = 8;

/// How a page's image count was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMethod {
    /// Image draws found in the content stream, Form XObjects followed.
    ContentStream,
    /// Distinct image XObjects listed in the page resources.
    Resources,
}

impl CountMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountMethod::ContentStream => "content stream",
            CountMethod::Resources => "resources",
        }
    }
}

/// Image count options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCountOptions {
    /// Images subtracted from every page (logos, banners), floored at zero.
    pub decorative_per_page: usize,
}

impl Default for ImageCountOptions {
    fn default() -> Self {
        Self {
            decorative_per_page: 1,
        }
    }
}

/// Image count for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImageCount {
    pub page: u32,
    /// Images found before the decorative discount.
    pub raw: usize,
    /// Images after the decorative discount.
    pub count: usize,
    pub method: CountMethod,
}

impl PdfExtractor {
    /// Count images on every page, keyed by 1-based page number.
    pub fn image_counts(&self, options: &ImageCountOptions) -> BTreeMap<u32, PageImageCount> {
        let doc = self.document();
        let mut counts = BTreeMap::new();

        for (page, page_id) in doc.get_pages() {
            let resources = page_resources(doc, page_id);
            let (raw, method) = match count_drawn_images(doc, page_id, resources) {
                Some(raw) => (raw, CountMethod::ContentStream),
                None => {
                    log::debug!("Page {}: content stream unreadable, counting resources", page);
                    (count_resource_images(doc, resources), CountMethod::Resources)
                }
            };
            counts.insert(
                page,
                PageImageCount {
                    page,
                    raw,
                    count: raw.saturating_sub(options.decorative_per_page),
                    method,
                },
            );
        }
        counts
    }
}

/// Image draws in the page content, or `None` if the content cannot be decoded.
fn count_drawn_images(doc: &Document, page_id: ObjectId, resources: Option<&Dictionary>) -> Option<usize> {
    let content = doc.get_page_content(page_id).ok()?;
    let content = Content::decode(&content).ok()?;
    let mut visited = HashSet::new();
    Some(count_in_content(doc, &content, resources, &mut visited, 0))
}

fn count_in_content(
    doc: &Document,
    content: &Content,
    resources: Option<&Dictionary>,
    visited: &mut HashSet<ObjectId>,
    depth: usize,
) -> usize {
    let xobjects = resources.and_then(|r| resolve_dict(doc, r, b"XObject"));
    let mut count = 0;

    for op in &content.operations {
        match op.operator.as_str() {
            // Inline image
            "BI" => count += 1,
            "Do" => {
                let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                    continue;
                };
                let Some(entry) = xobjects.and_then(|x| x.get(name).ok()) else {
                    continue;
                };
                count += count_xobject(doc, entry, resources, visited, depth);
            }
            _ => {}
        }
    }
    count
}

/// Images drawn by one `Do`: 1 for an image, the nested draws for a form.
fn count_xobject(
    doc: &Document,
    entry: &Object,
    parent_resources: Option<&Dictionary>,
    visited: &mut HashSet<ObjectId>,
    depth: usize,
) -> usize {
    let Some(stream) = resolve(doc, entry).and_then(|o| o.as_stream().ok()) else {
        return 0;
    };
    let subtype = stream.dict.get(b"Subtype").and_then(|s| s.as_name()).ok();
    match subtype {
        Some(b"Image") => 1,
        Some(b"Form") if depth < MAX_FORM_DEPTH => {
            // A form already being expanded would recurse forever
            if let Object::Reference(id) = entry {
                if !visited.insert(*id) {
                    return 0;
                }
            }
            let bytes = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            let count = match Content::decode(&bytes) {
                Ok(content) => {
                    let resources = resolve_dict(doc, &stream.dict, b"Resources").or(parent_resources);
                    count_in_content(doc, &content, resources, visited, depth + 1)
                }
                Err(_) => 0,
            };
            if let Object::Reference(id) = entry {
                visited.remove(id);
            }
            count
        }
        _ => 0,
    }
}

/// Distinct image XObjects in the page resources.
fn count_resource_images(doc: &Document, resources: Option<&Dictionary>) -> usize {
    let Some(xobjects) = resources.and_then(|r| resolve_dict(doc, r, b"XObject")) else {
        return 0;
    };
    xobjects
        .iter()
        .filter_map(|(_, obj)| resolve(doc, obj))
        .filter_map(|obj| obj.as_stream().ok())
        .filter(|stream| {
            stream
                .dict
                .get(b"Subtype")
                .and_then(|s| s.as_name())
                .is_ok_and(|s| s == b"Image")
        })
        .count()
}
