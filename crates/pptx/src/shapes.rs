//! Shape extraction from slide and notes XML.

use doccheck_core::{Error, FormatRun, Paragraph, Result, Table};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Content carried by a shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeContent {
    Text(Vec<Paragraph>),
    Table(Table),
    /// A picture; `embed` is the relationship id of the image part.
    Picture { embed: String, hash: Option<String> },
}

/// A shape on a slide, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub name: String,
    /// Placeholder type (`title`, `ctrTitle`, `body`, `sldNum`, ...).
    pub placeholder: Option<String>,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
    pub content: ShapeContent,
}

impl Shape {
    /// True for title and centered-title placeholders.
    pub fn is_title(&self) -> bool {
        matches!(self.placeholder.as_deref(), Some("title") | Some("ctrTitle"))
    }

    /// Paragraphs of a text shape, empty for other shapes.
    pub fn paragraphs(&self) -> &[Paragraph] {
        match &self.content {
            ShapeContent::Text(paragraphs) => paragraphs,
            _ => &[],
        }
    }

    /// Paragraph texts joined by newlines.
    pub fn text(&self) -> String {
        self.paragraphs()
            .iter()
            .map(|p| p.text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Shapes of one XML part and whether the part is hidden.
#[derive(Debug, Default)]
pub struct ParsedPart {
    pub shapes: Vec<Shape>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Sp,
    Pic,
    GraphicFrame,
}

impl Element {
    fn from_local(name: &[u8]) -> Option<Self> {
        match name {
            b"sp" => Some(Element::Sp),
            b"pic" => Some(Element::Pic),
            b"graphicFrame" => Some(Element::GraphicFrame),
            _ => None,
        }
    }
}

/// A shape being assembled while its element is open.
#[derive(Debug)]
struct ShapeBuilder {
    element: Element,
    name: String,
    placeholder: Option<String>,
    offset: Option<(i64, i64)>,
    extent: Option<(i64, i64)>,
    paragraphs: Vec<Paragraph>,
    embed: Option<String>,
    rows: Vec<Vec<String>>,
}

impl ShapeBuilder {
    fn new(element: Element) -> Self {
        Self {
            element,
            name: String::new(),
            placeholder: None,
            offset: None,
            extent: None,
            paragraphs: Vec::new(),
            embed: None,
            rows: Vec::new(),
        }
    }

    fn finish(self) -> Option<Shape> {
        let content = match self.element {
            Element::Sp => ShapeContent::Text(self.paragraphs),
            Element::Pic => ShapeContent::Picture {
                embed: self.embed?,
                hash: None,
            },
            // Charts, diagrams and OLE objects carry no table rows
            Element::GraphicFrame if self.rows.is_empty() => return None,
            Element::GraphicFrame => ShapeContent::Table(Table::new(self.rows)),
        };
        let (left, top) = self.offset.unwrap_or_default();
        let (width, height) = self.extent.unwrap_or_default();
        Some(Shape {
            name: self.name,
            placeholder: self.placeholder,
            left,
            top,
            width,
            height,
            content,
        })
    }
}

/// Streaming state for one XML part.
#[derive(Debug, Default)]
struct ShapeCollector {
    parsed: ParsedPart,
    current: Option<ShapeBuilder>,
    paragraph: Option<Paragraph>,
    run: Option<FormatRun>,
    row: Option<Vec<String>>,
    cell: Option<String>,
    in_run_props: bool,
    in_text: bool,
}

impl ShapeCollector {
    fn open(&mut self, e: &BytesStart, empty: bool) {
        let name = e.name();
        match local_name(name.as_ref()) {
            b"sld" => {
                self.parsed.hidden = attr(e, b"show").is_some_and(|v| v == "0" || v == "false");
            }
            local @ (b"sp" | b"pic" | b"graphicFrame") if !empty && self.current.is_none() => {
                if let Some(element) = Element::from_local(local) {
                    self.current = Some(ShapeBuilder::new(element));
                }
            }
            b"cNvPr" => {
                if let Some(shape) = self.current.as_mut().filter(|s| s.name.is_empty()) {
                    shape.name = attr(e, b"name").unwrap_or_default();
                }
            }
            b"ph" => {
                if let Some(shape) = self.current.as_mut() {
                    shape.placeholder = Some(attr(e, b"type").unwrap_or_else(|| "body".to_string()));
                }
            }
            b"off" => {
                if let Some(shape) = self.current.as_mut().filter(|s| s.offset.is_none()) {
                    shape.offset = Some((int_attr(e, b"x"), int_attr(e, b"y")));
                }
            }
            b"ext" => {
                // a:ext also appears inside extension lists, without cx/cy
                if let (Some(shape), Some(cx)) = (self.current.as_mut(), attr(e, b"cx")) {
                    if shape.extent.is_none() {
                        shape.extent = Some((cx.parse().unwrap_or(0), int_attr(e, b"cy")));
                    }
                }
            }
            b"blip" => {
                if let Some(shape) = self.current.as_mut() {
                    shape.embed = attr(e, b"embed");
                }
            }
            b"tr" if !empty => self.row = Some(Vec::new()),
            b"tc" => {
                if empty {
                    if let Some(row) = self.row.as_mut() {
                        row.push(String::new());
                    }
                } else {
                    self.cell = Some(String::new());
                }
            }
            b"p" if !empty => {
                if let Some(cell) = self.cell.as_mut() {
                    if !cell.is_empty() {
                        cell.push('\n');
                    }
                } else if self.current.is_some() {
                    self.paragraph = Some(Paragraph::default());
                }
            }
            b"pPr" => {
                if let Some(paragraph) = self.paragraph.as_mut() {
                    paragraph.level = int_attr(e, b"lvl").max(0) as u32;
                }
            }
            b"r" | b"fld" if !empty => self.run = Some(FormatRun::default()),
            b"rPr" => {
                if let Some(run) = self.run.as_mut() {
                    run.bold = attr(e, b"b").map(|v| v == "1" || v == "true");
                    run.italic = attr(e, b"i").map(|v| v == "1" || v == "true");
                    self.in_run_props = !empty;
                }
            }
            b"srgbClr" if self.in_run_props => {
                if let Some(run) = self.run.as_mut() {
                    run.color = attr(e, b"val");
                }
            }
            b"latin" if self.in_run_props => {
                if let Some(run) = self.run.as_mut() {
                    run.font = attr(e, b"typeface");
                }
            }
            b"br" => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.push('\n');
                } else if let Some(paragraph) = self.paragraph.as_mut() {
                    paragraph.runs.push(FormatRun::plain("\n"));
                }
            }
            b"t" if !empty => self.in_text = true,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if !self.in_text {
            return;
        }
        if let Some(cell) = self.cell.as_mut() {
            cell.push_str(text);
        } else if let Some(run) = self.run.as_mut() {
            run.text.push_str(text);
        }
    }

    fn close(&mut self, local: &[u8]) {
        match local {
            b"t" => self.in_text = false,
            b"rPr" => self.in_run_props = false,
            b"r" | b"fld" => {
                if let (Some(run), Some(paragraph)) = (self.run.take(), self.paragraph.as_mut()) {
                    paragraph.runs.push(run);
                }
            }
            b"p" => {
                if let (Some(paragraph), Some(shape)) = (self.paragraph.take(), self.current.as_mut()) {
                    shape.paragraphs.push(paragraph);
                }
            }
            b"tc" => {
                if let (Some(cell), Some(row)) = (self.cell.take(), self.row.as_mut()) {
                    row.push(cell.trim().to_string());
                }
            }
            b"tr" => {
                if let (Some(row), Some(shape)) = (self.row.take(), self.current.as_mut()) {
                    shape.rows.push(row);
                }
            }
            local => {
                let closes_current = Element::from_local(local)
                    .zip(self.current.as_ref())
                    .is_some_and(|(element, shape)| shape.element == element);
                if closes_current {
                    if let Some(shape) = self.current.take().and_then(ShapeBuilder::finish) {
                        self.parsed.shapes.push(shape);
                    }
                    self.paragraph = None;
                    self.run = None;
                }
            }
        }
    }
}

/// Parse the shapes of a slide, layout or notes part in document order.
///
/// Group shapes are flattened: their children appear in place.
pub fn parse_shapes(xml_content: &str) -> Result<ParsedPart> {
    let mut reader = Reader::from_str(xml_content);
    // Run text keeps its own spacing
    reader.trim_text(false);

    let mut collector = ShapeCollector::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => collector.open(e, false),
            Ok(Event::Empty(ref e)) => collector.open(e, true),
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| Error::XmlError(format!("Bad text content: {}", err)))?;
                collector.text(&text);
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                collector.close(local_name(name.as_ref()));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(collector.parsed)
}

/// Extract the local name from a potentially namespaced XML element name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Value of the attribute with the given local name.
pub(crate) fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn int_attr(e: &BytesStart, key: &[u8]) -> i64 {
    attr(e, key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:cSld><p:spTree>
    <p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
    <p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/></a:xfrm></p:grpSpPr>
    <p:sp>
      <p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
      <p:spPr><a:xfrm><a:off x="100" y="200"/><a:ext cx="300" cy="400"/></a:xfrm></p:spPr>
      <p:txBody><a:bodyPr/><a:p><a:r><a:rPr lang="en-US"/><a:t>Quarterly &amp; Annual</a:t></a:r></a:p></p:txBody>
    </p:sp>
    <p:sp>
      <p:nvSpPr><p:cNvPr id="3" name="Content 2"/><p:cNvSpPr/><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr>
      <p:spPr/>
      <p:txBody><a:bodyPr/>
        <a:p><a:r><a:rPr b="1"/><a:t>Bold </a:t></a:r><a:r><a:rPr i="1"><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill><a:latin typeface="Arial"/></a:rPr><a:t>red italic</a:t></a:r></a:p>
        <a:p><a:pPr lvl="1"/><a:r><a:t>Nested</a:t></a:r><a:br/><a:r><a:t>after break</a:t></a:r></a:p>
      </p:txBody>
    </p:sp>
    <p:grpSp>
      <p:nvGrpSpPr><p:cNvPr id="4" name="Group 3"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
      <p:grpSpPr><a:xfrm><a:off x="5" y="5"/><a:ext cx="5" cy="5"/></a:xfrm></p:grpSpPr>
      <p:sp><p:nvSpPr><p:cNvPr id="5" name="Grouped"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/>
        <p:txBody><a:bodyPr/><a:p><a:r><a:t>Inside group</a:t></a:r></a:p></p:txBody></p:sp>
    </p:grpSp>
    <p:pic>
      <p:nvPicPr><p:cNvPr id="6" name="Picture 5"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr>
      <p:blipFill><a:blip r:embed="rId2"><a:extLst><a:ext uri="{28A0092B}"/></a:extLst></a:blip></p:blipFill>
      <p:spPr><a:xfrm><a:off x="10" y="20"/><a:ext cx="30" cy="40"/></a:xfrm></p:spPr>
    </p:pic>
    <p:graphicFrame>
      <p:nvGraphicFramePr><p:cNvPr id="7" name="Table 6"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr>
      <p:xfrm><a:off x="1" y="2"/><a:ext cx="3" cy="4"/></p:xfrm>
      <a:graphic><a:graphicData><a:tbl>
        <a:tr h="1"><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>Name</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>Value</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
        <a:tr h="1"><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>a</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>1</a:t></a:r></a:p><a:p><a:r><a:t>2</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
      </a:tbl></a:graphicData></a:graphic>
    </p:graphicFrame>
  </p:spTree></p:cSld>
</p:sld>"#;

    #[test]
    fn test_shapes_in_document_order() {
        let parsed = parse_shapes(SLIDE).unwrap();
        let names: Vec<&str> = parsed.shapes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Title 1", "Content 2", "Grouped", "Picture 5", "Table 6"]);
        assert!(!parsed.hidden);
    }

    #[test]
    fn test_title_placeholder_and_geometry() {
        let parsed = parse_shapes(SLIDE).unwrap();
        let title = &parsed.shapes[0];
        assert!(title.is_title());
        assert_eq!(title.text(), "Quarterly & Annual");
        assert_eq!((title.left, title.top, title.width, title.height), (100, 200, 300, 400));

        // Placeholder without a type is a body placeholder
        assert_eq!(parsed.shapes[1].placeholder.as_deref(), Some("body"));
        assert_eq!(parsed.shapes[2].placeholder, None);
    }

    #[test]
    fn test_runs_and_levels() {
        let parsed = parse_shapes(SLIDE).unwrap();
        let paragraphs = parsed.shapes[1].paragraphs();
        assert_eq!(paragraphs.len(), 2);

        let runs = &paragraphs[0].runs;
        assert_eq!(runs[0].text, "Bold ");
        assert_eq!(runs[0].bold, Some(true));
        assert_eq!(runs[1].italic, Some(true));
        assert_eq!(runs[1].color.as_deref(), Some("FF0000"));
        assert_eq!(runs[1].font.as_deref(), Some("Arial"));
        assert_eq!(paragraphs[0].text(), "Bold red italic");

        assert_eq!(paragraphs[1].level, 1);
        assert_eq!(paragraphs[1].text(), "Nested\nafter break");
    }

    #[test]
    fn test_picture_and_table() {
        let parsed = parse_shapes(SLIDE).unwrap();
        match &parsed.shapes[3].content {
            ShapeContent::Picture { embed, hash } => {
                assert_eq!(embed, "rId2");
                assert!(hash.is_none());
            }
            other => panic!("expected picture, got {:?}", other),
        }
        assert_eq!((parsed.shapes[3].width, parsed.shapes[3].height), (30, 40));

        match &parsed.shapes[4].content {
            ShapeContent::Table(table) => {
                assert_eq!(table.rows[0], vec!["Name", "Value"]);
                assert_eq!(table.rows[1], vec!["a", "1\n2"]);
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_hidden_slide() {
        let xml = r#"<p:sld xmlns:p="p" show="0"><p:cSld><p:spTree/></p:cSld></p:sld>"#;
        assert!(parse_shapes(xml).unwrap().hidden);
    }

    #[test]
    fn test_malformed_xml_is_error() {
        let xml = r#"<p:sld><p:cSld></p:sld>"#;
        assert!(parse_shapes(xml).is_err());
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }
}
