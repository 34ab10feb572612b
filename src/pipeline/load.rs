//! Document loader: `.docx` bytes → node tree + embedded image payloads.
//!
//! A `.docx` file is a ZIP container of XML parts. The loader reads:
//!
//! * `_rels/.rels` to locate the main document part (normally
//!   `word/document.xml`);
//! * the main part's relationships, which map `r:id`/`r:embed` values to
//!   hyperlink targets and media parts;
//! * `word/styles.xml` for style names (`heading 1` …) and
//!   `word/numbering.xml` for list formats, when present;
//! * the body itself, streamed through quick-xml.
//!
//! Images are numbered from 1 in document order and returned alongside the
//! tree; the tree only carries an [`ImageRef`] to each. Caption paragraphs
//! are left as ordinary paragraphs.
//!
//! Text boxes (`w:txbxContent`) and `mc:Fallback` alternatives are skipped:
//! the former nest paragraphs inside paragraphs, the latter duplicate the
//! preferred `mc:Choice` content.

use crate::document::{EmphasisKind, ImageRef, Node};
use crate::error::{ConversionWarning, Docx2WikiError};
use once_cell::sync::Lazy;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};
use zip::ZipArchive;

const DEFAULT_DOCUMENT_PART: &str = "word/document.xml";

/// One embedded image, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub content_type: String,
    pub raw_bytes: Vec<u8>,
    pub alt_text: Option<String>,
    /// 1-based, strictly increasing in document order.
    pub sequence_number: u32,
}

impl ImagePayload {
    /// File extension for uploads, taken from the subtype of the content type
    /// (`image/jpeg` → `jpeg`).
    pub fn extension(&self) -> &str {
        self.content_type
            .split_once('/')
            .map(|(_, sub)| sub.trim_start_matches("x-"))
            .filter(|sub| !sub.is_empty())
            .unwrap_or("bin")
    }
}

/// The loader's output.
#[derive(Debug, Clone, Default)]
pub struct LoadedDocument {
    pub body: Vec<Node>,
    pub images: Vec<ImagePayload>,
    pub warnings: Vec<ConversionWarning>,
}

/// Parse a `.docx` byte stream.
///
/// # Errors
/// [`Docx2WikiError::Load`] if the bytes are not a ZIP archive, the main
/// document part is missing, or any XML part read is malformed.
pub fn load_document(bytes: &[u8]) -> Result<LoadedDocument, Docx2WikiError> {
    let mut parts = Parts::open(bytes)?;

    let document_path = parts
        .read_string("_rels/.rels")?
        .map(|xml| parse_relationships(&xml, ""))
        .transpose()?
        .and_then(|rels| rels.by_type("/officeDocument").map(|r| r.target.clone()))
        .unwrap_or_else(|| DEFAULT_DOCUMENT_PART.to_string());
    let (document_dir, document_name) = split_part_path(&document_path);

    let document_xml = parts.read_string(&document_path)?.ok_or_else(|| {
        Docx2WikiError::load(format!("missing main document part '{}'", document_path))
    })?;

    let rels = match parts.read_string(&format!("{document_dir}_rels/{document_name}.rels"))? {
        Some(xml) => parse_relationships(&xml, document_dir)?,
        None => Relationships::default(),
    };

    let styles = match rels
        .by_type("/styles")
        .map(|r| r.target.clone())
        .map(|path| parts.read_string(&path))
        .transpose()?
        .flatten()
    {
        Some(xml) => parse_styles(&xml)?,
        None => HashMap::new(),
    };

    let numbering = match rels
        .by_type("/numbering")
        .map(|r| r.target.clone())
        .map(|path| parts.read_string(&path))
        .transpose()?
        .flatten()
    {
        Some(xml) => parse_numbering(&xml)?,
        None => Numbering::default(),
    };

    let mut builder = BodyBuilder::new(&mut parts, &rels, &styles, &numbering);
    scan(&document_xml, |ev| builder.handle(ev))?;
    let loaded = builder.finish();

    info!(
        "Loaded document: {} blocks, {} images",
        loaded.body.len(),
        loaded.images.len()
    );
    Ok(loaded)
}

// ── ZIP access ───────────────────────────────────────────────────────────

struct Parts<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Parts<'a> {
    fn open(bytes: &'a [u8]) -> Result<Self, Docx2WikiError> {
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(Docx2WikiError::load)?;
        Ok(Self { archive })
    }

    /// Read a part's bytes; `Ok(None)` if the part does not exist.
    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, Docx2WikiError> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(Docx2WikiError::load(format!("{name}: {e}"))),
        };
        let mut buf = Vec::new();
        entry
            .read_to_end(&mut buf)
            .map_err(|e| Docx2WikiError::load(format!("{name}: {e}")))?;
        Ok(Some(buf))
    }

    fn read_string(&mut self, name: &str) -> Result<Option<String>, Docx2WikiError> {
        match self.read_bytes(name)? {
            Some(bytes) => String::from_utf8(strip_bom(&bytes).to_vec())
                .map(Some)
                .map_err(|e| Docx2WikiError::load(format!("{name}: {e}"))),
            None => Ok(None),
        }
    }
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data)
}

/// `word/document.xml` → (`word/`, `document.xml`)
fn split_part_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    }
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_part_path(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{base_dir}{target}"),
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
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

fn content_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        _ => "application/octet-stream",
    }
}

// ── XML scanning ─────────────────────────────────────────────────────────

/// A flattened XML event. Empty elements are reported as `Open` + `Close`.
enum XmlEvent<'e> {
    Open(&'e BytesStart<'e>),
    Close(&'e [u8]),
    Text(&'e str),
}

fn scan<F>(xml: &str, mut visit: F) -> Result<(), Docx2WikiError>
where
    F: FnMut(XmlEvent<'_>) -> Result<(), Docx2WikiError>,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => visit(XmlEvent::Open(&e))?,
            Ok(Event::Empty(e)) => {
                visit(XmlEvent::Open(&e))?;
                let name = e.name();
                visit(XmlEvent::Close(local_name(name.as_ref())))?;
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                visit(XmlEvent::Close(local_name(name.as_ref())))?;
            }
            Ok(Event::Text(e)) => {
                let text = String::from_utf8_lossy(e.as_ref());
                visit(XmlEvent::Text(&text))?;
            }
            Ok(Event::CData(e)) => {
                let raw = e.into_inner();
                let text = String::from_utf8_lossy(&raw);
                visit(XmlEvent::Text(&text))?;
            }
            Ok(Event::GeneralRef(e)) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    visit(XmlEvent::Text(&resolved))?;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Docx2WikiError::load(format!(
                    "XML error at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };
    code.and_then(char::from_u32).map(|c| c.to_string())
}

/// Attribute value by local name (`w:val`, `r:id` → `val`, `id`), unescaped.
fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == key)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            let unescaped = unescape(&raw).map(|c| c.into_owned()).ok();
            unescaped.unwrap_or(raw)
        })
}

/// On/off properties such as `<w:b/>` or `<w:i w:val="0"/>`.
fn toggle_on(e: &BytesStart<'_>) -> bool {
    !matches!(
        attr(e, b"val").as_deref(),
        Some("0") | Some("false") | Some("off") | Some("none")
    )
}

fn open_name<'e>(e: &'e BytesStart<'e>) -> Vec<u8> {
    local_name(e.name().as_ref()).to_vec()
}

// ── Relationships ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Relationship {
    rel_type: String,
    /// Resolved part path, or the raw URL for external targets.
    target: String,
    external: bool,
}

#[derive(Debug, Clone, Default)]
struct Relationships {
    by_id: HashMap<String, Relationship>,
}

impl Relationships {
    fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id)
    }

    fn by_type(&self, suffix: &str) -> Option<&Relationship> {
        self.by_id.values().find(|r| r.rel_type.ends_with(suffix))
    }
}

fn parse_relationships(xml: &str, base_dir: &str) -> Result<Relationships, Docx2WikiError> {
    let mut rels = Relationships::default();
    scan(xml, |ev| {
        if let XmlEvent::Open(e) = ev {
            if local_name(e.name().as_ref()) == b"Relationship" {
                let (Some(id), Some(target)) = (attr(e, b"Id"), attr(e, b"Target")) else {
                    return Ok(());
                };
                let external = attr(e, b"TargetMode").as_deref() == Some("External");
                let target = if external {
                    target
                } else {
                    resolve_part_path(base_dir, &target)
                };
                rels.by_id.insert(
                    id,
                    Relationship {
                        rel_type: attr(e, b"Type").unwrap_or_default(),
                        target,
                        external,
                    },
                );
            }
        }
        Ok(())
    })?;
    Ok(rels)
}

// ── Styles ───────────────────────────────────────────────────────────────

/// styleId → lower-cased style name.
fn parse_styles(xml: &str) -> Result<HashMap<String, String>, Docx2WikiError> {
    let mut styles = HashMap::new();
    let mut current: Option<String> = None;
    scan(xml, |ev| {
        match ev {
            XmlEvent::Open(e) => match local_name(e.name().as_ref()) {
                b"style" => current = attr(e, b"styleId"),
                b"name" => {
                    if let (Some(id), Some(name)) = (current.as_ref(), attr(e, b"val")) {
                        styles.insert(id.clone(), name.to_lowercase());
                    }
                }
                _ => {}
            },
            XmlEvent::Close(b"style") => current = None,
            _ => {}
        }
        Ok(())
    })?;
    Ok(styles)
}

static RE_HEADING_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^heading\s*([1-9])$").unwrap());
static RE_HEADING_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^heading([1-9])$").unwrap());

/// Heading level for a paragraph style, from its name or else its id.
fn heading_level(style_id: &str, styles: &HashMap<String, String>) -> Option<u8> {
    let caps = styles
        .get(style_id)
        .and_then(|name| RE_HEADING_NAME.captures(name))
        .or_else(|| RE_HEADING_ID.captures(style_id))?;
    caps[1].parse().ok()
}

// ── Numbering ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Numbering {
    /// numId → abstractNumId
    nums: HashMap<String, String>,
    /// (abstractNumId, ilvl) → numFmt
    formats: HashMap<(String, u8), String>,
}

impl Numbering {
    fn is_ordered(&self, num_id: &str, level: u8) -> bool {
        self.nums
            .get(num_id)
            .and_then(|abs| self.formats.get(&(abs.clone(), level)))
            .is_some_and(|fmt| fmt != "bullet" && fmt != "none")
    }
}

fn parse_numbering(xml: &str) -> Result<Numbering, Docx2WikiError> {
    let mut numbering = Numbering::default();
    let mut abstract_id: Option<String> = None;
    let mut level: Option<u8> = None;
    let mut num_id: Option<String> = None;

    scan(xml, |ev| {
        match ev {
            XmlEvent::Open(e) => match local_name(e.name().as_ref()) {
                b"abstractNum" => abstract_id = attr(e, b"abstractNumId"),
                b"lvl" => level = attr(e, b"ilvl").and_then(|v| v.parse().ok()),
                b"numFmt" => {
                    if let (Some(abs), Some(lvl), Some(fmt)) =
                        (abstract_id.as_ref(), level, attr(e, b"val"))
                    {
                        numbering.formats.insert((abs.clone(), lvl), fmt);
                    }
                }
                b"num" => num_id = attr(e, b"numId"),
                b"abstractNumId" => {
                    if let (Some(num), Some(abs)) = (num_id.as_ref(), attr(e, b"val")) {
                        numbering.nums.insert(num.clone(), abs);
                    }
                }
                _ => {}
            },
            XmlEvent::Close(b"abstractNum") => abstract_id = None,
            XmlEvent::Close(b"lvl") => level = None,
            XmlEvent::Close(b"num") => num_id = None,
            _ => {}
        }
        Ok(())
    })?;
    Ok(numbering)
}

// ── Body ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RunState {
    bold: bool,
    italic: bool,
    in_props: bool,
}

impl RunState {
    fn kinds(&self) -> Vec<EmphasisKind> {
        let mut kinds = Vec::with_capacity(2);
        if self.bold {
            kinds.push(EmphasisKind::Bold);
        }
        if self.italic {
            kinds.push(EmphasisKind::Italic);
        }
        kinds
    }
}

#[derive(Debug)]
struct LinkState {
    href: Option<String>,
    text: String,
}

/// An open complex field (`w:fldChar` begin … end).
#[derive(Debug, Default)]
struct FieldState {
    instr: String,
    /// The field is a `HYPERLINK` and its result runs feed `BodyBuilder::link`.
    opened_link: bool,
}

#[derive(Debug, Default)]
struct DrawingState {
    alt_text: Option<String>,
    title: Option<String>,
    embed: Option<String>,
}

#[derive(Debug, Default)]
struct ParagraphState {
    style_id: Option<String>,
    num_id: Option<String>,
    ilvl: u8,
    in_props: bool,
    inlines: Vec<Node>,
}

enum Frame {
    Table { rows: Vec<Node> },
    Row { cells: Vec<Node>, header: bool },
    Cell { colspan: u32, merge_continue: bool, blocks: Vec<Node> },
}

struct BodyBuilder<'p, 'a> {
    parts: &'p mut Parts<'a>,
    rels: &'p Relationships,
    styles: &'p HashMap<String, String>,
    numbering: &'p Numbering,

    body: Vec<Node>,
    frames: Vec<Frame>,
    paragraph: Option<ParagraphState>,
    run: Option<RunState>,
    link: Option<LinkState>,
    fields: Vec<FieldState>,
    simple_field_link: bool,
    drawing: Option<DrawingState>,
    in_text: bool,
    in_instr: bool,
    skip_depth: usize,

    images: Vec<ImagePayload>,
    warnings: Vec<ConversionWarning>,
}

impl<'p, 'a> BodyBuilder<'p, 'a> {
    fn new(
        parts: &'p mut Parts<'a>,
        rels: &'p Relationships,
        styles: &'p HashMap<String, String>,
        numbering: &'p Numbering,
    ) -> Self {
        Self {
            parts,
            rels,
            styles,
            numbering,
            body: Vec::new(),
            frames: Vec::new(),
            paragraph: None,
            run: None,
            link: None,
            fields: Vec::new(),
            simple_field_link: false,
            drawing: None,
            in_text: false,
            in_instr: false,
            skip_depth: 0,
            images: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn finish(self) -> LoadedDocument {
        LoadedDocument {
            body: self.body,
            images: self.images,
            warnings: self.warnings,
        }
    }

    fn handle(&mut self, ev: XmlEvent<'_>) -> Result<(), Docx2WikiError> {
        if self.skip_depth > 0 {
            match ev {
                XmlEvent::Open(_) => self.skip_depth += 1,
                XmlEvent::Close(_) => self.skip_depth -= 1,
                XmlEvent::Text(_) => {}
            }
            return Ok(());
        }

        match ev {
            XmlEvent::Open(e) => self.open(e),
            XmlEvent::Close(name) => self.close(name),
            XmlEvent::Text(text) => {
                if self.in_text {
                    self.push_text(text);
                } else if self.in_instr {
                    if let Some(field) = self.fields.last_mut() {
                        field.instr.push_str(text);
                    }
                }
                Ok(())
            }
        }
    }

    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), Docx2WikiError> {
        match open_name(e).as_slice() {
            b"Fallback" | b"txbxContent" => self.skip_depth = 1,

            b"tbl" => self.frames.push(Frame::Table { rows: Vec::new() }),
            b"tr" => self.frames.push(Frame::Row {
                cells: Vec::new(),
                header: false,
            }),
            b"tblHeader" => {
                if toggle_on(e) {
                    if let Some(Frame::Row { header, .. }) = self.frames.last_mut() {
                        *header = true;
                    }
                }
            }
            b"tc" => self.frames.push(Frame::Cell {
                colspan: 1,
                merge_continue: false,
                blocks: Vec::new(),
            }),
            b"gridSpan" => {
                if let Some(Frame::Cell { colspan, .. }) = self.frames.last_mut() {
                    *colspan = attr(e, b"val")
                        .and_then(|v| v.parse().ok())
                        .filter(|n| *n >= 1)
                        .unwrap_or(1);
                }
            }
            b"hMerge" => {
                if let Some(Frame::Cell { merge_continue, .. }) = self.frames.last_mut() {
                    *merge_continue = attr(e, b"val").as_deref() != Some("restart");
                }
            }

            b"p" => self.paragraph = Some(ParagraphState::default()),
            b"pPr" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.in_props = true;
                }
            }
            b"pStyle" => {
                if let Some(p) = self.paragraph.as_mut().filter(|p| p.in_props) {
                    p.style_id = attr(e, b"val");
                }
            }
            b"ilvl" => {
                if let Some(p) = self.paragraph.as_mut().filter(|p| p.in_props) {
                    p.ilvl = attr(e, b"val").and_then(|v| v.parse().ok()).unwrap_or(0);
                }
            }
            b"numId" => {
                if let Some(p) = self.paragraph.as_mut().filter(|p| p.in_props) {
                    p.num_id = attr(e, b"val").filter(|v| v != "0");
                }
            }

            b"hyperlink" => {
                let href = match attr(e, b"id").and_then(|id| self.rels.get(&id)) {
                    Some(rel) if rel.external => Some(rel.target.clone()),
                    _ => attr(e, b"anchor").map(|a| format!("#{a}")),
                };
                self.link = Some(LinkState {
                    href,
                    text: String::new(),
                });
            }

            b"fldChar" => self.field_char(attr(e, b"fldCharType").as_deref()),
            b"instrText" => self.in_instr = !self.fields.is_empty(),
            b"fldSimple" => {
                let href = attr(e, b"instr").as_deref().and_then(field_hyperlink);
                if let Some(href) = href.filter(|_| self.link.is_none()) {
                    self.simple_field_link = true;
                    self.link = Some(LinkState {
                        href: Some(href),
                        text: String::new(),
                    });
                }
            }

            b"r" => self.run = Some(RunState::default()),
            b"rPr" => {
                if let Some(run) = self.run.as_mut() {
                    run.in_props = true;
                }
            }
            b"b" => {
                if let Some(run) = self.run.as_mut().filter(|r| r.in_props) {
                    run.bold = toggle_on(e);
                }
            }
            b"i" => {
                if let Some(run) = self.run.as_mut().filter(|r| r.in_props) {
                    run.italic = toggle_on(e);
                }
            }
            b"t" => self.in_text = self.run.is_some(),
            b"tab" => {
                if self.in_run_content() {
                    self.push_text("\t");
                }
            }
            b"br" => {
                if self.in_run_content() && attr(e, b"type").as_deref() != Some("page") {
                    self.push_text("\n");
                }
            }
            b"cr" => {
                if self.in_run_content() {
                    self.push_text("\n");
                }
            }
            b"noBreakHyphen" => {
                if self.in_run_content() {
                    self.push_text("-");
                }
            }

            b"drawing" | b"pict" => self.drawing = Some(DrawingState::default()),
            b"docPr" => {
                if let Some(d) = self.drawing.as_mut() {
                    d.alt_text = attr(e, b"descr").filter(|s| !s.trim().is_empty());
                    d.title = attr(e, b"title");
                }
            }
            b"blip" => {
                if let Some(d) = self.drawing.as_mut() {
                    d.embed = attr(e, b"embed").or_else(|| attr(e, b"link"));
                }
            }
            b"shape" => {
                if let Some(d) = self.drawing.as_mut() {
                    if d.alt_text.is_none() {
                        d.alt_text = attr(e, b"alt").filter(|s| !s.trim().is_empty());
                    }
                }
            }
            b"imagedata" => {
                if let Some(d) = self.drawing.as_mut() {
                    d.embed = attr(e, b"id");
                    d.title = attr(e, b"title");
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) -> Result<(), Docx2WikiError> {
        match name {
            b"t" => self.in_text = false,
            b"rPr" => {
                if let Some(run) = self.run.as_mut() {
                    run.in_props = false;
                }
            }
            b"r" => self.run = None,
            b"pPr" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.in_props = false;
                }
            }
            b"hyperlink" => self.finish_link(),
            b"instrText" => self.in_instr = false,
            b"fldSimple" => {
                if std::mem::take(&mut self.simple_field_link) {
                    self.finish_link();
                }
            }
            b"drawing" | b"pict" => {
                if let Some(drawing) = self.drawing.take() {
                    self.finish_drawing(drawing)?;
                }
            }
            b"p" => self.finish_paragraph(),
            b"tc" => self.finish_cell(),
            b"tr" => self.finish_row(),
            b"tbl" => self.finish_table(),
            _ => {}
        }
        Ok(())
    }

    fn field_char(&mut self, kind: Option<&str>) {
        match kind {
            Some("begin") => self.fields.push(FieldState::default()),
            Some("separate") => {
                let Some(field) = self.fields.last_mut() else {
                    return;
                };
                if self.link.is_none() {
                    if let Some(href) = field_hyperlink(&field.instr) {
                        field.opened_link = true;
                        self.link = Some(LinkState {
                            href: Some(href),
                            text: String::new(),
                        });
                    }
                }
            }
            Some("end") => {
                if self.fields.pop().is_some_and(|f| f.opened_link) {
                    self.finish_link();
                }
            }
            _ => {}
        }
    }

    fn finish_link(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        if !link.text.is_empty() {
            self.push_inline(
                &[],
                Node::Link {
                    href: link.href,
                    text: link.text,
                    is_citation: false,
                },
            );
        }
    }

    fn in_run_content(&self) -> bool {
        self.run.as_ref().is_some_and(|r| !r.in_props)
    }

    fn push_text(&mut self, text: &str) {
        if let Some(link) = self.link.as_mut() {
            link.text.push_str(text);
            return;
        }
        let kinds = self.run.as_ref().map(RunState::kinds).unwrap_or_default();
        self.push_inline(&kinds, Node::text(text));
    }

    fn push_inline(&mut self, kinds: &[EmphasisKind], node: Node) {
        if let Some(p) = self.paragraph.as_mut() {
            push_formatted(&mut p.inlines, kinds, node);
        }
    }

    fn finish_drawing(&mut self, drawing: DrawingState) -> Result<(), Docx2WikiError> {
        let Some(embed) = drawing.embed else {
            // Shapes and charts carry no picture.
            return Ok(());
        };

        let part = match self.rels.get(&embed) {
            Some(rel) if !rel.external => rel.target.clone(),
            other => {
                let target = other.map(|r| r.target.clone()).unwrap_or(embed);
                warn!("Image '{}' is not embedded; dropping it", target);
                self.warnings
                    .push(ConversionWarning::UnsupportedImage { target });
                return Ok(());
            }
        };

        let Some(raw_bytes) = self.parts.read_bytes(&part)? else {
            warn!("Image part '{}' is missing; dropping it", part);
            self.warnings
                .push(ConversionWarning::UnsupportedImage { target: part });
            return Ok(());
        };

        let alt_text = drawing.alt_text.or(drawing.title);
        let sequence_number = self.images.len() as u32 + 1;
        debug!(
            "Image {}: {} ({} bytes, alt={:?})",
            sequence_number,
            part,
            raw_bytes.len(),
            alt_text
        );

        self.images.push(ImagePayload {
            content_type: content_type_for(&part).to_string(),
            raw_bytes,
            alt_text: alt_text.clone(),
            sequence_number,
        });
        self.push_inline(
            &[],
            Node::Image(ImageRef {
                sequence_number,
                alt_text,
                remote_id: None,
            }),
        );
        Ok(())
    }

    fn finish_paragraph(&mut self) {
        // A field link may run past its paragraph; keep its text here.
        self.finish_link();
        let Some(p) = self.paragraph.take() else {
            return;
        };
        self.run = None;
        self.in_text = false;

        let has_content = p.inlines.iter().any(|n| match n {
            Node::Image(_) => true,
            other => !other.plain_text().trim().is_empty(),
        });
        if !has_content {
            return;
        }

        let heading = p
            .style_id
            .as_deref()
            .and_then(|id| heading_level(id, self.styles))
            .filter(|level| (1..=4).contains(level));

        let node = if let Some(level) = heading {
            Node::Heading {
                level,
                children: p.inlines,
            }
        } else if let Some(num_id) = p.num_id.as_deref() {
            Node::ListItem {
                ordered: self.numbering.is_ordered(num_id, p.ilvl),
                depth: p.ilvl,
                children: p.inlines,
            }
        } else {
            Node::Paragraph {
                children: p.inlines,
            }
        };
        self.push_block(node);
    }

    fn push_block(&mut self, node: Node) {
        match self.frames.last_mut() {
            Some(Frame::Cell { blocks, .. }) => blocks.push(node),
            _ => self.body.push(node),
        }
    }

    fn finish_cell(&mut self) {
        let Some(Frame::Cell {
            colspan,
            merge_continue,
            blocks,
        }) = self.pop_frame(|f| matches!(f, Frame::Cell { .. }))
        else {
            return;
        };
        let Some(Frame::Row { cells, header }) = self.frames.last_mut() else {
            return;
        };
        if merge_continue {
            if let Some(Node::TableCell { colspan: prev, .. }) = cells.last_mut() {
                *prev += colspan;
                return;
            }
        }
        cells.push(Node::TableCell {
            colspan,
            is_header: *header,
            children: blocks,
        });
    }

    fn finish_row(&mut self) {
        let Some(Frame::Row { cells, .. }) = self.pop_frame(|f| matches!(f, Frame::Row { .. }))
        else {
            return;
        };
        if let Some(Frame::Table { rows }) = self.frames.last_mut() {
            rows.push(Node::TableRow { cells });
        }
    }

    fn finish_table(&mut self) {
        let Some(Frame::Table { rows }) = self.pop_frame(|f| matches!(f, Frame::Table { .. }))
        else {
            return;
        };
        self.push_block(Node::Table { rows });
    }

    /// Pop the top frame if it has the expected kind.
    fn pop_frame(&mut self, expected: impl Fn(&Frame) -> bool) -> Option<Frame> {
        if self.frames.last().is_some_and(expected) {
            self.frames.pop()
        } else {
            None
        }
    }
}

/// Target of a `HYPERLINK` field instruction such as
/// ` HYPERLINK "https://example.org" \o "tip" ` or ` HYPERLINK \l "_Toc1" `.
fn field_hyperlink(instr: &str) -> Option<String> {
    let tokens = field_tokens(instr);
    let (name, args) = tokens.split_first()?;
    if !name.eq_ignore_ascii_case("HYPERLINK") {
        return None;
    }

    let mut url = None;
    let mut anchor = None;
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "\\l" => anchor = args.next().cloned(),
            "\\o" | "\\t" => {
                args.next();
            }
            switch if switch.starts_with('\\') => {}
            _ if url.is_none() => url = Some(arg.clone()),
            _ => {}
        }
    }
    match (url, anchor) {
        (Some(url), Some(anchor)) => Some(format!("{url}#{anchor}")),
        (Some(url), None) => Some(url),
        (None, Some(anchor)) => Some(format!("#{anchor}")),
        (None, None) => None,
    }
}

/// Split a field instruction into words; double quotes group a word.
fn field_tokens(instr: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = instr.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if c == '"' {
            chars.next();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                token.push(c);
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }
    tokens
}

/// Append an inline node under the given emphasis wrappers, merging with the
/// previous sibling when the formatting matches. Word splits runs freely
/// (spell-check marks, revision ids); without merging, `''a''''b''` would
/// come out instead of `''ab''`.
fn push_formatted(target: &mut Vec<Node>, kinds: &[EmphasisKind], node: Node) {
    match kinds.split_first() {
        None => {
            if let (Some(Node::Text(prev)), Node::Text(next)) = (target.last_mut(), &node) {
                prev.push_str(next);
                return;
            }
            target.push(node);
        }
        Some((kind, rest)) => {
            let reuse = matches!(target.last(), Some(Node::Emphasis { kind: k, .. }) if k == kind);
            if !reuse {
                target.push(Node::Emphasis {
                    kind: *kind,
                    children: Vec::new(),
                });
            }
            if let Some(Node::Emphasis { children, .. }) = target.last_mut() {
                push_formatted(children, rest, node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_part_path_handles_relative_and_absolute() {
        assert_eq!(resolve_part_path("word/", "media/image1.png"), "word/media/image1.png");
        assert_eq!(resolve_part_path("word/", "../media/a.png"), "media/a.png");
        assert_eq!(resolve_part_path("word/", "/word/media/b.jpeg"), "word/media/b.jpeg");
        assert_eq!(resolve_part_path("", "word/document.xml"), "word/document.xml");
    }

    #[test]
    fn split_part_path_splits_directory() {
        assert_eq!(split_part_path("word/document.xml"), ("word/", "document.xml"));
        assert_eq!(split_part_path("document.xml"), ("", "document.xml"));
    }

    #[test]
    fn content_types_from_extension() {
        assert_eq!(content_type_for("word/media/image1.PNG"), "image/png");
        assert_eq!(content_type_for("word/media/image2.jpg"), "image/jpeg");
        assert_eq!(content_type_for("word/media/image3.emf"), "image/x-emf");
        assert_eq!(content_type_for("word/media/blob"), "application/octet-stream");
    }

    #[test]
    fn payload_extension_from_content_type() {
        let payload = |ct: &str| ImagePayload {
            content_type: ct.to_string(),
            raw_bytes: vec![],
            alt_text: None,
            sequence_number: 1,
        };
        assert_eq!(payload("image/png").extension(), "png");
        assert_eq!(payload("image/jpeg").extension(), "jpeg");
        assert_eq!(payload("image/x-emf").extension(), "emf");
        assert_eq!(payload("garbage").extension(), "bin");
    }

    #[test]
    fn heading_level_prefers_style_name() {
        let mut styles = HashMap::new();
        styles.insert("Titre1".to_string(), "heading 1".to_string());
        styles.insert("Heading2".to_string(), "custom".to_string());
        assert_eq!(heading_level("Titre1", &styles), Some(1));
        assert_eq!(heading_level("Heading3", &styles), Some(3));
        assert_eq!(heading_level("Caption", &styles), None);
    }

    #[test]
    fn relationships_resolve_against_source_directory() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://www.zotero.org/?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;
        let rels = parse_relationships(xml, "word/").unwrap();
        assert_eq!(rels.get("rId1").unwrap().target, "word/media/image1.png");
        let link = rels.get("rId2").unwrap();
        assert!(link.external);
        assert_eq!(link.target, "https://www.zotero.org/?a=1&b=2");
    }

    #[test]
    fn numbering_distinguishes_bullets() {
        let xml = r#"<w:numbering xmlns:w="w">
  <w:abstractNum w:abstractNumId="0">
    <w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl>
  </w:abstractNum>
  <w:abstractNum w:abstractNumId="1">
    <w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl>
    <w:lvl w:ilvl="1"><w:numFmt w:val="bullet"/></w:lvl>
  </w:abstractNum>
  <w:num w:numId="5"><w:abstractNumId w:val="0"/></w:num>
  <w:num w:numId="6"><w:abstractNumId w:val="1"/></w:num>
</w:numbering>"#;
        let numbering = parse_numbering(xml).unwrap();
        assert!(!numbering.is_ordered("5", 0));
        assert!(numbering.is_ordered("6", 0));
        assert!(!numbering.is_ordered("6", 1));
        assert!(!numbering.is_ordered("99", 0));
    }

    #[test]
    fn push_formatted_merges_matching_runs() {
        let mut inlines = Vec::new();
        push_formatted(&mut inlines, &[EmphasisKind::Italic], Node::text("a"));
        push_formatted(&mut inlines, &[EmphasisKind::Italic], Node::text("b"));
        push_formatted(&mut inlines, &[], Node::text(" c"));
        push_formatted(&mut inlines, &[], Node::text("d"));
        assert_eq!(
            inlines,
            vec![
                Node::Emphasis {
                    kind: EmphasisKind::Italic,
                    children: vec![Node::text("ab")],
                },
                Node::text(" cd"),
            ]
        );
    }

    #[test]
    fn not_a_zip_is_a_load_error() {
        let err = load_document(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, Docx2WikiError::Load { .. }));
    }

    #[test]
    fn entity_resolution() {
        assert_eq!(resolve_entity("amp").as_deref(), Some("&"));
        assert_eq!(resolve_entity("#x41").as_deref(), Some("A"));
        assert_eq!(resolve_entity("#66").as_deref(), Some("B"));
        assert_eq!(resolve_entity("nbsp"), None);
    }

    // ── Body on real parts ───────────────────────────────────────────────

    const REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    /// Zip a minimal package: document body, extra document rels, extra parts.
    fn package(body: &str, rels: &str, parts: &[(&str, &[u8])]) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="w" xmlns:r="r" xmlns:wp="wp" xmlns:a="a" xmlns:mc="mc" xmlns:v="v"><w:body>{body}</w:body></w:document>"#
        );
        let document_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        );
        let mut files: Vec<(&str, &[u8])> = vec![
            ("word/document.xml", document.as_bytes()),
            ("word/_rels/document.xml.rels", document_rels.as_bytes()),
        ];
        files.extend_from_slice(parts);
        for (name, data) in files {
            zip.start_file(name, opts).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn load_body(body: &str) -> LoadedDocument {
        load_document(&package(body, "", &[])).unwrap()
    }

    fn image_rel(id: &str, target: &str) -> String {
        format!(r#"<Relationship Id="{id}" Type="{REL}/image" Target="{target}"/>"#)
    }

    fn drawing(doc_pr: &str, embed: &str) -> String {
        format!(
            r#"<w:r><w:drawing><wp:inline><wp:docPr id="1" {doc_pr}/><a:graphic><a:graphicData><a:blip r:embed="{embed}"/></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
        )
    }

    fn texts(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(Node::plain_text).collect()
    }

    #[test]
    fn numbered_paragraphs_become_list_items() {
        let numbering: &[u8] = br#"<w:numbering xmlns:w="w">
  <w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl><w:lvl w:ilvl="1"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum>
  <w:num w:numId="3"><w:abstractNumId w:val="0"/></w:num>
</w:numbering>"#;
        let item = |ilvl: u8, num: &str, text: &str| {
            format!(
                r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="{ilvl}"/><w:numId w:val="{num}"/></w:numPr></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
            )
        };
        let body = [item(0, "3", "First"), item(1, "3", "Nested"), item(0, "0", "Plain")].concat();
        let rels = format!(r#"<Relationship Id="rIdN" Type="{REL}/numbering" Target="numbering.xml"/>"#);
        let loaded =
            load_document(&package(&body, &rels, &[("word/numbering.xml", numbering)])).unwrap();

        assert_eq!(
            loaded.body,
            vec![
                Node::ListItem {
                    ordered: true,
                    depth: 0,
                    children: vec![Node::text("First")],
                },
                Node::ListItem {
                    ordered: false,
                    depth: 1,
                    children: vec![Node::text("Nested")],
                },
                Node::paragraph(vec![Node::text("Plain")]),
            ]
        );
    }

    #[test]
    fn run_properties_set_and_clear_emphasis() {
        let loaded = load_body(concat!(
            "<w:p>",
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t>bold</w:t></w:r>"#,
            r#"<w:r><w:rPr><w:b w:val="0"/><w:i/></w:rPr><w:t>italic</w:t></w:r>"#,
            r#"<w:r><w:rPr><w:i w:val="false"/></w:rPr><w:t xml:space="preserve"> plain</w:t></w:r>"#,
            "</w:p>",
        ));
        assert_eq!(
            loaded.body,
            vec![Node::paragraph(vec![
                Node::Emphasis {
                    kind: EmphasisKind::Bold,
                    children: vec![Node::text("bold")],
                },
                Node::Emphasis {
                    kind: EmphasisKind::Italic,
                    children: vec![Node::text("italic")],
                },
                Node::text(" plain"),
            ])]
        );
    }

    #[test]
    fn horizontal_merge_folds_into_colspan() {
        let loaded = load_body(concat!(
            "<w:tbl><w:tr>",
            r#"<w:tc><w:tcPr><w:hMerge w:val="restart"/></w:tcPr><w:p><w:r><w:t>A</w:t></w:r></w:p></w:tc>"#,
            r#"<w:tc><w:tcPr><w:hMerge/></w:tcPr><w:p/></w:tc>"#,
            r#"<w:tc><w:p><w:r><w:t>B</w:t></w:r></w:p></w:tc>"#,
            "</w:tr></w:tbl>",
        ));
        let Some(Node::Table { rows }) = loaded.body.first() else {
            panic!("expected a table, got {:?}", loaded.body);
        };
        let spans: Vec<(u32, String)> = rows[0]
            .children()
            .iter()
            .map(|cell| match cell {
                Node::TableCell { colspan, .. } => (*colspan, cell.plain_text()),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(spans, vec![(2, "A".to_string()), (1, "B".to_string())]);
    }

    #[test]
    fn text_boxes_and_fallbacks_are_skipped() {
        let loaded = load_body(concat!(
            r#"<w:p><w:r><w:t>Visible</w:t></w:r>"#,
            r#"<w:r><w:pict><v:shape><v:textbox><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p></w:txbxContent></v:textbox></v:shape></w:pict></w:r>"#,
            r#"<mc:AlternateContent><mc:Choice Requires="wps"><w:r><w:t xml:space="preserve"> chosen</w:t></w:r></mc:Choice>"#,
            r#"<mc:Fallback><w:r><w:t>fallback</w:t></w:r></mc:Fallback></mc:AlternateContent>"#,
            "</w:p>",
        ));
        assert_eq!(texts(&loaded.body), vec!["Visible chosen"]);
        assert!(loaded.images.is_empty());
    }

    #[test]
    fn images_are_numbered_in_document_order_across_tables() {
        let body = [
            format!("<w:p>{}</w:p>", drawing(r#"descr="First""#, "rId1")),
            format!(
                "<w:tbl><w:tr><w:tc><w:p>{}</w:p></w:tc></w:tr></w:tbl>",
                drawing(r#"descr=" " title="Titled""#, "rId2")
            ),
            format!("<w:p>{}</w:p>", drawing("", "rId1")),
        ]
        .concat();
        let rels = [
            image_rel("rId1", "media/image1.png"),
            image_rel("rId2", "media/image2.jpeg"),
        ]
        .concat();
        let loaded = load_document(&package(
            &body,
            &rels,
            &[
                ("word/media/image1.png", b"png".as_slice()),
                ("word/media/image2.jpeg", b"jpg".as_slice()),
            ],
        ))
        .unwrap();

        let summary: Vec<(u32, Option<&str>, &str)> = loaded
            .images
            .iter()
            .map(|i| (i.sequence_number, i.alt_text.as_deref(), i.content_type.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, Some("First"), "image/png"),
                (2, Some("Titled"), "image/jpeg"),
                (3, None, "image/png"),
            ]
        );

        let mut refs = Vec::new();
        let mut body = loaded.body;
        crate::document::walk_body_mut(&mut body, &mut |n| {
            if let Node::Image(image) = n {
                refs.push(image.sequence_number);
            }
        });
        assert_eq!(refs, vec![1, 2, 3]);
    }

    #[test]
    fn dangling_embed_is_reported_and_dropped() {
        let body = format!(
            "<w:p><w:r><w:t>Caption</w:t></w:r>{}{}</w:p>",
            drawing(r#"descr="Gone""#, "rIdMissing"),
            drawing(r#"descr="No part""#, "rIdPart"),
        );
        let rels = image_rel("rIdPart", "media/absent.png");
        let loaded = load_document(&package(&body, &rels, &[])).unwrap();

        assert!(loaded.images.is_empty());
        assert_eq!(loaded.body, vec![Node::paragraph(vec![Node::text("Caption")])]);
        assert_eq!(
            loaded.warnings,
            vec![
                ConversionWarning::UnsupportedImage {
                    target: "rIdMissing".into()
                },
                ConversionWarning::UnsupportedImage {
                    target: "word/media/absent.png".into()
                },
            ]
        );
    }

    #[test]
    fn hyperlink_field_becomes_a_link() {
        let citation = r#"ITEM CSL_CITATION {"citationItems":[{"uris":["http://zotero.org/groups/G/items/A1"]}]}"#;
        let loaded = load_body(&format!(
            concat!(
                "<w:p>",
                r#"<w:r><w:t xml:space="preserve">See </w:t></w:r>"#,
                r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#,
                r#"<w:r><w:instrText xml:space="preserve"> HYPERLINK "https://www.zotero.org/google-docs/?x" </w:instrText></w:r>"#,
                r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#,
                "<w:r><w:t>{}</w:t></w:r>",
                r#"<w:r><w:fldChar w:fldCharType="end"/></w:r>"#,
                r#"<w:r><w:t xml:space="preserve"> now.</w:t></w:r>"#,
                "</w:p>",
            ),
            citation
        ));
        assert_eq!(
            loaded.body,
            vec![Node::paragraph(vec![
                Node::text("See "),
                Node::Link {
                    href: Some("https://www.zotero.org/google-docs/?x".into()),
                    text: citation.to_string(),
                    is_citation: false,
                },
                Node::text(" now."),
            ])]
        );
    }

    #[test]
    fn other_fields_keep_their_result_as_text() {
        let loaded = load_body(concat!(
            "<w:p>",
            r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#,
            r#"<w:r><w:instrText> PAGE </w:instrText></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#,
            "<w:r><w:t>7</w:t></w:r>",
            r#"<w:r><w:fldChar w:fldCharType="end"/></w:r>"#,
            r#"<w:fldSimple w:instr=" HYPERLINK \l &quot;intro&quot; "><w:r><w:t xml:space="preserve"> Intro</w:t></w:r></w:fldSimple>"#,
            "</w:p>",
        ));
        assert_eq!(
            loaded.body,
            vec![Node::paragraph(vec![
                Node::text("7"),
                Node::Link {
                    href: Some("#intro".into()),
                    text: " Intro".into(),
                    is_citation: false,
                },
            ])]
        );
    }

    #[test]
    fn field_hyperlink_targets() {
        assert_eq!(
            field_hyperlink(r#" HYPERLINK "https://example.org/a b" \o "tip" "#).as_deref(),
            Some("https://example.org/a b")
        );
        assert_eq!(
            field_hyperlink(r#"hyperlink https://example.org \l "sec""#).as_deref(),
            Some("https://example.org#sec")
        );
        assert_eq!(field_hyperlink(r#" HYPERLINK \l "_Toc1" "#).as_deref(), Some("#_Toc1"));
        assert_eq!(field_hyperlink(" PAGE "), None);
        assert_eq!(field_hyperlink(" HYPERLINK "), None);
    }
}
