//! Page provider over the `pdf` crate: media box, annotations and
//! positioned glyphs.

use std::collections::HashMap;
use std::path::Path;

use pdf::content::{Matrix, Op, TextDrawAdjusted};
use pdf::error::PdfError;
use pdf::file::{CachedFile, FileOptions};
use pdf::font::{Font, ToUnicodeMap, Widths};
use pdf::object::{Annot, Page, Resolve};
use pdf::primitive::Primitive;

use crate::error::SourceError;
use crate::model::{Annotation, Glyph, MarkupKind, PageContent, Region, TextMarkup};

/// Supplies pages one at a time.
pub trait DocumentSource {
    fn page_count(&self) -> usize;
    fn page(&self, index: usize) -> Result<PageContent, SourceError>;
}

/// Pages already in memory.
impl DocumentSource for Vec<PageContent> {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn page(&self, index: usize) -> Result<PageContent, SourceError> {
        self.get(index).cloned().ok_or_else(|| SourceError::Page {
            page: index + 1,
            reason: "page index out of range".into(),
        })
    }
}

/// A PDF file opened with the default cached options.
pub struct PdfSource {
    file: CachedFile<Vec<u8>>,
}

impl PdfSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = FileOptions::cached()
            .open(path)
            .map_err(|err| SourceError::Open {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        log::info!("opened {} ({} pages)", path.display(), file.num_pages());
        Ok(Self { file })
    }

    fn load_page(&self, index: usize) -> Result<PageContent, PdfError> {
        let page = self.file.get_page(index as u32)?;
        let page_ref: &Page = &page;
        let resolver = self.file.resolver();

        let media_box = page_ref.media_box()?;
        let mut content = PageContent::new(
            index,
            (media_box.right - media_box.left).abs(),
            (media_box.top - media_box.bottom).abs(),
        )
        .with_origin(
            media_box.left.min(media_box.right),
            media_box.bottom.min(media_box.top),
        );

        let annotations = page_ref.annotations.load(&resolver)?;
        content.annotations = annotations
            .iter()
            .map(|annot| read_annotation(annot, &resolver))
            .collect();

        // Annotation text may still come from /Contents, so a broken content
        // stream only costs the glyphs.
        match extract_glyphs(page_ref, &resolver) {
            Ok(glyphs) => content.glyphs = glyphs,
            Err(err) => log::warn!("page {}: no text extracted: {err}", index + 1),
        }
        log::debug!(
            "page {}: {} annotations, {} glyphs",
            index + 1,
            content.annotations.len(),
            content.glyphs.len()
        );
        Ok(content)
    }
}

impl DocumentSource for PdfSource {
    fn page_count(&self) -> usize {
        self.file.num_pages() as usize
    }

    fn page(&self, index: usize) -> Result<PageContent, SourceError> {
        self.load_page(index).map_err(|err| SourceError::Page {
            page: index + 1,
            reason: err.to_string(),
        })
    }
}

fn read_annotation(annot: &Annot, resolver: &impl Resolve) -> Annotation {
    let rect = annot
        .rect
        .as_ref()
        .map(|r| Region::from_corners(r.left, r.bottom, r.right, r.top))
        .unwrap_or_default();
    let Some(kind) = MarkupKind::from_subtype(annot.subtype.as_str()) else {
        return Annotation::Other {
            subtype: annot.subtype.as_str().to_owned(),
            rect,
        };
    };

    let color = annot
        .color
        .clone()
        .and_then(|c| read_numbers(c, resolver).ok())
        .filter(|c| !c.is_empty());
    let quad_points = match annot.other.get("QuadPoints".into()) {
        Some(quads) => match read_numbers(quads.clone(), resolver) {
            Ok(values) => Some(values),
            Err(err) => {
                log::debug!("unreadable QuadPoints: {err}");
                None
            }
        },
        None => None,
    };

    Annotation::Markup(TextMarkup {
        kind,
        color,
        contents: annot.contents.as_ref().map(|s| s.to_string_lossy()),
        quad_points,
        rect,
    })
}

fn read_numbers(value: Primitive, resolver: &impl Resolve) -> Result<Vec<f32>, PdfError> {
    let array = value.resolve(resolver)?.into_array()?;
    array
        .into_iter()
        .map(|item| item.resolve(resolver)?.as_number())
        .collect()
}

/// Text state while walking a content stream.
#[derive(Debug, Clone)]
struct TextState {
    current_font: Option<String>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    text_rise: f32,
    text_matrix: Matrix,
    text_line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            current_font: None,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 100.0,
            leading: 0.0,
            text_rise: 0.0,
            text_matrix: Matrix::default(),
            text_line_matrix: Matrix::default(),
        }
    }
}

impl TextState {
    fn begin_text(&mut self) {
        self.text_matrix = Matrix::default();
        self.text_line_matrix = Matrix::default();
    }

    fn set_text_matrix(&mut self, matrix: Matrix) {
        self.text_matrix = matrix;
        self.text_line_matrix = matrix;
    }

    fn set_font(&mut self, name: &str, size: f32) {
        self.current_font = Some(name.to_owned());
        self.font_size = size;
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.text_line_matrix = multiply_matrix(&translation(tx, ty), &self.text_line_matrix);
        self.text_matrix = self.text_line_matrix;
    }

    fn newline(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    fn translate_text(&mut self, tx: f32) {
        self.text_matrix = multiply_matrix(&translation(tx, 0.0), &self.text_matrix);
    }

    fn horizontal_factor(&self) -> f32 {
        self.horizontal_scale / 100.0
    }

    /// Reinstate parameters saved by `q`. The text matrices belong to the
    /// text object, not the graphics state, and are kept.
    fn restore(&mut self, saved: TextState) {
        *self = TextState {
            text_matrix: self.text_matrix,
            text_line_matrix: self.text_line_matrix,
            ..saved
        };
    }
}

/// Width in glyph units used when a font carries no usable `/Widths`.
///
/// Fixed-pitch fonts (descriptor flag bit 1, or the Courier family) get 600,
/// other fonts with flags 500, and fonts without flags 550.
fn default_glyph_width(base_font: Option<&str>, flags: Option<u32>) -> f32 {
    const FIXED_PITCH: u32 = 1;
    let fixed_pitch_name = base_font.is_some_and(|name| {
        // Subset fonts carry a six-letter tag such as ABCDEF+Courier.
        let name = name.split_once('+').map_or(name, |(_, rest)| rest);
        name.starts_with("Courier")
    });
    match flags {
        _ if fixed_pitch_name => 600.0,
        Some(flags) if flags & FIXED_PITCH != 0 => 600.0,
        Some(_) => 500.0,
        None => 550.0,
    }
}

/// Font data needed to decode codes and advance the pen.
struct ResolvedFont {
    widths: Option<Widths>,
    default_width: f32,
    to_unicode: Option<ToUnicodeMap>,
    is_cid: bool,
}

impl ResolvedFont {
    fn from_font(font: &Font, resolver: &impl Resolve) -> Result<Self, PdfError> {
        let widths = font.widths(resolver)?;
        let to_unicode = match font.to_unicode(resolver) {
            Some(map) => Some(map?),
            None => None,
        };
        let flags = font
            .info()
            .and_then(|info| info.font_descriptor.as_ref())
            .map(|descriptor| descriptor.flags);
        let default_width = default_glyph_width(font.name.as_ref().map(|n| n.as_str()), flags);
        Ok(Self {
            widths,
            default_width,
            to_unicode,
            is_cid: font.is_cid(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        if self.is_cid {
            decode_cid(bytes, self.to_unicode.as_ref())
        } else {
            decode_simple(bytes, self.to_unicode.as_ref())
        }
    }

    /// Codes outside `/FirstChar..=/LastChar` read as zero and fall back too.
    fn glyph_width(&self, code: u16) -> f32 {
        match self.widths.as_ref().map(|w| w.get(code as usize)) {
            Some(width) if width > 0.0 => width,
            _ => self.default_width,
        }
    }
}

/// One character code and the text it maps to.
#[derive(Debug, PartialEq)]
struct DecodedGlyph {
    code: u16,
    text: String,
}

fn decode_code(code: u16, map: Option<&ToUnicodeMap>) -> DecodedGlyph {
    let mut text = String::new();
    match map.and_then(|m| m.get(code)) {
        Some(value) => text.push_str(value),
        None => text.push(char::from_u32(code as u32).unwrap_or('\u{FFFD}')),
    }
    DecodedGlyph { code, text }
}

fn decode_simple(bytes: &[u8], map: Option<&ToUnicodeMap>) -> Vec<DecodedGlyph> {
    bytes
        .iter()
        .map(|&byte| decode_code(byte as u16, map))
        .collect()
}

fn decode_cid(bytes: &[u8], map: Option<&ToUnicodeMap>) -> Vec<DecodedGlyph> {
    bytes
        .chunks_exact(2)
        .map(|pair| decode_code(u16::from_be_bytes([pair[0], pair[1]]), map))
        .collect()
}

/// Horizontal pen advance after showing `code`, in text space. A font
/// missing from the page resources advances a full em.
fn glyph_advance(font: Option<&ResolvedFont>, code: u16, state: &TextState) -> f32 {
    let glyph_width = font.map(|f| f.glyph_width(code)).unwrap_or(1000.0);
    let mut advance = (glyph_width / 1000.0) * state.font_size + state.char_spacing;
    if code == 32 && !font.is_some_and(|f| f.is_cid) {
        advance += state.word_spacing;
    }
    advance * state.horizontal_factor()
}

fn translation(tx: f32, ty: f32) -> Matrix {
    Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: tx,
        f: ty,
    }
}

/// `left` applied first, then `right`.
fn multiply_matrix(left: &Matrix, right: &Matrix) -> Matrix {
    Matrix {
        a: left.a * right.a + left.b * right.c,
        b: left.a * right.b + left.b * right.d,
        c: left.c * right.a + left.d * right.c,
        d: left.c * right.b + left.d * right.d,
        e: left.e * right.a + left.f * right.c + right.e,
        f: left.e * right.b + left.f * right.d + right.f,
    }
}

fn apply_matrix(matrix: &Matrix, point: (f32, f32)) -> (f32, f32) {
    (
        matrix.a * point.0 + matrix.c * point.1 + matrix.e,
        matrix.b * point.0 + matrix.d * point.1 + matrix.f,
    )
}

fn collect_fonts(page: &Page, resolver: &impl Resolve) -> HashMap<String, ResolvedFont> {
    let mut fonts = HashMap::new();
    if let Ok(resources) = page.resources() {
        for (name, font_ref) in resources.fonts.iter() {
            let resolved = font_ref
                .load(resolver)
                .and_then(|font| ResolvedFont::from_font(&font, resolver));
            match resolved {
                Ok(resolved) => {
                    fonts.insert(name.as_str().to_owned(), resolved);
                }
                Err(err) => log::debug!("font {}: {err}", name.as_str()),
            }
        }
    }
    fonts
}

/// Emit one glyph per character code, advancing the text matrix as it goes.
fn show_text(
    state: &mut TextState,
    fonts: &HashMap<String, ResolvedFont>,
    ctm: &Matrix,
    bytes: &[u8],
    glyphs: &mut Vec<Glyph>,
) {
    let font = state.current_font.as_ref().and_then(|name| fonts.get(name));
    let decoded = match font {
        Some(resolved) => resolved.decode(bytes),
        None => decode_simple(bytes, None),
    };
    for DecodedGlyph { code, text } in decoded {
        let rendering = multiply_matrix(&state.text_matrix, ctm);
        let (x, y) = apply_matrix(&rendering, (0.0, state.text_rise));
        if !text.is_empty() {
            let vertical_scale = rendering.c.hypot(rendering.d);
            glyphs.push(Glyph {
                text,
                x,
                y,
                font_size: state.font_size * vertical_scale,
                font: state.current_font.clone(),
            });
        }
        let advance = glyph_advance(font, code, state);
        if advance != 0.0 {
            state.translate_text(advance);
        }
    }
}

fn show_text_adjusted(
    state: &mut TextState,
    fonts: &HashMap<String, ResolvedFont>,
    ctm: &Matrix,
    array: &[TextDrawAdjusted],
    glyphs: &mut Vec<Glyph>,
) {
    for item in array {
        match item {
            TextDrawAdjusted::Text(text) => show_text(state, fonts, ctm, text.as_bytes(), glyphs),
            TextDrawAdjusted::Spacing(amount) => {
                let adjustment = -amount / 1000.0 * state.font_size * state.horizontal_factor();
                if adjustment != 0.0 {
                    state.translate_text(adjustment);
                }
            }
        }
    }
}

fn extract_glyphs(page: &Page, resolver: &impl Resolve) -> Result<Vec<Glyph>, PdfError> {
    let Some(content) = &page.contents else {
        return Ok(Vec::new());
    };
    let operations = content.operations(resolver)?;
    let fonts = collect_fonts(page, resolver);
    Ok(walk_operations(operations, &fonts))
}

fn walk_operations(
    operations: impl IntoIterator<Item = Op>,
    fonts: &HashMap<String, ResolvedFont>,
) -> Vec<Glyph> {
    let mut state = TextState::default();
    let mut ctm = Matrix::default();
    // q/Q save and restore the CTM together with the text state parameters.
    let mut stack: Vec<(Matrix, TextState)> = Vec::new();
    let mut glyphs = Vec::new();
    for op in operations {
        match op {
            Op::Save => stack.push((ctm, state.clone())),
            Op::Restore => match stack.pop() {
                Some((saved_ctm, saved)) => {
                    ctm = saved_ctm;
                    state.restore(saved);
                }
                None => log::debug!("unbalanced Q ignored"),
            },
            Op::Transform { matrix } => ctm = multiply_matrix(&matrix, &ctm),
            Op::BeginText => state.begin_text(),
            Op::SetTextMatrix { matrix } => state.set_text_matrix(matrix),
            Op::MoveTextPosition { translation } => {
                state.translate_line(translation.x, translation.y)
            }
            Op::TextNewline => state.newline(),
            Op::TextFont { name, size } => state.set_font(name.as_str(), size),
            Op::CharSpacing { char_space } => state.char_spacing = char_space,
            Op::WordSpacing { word_space } => state.word_spacing = word_space,
            Op::TextScaling { horiz_scale } => state.horizontal_scale = horiz_scale,
            Op::Leading { leading } => state.leading = leading,
            Op::TextRise { rise } => state.text_rise = rise,
            Op::TextDraw { text } => {
                show_text(&mut state, fonts, &ctm, text.as_bytes(), &mut glyphs)
            }
            Op::TextDrawAdjusted { array } => {
                show_text_adjusted(&mut state, fonts, &ctm, &array, &mut glyphs)
            }
            _ => {}
        }
    }
    glyphs
}
