//! Generating appearance streams for annotations.

use crate::context::Context;
use crate::error::Diagnostic;
use crate::options::AppearanceMode;
use crate::streams::{Role, finish_stream};
use log::debug;
use pdf_writer::types::{LineCapStyle, LineJoinStyle};
use pdf_writer::{Content, Str};
use rinse_syntax::Document;
use rinse_syntax::content::parse_content;
use rinse_syntax::object::dict::keys::{
    ANNOTS, AP, AS, BASE_FONT, BBOX, BC, BG, BM, BORDER, BS, C, CA, CA_NS, CIRCLE, CONTENTS, D,
    DA, ENCODING, EXT_G_STATE, FONT, FORM, FREE_TEXT, HIGHLIGHT, IC, INK, INK_LIST, L, LINE, LINK,
    MK, MULTIPLY, N, PARENT, POLY_LINE, POLYGON, POPUP, QUAD_POINTS, RECT, RESOURCES, S, SQUARE,
    SQUIGGLY, STRIKE_OUT, SUBTYPE, TEXT, TYPE, UNDERLINE, V, VERTICES, W, WIDGET, X_OBJECT,
};
use rinse_syntax::object::{Dict, Name, ObjRef, Object, Stream};
use rustc_hash::FxHashSet;

// Control point distance for approximating a quarter ellipse with a cubic Bézier curve.
const KAPPA: f32 = 0.552_284_8;

const HELVETICA: &[u8] = b"Helv";
const MAX_FIELD_DEPTH: usize = 32;
const GRAPHICS_STATE: &[u8] = b"GS0";

const SUPPORTED: [&[u8]; 13] = [
    SQUARE, CIRCLE, LINE, INK, POLYGON, POLY_LINE, HIGHLIGHT, UNDERLINE, STRIKE_OUT, SQUIGGLY,
    TEXT, FREE_TEXT, WIDGET,
];

/// Where an annotation dictionary lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Slot {
    Object(ObjRef),
    // A direct annotation in the `Annots` array of a page.
    Page { page: ObjRef, index: usize },
    // A direct annotation in an indirect `Annots` array.
    Array { array: ObjRef, index: usize },
}

impl Slot {
    fn annotation_mut(self, doc: &mut Document) -> Option<&mut Dict> {
        let object = match self {
            Self::Object(id) => doc.get_mut(id)?,
            Self::Page { page, index } => doc
                .get_mut(page)?
                .as_dict_mut()?
                .get_mut(ANNOTS)?
                .as_array_mut()?
                .get_mut(index)?,
            Self::Array { array, index } => doc.get_mut(array)?.as_array_mut()?.get_mut(index)?,
        };

        object.as_dict_mut()
    }
}

enum Outcome {
    Generated(Stream),
    Unsupported(String),
}

/// Generate appearance streams according to the configured mode.
pub(crate) fn generate(ctx: &mut Context) {
    let mode = ctx.settings.appearance;

    if mode == AppearanceMode::None {
        return;
    }

    let doc = &ctx.doc;
    let mut visited = FxHashSet::default();
    let mut jobs = vec![];

    for page in doc.pages() {
        let Some(annots) = doc.get(page).and_then(Object::as_dict).and_then(|p| p.get(ANNOTS))
        else {
            continue;
        };

        let (entries, array) = match annots {
            Object::Ref(id) => {
                if !visited.insert(*id) {
                    continue;
                }

                (doc.get(*id).and_then(Object::as_array), Some(*id))
            }
            Object::Array(entries) => (Some(&entries[..]), None),
            _ => continue,
        };

        for (index, entry) in entries.unwrap_or_default().iter().enumerate() {
            let (slot, object) = match (entry, array) {
                (Object::Ref(id), _) => {
                    if !visited.insert(*id) {
                        continue;
                    }

                    (Slot::Object(*id), *id)
                }
                (Object::Dict(_), Some(array)) => (Slot::Array { array, index }, page),
                (Object::Dict(_), None) => (Slot::Page { page, index }, page),
                _ => continue,
            };

            let Some(annot) = doc.resolve_dict(entry) else {
                continue;
            };

            if mode == AppearanceMode::CreateMissing
                && annot
                    .get(AP)
                    .and_then(|ap| doc.resolve_dict(ap))
                    .is_some_and(|ap| ap.contains_key(N))
            {
                continue;
            }

            if let Some(outcome) = appearance(doc, annot) {
                jobs.push((slot, object, outcome));
            }
        }
    }

    let mut generated = 0;

    for (slot, object, outcome) in jobs {
        match outcome {
            Outcome::Generated(mut stream) => {
                if let Err(err) = finish_stream(&mut stream, Role::Other, &ctx.settings) {
                    ctx.diagnostics.push(Diagnostic::UnsupportedFilter {
                        object,
                        filter: err.filter_name().to_string(),
                    });
                    continue;
                }

                let id = ctx.doc.add_object(stream);

                if let Some(annot) = slot.annotation_mut(&mut ctx.doc) {
                    annot.insert(AP, Dict::from_iter([(Name::new(N), Object::Ref(id))]));
                    generated += 1;
                }
            }
            Outcome::Unsupported(subtype) => {
                ctx.diagnostics
                    .push(Diagnostic::UnsupportedAnnotationSubtype { object, subtype });
            }
        }
    }

    debug!("generated {generated} appearance streams");
}

fn appearance(doc: &Document, annot: &Dict) -> Option<Outcome> {
    let subtype = annot.get_name(SUBTYPE)?;

    if [LINK, POPUP].contains(&&**subtype) {
        return None;
    }

    let stateful = &**subtype == WIDGET && has_field_state(doc, annot);

    if stateful || !SUPPORTED.contains(&&**subtype) {
        return Some(Outcome::Unsupported(subtype.as_str().to_string()));
    }

    let mut appearance = Appearance::new(doc, annot)?;
    appearance.draw(subtype)?;

    Some(Outcome::Generated(appearance.finish()))
}

// Whether the look of a widget depends on its state or its field value, which only the
// form field machinery can draw.
fn has_field_state(doc: &Document, annot: &Dict) -> bool {
    let states = annot
        .get(AP)
        .and_then(|ap| doc.resolve_dict(ap))
        .and_then(|ap| ap.get(N))
        .is_some_and(|n| matches!(doc.resolve(n), Object::Dict(_)));

    if states || annot.contains_key(AS) {
        return true;
    }

    let mut field = Some(annot);

    for _ in 0..MAX_FIELD_DEPTH {
        let Some(current) = field else {
            break;
        };

        if current.contains_key(V) {
            return true;
        }

        field = current.get(PARENT).and_then(|p| doc.resolve_dict(p));
    }

    false
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Color {
    Gray(f32),
    Rgb(f32, f32, f32),
    Cmyk(f32, f32, f32, f32),
}

impl Color {
    const BLACK: Self = Self::Gray(0.0);
    const YELLOW: Self = Self::Rgb(1.0, 1.0, 0.0);

    fn from_components(components: &[Object]) -> Option<Self> {
        let c = components
            .iter()
            .map(|o| o.as_f64().map(|v| v as f32))
            .collect::<Option<Vec<_>>>()?;

        match c[..] {
            [g] => Some(Self::Gray(g)),
            [r, g, b] => Some(Self::Rgb(r, g, b)),
            [c, m, y, k] => Some(Self::Cmyk(c, m, y, k)),
            _ => None,
        }
    }

    fn set_stroke(self, content: &mut Content) {
        match self {
            Self::Gray(g) => content.set_stroke_gray(g),
            Self::Rgb(r, g, b) => content.set_stroke_rgb(r, g, b),
            Self::Cmyk(c, m, y, k) => content.set_stroke_cmyk(c, m, y, k),
        };
    }

    fn set_fill(self, content: &mut Content) {
        match self {
            Self::Gray(g) => content.set_fill_gray(g),
            Self::Rgb(r, g, b) => content.set_fill_rgb(r, g, b),
            Self::Cmyk(c, m, y, k) => content.set_fill_cmyk(c, m, y, k),
        };
    }
}

#[derive(Debug, Copy, Clone)]
struct Point {
    x: f32,
    y: f32,
}

impl Point {
    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    fn distance(self, other: Self) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

fn points(numbers: &[f32]) -> Vec<Point> {
    numbers
        .chunks_exact(2)
        .map(|c| Point { x: c[0], y: c[1] })
        .collect()
}

struct Appearance<'a> {
    doc: &'a Document,
    annot: &'a Dict,
    bbox: [f64; 4],
    content: Content,
    resources: Dict,
    graphics_state: Option<Dict>,
    width: f32,
    dash: Option<Vec<f32>>,
    // The color from `C`, if there is one.
    color: Option<Color>,
    stroke: Option<Color>,
    fill: Option<Color>,
}

impl<'a> Appearance<'a> {
    fn new(doc: &'a Document, annot: &'a Dict) -> Option<Self> {
        let rect = annot
            .get(RECT)
            .and_then(|r| doc.resolve(r).as_array())?
            .iter()
            .map(|o| doc.resolve(o).as_f64())
            .collect::<Option<Vec<_>>>()?;

        let [x0, y0, x1, y1] = rect[..] else {
            return None;
        };

        let bbox = [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)];

        if bbox[2] - bbox[0] <= 0.0 || bbox[3] - bbox[1] <= 0.0 {
            return None;
        }

        let bs = annot.get(BS).and_then(|bs| doc.resolve_dict(bs));

        let width = bs
            .and_then(|bs| bs.get_f64(W))
            .or_else(|| {
                annot
                    .get(BORDER)
                    .and_then(|b| doc.resolve(b).as_array())
                    .and_then(|b| b.get(2))
                    .and_then(Object::as_f64)
            })
            .unwrap_or(1.0) as f32;

        let dash = bs
            .filter(|bs| bs.get_name(S).is_some_and(|s| &**s == D))
            .map(|bs| {
                bs.get(D)
                    .and_then(|d| doc.resolve(d).as_array())
                    .map(|d| d.iter().filter_map(|v| v.as_f64().map(|v| v as f32)).collect())
                    .unwrap_or_else(|| vec![3.0])
            });

        let color = annot
            .get(C)
            .and_then(|c| doc.resolve(c).as_array())
            .and_then(Color::from_components);
        // A missing color defaults to black, an empty color array means no color at all.
        let stroke = match annot.get(C) {
            None => Some(Color::BLACK),
            Some(_) => color,
        };
        let fill = annot
            .get(IC)
            .and_then(|c| doc.resolve(c).as_array())
            .and_then(Color::from_components);

        let mut appearance = Self {
            doc,
            annot,
            bbox,
            content: Content::new(),
            resources: Dict::new(),
            graphics_state: None,
            width,
            dash,
            color,
            stroke,
            fill,
        };

        if let Some(opacity) = annot.get_f64(CA).filter(|a| *a < 1.0) {
            let gs = appearance.graphics_state();
            gs.insert(CA, opacity);
            gs.insert(CA_NS, opacity);
        }

        Some(appearance)
    }

    fn draw(&mut self, subtype: &[u8]) -> Option<()> {
        match subtype {
            SQUARE => self.square(),
            CIRCLE => self.circle(),
            LINE => self.line(),
            INK => self.ink(),
            POLYGON => self.vertices(true),
            POLY_LINE => self.vertices(false),
            HIGHLIGHT => self.highlight(),
            UNDERLINE | STRIKE_OUT | SQUIGGLY => self.text_markup(subtype),
            TEXT => self.note(),
            FREE_TEXT => self.free_text(),
            WIDGET => self.widget(),
            _ => None,
        }
    }

    fn rect(&self) -> [f32; 4] {
        self.bbox.map(|v| v as f32)
    }

    fn numbers(&self, key: &[u8]) -> Vec<f32> {
        self.annot
            .get(key)
            .and_then(|v| self.doc.resolve(v).as_array())
            .unwrap_or_default()
            .iter()
            .filter_map(|v| self.doc.resolve(v).as_f64().map(|v| v as f32))
            .collect()
    }

    // The graphics state parameters of the appearance, activated on first use.
    fn graphics_state(&mut self) -> &mut Dict {
        if self.graphics_state.is_none() {
            self.content.set_parameters(pdf_writer::Name(GRAPHICS_STATE));
        }

        self.graphics_state.get_or_insert_with(Dict::new)
    }

    // Set up the stroke parameters, returning whether anything is stroked.
    fn begin_stroke(&mut self) -> bool {
        let Some(color) = self.stroke.filter(|_| self.width > 0.0) else {
            return false;
        };

        color.set_stroke(&mut self.content);
        self.content.set_line_width(self.width);

        if let Some(dash) = &self.dash {
            self.content.set_dash_pattern(dash.iter().copied(), 0.0);
        }

        true
    }

    fn begin_fill(&mut self, color: Option<Color>) -> bool {
        match color {
            Some(color) => {
                color.set_fill(&mut self.content);
                true
            }
            None => false,
        }
    }

    fn paint(&mut self, fill: bool, stroke: bool) {
        match (fill, stroke) {
            (true, true) => self.content.fill_nonzero_and_stroke(),
            (true, false) => self.content.fill_nonzero(),
            (false, true) => self.content.stroke(),
            (false, false) => self.content.end_path(),
        };
    }

    fn polyline(&mut self, points: &[Point], close: bool) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };

        self.content.move_to(first.x, first.y);

        for p in rest {
            self.content.line_to(p.x, p.y);
        }

        if close {
            self.content.close_path();
        }
    }

    fn square(&mut self) -> Option<()> {
        let stroke = self.begin_stroke();
        let fill = self.begin_fill(self.fill);
        let inset = if stroke { self.width / 2.0 } else { 0.0 };
        let [x0, y0, x1, y1] = self.rect();

        self.content.rect(
            x0 + inset,
            y0 + inset,
            (x1 - x0 - 2.0 * inset).max(0.0),
            (y1 - y0 - 2.0 * inset).max(0.0),
        );
        self.paint(fill, stroke);

        Some(())
    }

    fn circle(&mut self) -> Option<()> {
        let stroke = self.begin_stroke();
        let fill = self.begin_fill(self.fill);
        let inset = if stroke { self.width / 2.0 } else { 0.0 };
        let [x0, y0, x1, y1] = self.rect();

        let (cx, cy) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
        let rx = ((x1 - x0) / 2.0 - inset).max(0.0);
        let ry = ((y1 - y0) / 2.0 - inset).max(0.0);
        let (kx, ky) = (rx * KAPPA, ry * KAPPA);

        let c = &mut self.content;
        c.move_to(cx + rx, cy);
        c.cubic_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);
        c.cubic_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);
        c.cubic_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);
        c.cubic_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);
        c.close_path();
        self.paint(fill, stroke);

        Some(())
    }

    fn line(&mut self) -> Option<()> {
        let points = points(&self.numbers(L));

        if points.len() != 2 {
            return None;
        }

        if self.begin_stroke() {
            self.polyline(&points, false);
            self.content.stroke();
        }

        Some(())
    }

    fn ink(&mut self) -> Option<()> {
        let doc = self.doc;
        let paths = self
            .annot
            .get(INK_LIST)
            .and_then(|i| doc.resolve(i).as_array())
            .unwrap_or_default()
            .iter()
            .filter_map(|path| doc.resolve(path).as_array())
            .map(|path| {
                let numbers = path
                    .iter()
                    .filter_map(|v| doc.resolve(v).as_f64().map(|v| v as f32))
                    .collect::<Vec<_>>();
                points(&numbers)
            })
            .filter(|path| !path.is_empty())
            .collect::<Vec<_>>();

        if paths.is_empty() {
            return None;
        }

        if self.begin_stroke() {
            self.content.set_line_cap(LineCapStyle::RoundCap);
            self.content.set_line_join(LineJoinStyle::RoundJoin);

            for path in &paths {
                self.polyline(path, false);
            }

            self.content.stroke();
        }

        Some(())
    }

    fn vertices(&mut self, close: bool) -> Option<()> {
        let points = points(&self.numbers(VERTICES));

        if points.len() < 2 {
            return None;
        }

        let stroke = self.begin_stroke();
        let fill = close && self.begin_fill(self.fill);

        self.polyline(&points, close);
        self.paint(fill, stroke);

        Some(())
    }

    // Quadrilaterals in the order upper left, upper right, lower left, lower right.
    fn quads(&self) -> Option<Vec<[Point; 4]>> {
        let quads = points(&self.numbers(QUAD_POINTS))
            .chunks_exact(4)
            .map(|q| [q[0], q[1], q[2], q[3]])
            .collect::<Vec<_>>();

        (!quads.is_empty()).then_some(quads)
    }

    fn highlight(&mut self) -> Option<()> {
        let quads = self.quads()?;

        self.graphics_state().insert(BM, Name::new(MULTIPLY));

        self.begin_fill(Some(self.color.unwrap_or(Color::YELLOW)));

        for [ul, ur, ll, lr] in quads {
            self.polyline(&[ul, ur, lr, ll], true);
        }

        self.content.fill_nonzero();

        Some(())
    }

    fn text_markup(&mut self, subtype: &[u8]) -> Option<()> {
        let quads = self.quads()?;
        let Some(color) = self.stroke else {
            return Some(());
        };

        color.set_stroke(&mut self.content);

        for [ul, ur, ll, lr] in quads {
            let height = ul.distance(ll);
            let thickness = (height / 16.0).max(0.5);
            // How far up from the baseline a point at the relative height `t` is.
            let left = |t: f32| ll.lerp(ul, t);
            let right = |t: f32| lr.lerp(ur, t);

            self.content.set_line_width(thickness);

            if subtype == SQUIGGLY {
                let length = ll.distance(lr);
                let steps = ((length / (height / 4.0).max(1.0)).ceil() as usize).max(1);
                let amplitude = 2.0 * thickness / height.max(f32::EPSILON);

                let zigzag = (0..=steps)
                    .map(|i| {
                        let t = i as f32 / steps as f32;
                        let up = if i % 2 == 0 { 0.0 } else { amplitude };
                        left(up).lerp(right(up), t)
                    })
                    .collect::<Vec<_>>();

                self.polyline(&zigzag, false);
            } else {
                let t = if subtype == STRIKE_OUT {
                    0.5
                } else {
                    thickness / height.max(f32::EPSILON)
                };

                self.polyline(&[left(t), right(t)], false);
            }

            self.content.stroke();
        }

        Some(())
    }

    // A sticky note icon in the upper left corner.
    fn note(&mut self) -> Option<()> {
        let [x0, y0, x1, y1] = self.rect();
        let size = (x1 - x0).min(y1 - y0).min(20.0);
        let (x, y) = (x0, y1 - size);

        self.begin_fill(Some(self.color.unwrap_or(Color::YELLOW)));
        Color::BLACK.set_stroke(&mut self.content);
        self.content.set_line_width(1.0);
        self.content.rect(x + 0.5, y + 0.5, size - 1.0, size - 1.0);
        self.content.fill_nonzero_and_stroke();

        for i in 1..=3 {
            let ly = y + size - size * i as f32 / 4.0;
            self.content.move_to(x + size * 0.2, ly);
            self.content.line_to(x + size * 0.8, ly);
        }

        self.content.stroke();

        Some(())
    }

    fn free_text(&mut self) -> Option<()> {
        let [x0, y0, x1, y1] = self.rect();
        let (size, color) = self.default_appearance();

        self.content.save_state();
        self.content.rect(x0, y0, x1 - x0, y1 - y0);
        self.content.clip_nonzero();
        self.content.end_path();

        if self.begin_stroke() {
            let inset = self.width / 2.0;
            self.content
                .rect(x0 + inset, y0 + inset, x1 - x0 - self.width, y1 - y0 - self.width);
            self.content.stroke();
        }

        let text = self
            .annot
            .get(CONTENTS)
            .and_then(|c| self.doc.resolve(c).as_string())
            .map(text_bytes)
            .unwrap_or_default();

        let font = Dict::from_iter([
            (Name::new(TYPE), Name::new(FONT).into()),
            (Name::new(SUBTYPE), Name::new(b"Type1").into()),
            (Name::new(BASE_FONT), Name::new(b"Helvetica").into()),
            (Name::new(ENCODING), Name::new(b"WinAnsiEncoding").into()),
        ]);
        self.resources.insert(
            FONT,
            Dict::from_iter([(Name::new(HELVETICA), font.into())]),
        );

        let padding = 2.0 + self.width;
        let leading = size * 1.2;

        color.set_fill(&mut self.content);
        self.content.begin_text();
        self.content.set_font(pdf_writer::Name(HELVETICA), size);
        self.content.next_line(x0 + padding, y1 - padding - size);

        for (i, line) in text.split(|b| *b == b'\n').enumerate() {
            if i > 0 {
                self.content.next_line(0.0, -leading);
            }

            self.content.show(Str(line));
        }

        self.content.end_text();
        self.content.restore_state();

        Some(())
    }

    // The font size and text color from the `DA` string.
    fn default_appearance(&self) -> (f32, Color) {
        let mut size = 12.0;
        let mut color = Color::BLACK;

        let da = self
            .annot
            .get(DA)
            .and_then(|da| self.doc.resolve(da).as_string())
            .map(parse_content)
            .unwrap_or_default();

        for op in &da.operations {
            match &*op.operator {
                b"Tf" => {
                    if let Some(s) = op.operands.get(1).and_then(Object::as_f64)
                        && s > 0.0
                    {
                        size = s as f32;
                    }
                }
                b"g" | b"rg" | b"k" => {
                    if let Some(c) = Color::from_components(&op.operands) {
                        color = c;
                    }
                }
                _ => {}
            }
        }

        (size, color)
    }

    fn widget(&mut self) -> Option<()> {
        let doc = self.doc;
        let [x0, y0, x1, y1] = self.rect();

        let Some(mk) = self.annot.get(MK).and_then(|mk| doc.resolve_dict(mk)) else {
            return Some(());
        };

        let color = |key| {
            mk.get(key)
                .and_then(|c| doc.resolve(c).as_array())
                .and_then(Color::from_components)
        };

        if let Some(background) = color(BG) {
            background.set_fill(&mut self.content);
            self.content.rect(x0, y0, x1 - x0, y1 - y0);
            self.content.fill_nonzero();
        }

        self.stroke = color(BC);

        if self.begin_stroke() {
            let inset = self.width / 2.0;
            self.content
                .rect(x0 + inset, y0 + inset, x1 - x0 - self.width, y1 - y0 - self.width);
            self.content.stroke();
        }

        Some(())
    }

    fn finish(mut self) -> Stream {
        if let Some(gs) = self.graphics_state {
            self.resources.insert(
                EXT_G_STATE,
                Dict::from_iter([(Name::new(GRAPHICS_STATE), gs.into())]),
            );
        }

        let mut dict = Dict::new();
        dict.insert(TYPE, Name::new(X_OBJECT));
        dict.insert(SUBTYPE, Name::new(FORM));
        dict.insert(BBOX, self.bbox.map(Object::from).to_vec());

        if !self.resources.is_empty() {
            dict.insert(RESOURCES, self.resources);
        }

        Stream::new(dict, self.content.finish())
    }
}

// Convert a text string into the bytes shown with a WinAnsi-encoded font. UTF-16 text is
// mapped to Latin-1 where possible.
fn text_bytes(text: &[u8]) -> Vec<u8> {
    let normalize = |b: u8| if b == b'\r' { b'\n' } else { b };

    match text.strip_prefix(b"\xfe\xff") {
        Some(utf16) => {
            let units = utf16
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]));

            char::decode_utf16(units)
                .map(|c| {
                    c.ok()
                        .and_then(|c| u8::try_from(u32::from(c)).ok())
                        .map(normalize)
                        .unwrap_or(b'?')
                })
                .collect()
        }
        None => text.iter().copied().map(normalize).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{generate, text_bytes};
    use crate::context::Context;
    use crate::error::Diagnostic;
    use crate::options::{AppearanceMode, CleanOptions};
    use rinse_syntax::Document;
    use rinse_syntax::object::{Dict, Name, ObjRef, Object, PdfString, Stream};

    fn r(num: u32) -> Object {
        Object::Ref(ObjRef::new(num, 0))
    }

    fn name(n: &str) -> Object {
        Name::new(n.as_bytes()).into()
    }

    fn numbers(values: &[f64]) -> Object {
        values.iter().map(|v| Object::from(*v)).collect::<Vec<_>>().into()
    }

    fn annotation(subtype: &str, extra: &[(&str, Object)]) -> Dict {
        let mut annot = Dict::new();
        annot.insert("Type", name("Annot"));
        annot.insert("Subtype", name(subtype));
        annot.insert("Rect", numbers(&[100.0, 100.0, 0.0, 50.0]));

        for (k, v) in extra {
            annot.insert(*k, v.clone());
        }

        annot
    }

    // One page with the given annotations as objects 10 and up, plus a direct one if given.
    fn document(annots: Vec<Dict>, direct: Option<Dict>) -> Document {
        let mut doc = Document::default();
        doc.trailer.insert("Root", r(1));

        let mut catalog = Dict::new();
        catalog.insert("Type", name("Catalog"));
        catalog.insert("Pages", r(2));
        doc.insert(ObjRef::new(1, 0), catalog);

        let mut pages = Dict::new();
        pages.insert("Type", name("Pages"));
        pages.insert("Kids", vec![r(3)]);
        pages.insert("Count", 1);
        doc.insert(ObjRef::new(2, 0), pages);

        let mut refs = vec![];
        for (i, annot) in annots.into_iter().enumerate() {
            let num = 10 + i as u32;
            doc.insert(ObjRef::new(num, 0), annot);
            refs.push(r(num));
        }
        refs.extend(direct.map(Object::Dict));

        let mut page = Dict::new();
        page.insert("Type", name("Page"));
        page.insert("Parent", r(2));
        page.insert("Annots", refs);
        doc.insert(ObjRef::new(3, 0), page);

        doc
    }

    fn run(doc: Document, appearance: AppearanceMode) -> Context {
        let settings = CleanOptions {
            appearance,
            ..CleanOptions::default()
        }
        .validate()
        .unwrap();

        let mut ctx = Context::new(doc, settings);
        generate(&mut ctx);
        ctx
    }

    fn normal_appearance<'a>(doc: &'a Document, annot: &Dict) -> Option<&'a Stream> {
        let id = annot.get_dict(b"AP")?.get_ref(b"N")?;
        doc.get(id)?.as_stream()
    }

    fn annot(ctx: &Context, num: u32) -> &Dict {
        ctx.doc.get(ObjRef::new(num, 0)).unwrap().as_dict().unwrap()
    }

    fn content(ctx: &Context, num: u32) -> String {
        let stream = normal_appearance(&ctx.doc, annot(ctx, num)).unwrap();
        String::from_utf8(stream.data.clone()).unwrap()
    }

    #[test]
    fn square() {
        let square = annotation(
            "Square",
            &[
                ("C", numbers(&[1.0, 0.0, 0.0])),
                ("IC", numbers(&[0.5])),
                ("Border", numbers(&[0.0, 0.0, 4.0])),
            ],
        );
        let ctx = run(document(vec![square], None), AppearanceMode::CreateMissing);

        let stream = normal_appearance(&ctx.doc, annot(&ctx, 10)).unwrap();
        assert_eq!(stream.dict.get_name(b"Subtype"), Some(&Name::new(b"Form")));
        assert_eq!(
            stream.dict.get(b"BBox"),
            Some(&numbers(&[0.0, 50.0, 100.0, 100.0]))
        );

        let content = content(&ctx, 10);
        assert!(content.contains("1 0 0 RG"));
        assert!(content.contains("0.5 g"));
        assert!(content.contains("4 w"));
        assert!(content.contains("2 52 96 46 re"));
        assert!(content.trim_end().ends_with('B'));
    }

    #[test]
    fn create_missing_keeps_existing() {
        let existing = annotation(
            "Circle",
            &[("AP", Dict::from_iter([("N".into(), r(20))]).into())],
        );
        let doc = document(vec![existing.clone()], None);

        let ctx = run(doc.clone(), AppearanceMode::CreateMissing);
        assert_eq!(annot(&ctx, 10), &existing);

        let ctx = run(doc, AppearanceMode::RecreateAll);
        let content = content(&ctx, 10);
        assert!(content.contains(" c\n"));
        assert_ne!(annot(&ctx, 10).get_dict(b"AP").unwrap().get_ref(b"N"), Some(ObjRef::new(20, 0)));
    }

    #[test]
    fn skipped_and_unsupported() {
        let link = annotation("Link", &[]);
        let sound = annotation("Sound", &[]);
        let degenerate = {
            let mut a = annotation("Square", &[]);
            a.insert("Rect", numbers(&[10.0, 10.0, 10.0, 20.0]));
            a
        };

        let ctx = run(
            document(vec![link, sound, degenerate], Some(annotation("Sound", &[]))),
            AppearanceMode::RecreateAll,
        );

        assert!(!annot(&ctx, 10).contains_key(b"AP"));
        assert!(!annot(&ctx, 11).contains_key(b"AP"));
        assert!(!annot(&ctx, 12).contains_key(b"AP"));
        assert_eq!(
            ctx.diagnostics.as_slice(),
            [
                Diagnostic::UnsupportedAnnotationSubtype {
                    object: ObjRef::new(11, 0),
                    subtype: "Sound".to_string(),
                },
                Diagnostic::UnsupportedAnnotationSubtype {
                    object: ObjRef::new(3, 0),
                    subtype: "Sound".to_string(),
                },
            ]
        );
    }

    #[test]
    fn direct_annotations_are_updated_in_place() {
        let ink = annotation(
            "Ink",
            &[(
                "InkList",
                vec![numbers(&[10.0, 60.0, 20.0, 70.0, 30.0, 60.0])].into(),
            )],
        );
        let ctx = run(document(vec![], Some(ink)), AppearanceMode::CreateMissing);

        let page = ctx.doc.get(ObjRef::new(3, 0)).unwrap().as_dict().unwrap();
        let annot = page.get_array(b"Annots").unwrap()[0].as_dict().unwrap();
        let stream = normal_appearance(&ctx.doc, annot).unwrap();
        let content = String::from_utf8(stream.data.clone()).unwrap();

        assert!(content.contains("10 60 m\n20 70 l\n30 60 l\nS"));
    }

    #[test]
    fn highlight_multiplies() {
        let highlight = annotation(
            "Highlight",
            &[
                ("QuadPoints", numbers(&[0.0, 100.0, 100.0, 100.0, 0.0, 50.0, 100.0, 50.0])),
                ("CA", 0.5.into()),
            ],
        );
        let ctx = run(document(vec![highlight], None), AppearanceMode::CreateMissing);

        let stream = normal_appearance(&ctx.doc, annot(&ctx, 10)).unwrap();
        let gs = stream
            .dict
            .get_dict(b"Resources")
            .and_then(|r| r.get_dict(b"ExtGState"))
            .and_then(|g| g.get_dict(b"GS0"))
            .unwrap();

        assert_eq!(gs.get_name(b"BM"), Some(&Name::new(b"Multiply")));
        assert_eq!(gs.get_f64(b"CA"), Some(0.5));
        assert_eq!(gs.get_f64(b"ca"), Some(0.5));

        let content = content(&ctx, 10);
        assert!(content.starts_with("/GS0 gs"));
        assert_eq!(content.matches(" gs").count(), 1);
    }

    #[test]
    fn free_text() {
        let free_text = annotation(
            "FreeText",
            &[
                ("Contents", PdfString::new(b"Hello\rWorld".to_vec()).into()),
                ("DA", PdfString::new(b"/Helv 10 Tf 0 0 1 rg".to_vec()).into()),
            ],
        );
        let ctx = run(document(vec![free_text], None), AppearanceMode::CreateMissing);

        let stream = normal_appearance(&ctx.doc, annot(&ctx, 10)).unwrap();
        let font = stream
            .dict
            .get_dict(b"Resources")
            .and_then(|r| r.get_dict(b"Font"))
            .and_then(|f| f.get_dict(b"Helv"))
            .unwrap();
        assert_eq!(font.get_name(b"BaseFont"), Some(&Name::new(b"Helvetica")));

        let content = content(&ctx, 10);
        assert!(content.contains("/Helv 10 Tf"));
        assert!(content.contains("0 0 1 rg"));
        assert!(content.contains("(Hello) Tj"));
        assert!(content.contains("(World) Tj"));
    }

    #[test]
    fn utf16_text() {
        assert_eq!(text_bytes(b"\xfe\xff\x00A\x00\xe9\x26\x3a"), b"A\xe9?");
        assert_eq!(text_bytes(b"a\rb"), b"a\nb");
    }
}
