//! PDF back end built on `lopdf`.
//!
//! Rendering is two passes. [`layout`] flows the document blocks into
//! pages of absolute draw operations (US Letter, Helvetica). The page
//! template is then applied to every page, which is why the footer can
//! print the total page count, and the writer serialises the pages.

use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};

use super::config::Institution;
use super::document::{Block, Document, KeyValueStyle, Table, TextStyle};

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const MARGIN_LEFT: f32 = 50.0;
pub const MARGIN_RIGHT: f32 = 50.0;
pub const MARGIN_TOP: f32 = 100.0;
pub const MARGIN_BOTTOM: f32 = 50.0;

const CONTENT_LEFT: f32 = MARGIN_LEFT;
const CONTENT_RIGHT: f32 = PAGE_WIDTH - MARGIN_RIGHT;
const CONTENT_WIDTH: f32 = CONTENT_RIGHT - CONTENT_LEFT;
const CONTENT_TOP: f32 = PAGE_HEIGHT - MARGIN_TOP;
const CONTENT_BOTTOM: f32 = MARGIN_BOTTOM;

const TABLE_HEADER_HEIGHT: f32 = 22.0;
const TABLE_ROW_HEIGHT: f32 = 18.0;
const CELL_PADDING: f32 = 4.0;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("pdf encoding failed")]
    Pdf(#[from] lopdf::Error),
    #[error("pdf serialisation failed")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

// #1a237e, #283593, #e8eaf6, #f5f5f5
pub const NAVY: Rgb = Rgb(0.102, 0.137, 0.494);
pub const INDIGO: Rgb = Rgb(0.157, 0.208, 0.576);
pub const LAVENDER: Rgb = Rgb(0.910, 0.918, 0.965);
pub const STRIPE: Rgb = Rgb(0.961, 0.961, 0.961);
pub const GREY: Rgb = Rgb(0.5, 0.5, 0.5);
pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
pub const WHITE: Rgb = Rgb(1.0, 1.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        font: Font,
        size: f32,
        color: Rgb,
        text: String,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Rgb>,
        stroke: Option<(Rgb, f32)>,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Rgb,
        width: f32,
    },
    Image {
        image: Arc<JpegImage>,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

impl DrawOp {
    /// Text placed inside a box of `width` starting at `x`.
    pub fn text_in(
        align: Align,
        x: f32,
        width: f32,
        baseline: f32,
        font: Font,
        size: f32,
        color: Rgb,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let measured = text_width(&text, font, size);
        let x = match align {
            Align::Left => x,
            Align::Center => x + (width - measured) / 2.0,
            Align::Right => x + width - measured,
        };
        DrawOp::Text {
            x,
            y: baseline,
            font,
            size,
            color,
            text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub number: usize,
    pub total: usize,
}

/// Per-page decoration, invoked for every page once the page count is known.
pub trait PageTemplate {
    fn header(&self, page: PageInfo) -> Vec<DrawOp>;
    fn footer(&self, page: PageInfo) -> Vec<DrawOp>;
}

/// Institutional letterhead: logo or monogram, three identity lines and a
/// rule on top; rule, tagline and "Página N de M" at the bottom.
pub struct InstitutionTemplate<'a> {
    pub institution: &'a Institution,
    pub logo: Option<Arc<JpegImage>>,
}

impl InstitutionTemplate<'_> {
    const LOGO_BOX: f32 = 60.0;

    fn monogram(&self) -> String {
        self.institution
            .name
            .split_whitespace()
            .filter_map(|w| w.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase()
    }
}

impl PageTemplate for InstitutionTemplate<'_> {
    fn header(&self, _page: PageInfo) -> Vec<DrawOp> {
        let size = Self::LOGO_BOX;
        let top = PAGE_HEIGHT - 20.0;
        let mut ops = Vec::new();

        match &self.logo {
            Some(image) => {
                let (width, height) = image.fit_within(size, size);
                ops.push(DrawOp::Image {
                    image: Arc::clone(image),
                    x: MARGIN_LEFT + (size - width) / 2.0,
                    y: top - size + (size - height) / 2.0,
                    width,
                    height,
                });
            }
            None => {
                ops.push(DrawOp::Rect {
                    x: MARGIN_LEFT,
                    y: top - size,
                    width: size,
                    height: size,
                    fill: Some(NAVY),
                    stroke: None,
                });
                ops.push(DrawOp::text_in(
                    Align::Center,
                    MARGIN_LEFT,
                    size,
                    top - size / 2.0 - 8.0,
                    Font::Bold,
                    22.0,
                    WHITE,
                    self.monogram(),
                ));
            }
        }

        let text_x = MARGIN_LEFT + size + 15.0;
        ops.push(DrawOp::Text {
            x: text_x,
            y: top - 15.0,
            font: Font::Bold,
            size: 12.0,
            color: NAVY,
            text: self.institution.name.clone(),
        });
        ops.push(DrawOp::Text {
            x: text_x,
            y: top - 30.0,
            font: Font::Regular,
            size: 9.0,
            color: BLACK,
            text: self.institution.subtitle.clone(),
        });
        ops.push(DrawOp::Text {
            x: text_x,
            y: top - 44.0,
            font: Font::Regular,
            size: 9.0,
            color: BLACK,
            text: self.institution.location.clone(),
        });
        ops.push(DrawOp::Line {
            from: (CONTENT_LEFT, top - size - 8.0),
            to: (CONTENT_RIGHT, top - size - 8.0),
            color: NAVY,
            width: 2.0,
        });
        ops
    }

    fn footer(&self, page: PageInfo) -> Vec<DrawOp> {
        vec![
            DrawOp::Line {
                from: (CONTENT_LEFT, 40.0),
                to: (CONTENT_RIGHT, 40.0),
                color: NAVY,
                width: 1.0,
            },
            DrawOp::Text {
                x: CONTENT_LEFT,
                y: 25.0,
                font: Font::Regular,
                size: 8.0,
                color: GREY,
                text: self.institution.tagline.clone(),
            },
            DrawOp::text_in(
                Align::Right,
                CONTENT_LEFT,
                CONTENT_WIDTH,
                25.0,
                Font::Regular,
                8.0,
                GREY,
                format!("Página {} de {}", page.number, page.total),
            ),
        ]
    }
}

// ===== Text metrics =====

/// Helvetica advance widths for U+0020..=U+007E, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, //
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, //
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, //
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

fn char_width(c: char) -> u16 {
    let code = c as u32;
    if (0x20..=0x7e).contains(&code) {
        HELVETICA_WIDTHS[(code - 0x20) as usize]
    } else {
        556
    }
}

/// Approximate rendered width in points. Bold is treated as 5% wider.
pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c))).sum();
    let factor = match font {
        Font::Regular => 1.0,
        Font::Bold => 1.05,
    };
    units as f32 * size / 1000.0 * factor
}

/// Drops trailing characters until the text fits in `width`.
fn fit(text: &str, width: f32, font: Font, size: f32) -> String {
    if text_width(text, font, size) <= width {
        return text.to_string();
    }
    let mut fitted = String::new();
    for c in text.chars() {
        fitted.push(c);
        if text_width(&fitted, font, size) > width {
            fitted.pop();
            break;
        }
    }
    fitted
}

/// Greedy word wrap; a single word wider than the line is clipped.
fn wrap(text: &str, width: f32, font: Font, size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if text_width(&candidate, font, size) <= width || line.is_empty() {
                line = candidate;
            } else {
                lines.push(std::mem::take(&mut line));
                line = word.to_string();
            }
        }
        lines.push(fit(&line, width, font, size));
    }
    lines
}

// ===== Layout =====

struct TextSpec {
    font: Font,
    size: f32,
    color: Rgb,
    align: Align,
    leading: f32,
    before: f32,
    after: f32,
}

fn text_spec(style: TextStyle) -> TextSpec {
    match style {
        TextStyle::Title => TextSpec {
            font: Font::Bold,
            size: 18.0,
            color: NAVY,
            align: Align::Center,
            leading: 22.0,
            before: 0.0,
            after: 24.0,
        },
        TextStyle::Heading => TextSpec {
            font: Font::Bold,
            size: 14.0,
            color: INDIGO,
            align: Align::Left,
            leading: 17.0,
            before: 12.0,
            after: 8.0,
        },
        TextStyle::Body => TextSpec {
            font: Font::Regular,
            size: 10.0,
            color: BLACK,
            align: Align::Left,
            leading: 13.0,
            before: 0.0,
            after: 10.0,
        },
    }
}

struct Layout {
    pages: Vec<Page>,
    current: Page,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Page::default(),
            y: CONTENT_TOP,
        }
    }

    fn at_top(&self) -> bool {
        self.current.ops.is_empty()
    }

    fn remaining(&self) -> f32 {
        self.y - CONTENT_BOTTOM
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = CONTENT_TOP;
    }

    /// Starts a new page unless `height` still fits. A fresh page always
    /// accepts the content, even if it overflows.
    fn ensure(&mut self, height: f32) {
        if height > self.remaining() && !self.at_top() {
            self.new_page();
        }
    }

    fn draw(&mut self, op: DrawOp) {
        self.current.ops.push(op);
    }

    fn place(&mut self, block: &Block) {
        match block {
            Block::Text { style, text } => self.place_text(*style, text),
            Block::KeyValue { style, pairs } => self.place_key_values(*style, pairs),
            Block::Table(table) => self.place_table(table),
            Block::Signatures(names) => self.place_signatures(names),
            Block::Image { image, width, height } => {
                self.ensure(*height);
                let (w, h) = image.fit_within(width.min(CONTENT_WIDTH), *height);
                self.draw(DrawOp::Image {
                    image: Arc::clone(image),
                    x: CONTENT_LEFT,
                    y: self.y - h,
                    width: w,
                    height: h,
                });
                self.y -= h + 6.0;
            }
            Block::Spacer(height) => {
                if self.at_top() {
                    return;
                }
                if *height >= self.remaining() {
                    self.new_page();
                } else {
                    self.y -= height;
                }
            }
            Block::PageBreak => {
                if !self.at_top() {
                    self.new_page();
                }
            }
        }
    }

    fn place_text(&mut self, style: TextStyle, text: &str) {
        let spec = text_spec(style);
        let lines = wrap(text, CONTENT_WIDTH, spec.font, spec.size);

        if !self.at_top() {
            self.y -= spec.before;
        }
        // keep headings with at least a couple of rows of what follows
        let keep = if style == TextStyle::Heading { 3.0 * TABLE_ROW_HEIGHT } else { 0.0 };
        self.ensure(spec.leading + keep);

        for line in lines {
            self.ensure(spec.leading);
            let baseline = self.y - spec.size;
            self.draw(DrawOp::text_in(
                spec.align,
                CONTENT_LEFT,
                CONTENT_WIDTH,
                baseline,
                spec.font,
                spec.size,
                spec.color,
                line,
            ));
            self.y -= spec.leading;
        }
        self.y -= spec.after;
    }

    fn place_key_values(&mut self, style: KeyValueStyle, pairs: &[(String, String)]) {
        let (key_width, value_width, row_height, size) = match style {
            KeyValueStyle::Metadata => (108.0, 288.0, 15.0, 9.0),
            KeyValueStyle::Summary => (216.0, 144.0, 26.0, 11.0),
        };
        let x0 = CONTENT_LEFT + (CONTENT_WIDTH - key_width - value_width) / 2.0;

        for (key, value) in pairs {
            self.ensure(row_height);
            let top = self.y;
            let baseline = top - row_height / 2.0 - size / 3.0;

            if style == KeyValueStyle::Summary {
                for (x, width) in [(x0, key_width), (x0 + key_width, value_width)] {
                    self.draw(DrawOp::Rect {
                        x,
                        y: top - row_height,
                        width,
                        height: row_height,
                        fill: Some(LAVENDER),
                        stroke: Some((NAVY, 1.0)),
                    });
                }
            }

            let (key_font, key_color, value_font) = match style {
                KeyValueStyle::Metadata => (Font::Bold, NAVY, Font::Regular),
                KeyValueStyle::Summary => (Font::Bold, NAVY, Font::Bold),
            };
            let value_color = if style == KeyValueStyle::Summary { NAVY } else { BLACK };

            self.draw(DrawOp::text_in(
                Align::Right,
                x0,
                key_width - 2.0 * CELL_PADDING,
                baseline,
                key_font,
                size,
                key_color,
                fit(key, key_width - 2.0 * CELL_PADDING, key_font, size),
            ));
            self.draw(DrawOp::text_in(
                Align::Left,
                x0 + key_width + CELL_PADDING,
                value_width - 2.0 * CELL_PADDING,
                baseline,
                value_font,
                size,
                value_color,
                fit(value, value_width - 2.0 * CELL_PADDING, value_font, size),
            ));
            self.y -= row_height;
        }
    }

    fn table_origin(table: &Table) -> f32 {
        let width = table.width();
        if width >= CONTENT_WIDTH {
            CONTENT_LEFT
        } else {
            CONTENT_LEFT + (CONTENT_WIDTH - width) / 2.0
        }
    }

    fn place_table_header(&mut self, table: &Table) {
        let top = self.y;
        let mut x = Self::table_origin(table);
        for (title, width) in table.header.iter().zip(&table.widths) {
            self.draw(DrawOp::Rect {
                x,
                y: top - TABLE_HEADER_HEIGHT,
                width: *width,
                height: TABLE_HEADER_HEIGHT,
                fill: Some(NAVY),
                stroke: Some((GREY, 0.5)),
            });
            self.draw(DrawOp::text_in(
                Align::Center,
                x,
                *width,
                top - TABLE_HEADER_HEIGHT / 2.0 - 3.5,
                Font::Bold,
                10.0,
                WHITE,
                fit(title, width - 2.0 * CELL_PADDING, Font::Bold, 10.0),
            ));
            x += width;
        }
        self.y -= TABLE_HEADER_HEIGHT;
    }

    fn place_table(&mut self, table: &Table) {
        let first = if table.rows.is_empty() { 0.0 } else { TABLE_ROW_HEIGHT };
        self.ensure(TABLE_HEADER_HEIGHT + first);
        self.place_table_header(table);

        for (index, row) in table.rows.iter().enumerate() {
            if TABLE_ROW_HEIGHT > self.remaining() {
                self.new_page();
                self.place_table_header(table);
            }

            let top = self.y;
            let fill = if index % 2 == 0 { WHITE } else { STRIPE };
            let mut x = Self::table_origin(table);
            for (cell, width) in row.iter().zip(&table.widths) {
                self.draw(DrawOp::Rect {
                    x,
                    y: top - TABLE_ROW_HEIGHT,
                    width: *width,
                    height: TABLE_ROW_HEIGHT,
                    fill: Some(fill),
                    stroke: Some((GREY, 0.5)),
                });
                self.draw(DrawOp::Text {
                    x: x + CELL_PADDING,
                    y: top - TABLE_ROW_HEIGHT / 2.0 - 3.0,
                    font: Font::Regular,
                    size: 9.0,
                    color: BLACK,
                    text: fit(cell, width - 2.0 * CELL_PADDING, Font::Regular, 9.0),
                });
                x += width;
            }
            self.y -= TABLE_ROW_HEIGHT;
        }
        self.y -= 14.0;
    }

    fn place_signatures(&mut self, names: &[String]) {
        const COLUMN: f32 = 180.0;
        const ROW: f32 = 46.0;
        let x0 = CONTENT_LEFT + (CONTENT_WIDTH - 2.0 * COLUMN) / 2.0;

        self.place(&Block::Spacer(36.0));
        for pair in names.chunks(2) {
            self.ensure(ROW);
            let top = self.y;
            for (index, name) in pair.iter().enumerate() {
                let x = x0 + index as f32 * COLUMN;
                self.draw(DrawOp::text_in(
                    Align::Center,
                    x,
                    COLUMN,
                    top - 22.0,
                    Font::Regular,
                    9.0,
                    BLACK,
                    "_".repeat(30),
                ));
                self.draw(DrawOp::text_in(
                    Align::Center,
                    x,
                    COLUMN,
                    top - 38.0,
                    Font::Bold,
                    10.0,
                    NAVY,
                    name.clone(),
                ));
            }
            self.y -= ROW;
        }
    }

    fn finish(mut self) -> Vec<Page> {
        if !self.at_top() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

/// Flows the document into pages. Always yields at least one page.
pub fn layout(document: &Document) -> Vec<Page> {
    let mut layout = Layout::new();
    for block in &document.blocks {
        layout.place(block);
    }
    layout.finish()
}

/// Wraps every page in the template's header and footer.
pub fn decorate(pages: Vec<Page>, template: &dyn PageTemplate) -> Vec<Page> {
    let total = pages.len();
    pages
        .into_iter()
        .enumerate()
        .map(|(index, page)| {
            let info = PageInfo {
                number: index + 1,
                total,
            };
            let mut ops = template.header(info);
            ops.extend(page.ops);
            ops.extend(template.footer(info));
            Page { ops }
        })
        .collect()
}

pub fn render(document: &Document, template: &dyn PageTemplate) -> Result<Vec<u8>, RenderError> {
    let pages = decorate(layout(document), template);
    write_pdf(&document.title, &pages)
}

// ===== Writer =====

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

fn color_operands(color: Rgb) -> Vec<Object> {
    vec![real(color.0), real(color.1), real(color.2)]
}

/// Maps text to WinAnsiEncoding; characters outside it become '?'.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u32 as u8,
            0x20ac => 0x80,
            0x2026 => 0x85,
            0x2018 => 0x91,
            0x2019 => 0x92,
            0x201c => 0x93,
            0x201d => 0x94,
            0x2022 => 0x95,
            0x2013 => 0x96,
            0x2014 => 0x97,
            _ => b'?',
        })
        .collect()
}

fn text_object(text: &str) -> Object {
    Object::String(encode_win_ansi(text), StringFormat::Literal)
}

fn page_operations(page: &Page, images: &[(Arc<JpegImage>, ObjectId)]) -> Vec<Operation> {
    let mut ops = Vec::new();
    for op in &page.ops {
        match op {
            DrawOp::Text {
                x,
                y,
                font,
                size,
                color,
                text,
            } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![font.resource().into(), real(*size)]));
                ops.push(Operation::new("rg", color_operands(*color)));
                ops.push(Operation::new("Td", vec![real(*x), real(*y)]));
                ops.push(Operation::new("Tj", vec![text_object(text)]));
                ops.push(Operation::new("ET", vec![]));
            }
            DrawOp::Rect {
                x,
                y,
                width,
                height,
                fill,
                stroke,
            } => {
                ops.push(Operation::new("q", vec![]));
                if let Some(fill) = fill {
                    ops.push(Operation::new("rg", color_operands(*fill)));
                }
                if let Some((color, line_width)) = stroke {
                    ops.push(Operation::new("RG", color_operands(*color)));
                    ops.push(Operation::new("w", vec![real(*line_width)]));
                }
                ops.push(Operation::new(
                    "re",
                    vec![real(*x), real(*y), real(*width), real(*height)],
                ));
                let paint = match (fill.is_some(), stroke.is_some()) {
                    (true, true) => "B",
                    (true, false) => "f",
                    (false, true) => "S",
                    (false, false) => "n",
                };
                ops.push(Operation::new(paint, vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            DrawOp::Line { from, to, color, width } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new("RG", color_operands(*color)));
                ops.push(Operation::new("w", vec![real(*width)]));
                ops.push(Operation::new("m", vec![real(from.0), real(from.1)]));
                ops.push(Operation::new("l", vec![real(to.0), real(to.1)]));
                ops.push(Operation::new("S", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            DrawOp::Image {
                image,
                x,
                y,
                width,
                height,
            } => {
                let Some(index) = images.iter().position(|(known, _)| Arc::ptr_eq(known, image)) else {
                    continue;
                };
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![real(*width), real(0.0), real(0.0), real(*height), real(*x), real(*y)],
                ));
                ops.push(Operation::new("Do", vec![format!("Im{index}").as_str().into()]));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }
    ops
}

pub fn write_pdf(title: &str, pages: &[Page]) -> Result<Vec<u8>, RenderError> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut images: Vec<(Arc<JpegImage>, ObjectId)> = Vec::new();
    for op in pages.iter().flat_map(|page| page.ops.iter()) {
        if let DrawOp::Image { image, .. } = op {
            if !images.iter().any(|(known, _)| Arc::ptr_eq(known, image)) {
                let id = doc.add_object(image.to_stream());
                images.push((Arc::clone(image), id));
            }
        }
    }

    let mut xobjects = Dictionary::new();
    for (index, (_, id)) in images.iter().enumerate() {
        xobjects.set(format!("Im{index}"), *id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
        "XObject" => xobjects,
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content {
            operations: page_operations(page, &images),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![real(0.0), real(0.0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
        }),
    );

    let info_id = doc.add_object(dictionary! {
        "Title" => text_object(title),
        "Producer" => text_object("academia"),
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

// ===== Images =====

/// A baseline or progressive JPEG embedded as-is with DCTDecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub components: u8,
}

impl JpegImage {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, RenderError> {
        if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
            return Err(RenderError::InvalidImage("not a JPEG stream".to_string()));
        }

        let mut pos = 2;
        while pos + 4 <= data.len() {
            if data[pos] != 0xFF {
                return Err(RenderError::InvalidImage(format!("bad marker at offset {pos}")));
            }
            let marker = data[pos + 1];
            if marker == 0xFF {
                pos += 1;
                continue;
            }
            if marker == 0x01 || (0xD0..=0xD8).contains(&marker) {
                pos += 2;
                continue;
            }

            let length = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
            let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
            if is_frame {
                if pos + 10 > data.len() {
                    break;
                }
                let height = u16::from_be_bytes([data[pos + 5], data[pos + 6]]);
                let width = u16::from_be_bytes([data[pos + 7], data[pos + 8]]);
                let components = data[pos + 9];
                if width == 0 || height == 0 || !matches!(components, 1 | 3 | 4) {
                    return Err(RenderError::InvalidImage("unsupported frame header".to_string()));
                }
                return Ok(Self {
                    data,
                    width: u32::from(width),
                    height: u32::from(height),
                    components,
                });
            }
            pos += 2 + length;
        }

        Err(RenderError::InvalidImage("missing frame header".to_string()))
    }

    /// Largest size with the image's aspect ratio that fits the box.
    pub fn fit_within(&self, max_width: f32, max_height: f32) -> (f32, f32) {
        let scale = (max_width / self.width as f32).min(max_height / self.height as f32);
        (self.width as f32 * scale, self.height as f32 * scale)
    }

    fn to_stream(&self) -> Stream {
        let color_space = match self.components {
            1 => "DeviceGray",
            4 => "DeviceCMYK",
            _ => "DeviceRGB",
        };
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(self.width),
            "Height" => i64::from(self.height),
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        if self.components == 4 {
            dict.set("Decode", vec![1.into(), 0.into(), 1.into(), 0.into(), 1.into(), 0.into(), 1.into(), 0.into()]);
        }
        Stream::new(dict, self.data.clone()).with_compression(false)
    }
}
