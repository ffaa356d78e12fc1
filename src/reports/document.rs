//! Format-independent document model handed to the renderer.

use std::sync::Arc;

use super::pdf::JpegImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValueStyle {
    /// Small right-aligned keys, used for the generation stamp and detail blocks.
    Metadata,
    /// Boxed, shaded aggregates.
    Summary,
}

/// Tabular data. The header row is kept apart from the data rows so it is
/// always first and can be repeated on every page the table spans.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub widths: Vec<f32>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(header: impl IntoIterator<Item = S>, widths: impl Into<Vec<f32>>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            widths: widths.into(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn width(&self) -> f32 {
        self.widths.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text { style: TextStyle, text: String },
    KeyValue { style: KeyValueStyle, pairs: Vec<(String, String)> },
    Table(Table),
    /// Printed names under blank signature lines, two per row.
    Signatures(Vec<String>),
    Image { image: Arc<JpegImage>, width: f32, height: f32 },
    Spacer(f32),
    PageBreak,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    pub fn text(&mut self, style: TextStyle, text: impl Into<String>) -> &mut Self {
        self.push(Block::Text {
            style,
            text: text.into(),
        })
    }

    pub fn heading(&mut self, text: impl Into<String>) -> &mut Self {
        self.text(TextStyle::Heading, text)
    }

    pub fn paragraph(&mut self, text: impl Into<String>) -> &mut Self {
        self.text(TextStyle::Body, text)
    }

    pub fn spacer(&mut self, height: f32) -> &mut Self {
        self.push(Block::Spacer(height))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            _ => None,
        })
    }

    pub fn summary(&self) -> Option<&[(String, String)]> {
        self.blocks.iter().find_map(|block| match block {
            Block::KeyValue {
                style: KeyValueStyle::Summary,
                pairs,
            } => Some(pairs.as_slice()),
            _ => None,
        })
    }
}

/// Keeps at most `max_chars` characters. Cuts on char boundaries so
/// multi-byte text is never split.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("Administración", 12), "Administraci");
        assert_eq!(truncate("Ñandú", 3), "Ñan");
        assert_eq!(truncate("corto", 30), "corto");
        assert_eq!(truncate("", 5), "");
    }

    #[test]
    fn summary_lookup() {
        let mut doc = Document::new("t");
        doc.paragraph("x").push(Block::KeyValue {
            style: KeyValueStyle::Summary,
            pairs: vec![("Total".into(), "3".into())],
        });
        assert_eq!(doc.summary().map(|s| s.len()), Some(1));
        assert_eq!(doc.tables().count(), 0);
    }
}
