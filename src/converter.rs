//! Text-to-PDF conversion of a single file.
//!
//! The pipeline is: read bytes, decode (UTF-8, then an optional permissive
//! fallback), normalize line endings, split into wrapped blocks, render, and
//! move the finished PDF into place. Rendering sits behind [`TextRenderer`] so
//! the font-bound `genpdf` backend can be swapped out.

use crate::config::{RenderSettings, Settings};
use crate::error::{ConfigError, ConversionError, FontError};
use crate::path_mapper::{ConversionTask, PARTIAL_PREFIX, PARTIAL_SUFFIX};
use encoding_rs::Encoding;
use genpdf::{elements, fonts, Document, SimplePageDecorator};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Fallback font locations searched after the configured font directory
const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/liberation2",
    "/usr/share/fonts/liberation-mono",
    "/usr/share/fonts/TTF",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];

/// One non-blank source line, pre-wrapped to the configured width
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub lines: Vec<String>,
}

/// Renders text blocks into a PDF document
pub trait TextRenderer: Send + Sync {
    fn render(
        &self,
        title: &str,
        blocks: &[TextBlock],
        out: &mut dyn Write,
    ) -> Result<(), ConversionError>;
}

/// Decodes file bytes as UTF-8, retrying once with a fallback encoding
#[derive(Debug, Clone, Copy)]
pub struct TextDecoder {
    fallback: Option<&'static Encoding>,
}

impl TextDecoder {
    pub fn new(fallback: Option<&'static Encoding>) -> Self {
        Self { fallback }
    }

    /// Build from an encoding label; an empty label disables the fallback
    pub fn from_label(label: &str) -> Result<Self, ConfigError> {
        if label.is_empty() {
            return Ok(Self::new(None));
        }

        Encoding::for_label(label.as_bytes())
            .map(|encoding| Self::new(Some(encoding)))
            .ok_or_else(|| ConfigError::UnknownEncoding {
                label: label.to_string(),
            })
    }

    pub fn decode(&self, path: &Path, bytes: Vec<u8>) -> Result<String, ConversionError> {
        let bytes = match String::from_utf8(bytes) {
            Ok(text) => return Ok(text),
            Err(err) => err.into_bytes(),
        };

        let Some(encoding) = self.fallback else {
            return Err(ConversionError::Decode {
                path: path.to_path_buf(),
                tried: "UTF-8".to_string(),
            });
        };

        debug!("{} is not UTF-8, decoding as {}", path.display(), encoding.name());
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes);
        if had_errors {
            return Err(ConversionError::Decode {
                path: path.to_path_buf(),
                tried: format!("UTF-8 and {}", encoding.name()),
            });
        }

        Ok(text.into_owned())
    }
}

impl Default for TextDecoder {
    fn default() -> Self {
        Self::new(Some(encoding_rs::WINDOWS_1252))
    }
}

/// CRLF to LF, drop a leading BOM, trim the whole document
pub fn normalize_text(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.replace("\r\n", "\n").trim().to_string()
}

/// Split normalized text into blocks, skipping blank lines
pub fn text_blocks(text: &str, wrap_width: usize) -> Vec<TextBlock> {
    let options = textwrap::Options::new(wrap_width.max(1))
        .break_words(true)
        .wrap_algorithm(textwrap::WrapAlgorithm::FirstFit);

    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| TextBlock {
            lines: textwrap::wrap(line, &options)
                .into_iter()
                .map(|segment| segment.into_owned())
                .collect(),
        })
        .collect()
}

/// `genpdf` backend with a font family loaded once at startup
pub struct GenpdfRenderer {
    family: fonts::FontFamily<fonts::FontData>,
    font_size: u8,
    margins: u8,
    line_spacing: f64,
    block_gap: f64,
}

impl GenpdfRenderer {
    pub fn load(settings: &RenderSettings) -> Result<Self, FontError> {
        let family = load_font_family(&settings.font_dir, &settings.font_family)?;

        Ok(Self {
            family,
            font_size: settings.font_size,
            margins: settings.margins,
            line_spacing: settings.line_spacing,
            block_gap: settings.block_gap,
        })
    }
}

impl TextRenderer for GenpdfRenderer {
    fn render(
        &self,
        title: &str,
        blocks: &[TextBlock],
        out: &mut dyn Write,
    ) -> Result<(), ConversionError> {
        let mut doc = Document::new(self.family.clone());
        doc.set_title(title);
        doc.set_minimal_conformance();
        doc.set_font_size(self.font_size);
        doc.set_line_spacing(self.line_spacing);

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(self.margins as i32);
        doc.set_page_decorator(decorator);

        for block in blocks {
            let mut layout = elements::LinearLayout::vertical();
            for line in &block.lines {
                layout.push(elements::Paragraph::new(line.clone()));
            }
            doc.push(layout);
            doc.push(elements::Break::new(self.block_gap));
        }

        doc.render(out).map_err(|e| ConversionError::Render {
            reason: e.to_string(),
        })
    }
}

/// Try the configured directory, then the usual system locations
fn load_font_family(
    font_dir: &Path,
    family: &str,
) -> Result<fonts::FontFamily<fonts::FontData>, FontError> {
    let mut searched: Vec<PathBuf> = vec![font_dir.to_path_buf()];
    searched.extend(SYSTEM_FONT_DIRS.iter().map(PathBuf::from));

    for dir in &searched {
        if let Ok(font_family) = fonts::from_files(dir, family, None) {
            info!("Loaded font '{}' from {}", family, dir.display());
            return Ok(font_family);
        }
    }

    Err(FontError::NotFound {
        family: family.to_string(),
        searched,
    })
}

/// Converts one source file into one PDF file
pub struct FileConverter {
    decoder: TextDecoder,
    renderer: Arc<dyn TextRenderer>,
    wrap_width: usize,
}

impl FileConverter {
    pub fn new(renderer: Arc<dyn TextRenderer>, decoder: TextDecoder, wrap_width: usize) -> Self {
        Self {
            decoder,
            renderer,
            wrap_width,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        renderer: Arc<dyn TextRenderer>,
    ) -> Result<Self, ConfigError> {
        let decoder = TextDecoder::from_label(&settings.input.fallback_encoding)?;

        Ok(Self::new(renderer, decoder, settings.render.wrap_width))
    }

    /// Read, decode and render `source`, returning the PDF bytes
    pub fn render_file(&self, source: &Path) -> Result<Vec<u8>, ConversionError> {
        let bytes = fs::read(source).map_err(|e| ConversionError::Read {
            path: source.to_path_buf(),
            source: e,
        })?;

        let text = normalize_text(&self.decoder.decode(source, bytes)?);
        let blocks = text_blocks(&text, self.wrap_width);

        let title = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut buffer = Vec::new();
        self.renderer.render(&title, &blocks, &mut buffer)?;

        debug!(
            "Rendered {} ({} blocks, {} bytes)",
            source.display(),
            blocks.len(),
            buffer.len()
        );
        Ok(buffer)
    }

    /// Convert `task.source` and atomically place the PDF at `task.destination`.
    ///
    /// The document goes to a hidden `.partial` file next to the destination
    /// and is renamed over it only once fully written, so a failure never
    /// leaves a truncated PDF behind.
    pub fn convert(&self, task: &ConversionTask) -> Result<u64, ConversionError> {
        let pdf = self.render_file(&task.source.path)?;

        let destination = &task.destination;
        let write_error = |source: std::io::Error| ConversionError::Write {
            path: destination.clone(),
            source,
        };

        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut partial = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(parent)
            .map_err(write_error)?;

        partial.write_all(&pdf).map_err(write_error)?;
        partial.as_file().sync_all().map_err(write_error)?;
        partial
            .persist(destination)
            .map_err(|e| write_error(e.error))?;

        Ok(pdf.len() as u64)
    }
}
