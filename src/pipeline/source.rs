//! Document access: positioned text runs and image regions per page.
//!
//! The extractor works against the [`DocumentSource`] trait rather than
//! pdfium directly. [`PdfiumSource`] is the production implementation; tests
//! drive the extractor with an in-memory source so no native library is
//! needed outside the end-to-end suite.
//!
//! ## Coordinates
//!
//! PDF page space is bottom-up. Everything leaving this module is flipped to
//! top-down (`top < bottom`) so reading order is a plain `(top, left)` sort.
//!
//! ## Threading
//!
//! pdfium is not async-safe. Callers run a whole extraction inside
//! `tokio::task::spawn_blocking`, and a `PdfiumSource` borrows its `Pdfium`
//! handle for its entire life, so it never crosses threads.

use crate::error::TranslateError;
use crate::model::Rect;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ── Page content ─────────────────────────────────────────────────────────

/// Font-name fragments that mark a monospace face.
pub const MONOSPACE_MARKERS: &[&str] = &[
    "mono",
    "courier",
    "consola",
    "inconsolata",
    "sourcecodepro",
    "code",
];

/// A run of text sharing one font, with its box on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub font_size: f32,
    pub font_name: String,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    pub bbox: Rect,
}

impl TextSpan {
    /// Create a span, deriving style flags from the font name.
    ///
    /// Sources that know more (font weight, fixed-pitch flag) OR their own
    /// signals into the flags afterwards.
    pub fn new(text: impl Into<String>, font_size: f32, font_name: impl Into<String>, bbox: Rect) -> Self {
        let font_name = font_name.into();
        let lower = font_name.to_lowercase();
        let bold = lower.contains("bold") || lower.contains("black") || lower.contains("heavy");
        let italic = lower.contains("italic") || lower.contains("oblique");
        let compact: String = lower.chars().filter(|c| c.is_alphanumeric()).collect();
        let monospace = MONOSPACE_MARKERS.iter().any(|m| compact.contains(m));
        Self {
            text: text.into(),
            font_size,
            font_name,
            bold,
            italic,
            monospace,
            bbox,
        }
    }
}

/// A raster or vector image placed on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRegion {
    pub bbox: Rect,
}

/// Raw content of one page, in no particular order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    /// 1-based page number.
    pub page_number: usize,
    pub width: f32,
    pub height: f32,
    pub spans: Vec<TextSpan>,
    pub images: Vec<ImageRegion>,
}

/// A paginated document the extractor can read.
pub trait DocumentSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Text runs and image regions of a 1-based page.
    fn page_content(&self, page: usize) -> Result<PageContent, TranslateError>;

    /// Rasterise `region` of a 1-based page at `dpi`.
    fn render_region(&self, page: usize, region: &Rect, dpi: u32) -> Result<DynamicImage, TranslateError>;
}

// ── pdfium binding ───────────────────────────────────────────────────────

/// Bind to a pdfium library.
///
/// Resolution order: `PDFIUM_LIB_PATH` (a library file or the directory
/// holding it), the current working directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, TranslateError> {
    if let Ok(configured) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(&configured);
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path
        };
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| TranslateError::PdfiumBindingFailed(format!("{}: {}", lib.display(), e)));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| TranslateError::PdfiumBindingFailed(e.to_string()))
}

// ── pdfium source ────────────────────────────────────────────────────────

/// Last page rasterised by [`PdfiumSource::render_region`].
struct RenderedPage {
    page: usize,
    dpi: u32,
    image: DynamicImage,
}

/// [`DocumentSource`] over a PDF opened with pdfium.
pub struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
    path: PathBuf,
    // Images on one page are cropped from a single full-page render.
    rendered: RefCell<Option<RenderedPage>>,
}

impl<'a> PdfiumSource<'a> {
    /// Open `path`, mapping pdfium load failures to actionable errors.
    pub fn open(pdfium: &'a Pdfium, path: &Path, password: Option<&'a str>) -> Result<Self, TranslateError> {
        let document = pdfium.load_pdf_from_file(path, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    TranslateError::WrongPassword {
                        path: path.to_path_buf(),
                    }
                } else {
                    TranslateError::PasswordRequired {
                        path: path.to_path_buf(),
                    }
                }
            } else {
                TranslateError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: err_str,
                }
            }
        })?;

        info!(
            "PDF loaded: {} ({} pages)",
            path.display(),
            document.pages().len()
        );

        Ok(Self {
            document,
            path: path.to_path_buf(),
            rendered: RefCell::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn page(&self, page: usize) -> Result<PdfPage<'_>, TranslateError> {
        let total = self.page_count();
        if page == 0 || page > total {
            return Err(TranslateError::PageOutOfRange { page, total });
        }
        self.document
            .pages()
            .get((page - 1) as u16)
            .map_err(|e| TranslateError::PageReadFailed {
                page,
                detail: format!("{:?}", e),
            })
    }
}

impl DocumentSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_content(&self, page_number: usize) -> Result<PageContent, TranslateError> {
        let page = self.page(page_number)?;
        let width = page.width().value;
        let height = page.height().value;

        let mut content = PageContent {
            page_number,
            width,
            height,
            ..Default::default()
        };

        for object in page.objects().iter() {
            let bounds = match object.bounds() {
                Ok(b) => b,
                Err(e) => {
                    debug!("Page {}: object without bounds skipped ({:?})", page_number, e);
                    continue;
                }
            };
            let bbox = Rect::new(
                bounds.left().value,
                height - bounds.top().value,
                bounds.right().value,
                height - bounds.bottom().value,
            );

            if let Some(text_object) = object.as_text_object() {
                let text = text_object.text();
                if text.trim().is_empty() {
                    continue;
                }
                let font = text_object.font();
                let mut span = TextSpan::new(text, text_object.scaled_font_size().value, font.name(), bbox);
                span.bold |= matches!(
                    font.weight(),
                    Ok(PdfFontWeight::Weight700Bold | PdfFontWeight::Weight800 | PdfFontWeight::Weight900)
                ) || matches!(font.weight(), Ok(PdfFontWeight::Custom(w)) if w >= 700);
                span.italic |= font.is_italic();
                span.monospace |= font.is_fixed_pitch();
                content.spans.push(span);
            } else if object.object_type() == PdfPageObjectType::Image {
                content.images.push(ImageRegion { bbox });
            }
        }

        debug!(
            "Page {}: {} text runs, {} images",
            page_number,
            content.spans.len(),
            content.images.len()
        );
        Ok(content)
    }

    fn render_region(&self, page_number: usize, region: &Rect, dpi: u32) -> Result<DynamicImage, TranslateError> {
        let scale = dpi as f32 / 72.0;

        let mut cache = self.rendered.borrow_mut();
        let cached = matches!(cache.as_ref(), Some(r) if r.page == page_number && r.dpi == dpi);
        if !cached {
            let page = self.page(page_number)?;
            let render_config = PdfRenderConfig::new()
                .set_target_width((page.width().value * scale).round() as i32);
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| TranslateError::RasterisationFailed {
                    page: page_number,
                    detail: format!("{:?}", e),
                })?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_number,
                image.width(),
                image.height()
            );
            *cache = Some(RenderedPage {
                page: page_number,
                dpi,
                image,
            });
        }

        let rendered = cache
            .as_ref()
            .ok_or_else(|| TranslateError::Internal("page render cache empty".into()))?;
        crop_scaled(&rendered.image, region, scale).ok_or_else(|| TranslateError::RasterisationFailed {
            page: page_number,
            detail: format!("image region {:?} lies outside the page", region),
        })
    }
}

/// Crop `region` (page points) out of a page image rendered at `scale` px/pt.
pub fn crop_scaled(image: &DynamicImage, region: &Rect, scale: f32) -> Option<DynamicImage> {
    let max_w = image.width();
    let max_h = image.height();
    let x0 = ((region.left * scale).floor().max(0.0) as u32).min(max_w);
    let y0 = ((region.top * scale).floor().max(0.0) as u32).min(max_h);
    let x1 = ((region.right * scale).ceil().max(0.0) as u32).min(max_w);
    let y1 = ((region.bottom * scale).ceil().max(0.0) as u32).min(max_h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(image.crop_imm(x0, y0, x1 - x0, y1 - y0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn span_flags_from_font_name() {
        let r = Rect::default();
        let s = TextSpan::new("x", 10.0, "Helvetica-BoldOblique", r);
        assert!(s.bold && s.italic && !s.monospace);
        let c = TextSpan::new("x", 10.0, "ABCDEF+SourceCodePro-Regular", r);
        assert!(c.monospace);
        let m = TextSpan::new("x", 10.0, "Ubuntu Mono", r);
        assert!(m.monospace);
    }

    #[test]
    fn crop_scales_and_clamps() {
        let page = DynamicImage::ImageRgba8(RgbaImage::new(200, 100));
        let cropped = crop_scaled(&page, &Rect::new(10.0, 10.0, 60.0, 40.0), 2.0).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (100, 60));

        let clamped = crop_scaled(&page, &Rect::new(90.0, 40.0, 500.0, 500.0), 2.0).unwrap();
        assert_eq!((clamped.width(), clamped.height()), (20, 20));

        assert!(crop_scaled(&page, &Rect::new(150.0, 10.0, 160.0, 20.0), 2.0).is_none());
    }
}
