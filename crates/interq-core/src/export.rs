//! Multi-page PDF export of a rendered report region
//!
//! A region is rasterized once at [`OVERSAMPLE`]× into one tall RGB image.
//! The image is scaled to the page width and cut into pages by placing the
//! same image on every page, shifted up one page height per page. The pixel
//! data is embedded a single time and referenced from each page.

use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::debug;

use crate::aggregate::AggregatedReport;
use crate::error::{Error, Result};

/// Raster oversampling factor
pub const OVERSAMPLE: u32 = 2;

/// Page size in PDF points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFormat {
    pub width: f64,
    pub height: f64,
}

impl PageFormat {
    /// ISO A4, portrait
    pub const A4: Self = Self {
        width: 595.28,
        height: 841.89,
    };
}

impl Default for PageFormat {
    fn default() -> Self {
        Self::A4
    }
}

/// Something that can be captured as an image
pub trait Rasterizer: Send + Sync {
    /// Render at `scale` device pixels per logical pixel
    fn rasterize(&self, scale: u32) -> Result<RgbImage>;
}

impl<R: Rasterizer + ?Sized> Rasterizer for Box<R> {
    fn rasterize(&self, scale: u32) -> Result<RgbImage> {
        (**self).rasterize(scale)
    }
}

/// Placement of one tall image across pages
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    /// Image height once scaled to the page width, in points
    pub image_height: f64,
    /// Vertical offset of the image top on each page (0, -h, -2h, ...)
    pub offsets: Vec<f64>,
}

impl PageLayout {
    pub fn page_count(&self) -> usize {
        self.offsets.len()
    }
}

/// Work out how many pages an image of `width_px` × `height_px` needs
pub fn layout_pages(width_px: u32, height_px: u32, format: PageFormat) -> PageLayout {
    let image_height = if width_px == 0 {
        0.0
    } else {
        f64::from(height_px) * format.width / f64::from(width_px)
    };

    let mut offsets = vec![0.0];
    let mut position = 0.0;
    let mut remaining = image_height;
    while remaining > format.height {
        position -= format.height;
        remaining -= format.height;
        offsets.push(position);
    }

    PageLayout {
        image_height,
        offsets,
    }
}

/// A finished PDF
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl ExportedDocument {
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Rasterize a region and paginate it into a PDF
pub fn export_region<R: Rasterizer + ?Sized>(
    region: &R,
    format: PageFormat,
) -> Result<ExportedDocument> {
    let image = region.rasterize(OVERSAMPLE)?;
    render_pdf(&image, format)
}

/// Paginate an already rasterized image into a PDF
pub fn render_pdf(image: &RgbImage, format: PageFormat) -> Result<ExportedDocument> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::InvalidData("Cannot export an empty image".to_string()));
    }
    let layout = layout_pages(width, height, format);
    debug!(
        "Exporting {}x{} px image onto {} page(s)",
        width,
        height,
        layout.page_count()
    );

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(image.as_raw())?;
    let pixels = encoder.finish()?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        pixels,
    ));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im0" => image_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(layout.page_count());
    for offset in &layout.offsets {
        // PDF origin is bottom-left; offsets are measured from the page top
        let y = format.height - layout.image_height - offset;
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        real(format.width),
                        Object::Integer(0),
                        Object::Integer(0),
                        real(layout.image_height),
                        Object::Integer(0),
                        real(y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len();
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            real(format.width),
            real(format.height),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(ExportedDocument { bytes, page_count })
}

fn real(value: f64) -> Object {
    Object::from(value as f32)
}

/// A screenshot captured elsewhere (PNG), already at device resolution
#[derive(Debug, Clone)]
pub struct PngCapture {
    bytes: Vec<u8>,
}

impl PngCapture {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }
}

impl Rasterizer for PngCapture {
    fn rasterize(&self, _scale: u32) -> Result<RgbImage> {
        let image = image::load_from_memory_with_format(&self.bytes, ImageFormat::Png)?;
        Ok(image.to_rgb8())
    }
}

const CANVAS_WIDTH: u32 = 600;
const MARGIN: u32 = 24;
const HEADER_HEIGHT: u32 = 56;
const SECTION_GAP: u32 = 32;
const BAR_HEIGHT: u32 = 16;
const BAR_GAP: u32 = 8;
const SHARE_STRIP_HEIGHT: u32 = 32;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const HEADER: Rgb<u8> = Rgb([30, 41, 59]);
const TRACK: Rgb<u8> = Rgb([226, 232, 240]);
const FEATURE_BAR: Rgb<u8> = Rgb([59, 130, 246]);
const RISK_BAR: Rgb<u8> = Rgb([16, 185, 129]);
const DOWNGRADED_BAR: Rgb<u8> = Rgb([239, 68, 68]);
const SHARE_PALETTE: [Rgb<u8>; 6] = [
    Rgb([59, 130, 246]),
    Rgb([245, 158, 11]),
    Rgb([139, 92, 246]),
    Rgb([20, 184, 166]),
    Rgb([236, 72, 153]),
    Rgb([100, 116, 139]),
];

fn share_color(i: usize) -> Rgb<u8> {
    SHARE_PALETTE[i % SHARE_PALETTE.len()]
}

/// Draws the report's charts: a header band, one bar per overall feature,
/// the relative share of the significant features (a stacked strip plus one
/// bar per feature in its strip colour) and one bar per transaction risk
/// score (red when downgraded)
#[derive(Debug, Clone)]
pub struct ReportCanvas {
    report: AggregatedReport,
}

impl ReportCanvas {
    pub fn new(report: AggregatedReport) -> Self {
        Self { report }
    }

    /// Logical (unscaled) canvas height
    pub fn logical_height(&self) -> u32 {
        let rows = |n: usize| n as u32 * (BAR_HEIGHT + BAR_GAP);
        MARGIN
            + HEADER_HEIGHT
            + SECTION_GAP
            + rows(self.report.overall_series.len())
            + self.share_section_height()
            + SECTION_GAP
            + rows(self.report.per_transaction_series.len())
            + MARGIN
    }

    /// Omitted entirely when no feature clears the share threshold
    fn share_section_height(&self) -> u32 {
        match self.report.relative_share.len() as u32 {
            0 => 0,
            n => SECTION_GAP + SHARE_STRIP_HEIGHT + BAR_GAP + n * (BAR_HEIGHT + BAR_GAP),
        }
    }
}

impl Rasterizer for ReportCanvas {
    fn rasterize(&self, scale: u32) -> Result<RgbImage> {
        let scale = scale.max(1);
        let mut img = RgbImage::from_pixel(
            CANVAS_WIDTH * scale,
            self.logical_height() * scale,
            BACKGROUND,
        );
        let track_width = CANVAS_WIDTH - 2 * MARGIN;
        let mut pen = Pen {
            img: &mut img,
            scale,
        };

        pen.fill(MARGIN, MARGIN, track_width, HEADER_HEIGHT, HEADER);
        let mut y = MARGIN + HEADER_HEIGHT + SECTION_GAP;

        let max_importance = max_of(self.report.overall_series.iter().map(|p| p.importance));
        for point in &self.report.overall_series {
            pen.bar(y, track_width, point.importance / max_importance, FEATURE_BAR);
            y += BAR_HEIGHT + BAR_GAP;
        }

        let fractions = self.report.share_fractions();
        if !fractions.is_empty() {
            y += SECTION_GAP;
            let mut x = MARGIN;
            for (i, fraction) in fractions.iter().enumerate() {
                // last segment absorbs rounding so the strip spans the track
                let width = if i + 1 == fractions.len() {
                    MARGIN + track_width - x
                } else {
                    ((f64::from(track_width) * fraction).round() as u32).min(MARGIN + track_width - x)
                };
                pen.fill(x, y, width, SHARE_STRIP_HEIGHT, share_color(i));
                x += width;
            }
            y += SHARE_STRIP_HEIGHT + BAR_GAP;
            for (i, fraction) in fractions.iter().enumerate() {
                pen.bar(y, track_width, *fraction, share_color(i));
                y += BAR_HEIGHT + BAR_GAP;
            }
        }

        y += SECTION_GAP;
        let max_risk = max_of(self.report.risk_scores.iter().copied());
        for point in &self.report.per_transaction_series {
            let color = if point.downgraded {
                DOWNGRADED_BAR
            } else {
                RISK_BAR
            };
            pen.bar(y, track_width, point.risk_score / max_risk, color);
            y += BAR_HEIGHT + BAR_GAP;
        }

        Ok(img)
    }
}

/// Largest finite positive value, or 1 so ratios stay defined
fn max_of(values: impl Iterator<Item = f64>) -> f64 {
    values
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .unwrap_or(1.0)
}

/// Draws in logical coordinates onto a scaled raster
struct Pen<'a> {
    img: &'a mut RgbImage,
    scale: u32,
}

impl Pen<'_> {
    fn fill(&mut self, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
        let (max_x, max_y) = self.img.dimensions();
        let x0 = (x * self.scale).min(max_x);
        let y0 = (y * self.scale).min(max_y);
        let x1 = ((x + w) * self.scale).min(max_x);
        let y1 = ((y + h) * self.scale).min(max_y);
        for py in y0..y1 {
            for px in x0..x1 {
                self.img.put_pixel(px, py, color);
            }
        }
    }

    /// Grey track with a filled portion of `ratio` (clamped to 0..=1)
    fn bar(&mut self, y: u32, track_width: u32, ratio: f64, color: Rgb<u8>) {
        self.fill(MARGIN, y, track_width, BAR_HEIGHT, TRACK);
        let ratio = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let filled = (f64::from(track_width) * ratio).round() as u32;
        self.fill(MARGIN, y, filled, BAR_HEIGHT, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::models::{
        OverallFeature, OverallFeatures, ReportDetail, TransactionDetail, TransactionFeature,
    };

    /// Solid image of a fixed size
    struct Solid(u32, u32);

    impl Rasterizer for Solid {
        fn rasterize(&self, scale: u32) -> Result<RgbImage> {
            Ok(RgbImage::from_pixel(self.0 * scale, self.1 * scale, Rgb([10, 20, 30])))
        }
    }

    fn sample_report(transactions: u64) -> AggregatedReport {
        let detail = ReportDetail {
            overall: OverallFeatures {
                features: vec![
                    OverallFeature {
                        name: "mc_channel_type".into(),
                        importance: 0.7,
                        reason: String::new(),
                    },
                    OverallFeature {
                        name: "mc_eci_indicator".into(),
                        importance: 0.3,
                        reason: String::new(),
                    },
                ],
            },
            per_transaction: (0..transactions)
                .map(|i| TransactionDetail {
                    index: i,
                    predicted_fee: "1.00".into(),
                    actual_fee: "1.40".into(),
                    downgraded: i == 0,
                    features: vec![TransactionFeature {
                        name: "mc_channel_type".into(),
                        value: "ecom".into(),
                        importance: 0.5,
                        reason: String::new(),
                    }],
                })
                .collect(),
        };
        aggregate(&detail)
    }

    #[test]
    fn test_layout_single_page() {
        let layout = layout_pages(1000, 1000, PageFormat::A4);
        assert_eq!(layout.page_count(), 1);
        assert!((layout.image_height - 595.28).abs() < 1e-9);
        assert_eq!(layout.offsets, vec![0.0]);
    }

    #[test]
    fn test_layout_shifts_by_page_height() {
        // 3000 px tall at 1000 px wide scales to 1785.84 pt: three pages
        let layout = layout_pages(1000, 3000, PageFormat::A4);
        assert_eq!(layout.page_count(), 3);
        assert_eq!(layout.offsets[0], 0.0);
        assert!((layout.offsets[1] + 841.89).abs() < 1e-9);
        assert!((layout.offsets[2] + 2.0 * 841.89).abs() < 1e-9);
    }

    #[test]
    fn test_layout_image_exactly_one_page_tall() {
        let format = PageFormat {
            width: 100.0,
            height: 200.0,
        };
        assert_eq!(layout_pages(50, 100, format).page_count(), 1);
        assert_eq!(layout_pages(50, 101, format).page_count(), 2);
    }

    #[test]
    fn test_export_embeds_image_once() {
        let doc = export_region(&Solid(100, 400), PageFormat::A4).unwrap();
        assert_eq!(doc.page_count, 3);
        assert!(doc.bytes.starts_with(b"%PDF-1.5"));

        let parsed = Document::load_mem(&doc.bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 3);
        let images = parsed
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| {
                s.dict
                    .get(b"Subtype")
                    .and_then(|v| v.as_name())
                    .map(|n| n == b"Image")
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(images, 1);
    }

    #[test]
    fn test_empty_image_rejected() {
        let err = render_pdf(&RgbImage::new(0, 0), PageFormat::A4).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_report_canvas_dimensions() {
        let small = ReportCanvas::new(sample_report(1));
        let large = ReportCanvas::new(sample_report(40));
        let img = small.rasterize(OVERSAMPLE).unwrap();
        assert_eq!(img.width(), CANVAS_WIDTH * OVERSAMPLE);
        assert_eq!(img.height(), small.logical_height() * OVERSAMPLE);
        assert!(large.logical_height() > small.logical_height());
        assert_eq!(*img.get_pixel(MARGIN * 2 + 1, MARGIN * 2 + 1), HEADER);
    }

    #[test]
    fn test_report_canvas_bars() {
        let canvas = ReportCanvas::new(sample_report(2));
        let img = canvas.rasterize(1).unwrap();
        let first_bar_y = MARGIN + HEADER_HEIGHT + SECTION_GAP + 1;
        // largest feature fills the whole track
        assert_eq!(*img.get_pixel(CANVAS_WIDTH - MARGIN - 1, first_bar_y), FEATURE_BAR);
        // 0.3 of 0.7 leaves the right end of the second track empty
        let second_bar_y = first_bar_y + BAR_HEIGHT + BAR_GAP;
        assert_eq!(*img.get_pixel(CANVAS_WIDTH - MARGIN - 1, second_bar_y), TRACK);
        // first transaction is downgraded
        let tx_y = second_bar_y + BAR_HEIGHT + BAR_GAP + canvas.share_section_height() + SECTION_GAP;
        assert_eq!(*img.get_pixel(MARGIN + 1, tx_y), DOWNGRADED_BAR);
    }

    #[test]
    fn test_report_canvas_share_section() {
        let canvas = ReportCanvas::new(sample_report(1));
        let img = canvas.rasterize(1).unwrap();
        let track_width = CANVAS_WIDTH - 2 * MARGIN;

        // two features at 0.7 and 0.3
        let strip_y = MARGIN + HEADER_HEIGHT + SECTION_GAP + 2 * (BAR_HEIGHT + BAR_GAP) + SECTION_GAP + 1;
        assert_eq!(*img.get_pixel(MARGIN, strip_y), share_color(0));
        let split = MARGIN + (f64::from(track_width) * 0.7).round() as u32;
        assert_eq!(*img.get_pixel(split - 1, strip_y), share_color(0));
        assert_eq!(*img.get_pixel(split, strip_y), share_color(1));
        assert_eq!(*img.get_pixel(MARGIN + track_width - 1, strip_y), share_color(1));

        // legend bars: the 0.3 share stops short of the track end
        let legend_y = strip_y - 1 + SHARE_STRIP_HEIGHT + BAR_GAP + 1;
        assert_eq!(*img.get_pixel(split - 1, legend_y), share_color(0));
        let second_legend_y = legend_y + BAR_HEIGHT + BAR_GAP;
        assert_eq!(*img.get_pixel(MARGIN + 1, second_legend_y), share_color(1));
        assert_eq!(*img.get_pixel(MARGIN + track_width - 1, second_legend_y), TRACK);
    }

    #[test]
    fn test_report_canvas_without_share_section() {
        let canvas = ReportCanvas::new(aggregate(&ReportDetail::default()));
        assert_eq!(canvas.share_section_height(), 0);
        assert_eq!(
            canvas.logical_height(),
            MARGIN + HEADER_HEIGHT + SECTION_GAP + SECTION_GAP + MARGIN
        );
        assert!(canvas.rasterize(1).is_ok());
    }

    #[test]
    fn test_png_capture_roundtrip_into_pdf() {
        let source = RgbImage::from_pixel(8, 8, Rgb([200, 0, 0]));
        let mut png = std::io::Cursor::new(Vec::new());
        source.write_to(&mut png, ImageFormat::Png).unwrap();

        let capture = PngCapture::new(png.into_inner());
        let decoded = capture.rasterize(OVERSAMPLE).unwrap();
        assert_eq!(decoded.dimensions(), (8, 8));
        assert_eq!(export_region(&capture, PageFormat::A4).unwrap().page_count, 1);
    }

    #[test]
    fn test_png_capture_rejects_garbage() {
        let capture = PngCapture::new(b"not a png".to_vec());
        assert!(matches!(capture.rasterize(1), Err(Error::Image(_))));
    }
}
