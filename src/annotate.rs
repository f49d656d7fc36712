//! Drawing tracks and counters onto frames.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::Rgb;
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect as PixelRect;
use tracing::{debug, warn};

use crate::integration::Track;
use crate::media::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ACTIVE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const UNIQUE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 20.0;
const COUNTER_SCALE: f32 = 32.0;
/// Baselines of the two counter rows, 20px from the left edge.
const COUNTER_ROWS: [(i32, i32); 2] = [(20, 40), (20, 80)];

/// Fonts tried when none is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Draws confirmed tracks and the running counters.
///
/// Without a font only the boxes are drawn.
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    /// Boxes only, no text.
    pub fn boxes_only() -> Self {
        Self { font: None }
    }

    /// Load `font_path`, falling back to well-known system fonts.
    pub fn load(font_path: Option<&Path>) -> Self {
        let configured = font_path.map(Path::to_path_buf);
        let candidates = configured
            .iter()
            .cloned()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

        for path in candidates {
            match read_font(&path) {
                Ok(font) => {
                    debug!(path = %path.display(), "loaded label font");
                    return Self::new(Some(font));
                }
                Err(reason) if configured.as_ref() == Some(&path) => {
                    warn!(path = %path.display(), %reason, "configured font unusable");
                }
                Err(_) => {}
            }
        }

        warn!("no TrueType font found, drawing boxes without labels");
        Self::boxes_only()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw confirmed tracks and the counters. Returns the active count.
    pub fn annotate(&self, frame: &mut Frame, tracks: &[Track], unique_count: usize) -> usize {
        let (width, height) = frame.dimensions();
        let mut active = 0;

        for track in tracks.iter().filter(|t| t.is_confirmed()) {
            active += 1;
            let Some(bbox) = track.bbox.clamp_to(width, height) else {
                continue;
            };
            let x = bbox.x as i32;
            let y = bbox.y as i32;
            let w = bbox.width as u32;
            let h = bbox.height as u32;

            for inset in 0..BOX_THICKNESS {
                if w <= 2 * inset || h <= 2 * inset {
                    break;
                }
                let rect = PixelRect::at(x + inset as i32, y + inset as i32)
                    .of_size(w - 2 * inset, h - 2 * inset);
                draw_hollow_rect_mut(frame, rect, BOX_COLOR);
            }

            let label_top = (y - 10 - LABEL_SCALE as i32).max(0);
            let label = format!("ID: {}", track.id);
            self.text(frame, LABEL_COLOR, x, label_top, LABEL_SCALE, &label);
        }

        let [(ax, ay), (ux, uy)] = COUNTER_ROWS;
        let top = COUNTER_SCALE as i32;
        let people = format!("People Count: {active}");
        let unique = format!("Total Unique: {unique_count}");
        self.text(frame, ACTIVE_COLOR, ax, ay - top, COUNTER_SCALE, &people);
        self.text(frame, UNIQUE_COLOR, ux, uy - top, COUNTER_SCALE, &unique);

        active
    }

    fn text(&self, frame: &mut Frame, color: Rgb<u8>, x: i32, y: i32, scale: f32, text: &str) {
        if let Some(font) = &self.font {
            draw_text_mut(frame, color, x, y, PxScale::from(scale), font, text);
        }
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::load(None)
    }
}

fn read_font(path: &Path) -> Result<FontVec, String> {
    let data = std::fs::read(path).map_err(|e| e.to_string())?;
    FontVec::try_from_vec(data).map_err(|e| e.to_string())
}
