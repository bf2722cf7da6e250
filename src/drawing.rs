use std::fs;
use std::path::{Path, PathBuf};
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use crate::common::{Candidate, FrameDetections, LabelSet};

const BOX_COLOUR: Rgb<u8> = Rgb([255, 255, 0]);
const BOX_THICKNESS: i32 = 2;
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_OFFSET: i32 = 5;

const FONT_NAMES: [&str; 4] = ["DejaVuSans.ttf", "DejaVuSansMono.ttf", "LiberationSans-Regular.ttf", "FreeSans.ttf"];
const SYSTEM_FONT_DIRS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/TTF",
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/freefont",
];

/// Draws kept detections onto frames: a box per detection and `"<pct>% <name>"` above it.
pub struct Renderer {
    font: Option<FontVec>,
    scale: PxScale,
    colour: Rgb<u8>,
    per_class_colours: bool,
}

impl Renderer {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            scale: PxScale::from(LABEL_FONT_SIZE),
            colour: BOX_COLOUR,
            per_class_colours: false,
        }
    }

    /// Loads the font at `font_path`, or the first usable system font when `None`. Without a
    /// font the renderer still draws boxes, only the text is skipped.
    pub fn from_font_path(font_path: Option<&str>) -> Self {
        let font = match font_path {
            Some(path) => load_font(Path::new(path)),
            None => find_system_font().and_then(|p| load_font(&p)),
        };
        if font.is_none() {
            log::warn!("No usable font found, detections are drawn without labels");
        }
        Self::new(font)
    }

    pub fn with_colour(mut self, colour: Rgb<u8>) -> Self {
        self.colour = colour;
        self
    }

    pub fn with_class_colours(mut self, enabled: bool) -> Self {
        self.per_class_colours = enabled;
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draws every kept candidate onto `image`.
    ///
    /// Entries whose class id has no label, whose index is not a candidate, or whose box is
    /// empty are skipped silently.
    ///
    /// # Returns
    ///
    /// How many detections were drawn.
    pub fn render(&self, image: &mut RgbImage, candidates: &[Candidate], kept: &[usize], labels: &LabelSet) -> usize {
        let mut drawn = 0;
        for &idx in kept {
            let Some(candidate) = candidates.get(idx) else {
                continue;
            };
            let Some(name) = labels.get(candidate.class_id) else {
                continue;
            };
            if candidate.bbox.is_empty() {
                continue;
            }

            let colour = if self.per_class_colours { class_colour(candidate.class_id) } else { self.colour };
            self.draw_box(image, candidate, colour);
            self.draw_label(image, candidate, &label_text(candidate.confidence, name), colour);
            drawn += 1;
        }
        drawn
    }

    pub fn render_frame(&self, image: &mut RgbImage, detections: &FrameDetections, labels: &LabelSet) -> usize {
        self.render(image, &detections.candidates, &detections.kept, labels)
    }

    fn draw_box(&self, image: &mut RgbImage, candidate: &Candidate, colour: Rgb<u8>) {
        let b = candidate.bbox;
        for t in 0..BOX_THICKNESS {
            let (w, h) = (b.width - 2 * t, b.height - 2 * t);
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(b.left + t, b.top + t).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(image, rect, colour);
        }
    }

    fn draw_label(&self, image: &mut RgbImage, candidate: &Candidate, text: &str, colour: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let (_, text_h) = text_size(self.scale, font, text);
        let y = candidate.bbox.top - LABEL_OFFSET - text_h as i32;
        draw_text_mut(image, colour, candidate.bbox.left, y, self.scale, font, text);
    }
}

/// `"<pct>% <name>"` with the confidence as a rounded percentage.
pub fn label_text(confidence: f32, name: &str) -> String {
    format!("{}% {}", (confidence * 100.0).round() as i32, name)
}

/// Per-class palette for COCO ordering.
pub fn class_colour(class_id: usize) -> Rgb<u8> {
    match class_id {
        0 => Rgb([128, 0, 128]),     // purple (people)
        1..=8 => Rgb([0, 255, 0]),   // green (vehicles)
        14..=23 => Rgb([255, 0, 0]), // red (animals)
        _ => Rgb([0, 0, 255])        // blue (everything else)
    }
}

fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("Failed to read font {}: {}", path.display(), err);
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => {
            log::debug!("Using font {}", path.display());
            Some(font)
        }
        Err(err) => {
            log::warn!("Failed to parse font {}: {}", path.display(), err);
            None
        }
    }
}

fn find_system_font() -> Option<PathBuf> {
    let mut dirs_to_search: Vec<PathBuf> = Vec::new();
    if let Some(user_dir) = dirs::font_dir() {
        dirs_to_search.push(user_dir);
    }
    dirs_to_search.extend(SYSTEM_FONT_DIRS.iter().map(PathBuf::from));

    dirs_to_search.iter()
        .flat_map(|dir| FONT_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}
