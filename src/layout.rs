// Procedural slot layouts for the built-in template kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Slots may not extend or sit further than this from the canvas origin.
pub const MAX_SLOT_EXTENT: f32 = 16_384.0;

const STRIP_X: f32 = 50.0;
const STRIP_START_Y: f32 = 150.0;
const STRIP_PHOTO_WIDTH: f32 = 500.0;
const STRIP_PHOTO_HEIGHT: f32 = 350.0;
const STRIP_SPACING: f32 = 20.0;

// Collage and single layouts are computed against a fixed 600x800 canvas
const LAYOUT_CANVAS_WIDTH: f32 = 600.0;
const LAYOUT_CANVAS_HEIGHT: f32 = 800.0;
const COLLAGE_PADDING: f32 = 20.0;
const COLLAGE_MAIN_SHARE: f32 = 0.6;
const SINGLE_PADDING: f32 = 50.0;

/// A rectangular slot on the target canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotoLayout {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Carried through for editor round-trips; the compositor never rotates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
}

impl PhotoLayout {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        PhotoLayout {
            x,
            y,
            width,
            height,
            rotation: None,
        }
    }

    /// Positive, finite size within [`MAX_SLOT_EXTENT`], placed no further
    /// than that from the origin.
    pub fn is_valid(&self) -> bool {
        let within = |v: f32| v.is_finite() && v.abs() <= MAX_SLOT_EXTENT;
        self.width > 0.0
            && self.height > 0.0
            && [self.x, self.y, self.width, self.height].into_iter().all(within)
    }

    /// Shrink the rectangle by `amount` on every side.
    pub fn inset(&self, amount: f32) -> Self {
        PhotoLayout::new(
            self.x + amount,
            self.y + amount,
            self.width - amount * 2.0,
            self.height - amount * 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Strip,
    Collage,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateSize {
    pub width: u32,
    pub height: u32,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Strip => "strip",
            TemplateType::Collage => "collage",
            TemplateType::Single => "single",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown template type: {0}")]
pub struct UnknownTemplateType(pub String);

impl FromStr for TemplateType {
    type Err = UnknownTemplateType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strip" => Ok(TemplateType::Strip),
            "collage" => Ok(TemplateType::Collage),
            "single" => Ok(TemplateType::Single),
            other => Err(UnknownTemplateType(other.to_string())),
        }
    }
}

/// Compute the ordered slot list for a procedural template.
pub fn layout(template: TemplateType, photo_count: usize) -> Vec<PhotoLayout> {
    match template {
        TemplateType::Strip => strip_layout(photo_count),
        TemplateType::Collage => collage_layout(photo_count),
        TemplateType::Single => single_layout(),
    }
}

/// Default canvas size for a procedural template.
pub fn template_size(template: TemplateType) -> TemplateSize {
    match template {
        TemplateType::Strip => TemplateSize {
            width: 600,
            height: 1800,
        },
        TemplateType::Collage | TemplateType::Single => TemplateSize {
            width: 600,
            height: 800,
        },
    }
}

// No upper bound: long strips simply run off the bottom of the canvas
fn strip_layout(photo_count: usize) -> Vec<PhotoLayout> {
    (0..photo_count)
        .map(|i| {
            PhotoLayout::new(
                STRIP_X,
                STRIP_START_Y + (STRIP_PHOTO_HEIGHT + STRIP_SPACING) * i as f32,
                STRIP_PHOTO_WIDTH,
                STRIP_PHOTO_HEIGHT,
            )
        })
        .collect()
}

fn collage_layout(photo_count: usize) -> Vec<PhotoLayout> {
    let padding = COLLAGE_PADDING;
    let width = LAYOUT_CANVAS_WIDTH;
    let height = LAYOUT_CANVAS_HEIGHT;

    match photo_count {
        1 => vec![PhotoLayout::new(
            padding,
            padding,
            width - padding * 2.0,
            height - padding * 2.0,
        )],
        2 => {
            let photo_width = (width - padding * 3.0) / 2.0;
            let photo_height = height - padding * 2.0;
            vec![
                PhotoLayout::new(padding, padding, photo_width, photo_height),
                PhotoLayout::new(padding * 2.0 + photo_width, padding, photo_width, photo_height),
            ]
        }
        3 => {
            let main_width = width - padding * 2.0;
            let main_height = (height - padding * 3.0) * COLLAGE_MAIN_SHARE;
            let small_height = (height - padding * 3.0 - main_height) / 2.0;
            vec![
                PhotoLayout::new(padding, padding, main_width, main_height),
                PhotoLayout::new(padding, padding * 2.0 + main_height, main_width, small_height),
                PhotoLayout::new(
                    padding,
                    padding * 3.0 + main_height + small_height,
                    main_width,
                    small_height,
                ),
            ]
        }
        // Every other count, zero included, gets the 2x2 grid
        _ => {
            let photo_width = (width - padding * 3.0) / 2.0;
            let photo_height = (height - padding * 3.0) / 2.0;
            let right = padding * 2.0 + photo_width;
            let bottom = padding * 2.0 + photo_height;
            vec![
                PhotoLayout::new(padding, padding, photo_width, photo_height),
                PhotoLayout::new(right, padding, photo_width, photo_height),
                PhotoLayout::new(padding, bottom, photo_width, photo_height),
                PhotoLayout::new(right, bottom, photo_width, photo_height),
            ]
        }
    }
}

fn single_layout() -> Vec<PhotoLayout> {
    vec![PhotoLayout::new(
        SINGLE_PADDING,
        SINGLE_PADDING,
        LAYOUT_CANVAS_WIDTH - SINGLE_PADDING * 2.0,
        LAYOUT_CANVAS_HEIGHT - SINGLE_PADDING * 2.0,
    )]
}
