// Template composition: places captured photos into slots on a fresh surface

use image::Rgba;
use rusttype::Font;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::composite::{Composite, OutputFormat};
use crate::config::BrandingConfig;
use crate::errors::CompositionError;
use crate::layout::{layout, template_size, PhotoLayout, TemplateType};
use crate::loader::ImageSource;
use crate::surface::{Surface, WHITE};
use crate::templates::DesignTemplateConfig;

const PHOTO_CORNER_RADIUS: f32 = 10.0;
const PHOTO_BORDER_WIDTH: f32 = 3.0;

const FRAME_ACCENT: Rgba<u8> = Rgba([0xff, 0x6b, 0x6b, 255]);
const FRAME_OUTER_INSET: f32 = 10.0;
const FRAME_OUTER_WIDTH: f32 = 8.0;
const FRAME_INNER_INSET: f32 = 20.0;
const FRAME_INNER_WIDTH: f32 = 4.0;

const LABEL_COLOR: Rgba<u8> = Rgba([0x33, 0x33, 0x33, 255]);
const LABEL_SIZE: f32 = 24.0;
const LABEL_BASELINE_OFFSET: f32 = 30.0;
const DATE_COLOR: Rgba<u8> = Rgba([0x66, 0x66, 0x66, 255]);
const DATE_SIZE: f32 = 16.0;
const DATE_BASELINE_OFFSET: f32 = 10.0;

/// Empty design-template slots cycle through these.
pub const PLACEHOLDER_PALETTE: [Rgba<u8>; 5] = [
    Rgba([255, 255, 0, 255]),
    Rgba([255, 0, 0, 255]),
    Rgba([0, 255, 0, 255]),
    Rgba([0, 0, 255, 255]),
    Rgba([255, 165, 0, 255]),
];
const PLACEHOLDER_INSET: f32 = 3.0;

#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub design_template: Option<DesignTemplateConfig>,
}

/// Fonts and label used for the procedural-mode footer.
pub struct Branding {
    label: String,
    regular: Option<Font<'static>>,
    bold: Option<Font<'static>>,
}

impl Branding {
    pub fn new(
        label: impl Into<String>,
        regular: Option<Font<'static>>,
        bold: Option<Font<'static>>,
    ) -> Self {
        Branding {
            label: label.into(),
            regular,
            bold,
        }
    }

    /// Load fonts from disk. Missing fonts only disable the footer text.
    pub fn from_config(config: &BrandingConfig) -> Self {
        let regular = load_font(&config.font_path);
        let bold = load_font(&config.bold_font_path);
        if regular.is_none() && bold.is_none() {
            warn!("No branding fonts available, composites will have no footer text");
        }
        Self::new(config.label.clone(), regular, bold)
    }

    /// No fonts; footer text is skipped.
    pub fn plain(label: impl Into<String>) -> Self {
        Self::new(label, None, None)
    }
}

fn load_font(path: &Path) -> Option<Font<'static>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Font not found at {:?}: {}", path, e);
            return None;
        }
    };
    let font = Font::try_from_vec(data);
    if font.is_none() {
        warn!("Failed to parse font at {:?}", path);
    }
    font
}

pub struct Compositor {
    source: Arc<dyn ImageSource>,
    branding: Branding,
}

impl Compositor {
    pub fn new(source: Arc<dyn ImageSource>, branding: Branding) -> Self {
        Compositor { source, branding }
    }

    /// Compose `photos` into a single image.
    ///
    /// With `options.design_template` set, the template's background and slots
    /// are used and `template` is ignored. Otherwise the procedural layout for
    /// `template` is drawn with a frame and branding footer.
    ///
    /// Each call draws on its own surface; photos are decoded and drawn one
    /// slot at a time, in slot order. Any decode failure aborts the call.
    pub async fn compose(
        &self,
        photos: &[String],
        template: TemplateType,
        options: &ComposeOptions,
    ) -> Result<Composite, CompositionError> {
        match &options.design_template {
            Some(design) => self.compose_with_design(photos, design).await,
            None => self.compose_procedural(photos, template, options).await,
        }
    }

    async fn compose_procedural(
        &self,
        photos: &[String],
        template: TemplateType,
        options: &ComposeOptions,
    ) -> Result<Composite, CompositionError> {
        let slots = layout(template, photos.len());
        let default_size = template_size(template);
        let width = options.width.unwrap_or(default_size.width);
        let height = options.height.unwrap_or(default_size.height);

        info!(
            "Composing {} photos into {} template ({}x{}, {} slots)",
            photos.len(),
            template,
            width,
            height,
            slots.len()
        );

        let mut surface = Surface::new(width, height)?;
        surface.fill(WHITE);
        draw_frame(&mut surface);

        self.draw_photos(&mut surface, photos, &slots).await?;

        self.draw_branding(&mut surface);

        surface.encode(OutputFormat::Jpeg)
    }

    async fn compose_with_design(
        &self,
        photos: &[String],
        design: &DesignTemplateConfig,
    ) -> Result<Composite, CompositionError> {
        // The background decides the canvas size, so it is decoded first
        let background = self.source.load(&design.background_url).await?;

        info!(
            "Composing {} photos into design template '{}' ({}x{}, {} slots)",
            photos.len(),
            design.id,
            background.pixel_width(),
            background.pixel_height(),
            design.slots.len()
        );

        let mut surface = Surface::new(background.pixel_width(), background.pixel_height())?;
        // Opaque base so transparent background regions never show through
        surface.fill(WHITE);

        let drawn = self.draw_photos(&mut surface, photos, &design.slots).await?;

        for (i, slot) in design.slots.iter().enumerate().skip(drawn) {
            let color = PLACEHOLDER_PALETTE[i % PLACEHOLDER_PALETTE.len()];
            surface.fill_rect(&slot.inset(PLACEHOLDER_INSET), color);
        }
        if design.slots.len() > drawn {
            debug!("Filled {} empty slots with placeholders", design.slots.len() - drawn);
        }

        surface.composite_over(&background);

        surface.encode(OutputFormat::Png)
    }

    /// Decode and draw `photos[i]` into `slots[i]`, strictly in order.
    /// Returns how many slots were paired with a photo.
    async fn draw_photos(
        &self,
        surface: &mut Surface,
        photos: &[String],
        slots: &[PhotoLayout],
    ) -> Result<usize, CompositionError> {
        if photos.len() > slots.len() {
            debug!(
                "Dropping {} photos that have no slot",
                photos.len() - slots.len()
            );
        }

        let mut paired = 0;
        for (i, (photo, slot)) in photos.iter().zip(slots).enumerate() {
            let raster = self.source.load(photo).await?;

            if surface.draw_clipped_stretched(&raster, slot, PHOTO_CORNER_RADIUS) {
                surface.stroke_rect(slot, PHOTO_BORDER_WIDTH, WHITE);
            } else {
                debug!("Skipping degenerate slot {}: {:?}", i, slot);
            }
            paired += 1;
        }
        Ok(paired)
    }

    fn draw_branding(&self, surface: &mut Surface) {
        let height = surface.height() as f32;

        match self.branding.bold.as_ref().or(self.branding.regular.as_ref()) {
            Some(font) => surface.draw_text_centered(
                font,
                &self.branding.label,
                LABEL_SIZE,
                LABEL_COLOR,
                height - LABEL_BASELINE_OFFSET,
            ),
            None => debug!("No font loaded, skipping branding label"),
        }

        if let Some(font) = self.branding.regular.as_ref().or(self.branding.bold.as_ref()) {
            let date = chrono::Local::now().format("%-m/%-d/%Y").to_string();
            surface.draw_text_centered(
                font,
                &date,
                DATE_SIZE,
                DATE_COLOR,
                height - DATE_BASELINE_OFFSET,
            );
        }
    }
}

fn draw_frame(surface: &mut Surface) {
    let (width, height) = (surface.width() as f32, surface.height() as f32);
    let canvas = PhotoLayout::new(0.0, 0.0, width, height);

    surface.stroke_rect(&canvas.inset(FRAME_OUTER_INSET), FRAME_OUTER_WIDTH, FRAME_ACCENT);
    surface.stroke_rect(&canvas.inset(FRAME_INNER_INSET), FRAME_INNER_WIDTH, WHITE);
}
