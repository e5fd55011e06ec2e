// Layout reconstruction: map pixel-space OCR quads and per-region actions
// onto percent-positioned overlay descriptors the frontend can render on
// top of the original scan at any zoom level.

use std::collections::HashMap;
use tracing::debug;

use crate::core::language;
use crate::core::types::{Action, OverlayDescriptor, OverlayDocument, RectPercent, Region};

pub const FONT_MIN: f32 = 8.0;
pub const FONT_MAX: f32 = 16.0;
pub const FONT_HEIGHT_SCALE: f32 = 0.8;

/// Build the overlay document for a reviewed upload.
///
/// `translations` is indexed like `regions`; a region outside its bounds
/// keeps its original text. Whiteout regions produce no overlay at all,
/// which leaves the underlying pixels blank on the rendered page.
pub fn reconstruct(
    image_width: u32,
    image_height: u32,
    regions: &[Region],
    translations: &[String],
    actions: &HashMap<usize, Action>,
    target_language: &str,
) -> OverlayDocument {
    let width = image_width.max(1) as f32;
    let height = image_height.max(1) as f32;

    let mut overlays = Vec::with_capacity(regions.len());

    for region in regions {
        let action = actions.get(&region.id).copied().unwrap_or_default();
        if action == Action::Whiteout {
            debug!("Region {} whited out, no overlay emitted", region.id);
            continue;
        }

        let text = match action {
            Action::Translate => translations
                .get(region.id)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| region.text.clone()),
            _ => region.text.clone(),
        };

        let bbox = region.quad.bounding_rect();
        let height_pct = bbox.height / height * 100.0;
        let rect = RectPercent {
            left: bbox.x / width * 100.0,
            top: bbox.y / height * 100.0,
            width: bbox.width / width * 100.0,
            height: height_pct,
        };

        overlays.push(OverlayDescriptor {
            rect,
            text,
            font_size: (height_pct * FONT_HEIGHT_SCALE).clamp(FONT_MIN, FONT_MAX),
            action,
        });
    }

    OverlayDocument {
        overlays,
        font_family: language::font_family(target_language).to_string(),
        width: image_width,
        height: image_height,
    }
}
