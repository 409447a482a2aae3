use crate::aspect::AspectRatio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// Target is wider than the source: add canvas left and right.
    Horizontal,
    /// Target is narrower than the source: add canvas above and below.
    Vertical,
    /// Same shape: keep the framing and only re-fit.
    None,
}

const RATIO_EPSILON: f64 = 0.01;

pub fn extension_direction(target: AspectRatio, source: Option<(u32, u32)>) -> Extension {
    let source_value = match source {
        Some((width, height)) if width > 0 && height > 0 => width as f64 / height as f64,
        _ => 1.0,
    };
    let delta = target.value() - source_value;
    if delta.abs() < RATIO_EPSILON {
        Extension::None
    } else if delta > 0.0 {
        Extension::Horizontal
    } else {
        Extension::Vertical
    }
}

pub fn build_resize_prompt(target: AspectRatio, scene_description: Option<&str>) -> String {
    build_resize_prompt_from(target, None, scene_description)
}

pub fn build_resize_prompt_from(
    target: AspectRatio,
    source: Option<(u32, u32)>,
    scene_description: Option<&str>,
) -> String {
    let (width, height) = target.dimensions();
    let direction = match extension_direction(target, source) {
        Extension::Horizontal => {
            "The new canvas is wider than the reference: extend the scene to the left and right, keeping the original content centred."
        }
        Extension::Vertical => {
            "The new canvas is taller than the reference: extend the scene above and below, keeping the original content centred."
        }
        Extension::None => {
            "The reference already has this shape: keep the framing and only re-fit it to the new canvas."
        }
    };

    let mut out = String::new();
    out.push_str("Outpaint the supplied reference image onto a new canvas.\n");
    out.push_str(&format!(
        "The new canvas must be exactly {target} ({width}x{height} pixels). Do not crop or squash the original content.\n"
    ));
    out.push_str(direction);
    out.push('\n');
    out.push_str("Fidelity requirements:\n");
    out.push_str("- Keep every subject identical to the reference, including faces, hair and clothing.\n");
    out.push_str("- Keep the environment consistent: same location, materials and colour palette.\n");
    out.push_str("- Match the lighting direction, intensity and shadows of the reference.\n");
    out.push_str("- Extended areas must continue the scene seamlessly with no seams, frames, borders or blank padding.\n");
    if let Some(scene) = scene_description
        .map(str::trim)
        .filter(|scene| !scene.is_empty())
    {
        out.push_str(&format!("Original scene description: {scene}\n"));
    }
    out
}
