use super::{push_bullets, FULL_BLEED_RULES};
use crate::memory::{Attribute, ConsistencySettings};

fn attribute_line(attribute: Attribute, keep: bool) -> &'static str {
    match (attribute, keep) {
        (Attribute::Face, true) => {
            "Face: keep exactly the face from the reference images (same identity, features, skin tone and expression style)."
        }
        (Attribute::Face, false) => "Face: create a new face that fits the request.",
        (Attribute::Dress, true) => {
            "Dress: keep exactly the outfit from the reference images (same garments, colours, fabric and fit)."
        }
        (Attribute::Dress, false) => "Dress: create a new outfit that fits the request.",
        (Attribute::Background, true) => {
            "Background: keep exactly the background from the reference images."
        }
        (Attribute::Background, false) => "Background: create a new background that fits the request.",
        (Attribute::Environment, true) => {
            "Environment: keep exactly the environment from the reference images (same location, lighting and atmosphere)."
        }
        (Attribute::Environment, false) => {
            "Environment: create a new environment that fits the request."
        }
    }
}

pub fn build_consistency_prompt(user_prompt: &str, settings: &ConsistencySettings) -> String {
    let request = user_prompt.trim();
    let mut out = String::new();
    out.push_str("Generate a new image of the person shown in the reference images.\n");
    if !request.is_empty() {
        out.push_str(&format!("Request: {request}\n"));
    }
    out.push_str("\nReference handling:\n");
    for attribute in Attribute::ALL {
        out.push_str("- ");
        out.push_str(attribute_line(attribute, settings.is_consistent(attribute)));
        out.push('\n');
    }
    out.push_str("\nOutput constraints:\n");
    push_bullets(&mut out, FULL_BLEED_RULES);
    out.push_str("- Photorealistic result with natural skin texture and lighting.\n");
    out
}
