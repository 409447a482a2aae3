use super::heuristics::{strip_orientation_keywords, KeywordHeuristics};
use super::{push_bullets, FULL_BLEED_RULES};
use crate::aspect::{AspectRatio, Orientation};

const VERTICAL_GUIDANCE: &[&str] = &[
    "Build the composition along the vertical axis; the frame is taller than it is wide.",
    "Place the main subject in the central column with breathing room above the head.",
    "Use foreground, middle ground and background stacked top to bottom to add depth.",
];

const HORIZONTAL_GUIDANCE: &[&str] = &[
    "Build the composition along the horizontal axis; the frame is wider than it is tall.",
    "Place the main subject on a vertical third and let the setting extend to the sides.",
    "Keep the horizon level and use the width to show the surroundings.",
];

const SQUARE_GUIDANCE: &[&str] = &[
    "Use a balanced, centred composition; all four edges are equally important.",
    "Keep the main subject fully inside the frame with even margins around it.",
];

fn orientation_heading(orientation: Orientation) -> (&'static str, &'static [&'static str]) {
    match orientation {
        Orientation::Vertical => ("Vertical composition guidance:", VERTICAL_GUIDANCE),
        Orientation::Horizontal => ("Horizontal composition guidance:", HORIZONTAL_GUIDANCE),
        Orientation::Square => ("Square composition guidance:", SQUARE_GUIDANCE),
    }
}

fn ratio_guidance(ratio: AspectRatio) -> &'static str {
    match ratio {
        AspectRatio::Square => "1:1 suits a single centred subject, as in a profile picture or product shot.",
        AspectRatio::Tall9x16 => "9:16 is a full phone screen: frame the subject head to toe or from the waist up.",
        AspectRatio::Wide16x9 => "16:9 is a cinematic frame: give the setting as much weight as the subject.",
        AspectRatio::Tall3x4 => "3:4 is a classic print format: frame the subject from the chest or waist up.",
        AspectRatio::Wide4x3 => "4:3 is a classic photo format: keep the subject and setting in equal balance.",
        AspectRatio::Tall4x5 => "4:5 is a social feed format: keep the subject large and close to the centre.",
        AspectRatio::Wide3x2 => "3:2 is a full-frame camera format: use a natural eye-level perspective.",
        AspectRatio::Tall2x3 => "2:3 is a poster format: leave clean space at the top or bottom.",
        AspectRatio::Wide21x9 => "21:9 is an ultra-wide frame: spread the scene across the width and keep the subject off-centre.",
        AspectRatio::Tall9x21 => "9:21 is a very tall banner: lead the eye from top to bottom through the subject.",
    }
}

pub fn build_generation_prompt(raw_prompt: &str, ratio: AspectRatio) -> String {
    build_generation_prompt_with(raw_prompt, ratio, &KeywordHeuristics::default())
}

pub fn build_generation_prompt_with(
    raw_prompt: &str,
    ratio: AspectRatio,
    heuristics: &KeywordHeuristics,
) -> String {
    let cleaned = strip_orientation_keywords(raw_prompt);
    let detected = heuristics.detect(&cleaned);
    let description = if cleaned.is_empty() {
        detected.subject.clone()
    } else {
        cleaned
    };
    let (width, height) = ratio.dimensions();
    let (heading, guidance) = orientation_heading(ratio.orientation());

    let mut out = String::new();
    out.push_str(&format!("Create a {} image: {}.\n", detected.style, description));
    out.push_str(&format!(
        "Target canvas: {width}x{height} pixels, aspect ratio {ratio}.\n"
    ));
    out.push_str(&format!(
        "Main subject: {}. Setting: {}. Style: {}.\n\n",
        detected.subject, detected.environment, detected.style
    ));
    out.push_str(heading);
    out.push('\n');
    push_bullets(&mut out, guidance);
    push_bullets(&mut out, &[ratio_guidance(ratio)]);
    out.push_str("\nOutput constraints:\n");
    push_bullets(&mut out, FULL_BLEED_RULES);
    out.push_str(&format!(
        "- The final image must be exactly {ratio} at {width}x{height}.\n"
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_prompt_drops_conflicting_orientation() {
        let prompt = build_generation_prompt("a lion in the desert, landscape", AspectRatio::Tall9x16);
        assert!(prompt.contains("9:16"));
        assert!(prompt.contains("768x1344"));
        assert!(prompt.contains("Vertical composition guidance:"));
        assert!(prompt.contains("Main subject: lion"));
        assert!(prompt.contains("Setting: desert"));
        assert!(!prompt.to_lowercase().contains("landscape"));
    }

    #[test]
    fn output_is_deterministic() {
        let first = build_generation_prompt("a dog on the beach", AspectRatio::Wide21x9);
        let second = build_generation_prompt("a dog on the beach", AspectRatio::Wide21x9);
        assert_eq!(first, second);
        assert!(first.contains("Horizontal composition guidance:"));
        assert!(first.contains("full-bleed"));
    }

    #[test]
    fn empty_remainder_uses_detected_subject() {
        let prompt = build_generation_prompt("square", AspectRatio::Square);
        assert!(prompt.starts_with("Create a realistic image: subject."));
        assert!(prompt.contains("Square composition guidance:"));
    }

    #[test]
    fn no_guidance_block_mentions_the_other_orientation() {
        for ratio in AspectRatio::STUDIO {
            let prompt = build_generation_prompt("a cat", ratio).to_lowercase();
            assert!(!prompt.contains("landscape"), "{ratio}");
            assert!(!prompt.contains("portrait"), "{ratio}");
        }
    }
}
