//! Instruction templates for the image backends.
//!
//! Everything here is a pure function of its inputs: no model calls, no
//! clocks, no randomness. Identical input yields byte-identical output.

mod consistency;
mod edit;
mod extraction;
mod generation;
mod heuristics;
mod resize;
mod system;

pub use consistency::build_consistency_prompt;
pub use edit::build_edit_prompt;
pub use extraction::extraction_prompt;
pub use generation::{build_generation_prompt, build_generation_prompt_with};
pub use heuristics::{strip_orientation_keywords, DetectedKeywords, KeywordHeuristics};
pub use resize::{build_resize_prompt, build_resize_prompt_from, extension_direction, Extension};
pub use system::ORCHESTRATOR_INSTRUCTION;

pub(crate) const FULL_BLEED_RULES: &[&str] = &[
    "Fill the entire canvas edge to edge (full-bleed).",
    "No frames, borders, letterboxing, vignettes or device mockups.",
    "No text, captions, logos or watermarks unless the request asks for them.",
];

pub(crate) fn push_bullets(out: &mut String, lines: &[&str]) {
    for line in lines {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
}
