use crate::aspect::{parse_ratio_parts, AspectRatio};

const ORIENTATION_WORDS: &[&str] = &[
    "landscape",
    "portrait",
    "vertical",
    "horizontal",
    "square",
    "widescreen",
    "panoramic",
    "panorama",
    "orientation",
    "wide",
    "tall",
];

const DEFAULT_SUBJECT: &str = "subject";
const DEFAULT_ENVIRONMENT: &str = "environment";
const DEFAULT_STYLE: &str = "realistic";

const DEFAULT_SUBJECTS: &[&str] = &[
    "woman", "man", "girl", "boy", "person", "child", "baby", "couple", "family", "bride",
    "lion", "tiger", "cat", "dog", "horse", "wolf", "fox", "bear", "elephant", "eagle", "bird",
    "dragon", "robot", "astronaut", "car", "motorcycle", "ship", "castle", "house", "tree",
    "flower", "cake",
];

const DEFAULT_ENVIRONMENTS: &[&str] = &[
    "desert", "forest", "jungle", "beach", "ocean", "sea", "lake", "river", "mountain", "snow",
    "city", "street", "rooftop", "park", "garden", "field", "meadow", "village", "kitchen",
    "cafe", "office", "studio", "library", "space", "sky", "underwater", "night",
];

const DEFAULT_STYLES: &[&str] = &[
    "photorealistic", "realistic", "cinematic", "watercolor", "oil", "anime", "cartoon",
    "sketch", "pencil", "pixel", "minimalist", "vintage", "retro", "cyberpunk", "fantasy",
    "surreal", "noir", "pastel", "3d",
];

/// Keyword lists used to pull a subject, environment and style out of a
/// free-form prompt. Order matters: the first list entry present wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHeuristics {
    pub subjects: Vec<String>,
    pub environments: Vec<String>,
    pub styles: Vec<String>,
}

impl Default for KeywordHeuristics {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|item| (*item).to_string()).collect();
        Self {
            subjects: owned(DEFAULT_SUBJECTS),
            environments: owned(DEFAULT_ENVIRONMENTS),
            styles: owned(DEFAULT_STYLES),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedKeywords {
    pub subject: String,
    pub environment: String,
    pub style: String,
}

impl KeywordHeuristics {
    pub fn detect(&self, text: &str) -> DetectedKeywords {
        let words = tokenize(text);
        DetectedKeywords {
            subject: first_match(&self.subjects, &words).unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            environment: first_match(&self.environments, &words)
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            style: first_match(&self.styles, &words).unwrap_or_else(|| DEFAULT_STYLE.to_string()),
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !(ch.is_alphanumeric() || ch == '-'))
        .map(|word| word.trim_matches('-').to_lowercase())
        .filter(|word| !word.is_empty())
        .collect()
}

fn word_matches(word: &str, keyword: &str) -> bool {
    if word == keyword {
        return true;
    }
    word.strip_prefix(keyword)
        .map(|suffix| suffix == "s" || suffix == "es")
        .unwrap_or(false)
}

/// Whole-word match; multi-word entries must appear as consecutive words,
/// with the plural allowed on the last one.
fn contains_keyword(words: &[String], keyword: &str) -> bool {
    let parts = tokenize(keyword);
    let Some((last, head)) = parts.split_last() else {
        return false;
    };
    if words.len() < parts.len() {
        return false;
    }
    words.windows(parts.len()).any(|window| {
        window[..head.len()] == *head && word_matches(&window[head.len()], last)
    })
}

fn first_match(keywords: &[String], words: &[String]) -> Option<String> {
    keywords
        .iter()
        .find(|keyword| contains_keyword(words, keyword))
        .map(|keyword| keyword.to_lowercase())
}

fn token_core(token: &str) -> String {
    token
        .trim_matches(|ch: char| !ch.is_alphanumeric())
        .to_lowercase()
}

/// A ratio-shaped token counts only when it names a studio ratio or directly
/// follows "ratio"; times, fractions and sizes such as `5:30` or `4x4` stay.
fn is_orientation_token(core: &str, after_ratio_word: bool) -> bool {
    if ORIENTATION_WORDS.contains(&core) {
        return true;
    }
    match parse_ratio_parts(core) {
        Some(_) => after_ratio_word || AspectRatio::parse(core).is_some(),
        None => false,
    }
}

/// Removes orientation words, the phrase "aspect ratio" and ratio tokens so
/// they cannot contradict the requested canvas.
pub fn strip_orientation_keywords(raw: &str) -> String {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());
    let mut after_ratio_word = false;
    let mut idx = 0;
    while idx < tokens.len() {
        let core = token_core(tokens[idx]);
        if core == "aspect"
            && tokens
                .get(idx + 1)
                .map(|next| token_core(next) == "ratio")
                .unwrap_or(false)
        {
            after_ratio_word = true;
            idx += 2;
            continue;
        }
        if !is_orientation_token(&core, after_ratio_word) {
            kept.push(tokens[idx]);
        }
        after_ratio_word = core == "ratio";
        idx += 1;
    }
    kept.join(" ")
        .trim_matches(|ch: char| ch.is_whitespace() || matches!(ch, ',' | ';' | ':' | '-' | '/'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_orientation_words_and_ratio_tokens() {
        assert_eq!(
            strip_orientation_keywords("a lion in the desert, landscape"),
            "a lion in the desert"
        );
        assert_eq!(
            strip_orientation_keywords("Portrait, 9:16 photo of a fox at the beach"),
            "photo of a fox at the beach"
        );
        assert_eq!(
            strip_orientation_keywords("city skyline with aspect ratio 21/9"),
            "city skyline with"
        );
        assert_eq!(strip_orientation_keywords("wide landscape"), "");
    }

    #[test]
    fn keeps_times_counts_and_sizes_that_are_not_studio_ratios() {
        assert_eq!(
            strip_orientation_keywords("a 4x4 truck in the desert at 5:30 sunset, open 24/7"),
            "a 4x4 truck in the desert at 5:30 sunset, open 24/7"
        );
        assert_eq!(
            strip_orientation_keywords("harbor at dusk, aspect ratio 5:4"),
            "harbor at dusk"
        );
        assert_eq!(strip_orientation_keywords("tower, ratio 7:5"), "tower, ratio");
    }

    #[test]
    fn orientation_words_never_reach_keyword_detection() {
        let heuristics = KeywordHeuristics::default();
        assert!(!heuristics.subjects.iter().any(|subject| subject == "portrait"));
        let cleaned = strip_orientation_keywords("portrait of a knight");
        assert_eq!(heuristics.detect(&cleaned).subject, "subject");
    }

    #[test]
    fn detect_uses_first_list_entry_present() {
        let heuristics = KeywordHeuristics::default();
        let detected = heuristics.detect("a dog and a woman in the forest, watercolor");
        assert_eq!(detected.subject, "woman");
        assert_eq!(detected.environment, "forest");
        assert_eq!(detected.style, "watercolor");
    }

    #[test]
    fn detect_accepts_plurals_and_whole_words_only() {
        let heuristics = KeywordHeuristics::default();
        let detected = heuristics.detect("two lions near the beaches");
        assert_eq!(detected.subject, "lion");
        assert_eq!(detected.environment, "beach");

        let none = heuristics.detect("scattered catalogue pages");
        assert_eq!(none.subject, "subject");
        assert_eq!(none.environment, "environment");
        assert_eq!(none.style, "realistic");
    }

    #[test]
    fn custom_policy_overrides_defaults() {
        let heuristics = KeywordHeuristics {
            subjects: vec!["red panda".to_string()],
            environments: vec!["bamboo grove".to_string()],
            styles: vec!["ukiyo-e".to_string()],
        };
        let detected = heuristics.detect("Two red pandas in a bamboo grove, ukiyo-e print");
        assert_eq!(detected.subject, "red panda");
        assert_eq!(detected.environment, "bamboo grove");
        assert_eq!(detected.style, "ukiyo-e");
    }
}
