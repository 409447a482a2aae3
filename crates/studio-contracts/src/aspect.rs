use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Vertical,
    Horizontal,
    Square,
}

/// Target canvas shapes the orchestrator can ask a backend for.
///
/// The first five are offered everywhere; the rest are only exposed by the
/// studio surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    Tall9x16,
    #[serde(rename = "16:9")]
    Wide16x9,
    #[serde(rename = "3:4")]
    Tall3x4,
    #[serde(rename = "4:3")]
    Wide4x3,
    #[serde(rename = "4:5")]
    Tall4x5,
    #[serde(rename = "3:2")]
    Wide3x2,
    #[serde(rename = "2:3")]
    Tall2x3,
    #[serde(rename = "21:9")]
    Wide21x9,
    #[serde(rename = "9:21")]
    Tall9x21,
}

impl AspectRatio {
    pub const STANDARD: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Tall9x16,
        AspectRatio::Wide16x9,
        AspectRatio::Tall3x4,
        AspectRatio::Wide4x3,
    ];

    pub const STUDIO: [AspectRatio; 10] = [
        AspectRatio::Square,
        AspectRatio::Tall9x16,
        AspectRatio::Wide16x9,
        AspectRatio::Tall3x4,
        AspectRatio::Wide4x3,
        AspectRatio::Tall4x5,
        AspectRatio::Wide3x2,
        AspectRatio::Tall2x3,
        AspectRatio::Wide21x9,
        AspectRatio::Tall9x21,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Tall9x16 => "9:16",
            AspectRatio::Wide16x9 => "16:9",
            AspectRatio::Tall3x4 => "3:4",
            AspectRatio::Wide4x3 => "4:3",
            AspectRatio::Tall4x5 => "4:5",
            AspectRatio::Wide3x2 => "3:2",
            AspectRatio::Tall2x3 => "2:3",
            AspectRatio::Wide21x9 => "21:9",
            AspectRatio::Tall9x21 => "9:21",
        }
    }

    pub fn parts(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1, 1),
            AspectRatio::Tall9x16 => (9, 16),
            AspectRatio::Wide16x9 => (16, 9),
            AspectRatio::Tall3x4 => (3, 4),
            AspectRatio::Wide4x3 => (4, 3),
            AspectRatio::Tall4x5 => (4, 5),
            AspectRatio::Wide3x2 => (3, 2),
            AspectRatio::Tall2x3 => (2, 3),
            AspectRatio::Wide21x9 => (21, 9),
            AspectRatio::Tall9x21 => (9, 21),
        }
    }

    /// Pixel size requested from image backends for this ratio.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1024, 1024),
            AspectRatio::Tall9x16 => (768, 1344),
            AspectRatio::Wide16x9 => (1344, 768),
            AspectRatio::Tall3x4 => (864, 1184),
            AspectRatio::Wide4x3 => (1184, 864),
            AspectRatio::Tall4x5 => (896, 1152),
            AspectRatio::Wide3x2 => (1248, 832),
            AspectRatio::Tall2x3 => (832, 1248),
            AspectRatio::Wide21x9 => (1536, 672),
            AspectRatio::Tall9x21 => (672, 1536),
        }
    }

    pub fn value(self) -> f64 {
        let (width, height) = self.parts();
        width as f64 / height as f64
    }

    pub fn orientation(self) -> Orientation {
        let (width, height) = self.parts();
        if width > height {
            Orientation::Horizontal
        } else if width < height {
            Orientation::Vertical
        } else {
            Orientation::Square
        }
    }

    pub fn is_standard(self) -> bool {
        Self::STANDARD.contains(&self)
    }

    /// Parses `16:9`, `16/9`, `16x9` and the orientation keywords.
    ///
    /// Only exact members of the studio set are accepted; use [`AspectRatio::nearest`]
    /// to snap arbitrary shapes.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return None;
        }
        match normalized.as_str() {
            "square" => return Some(AspectRatio::Square),
            "portrait" | "vertical" | "tall" => return Some(AspectRatio::Tall9x16),
            "landscape" | "horizontal" | "wide" => return Some(AspectRatio::Wide16x9),
            _ => {}
        }
        let (left, right) = parse_ratio_parts(&normalized)?;
        Self::STUDIO
            .into_iter()
            .find(|candidate| candidate.parts() == (left, right))
    }

    /// Snaps a width/height pair to the closest member of `candidates`.
    pub fn nearest(width: u32, height: u32, candidates: &[AspectRatio]) -> AspectRatio {
        if width == 0 || height == 0 {
            return AspectRatio::Square;
        }
        let target = width as f64 / height as f64;
        let mut best = AspectRatio::Square;
        let mut best_delta = f64::MAX;
        for candidate in candidates {
            let delta = (candidate.value() - target).abs();
            if delta < best_delta {
                best = *candidate;
                best_delta = delta;
            }
        }
        best
    }

    pub fn supported_list(candidates: &[AspectRatio]) -> String {
        candidates
            .iter()
            .map(|ratio| ratio.as_str())
            .collect::<Vec<&str>>()
            .join(", ")
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognises `a:b`, `a/b` and `axb` tokens with positive integer sides.
pub fn parse_ratio_parts(raw: &str) -> Option<(u32, u32)> {
    let normalized = raw.trim().to_ascii_lowercase();
    let (left, right) = normalized
        .split_once(':')
        .or_else(|| normalized.split_once('/'))
        .or_else(|| normalized.split_once('x'))?;
    let left = left.trim().parse::<u32>().ok()?;
    let right = right.trim().parse::<u32>().ok()?;
    if left == 0 || right == 0 {
        return None;
    }
    Some((left, right))
}
