//! Document normalization — raw pages in, clean passages out.
//!
//! Each page is cut into overlapping character windows. A window is cleaned
//! (noise patterns stripped, whitespace collapsed) and then classified:
//! too short, administrative boilerplate, and mostly-non-text windows are
//! dropped, except that dosage/quantity tables survive the text-ratio check.

use crate::error::IngestError;
use crate::loader::RawDocument;
use anmi_config::IngestConfig;
use anmi_core::passage::Passage;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// Why a window was kept or dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Keep(String),
    TooShort { chars: usize },
    DiscardMarker(String),
    LowAlphaRatio(f32),
}

/// Per-run window accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeStats {
    pub windows: usize,
    pub kept: usize,
    pub too_short: usize,
    pub discard_marker: usize,
    pub low_alpha: usize,
}

impl NormalizeStats {
    pub fn record(&mut self, verdict: &Verdict) {
        self.windows += 1;
        match verdict {
            Verdict::Keep(_) => self.kept += 1,
            Verdict::TooShort { .. } => self.too_short += 1,
            Verdict::DiscardMarker(_) => self.discard_marker += 1,
            Verdict::LowAlphaRatio(_) => self.low_alpha += 1,
        }
    }

    pub fn merge(&mut self, other: &NormalizeStats) {
        self.windows += other.windows;
        self.kept += other.kept;
        self.too_short += other.too_short;
        self.discard_marker += other.discard_marker;
        self.low_alpha += other.low_alpha;
    }
}

/// Split `text` into windows of `size` chars, consecutive windows sharing `overlap` chars.
pub fn windows(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || size == 0 {
        return Vec::new();
    }
    let step = size.saturating_sub(overlap).max(1);

    let mut out = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    out
}

/// Alphabetic characters over non-whitespace characters.
pub fn alpha_ratio(text: &str) -> f32 {
    let (alpha, visible) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(a, v), c| {
            (a + usize::from(c.is_alphabetic()), v + 1)
        });
    if visible == 0 {
        0.0
    } else {
        alpha as f32 / visible as f32
    }
}

pub struct Normalizer {
    chunk_size: usize,
    chunk_overlap: usize,
    min_chars: usize,
    min_alpha_ratio: f32,
    noise: Vec<Regex>,
    discard_markers: Vec<(String, String)>,
    table_markers: Vec<String>,
}

impl Normalizer {
    pub fn new(config: &IngestConfig) -> Result<Self, IngestError> {
        if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
            return Err(IngestError::Settings(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }

        let noise = config
            .noise_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| IngestError::Pattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            min_chars: config.min_chars,
            min_alpha_ratio: config.min_alpha_ratio,
            noise,
            discard_markers: config
                .discard_markers
                .iter()
                .map(|m| (m.clone(), m.to_lowercase()))
                .collect(),
            table_markers: config.table_markers.iter().map(|m| m.to_lowercase()).collect(),
        })
    }

    /// Strip noise patterns, then collapse whitespace runs to single spaces.
    pub fn clean(&self, window: &str) -> String {
        let mut text = window.to_string();
        for pattern in &self.noise {
            text = pattern.replace_all(&text, " ").into_owned();
        }
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Clean one window and decide whether it becomes a passage.
    pub fn classify(&self, window: &str) -> Verdict {
        let cleaned = self.clean(window);

        let chars = cleaned.chars().count();
        if chars < self.min_chars {
            return Verdict::TooShort { chars };
        }

        let lower = cleaned.to_lowercase();
        if let Some((marker, _)) = self
            .discard_markers
            .iter()
            .find(|(_, needle)| lower.contains(needle.as_str()))
        {
            return Verdict::DiscardMarker(marker.clone());
        }

        let ratio = alpha_ratio(&cleaned);
        if ratio < self.min_alpha_ratio
            && !self.table_markers.iter().any(|m| lower.contains(m.as_str()))
        {
            return Verdict::LowAlphaRatio(ratio);
        }

        Verdict::Keep(cleaned)
    }

    /// Passages for one document, in page then window order.
    ///
    /// `chunk_index` counts windows across the whole document, kept or not,
    /// so it is stable under changes to the filters.
    pub fn normalize(&self, document: &RawDocument) -> (Vec<Passage>, NormalizeStats) {
        let mut passages = Vec::new();
        let mut stats = NormalizeStats::default();
        let mut chunk_index = 0usize;

        for (page_idx, page) in document.pages.iter().enumerate() {
            for window in windows(page, self.chunk_size, self.chunk_overlap) {
                let verdict = self.classify(&window);
                stats.record(&verdict);

                match verdict {
                    Verdict::Keep(content) => passages.push(Passage::new(
                        content,
                        &document.title,
                        page_idx as u32 + 1,
                        chunk_index,
                        vec![document.title.clone()],
                    )),
                    dropped => {
                        debug!(title = %document.title, page = page_idx + 1, chunk_index, verdict = ?dropped, "Window discarded");
                    }
                }
                chunk_index += 1;
            }
        }

        (passages, stats)
    }
}
