//! Class-index to label mapping

use crate::error::{PredictError, Result};
use once_cell::sync::Lazy;
use std::path::Path;
use tracing::warn;

static IMAGENET: Lazy<LabelTable> =
    Lazy::new(|| LabelTable::parse(include_str!("../labels/imagenet_classes.txt")));

/// An ordered, immutable list of class names. Index = class id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

/// The winning class of a score vector
#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub index: usize,
    pub score: f32,
    pub label: String,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        LabelTable { labels }
    }

    /// The 1000 ImageNet classes, bundled into the binary
    pub fn imagenet() -> &'static LabelTable {
        &IMAGENET
    }

    /// One label per line. Blank lines are skipped.
    pub fn parse(text: &str) -> Self {
        let labels = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        LabelTable { labels }
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Pick the highest score and look up its label. The lookup is bounds
    /// checked: a model with more outputs than labels is an error, not a panic.
    pub fn resolve(&self, scores: &[f32]) -> Result<Class> {
        if scores.len() != self.len() {
            warn!(
                "model returned {} scores for {} labels",
                scores.len(),
                self.len()
            );
        }

        let index = argmax(scores).ok_or(PredictError::NoScores)?;
        let label = self.get(index).ok_or(PredictError::LabelOutOfRange {
            index,
            classes: self.len(),
        })?;

        Ok(Class {
            index,
            score: scores[index],
            label: label.to_owned(),
        })
    }
}

/// Index of the largest score. Ties go to the lowest index and NaN never wins.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}
