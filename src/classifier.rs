// src/classifier.rs
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure, Context, Result};
use ndarray::{Array1, Array2};
use serde::Deserialize;

use crate::stream::{FeatureLayout, FeatureVector, StreamError, WindowTrigger};
use crate::types::{Activity, ClassificationResult};

/// Raw model output before it is mapped onto `Activity`.
#[derive(Clone, Debug, PartialEq)]
pub enum Score {
    /// A bare class label, for models that only expose a prediction.
    Label(String),
    /// One probability per entry of `Scorer::classes`.
    Probabilities(Vec<f64>),
}

/// Pre-trained, stateless scoring function shared by every session.
pub trait Scorer: Send + Sync {
    /// Feature names in the order the model was trained on.
    fn input_layout(&self) -> &FeatureLayout;
    /// Raw class labels, indexed like `Score::Probabilities`.
    fn classes(&self) -> &[String];
    fn score(&self, features: &FeatureVector) -> Result<Score>;
}

/// Checks feature shape, calls the scorer and maps its output onto the activity vocabulary.
#[derive(Clone)]
pub struct ClassifierAdapter {
    scorer: Arc<dyn Scorer>,
    vocabulary: Vec<Activity>,
}

impl ClassifierAdapter {
    pub fn new(scorer: Arc<dyn Scorer>) -> Result<Self, StreamError> {
        let vocabulary = scorer
            .classes()
            .iter()
            .map(|raw| raw.parse::<Activity>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StreamError::Config(format!("model classes: {e}")))?;
        Ok(Self { scorer, vocabulary })
    }

    pub fn expected_layout(&self) -> &FeatureLayout {
        self.scorer.input_layout()
    }

    fn check_shape(&self, features: &FeatureVector) -> Result<(), StreamError> {
        let expected = self.scorer.input_layout();
        if features.len() != expected.len() || features.layout.len() != expected.len() {
            return Err(StreamError::ModelInput {
                expected: expected.len(),
                actual: features.len(),
            });
        }
        if features.layout == *expected {
            return Ok(());
        }
        let mismatch = expected
            .names()
            .iter()
            .zip(features.layout.names())
            .enumerate()
            .find(|(_, (want, got))| want != got);
        match mismatch {
            Some((position, (want, got))) => Err(StreamError::FeatureOrder {
                position,
                expected: want.clone(),
                actual: got.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn classify(
        &self,
        features: &FeatureVector,
        trigger: &WindowTrigger,
    ) -> Result<ClassificationResult, StreamError> {
        self.check_shape(features)?;
        let score = self
            .scorer
            .score(features)
            .map_err(|e| StreamError::Inference(format!("{e:#}")))?;
        let (activity, confidence) = match score {
            Score::Label(raw) => {
                let activity = raw
                    .parse::<Activity>()
                    .map_err(|e| StreamError::Inference(e.to_string()))?;
                if !self.vocabulary.contains(&activity) {
                    return Err(StreamError::Inference(format!(
                        "label `{raw}` is not one of the model's classes"
                    )));
                }
                (activity, None)
            }
            Score::Probabilities(probs) => {
                if probs.len() != self.vocabulary.len() {
                    return Err(StreamError::Inference(format!(
                        "model returned {} probabilities for {} classes",
                        probs.len(),
                        self.vocabulary.len()
                    )));
                }
                if probs.iter().any(|p| !p.is_finite()) {
                    return Err(StreamError::Inference(
                        "model returned non-finite probabilities".into(),
                    ));
                }
                let (best, p) = probs
                    .iter()
                    .copied()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .ok_or_else(|| StreamError::Inference("model has no classes".into()))?;
                (self.vocabulary[best], Some(p))
            }
        };
        Ok(ClassificationResult {
            window_end_index: trigger.end_index,
            window_ordinal: trigger.ordinal,
            activity,
            confidence,
        })
    }
}

/// What `score` reports: the full distribution, or only the winning label.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelOutput {
    #[default]
    Probabilities,
    Label,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LogisticModelFile {
    features: Vec<String>,
    classes: Vec<String>,
    /// classes x features
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    #[serde(default)]
    mean: Option<Vec<f64>>,
    #[serde(default)]
    scale: Option<Vec<f64>>,
    #[serde(default)]
    output: ModelOutput,
}

/// Multinomial logistic regression with optional per-feature standardization.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    layout: FeatureLayout,
    classes: Vec<String>,
    weights: Array2<f64>,
    bias: Array1<f64>,
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
    output: ModelOutput,
}

impl LogisticModel {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: LogisticModelFile = serde_json::from_str(raw).context("invalid model JSON")?;
        let n_features = file.features.len();
        let n_classes = file.classes.len();
        ensure!(n_classes > 0, "model declares no classes");
        ensure!(
            file.weights.len() == n_classes,
            "expected {n_classes} weight rows, found {}",
            file.weights.len()
        );
        ensure!(
            file.bias.len() == n_classes,
            "expected {n_classes} bias terms, found {}",
            file.bias.len()
        );
        let mut flat = Vec::with_capacity(n_classes * n_features);
        for (i, row) in file.weights.iter().enumerate() {
            ensure!(
                row.len() == n_features,
                "weight row {i} has {} entries, expected {n_features}",
                row.len()
            );
            flat.extend_from_slice(row);
        }
        let weights = Array2::from_shape_vec((n_classes, n_features), flat)?;
        let per_feature = |name: &str, values: Option<Vec<f64>>| -> Result<Option<Array1<f64>>> {
            match values {
                None => Ok(None),
                Some(v) if v.len() == n_features => Ok(Some(Array1::from(v))),
                Some(v) => bail!("{name} has {} entries, expected {n_features}", v.len()),
            }
        };
        let mean = per_feature("mean", file.mean)?;
        let scale = per_feature("scale", file.scale)?;
        if let Some(scale) = &scale {
            ensure!(
                scale.iter().all(|s| *s != 0.0 && s.is_finite()),
                "scale entries must be finite and non-zero"
            );
        }
        Ok(Self {
            layout: FeatureLayout::new(file.features),
            classes: file.classes,
            weights,
            bias: Array1::from(file.bias),
            mean,
            scale,
            output: file.output,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading model {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("loading model {}", path.display()))
    }
}

impl Scorer for LogisticModel {
    fn input_layout(&self) -> &FeatureLayout {
        &self.layout
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn score(&self, features: &FeatureVector) -> Result<Score> {
        let mut x = features.values.clone();
        if let Some(mean) = &self.mean {
            x -= mean;
        }
        if let Some(scale) = &self.scale {
            x /= scale;
        }
        let logits = self.weights.dot(&x) + &self.bias;
        let peak = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !peak.is_finite() {
            return Err(anyhow!("logits are not finite"));
        }
        if self.output == ModelOutput::Label {
            let best = logits
                .iter()
                .position(|l| *l == peak)
                .ok_or_else(|| anyhow!("no winning class"))?;
            return Ok(Score::Label(self.classes[best].clone()));
        }
        let exp = logits.mapv(|l| (l - peak).exp());
        let total = exp.sum();
        Ok(Score::Probabilities(exp.iter().map(|e| e / total).collect()))
    }
}
