use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Who produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Agent,
    Heuristic,
}

impl std::fmt::Display for ScoreSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreSource::Agent => write!(f, "agent"),
            ScoreSource::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Multi-axis quality score for one draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub accuracy: f64,
    pub tone: f64,
    pub clarity: f64,
    /// Always [`QualityScore::aggregate`] of the three axes
    pub overall: f64,
    #[serde(default)]
    pub feedback: Vec<String>,
    pub source: ScoreSource,
}

#[derive(Error, Debug)]
pub enum ScoreParseError {
    #[error("No score block found in evaluator output")]
    NoScoreFound,

    #[error("Failed to parse score JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Invalid score value: {0}")]
    InvalidValue(String),
}

#[derive(Deserialize)]
struct RawScore {
    accuracy: f64,
    tone: f64,
    clarity: f64,
    #[serde(default)]
    feedback: RawFeedback,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFeedback {
    List(Vec<String>),
    Text(String),
}

impl Default for RawFeedback {
    fn default() -> Self {
        RawFeedback::List(Vec::new())
    }
}

impl QualityScore {
    /// Build a score, clamping each axis into [0, 1] and deriving `overall`.
    /// NaN axes count as 0.0.
    pub fn new(
        accuracy: f64,
        tone: f64,
        clarity: f64,
        feedback: Vec<String>,
        source: ScoreSource,
    ) -> Self {
        let accuracy = clamp_axis(accuracy);
        let tone = clamp_axis(tone);
        let clarity = clamp_axis(clarity);
        Self {
            accuracy,
            tone,
            clarity,
            overall: Self::aggregate(accuracy, tone, clarity),
            feedback,
            source,
        }
    }

    /// Equal-weighted mean of the three axes
    pub fn aggregate(accuracy: f64, tone: f64, clarity: f64) -> f64 {
        (accuracy + tone + clarity) / 3.0
    }

    /// Every axis and `overall` is a finite number
    pub fn is_finite(&self) -> bool {
        [self.accuracy, self.tone, self.clarity, self.overall]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn meets(&self, threshold: f64) -> bool {
        self.overall >= threshold
    }

    /// Parse a score from evaluator output
    ///
    /// Expected format, the last block wins:
    /// ```text
    /// <score>
    /// {"accuracy": 0.9, "tone": 0.8, "clarity": 0.85, "feedback": ["..."]}
    /// </score>
    /// ```
    pub fn parse(output: &str) -> Result<Self, ScoreParseError> {
        debug!(output_len = output.len(), "Parsing evaluator score");

        let start = output.rfind("<score>").ok_or(ScoreParseError::NoScoreFound)?;
        let body = &output[start + "<score>".len()..];
        let end = body.find("</score>").ok_or(ScoreParseError::NoScoreFound)?;
        let json_str = body[..end].trim();
        debug!(json = json_str, "Found score block");

        let raw: RawScore = serde_json::from_str(json_str)?;
        for (axis, value) in [
            ("accuracy", raw.accuracy),
            ("tone", raw.tone),
            ("clarity", raw.clarity),
        ] {
            if !value.is_finite() {
                return Err(ScoreParseError::InvalidValue(format!(
                    "{} is not a finite number",
                    axis
                )));
            }
        }

        let feedback = match raw.feedback {
            RawFeedback::List(items) => items,
            RawFeedback::Text(text) if text.trim().is_empty() => Vec::new(),
            RawFeedback::Text(text) => vec![text],
        };

        Ok(Self::new(
            raw.accuracy,
            raw.tone,
            raw.clarity,
            feedback,
            ScoreSource::Agent,
        ))
    }

    /// Short description for logging
    pub fn short_description(&self) -> String {
        format!(
            "{:.2} (accuracy {:.2}, tone {:.2}, clarity {:.2})",
            self.overall, self.accuracy, self.tone, self.clarity
        )
    }
}

fn clamp_axis(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
