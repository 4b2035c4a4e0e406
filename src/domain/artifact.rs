//! Artifacts produced by analysis jobs.
//!
//! Each job kind turns free-form model output into one of these structured
//! values. Cached kinds are wrapped in [`Artifact`].

use serde::{Deserialize, Serialize};

/// Kind of analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Bias,
    Deep,
    Emotions,
    Advanced,
    Quiz,
    Chat,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobKind::Bias => "bias",
            JobKind::Deep => "deep",
            JobKind::Emotions => "emotions",
            JobKind::Advanced => "advanced",
            JobKind::Quiz => "quiz",
            JobKind::Chat => "chat",
        };
        write!(f, "{}", name)
    }
}

/// Response cache slot (the cached job kinds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSlot {
    Bias,
    Deep,
    Emotions,
    Advanced,
}

impl CacheSlot {
    pub const ALL: [CacheSlot; 4] = [
        CacheSlot::Bias,
        CacheSlot::Deep,
        CacheSlot::Emotions,
        CacheSlot::Advanced,
    ];

    pub fn kind(&self) -> JobKind {
        match self {
            CacheSlot::Bias => JobKind::Bias,
            CacheSlot::Deep => JobKind::Deep,
            CacheSlot::Emotions => JobKind::Emotions,
            CacheSlot::Advanced => JobKind::Advanced,
        }
    }
}

impl std::fmt::Display for CacheSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind().fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Bias
// ---------------------------------------------------------------------------

/// Political leaning of an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Leaning {
    Left,
    Right,
    #[default]
    Neutral,
}

impl Leaning {
    /// Case-insensitive parse; anything unknown is `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Leaning::Left),
            "right" => Some(Leaning::Right),
            "neutral" => Some(Leaning::Neutral),
            _ => None,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Leaning::Left => "#3b82f6",
            Leaning::Right => "#ef4444",
            Leaning::Neutral => "#4ade80",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Leaning::Left => "Left-Leaning",
            Leaning::Right => "Right-Leaning",
            Leaning::Neutral => "Neutral",
        }
    }
}

/// Bias verdict with its one-sentence rationale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasVerdict {
    pub leaning: Leaning,
    pub explanation: String,
    /// False when neither field could be read and the raw reply was kept
    pub parsed: bool,
}

// ---------------------------------------------------------------------------
// Emotions
// ---------------------------------------------------------------------------

/// Neutral valence, used before scoring and as the fallback
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Where an emotion score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrigin {
    /// Not scored yet (value is the neutral default)
    Pending,
    /// Parsed from a model reply
    Scored,
    /// Every attempt failed; value is the neutral default
    Fallback,
}

/// Per-paragraph valence trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionTrace {
    scores: Vec<f64>,
    origins: Vec<ScoreOrigin>,
}

impl EmotionTrace {
    /// Trace of `len` pending neutral scores
    pub fn neutral(len: usize) -> Self {
        Self {
            scores: vec![NEUTRAL_SCORE; len],
            origins: vec![ScoreOrigin::Pending; len],
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn origins(&self) -> &[ScoreOrigin] {
        &self.origins
    }

    /// Overwrite one entry; the value is clamped to [0, 1]. Out-of-range
    /// indices are ignored.
    pub fn set(&mut self, index: usize, score: f64, origin: ScoreOrigin) {
        if index >= self.scores.len() {
            return;
        }
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            NEUTRAL_SCORE
        };
        self.scores[index] = score;
        self.origins[index] = origin;
    }

    /// Number of entries that were scored by the model
    pub fn scored_count(&self) -> usize {
        self.origins
            .iter()
            .filter(|o| **o == ScoreOrigin::Scored)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Deep analysis
// ---------------------------------------------------------------------------

/// A piece of cited analysis text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    /// Prose between citations
    Text(String),
    /// Citation of an existing paragraph
    Reference(usize),
    /// Citation that resolves to no paragraph, kept as the digits the
    /// model wrote
    Orphan(String),
}

/// Deep analysis split into prose and citations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedAnalysis {
    /// Reply as received, minus any `ANALYSIS:` prefix
    pub text: String,
    pub segments: Vec<Segment>,
}

impl CitedAnalysis {
    /// Every resolvable citation in order of appearance
    pub fn references(&self) -> Vec<usize> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Reference(k) => Some(*k),
                _ => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Quiz
// ---------------------------------------------------------------------------

/// Answer letter of a quiz option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [
        OptionLetter::A,
        OptionLetter::B,
        OptionLetter::C,
        OptionLetter::D,
    ];

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(OptionLetter::A),
            'B' => Some(OptionLetter::B),
            'C' => Some(OptionLetter::C),
            'D' => Some(OptionLetter::D),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            OptionLetter::A => 0,
            OptionLetter::B => 1,
            OptionLetter::C => 2,
            OptionLetter::D => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_char(&self) -> char {
        match self {
            OptionLetter::A => 'A',
            OptionLetter::B => 'B',
            OptionLetter::C => 'C',
            OptionLetter::D => 'D',
        }
    }
}

impl std::fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub question: String,
    pub options: [String; 4],
    pub correct: OptionLetter,
}

// ---------------------------------------------------------------------------
// Advanced analysis
// ---------------------------------------------------------------------------

/// Topic category of the breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Politics,
    Economy,
    Science,
    Technology,
    Society,
    Environment,
    /// Only appears in the default distribution
    Other,
}

impl Topic {
    /// Categories the model is asked to score, in prompt order
    pub const SCORED: [Topic; 6] = [
        Topic::Politics,
        Topic::Economy,
        Topic::Science,
        Topic::Technology,
        Topic::Society,
        Topic::Environment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Topic::Politics => "Politics",
            Topic::Economy => "Economy",
            Topic::Science => "Science",
            Topic::Technology => "Technology",
            Topic::Society => "Society",
            Topic::Environment => "Environment",
            Topic::Other => "Other",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Topic::Politics => "#ef4444",
            Topic::Economy => "#f59e0b",
            Topic::Science => "#10b981",
            Topic::Technology => "#3b82f6",
            Topic::Society => "#8b5cf6",
            Topic::Environment => "#14b8a6",
            Topic::Other => "#6b7280",
        }
    }

    /// Insight shown for a topic read from a model reply
    pub fn insight(&self) -> &'static str {
        match self {
            Topic::Politics => "Focus on political developments and policy analysis",
            Topic::Economy => "Coverage of economic trends and financial matters",
            Topic::Science => "Scientific research and discoveries",
            Topic::Technology => "Tech innovations and digital trends",
            Topic::Society => "Social issues and cultural topics",
            Topic::Environment => "Environmental and climate-related content",
            Topic::Other => "Miscellaneous topics",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One slice of the topic donut
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSlice {
    pub topic: Topic,
    pub percent: u8,
    pub insight: String,
}

impl TopicSlice {
    pub fn color(&self) -> &'static str {
        self.topic.color()
    }
}

/// Integer-percentage topic breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDistribution {
    pub slices: Vec<TopicSlice>,
    /// True when the reply could not be used and defaults were substituted
    pub is_default: bool,
}

impl TopicDistribution {
    pub fn total(&self) -> u32 {
        self.slices.iter().map(|s| s.percent as u32).sum()
    }
}

/// Historical bias of a publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrustBias {
    Left,
    #[default]
    Center,
    Right,
}

impl TrustBias {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(TrustBias::Left),
            "center" => Some(TrustBias::Center),
            "right" => Some(TrustBias::Right),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrustBias::Left => "Left",
            TrustBias::Center => "Center",
            TrustBias::Right => "Right",
        }
    }

    /// Pill colour
    pub fn color(&self) -> &'static str {
        match self {
            TrustBias::Center => "#22c55e",
            TrustBias::Left => "#3b82f6",
            TrustBias::Right => "#ef4444",
        }
    }
}

/// Source-trust summary of the publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRecord {
    pub source: String,
    pub ownership: String,
    /// 0-100
    pub reliability: u8,
    pub bias: TrustBias,
    pub history: String,
}

impl TrustRecord {
    /// Colour of the reliability bar
    pub fn reliability_color(&self) -> &'static str {
        match self.reliability {
            75.. => "#22c55e",
            50..=74 => "#f59e0b",
            _ => "#ef4444",
        }
    }
}

/// Topic breakdown plus source trust
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedReport {
    pub topics: TopicDistribution,
    pub trust: TrustRecord,
}

// ---------------------------------------------------------------------------
// Cached artifact
// ---------------------------------------------------------------------------

/// A completed analysis stored in the response cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    Bias(BiasVerdict),
    Deep(CitedAnalysis),
    Emotions(EmotionTrace),
    Advanced(AdvancedReport),
}

impl Artifact {
    /// The cache slot this artifact belongs in
    pub fn slot(&self) -> CacheSlot {
        match self {
            Artifact::Bias(_) => CacheSlot::Bias,
            Artifact::Deep(_) => CacheSlot::Deep,
            Artifact::Emotions(_) => CacheSlot::Emotions,
            Artifact::Advanced(_) => CacheSlot::Advanced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_trace_clamps_and_tracks_origin() {
        let mut trace = EmotionTrace::neutral(3);
        assert_eq!(trace.scores(), &[0.5, 0.5, 0.5]);

        trace.set(0, 1.7, ScoreOrigin::Scored);
        trace.set(1, f64::NAN, ScoreOrigin::Fallback);
        trace.set(9, 0.1, ScoreOrigin::Scored);

        assert_eq!(trace.scores(), &[1.0, 0.5, 0.5]);
        assert_eq!(
            trace.origins(),
            &[ScoreOrigin::Scored, ScoreOrigin::Fallback, ScoreOrigin::Pending]
        );
        assert_eq!(trace.scored_count(), 1);
    }

    #[test]
    fn test_leaning_parse_and_colors() {
        assert_eq!(Leaning::parse("LEFT"), Some(Leaning::Left));
        assert_eq!(Leaning::parse("centrist"), None);
        assert_eq!(Leaning::Left.color(), "#3b82f6");
        assert_eq!(Leaning::Right.label(), "Right-Leaning");
    }

    #[test]
    fn test_option_letters() {
        assert_eq!(OptionLetter::from_char('c'), Some(OptionLetter::C));
        assert_eq!(OptionLetter::from_char('E'), None);
        assert_eq!(OptionLetter::from_index(3), Some(OptionLetter::D));
        assert_eq!(OptionLetter::B.index(), 1);
    }

    #[test]
    fn test_reliability_color_bands() {
        let mut trust = TrustRecord {
            source: "example.com".into(),
            ownership: String::new(),
            reliability: 75,
            bias: TrustBias::Center,
            history: String::new(),
        };
        assert_eq!(trust.reliability_color(), "#22c55e");
        trust.reliability = 50;
        assert_eq!(trust.reliability_color(), "#f59e0b");
        trust.reliability = 49;
        assert_eq!(trust.reliability_color(), "#ef4444");
    }

    #[test]
    fn test_artifact_serialization() {
        let artifact = Artifact::Bias(BiasVerdict {
            leaning: Leaning::Left,
            explanation: "Leans left.".into(),
            parsed: true,
        });

        let json = serde_json::to_string(&artifact).unwrap();
        let parsed: Artifact = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.slot(), CacheSlot::Bias);
        assert_eq!(parsed, artifact);
    }
}
