//! Per-paragraph emotional valence scoring.
//!
//! Paragraphs are scored in chunks, one one-shot prompt per paragraph. A
//! chunk's scores become visible together once its last paragraph is done.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::config::Tuning;
use crate::core::gateway::{ModelGateway, SessionGuard};
use crate::core::retry::RetryPolicy;
use crate::domain::article::truncate_chars;
use crate::domain::artifact::NEUTRAL_SCORE;
use crate::domain::{EmotionTrace, JobKind, Paragraph, ScoreOrigin};

use super::AnalysisError;

pub const PREAMBLE: &str = "You are an emotion analyzer. Analyze text and return emotion scores. \
For each text, output ONLY a number between 0.0 and 1.0 where 0.0=very negative, 0.5=neutral, \
1.0=very positive. Always output exactly one number per text.";

/// Scoring prompt for one paragraph excerpt
pub fn prompt(excerpt: &str) -> String {
    format!("Text: \"{}\"\n\nEmotion score (0.0-1.0):", excerpt)
}

/// Read a score from a reply.
///
/// Every character outside `[0-9.]` is dropped and the longest numeric
/// prefix of what remains is read. `None` if nothing numeric remains or the
/// value falls outside [0, 1].
pub fn parse_score(reply: &str) -> Option<f64> {
    let digits: String = reply
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in digits.char_indices() {
        if c == '.' {
            if seen_dot {
                break;
            }
            seen_dot = true;
        }
        end = i + 1;
    }

    let value: f64 = digits[..end].trim_end_matches('.').parse().ok()?;
    (0.0..=1.0).contains(&value).then_some(value)
}

/// Timing and size settings of a scoring run
#[derive(Debug, Clone, Copy)]
pub struct ScoringPlan {
    pub chunk_size: usize,
    pub chunk_pause: Duration,
    pub excerpt_chars: usize,
    pub retry: RetryPolicy,
}

impl From<&Tuning> for ScoringPlan {
    fn from(tuning: &Tuning) -> Self {
        Self {
            chunk_size: tuning.chunk_size(),
            chunk_pause: Duration::from_millis(tuning.emotion_chunk_pause_ms),
            excerpt_chars: tuning.emotion_excerpt_chars,
            retry: RetryPolicy::linear(tuning.emotion_attempts, tuning.emotion_backoff_ms),
        }
    }
}

/// Score one paragraph, falling back to neutral once the retries run out
pub async fn score_paragraph(
    session: &SessionGuard,
    paragraph: &Paragraph,
    plan: &ScoringPlan,
) -> (f64, ScoreOrigin) {
    let request = prompt(&truncate_chars(&paragraph.text, plan.excerpt_chars));

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let failure = match session.ask(&request).await {
            Ok(reply) => match parse_score(&reply) {
                Some(score) => return (score, ScoreOrigin::Scored),
                None => format!("unreadable score {:?}", reply.trim()),
            },
            Err(e) => e.to_string(),
        };

        if !plan.retry.should_retry(attempt) {
            warn!(
                paragraph = paragraph.index,
                attempt,
                reason = %failure,
                "Emotion scoring failed, using neutral"
            );
            return (NEUTRAL_SCORE, ScoreOrigin::Fallback);
        }

        let delay = plan.retry.delay_for_attempt(attempt);
        debug!(
            paragraph = paragraph.index,
            attempt,
            delay_ms = delay.as_millis() as u64,
            reason = %failure,
            "Retrying emotion score"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Score every paragraph in chunks.
///
/// `on_chunk` sees the trace after each chunk is committed.
#[instrument(skip_all, fields(paragraphs = paragraphs.len()))]
pub async fn score_article<F>(
    gateway: &ModelGateway,
    paragraphs: &[Paragraph],
    plan: ScoringPlan,
    mut on_chunk: F,
) -> Result<EmotionTrace, AnalysisError>
where
    F: FnMut(&EmotionTrace),
{
    let session = gateway.acquire(JobKind::Emotions, PREAMBLE).await?;
    let mut trace = EmotionTrace::neutral(paragraphs.len());

    let chunk_count = paragraphs.chunks(plan.chunk_size.max(1)).len();
    for (chunk_idx, chunk) in paragraphs.chunks(plan.chunk_size.max(1)).enumerate() {
        let mut scores = Vec::with_capacity(chunk.len());
        for paragraph in chunk {
            scores.push((paragraph.index, score_paragraph(&session, paragraph, &plan).await));
        }

        for (index, (score, origin)) in scores {
            trace.set(index, score, origin);
        }
        debug!(chunk = chunk_idx, "Emotion chunk committed");
        on_chunk(&trace);

        if chunk_idx + 1 < chunk_count {
            tokio::time::sleep(plan.chunk_pause).await;
        }
    }

    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::{Matcher, ScriptedReply};
    use crate::adapters::ScriptedModel;
    use crate::domain::EventLog;
    use std::sync::Arc;

    fn paragraphs(n: usize) -> Vec<Paragraph> {
        (0..n)
            .map(|i| Paragraph {
                index: i,
                text: format!("Paragraph number {} with enough text to count.", i),
                node: i,
            })
            .collect()
    }

    fn plan() -> ScoringPlan {
        ScoringPlan::from(&Tuning::default())
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("0.8"), Some(0.8));
        assert_eq!(parse_score("Score: 0.75."), Some(0.75));
        assert_eq!(parse_score(" 1 "), Some(1.0));
        assert_eq!(parse_score("0.3 or 0.4"), Some(0.3));
        assert_eq!(parse_score("7"), None);
        assert_eq!(parse_score("neutral"), None);
        assert_eq!(parse_score("."), None);
    }

    #[test]
    fn test_prompt_format() {
        assert_eq!(prompt("Calm."), "Text: \"Calm.\"\n\nEmotion score (0.0-1.0):");
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_commit_in_order() {
        let model = Arc::new(ScriptedModel::new().respond(Matcher::Any, "0.8"));
        let gateway =
            ModelGateway::new(model.clone(), RetryPolicy::linear(5, 1000), EventLog::new());

        let mut snapshots = Vec::new();
        let trace = score_article(&gateway, &paragraphs(5), plan(), |t| {
            snapshots.push(t.scores().to_vec())
        })
        .await
        .unwrap();

        assert_eq!(trace.scores(), &[0.8; 5]);
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0], vec![0.8, 0.8, 0.8, 0.5, 0.5]);
        assert_eq!(model.stats().prompts, 5);
        assert_eq!(model.stats().sessions_destroyed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_fallback() {
        let model = Arc::new(
            ScriptedModel::new()
                .respond_seq(
                    Matcher::Prompt("number 0".into()),
                    vec!["unsure".into(), ScriptedReply::Fail("busy".into()), "0.2".into()],
                )
                .respond(Matcher::Prompt("number 1".into()), "no idea"),
        );
        let gateway =
            ModelGateway::new(model.clone(), RetryPolicy::linear(5, 1000), EventLog::new());

        let trace = score_article(&gateway, &paragraphs(2), plan(), |_| {})
            .await
            .unwrap();

        assert_eq!(trace.scores(), &[0.2, 0.5]);
        assert_eq!(trace.origins(), &[ScoreOrigin::Scored, ScoreOrigin::Fallback]);
        // 3 attempts each
        assert_eq!(model.stats().prompts, 6);
    }
}
