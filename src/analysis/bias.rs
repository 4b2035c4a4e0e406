//! Political bias verdict.

use crate::domain::{BiasVerdict, Leaning};

pub const PREAMBLE: &str =
    "You are a media bias analyst. Analyze articles for political bias.";

/// Bias prompt over the article text
pub fn prompt(article_text: &str) -> String {
    format!(
        "Analyze this article for political bias. Respond ONLY in this format:\n\
         BIAS: [Left|Right|Neutral]\n\
         EXPLANATION: <one sentence explanation>\n\n{}",
        article_text
    )
}

/// Parse a (possibly partial) reply.
///
/// Brackets around the verdict are optional and tokens are matched without
/// regard to case. An unknown verdict reads as Neutral; when neither field
/// is present the raw reply becomes the explanation.
pub fn parse(reply: &str) -> BiasVerdict {
    let leaning = static_regex!(r"(?i)BIAS:\s*\[?\s*([A-Za-z]+)\s*\]?")
        .captures(reply)
        .map(|c| Leaning::parse(&c[1]));
    let explanation = static_regex!(r"(?i)EXPLANATION:\s*(.*)")
        .captures(reply)
        .map(|c| c[1].trim().to_string());

    let parsed = leaning.is_some() || explanation.is_some();
    BiasVerdict {
        leaning: leaning.flatten().unwrap_or_default(),
        explanation: match explanation {
            Some(text) => text,
            None if !parsed => reply.trim().to_string(),
            None => String::new(),
        },
        parsed,
    }
}
