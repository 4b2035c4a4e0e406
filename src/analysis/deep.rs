//! Deep analysis with paragraph citations.

use crate::domain::{CitedAnalysis, Segment};

pub const PREAMBLE: &str =
    "You are an analyst. Provide insights with specific references to the article text.";

/// Deep-analysis prompt over the labelled article text (`[i] text` blocks)
pub fn prompt(labelled_text: &str) -> String {
    format!(
        "Analyze this article's key implications and what's not being said. \
         Each paragraph is labeled with [N]. You must use square brackets and only square \
         brackets when citing a paragraph. When referencing specific information, cite the \
         paragraph number like this: \"The article [3] mentions...\" or \"According to [5]...\" \
         or \"[2] shows that...\"\n\n\
         Provide EXACTLY 4-5 sentences of analysis. Each sentence should cite at least one \
         paragraph number. Be concise and insightful.\n\n\
         Article:\n{}",
        labelled_text
    )
}

/// Split a (possibly partial) reply into prose and citations.
///
/// A leading `ANALYSIS:` is dropped. Each `[k1, k2, ...]` group becomes one
/// segment per index, with a single space between them; indices at or past
/// `paragraph_count` become orphans. Parsing the same text twice yields the
/// same segments.
pub fn parse(reply: &str, paragraph_count: usize) -> CitedAnalysis {
    let text = static_regex!(r"(?i)^\s*ANALYSIS:\s*")
        .replace(reply, "")
        .trim()
        .to_string();

    let mut segments = Vec::new();
    let mut last = 0;
    for group in static_regex!(r"\[(\d+(?:\s*,\s*\d+)*)\]").captures_iter(&text) {
        let (Some(whole), Some(inner)) = (group.get(0), group.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text(text[last..whole.start()].to_string()));
        }

        for (i, number) in inner.as_str().split(',').enumerate() {
            if i > 0 {
                segments.push(Segment::Text(" ".to_string()));
            }
            let digits = number.trim();
            let index = digits.parse::<usize>().ok().filter(|k| *k < paragraph_count);
            segments.push(match index {
                Some(k) => Segment::Reference(k),
                None => Segment::Orphan(digits.to_string()),
            });
        }
        last = whole.end();
    }
    if last < text.len() {
        segments.push(Segment::Text(text[last..].to_string()));
    }

    CitedAnalysis { text, segments }
}
