//! HTML fragments for the overlay sections.
//!
//! Model text is always escaped before any markup is added.

use crate::analysis::quiz::QuizGrade;
use crate::analysis::strip_code;
use crate::domain::{
    BiasVerdict, CitedAnalysis, Segment, TopicDistribution, TopicSlice, TrustRecord,
};

/// Hover hints of the trust widget rows, in row order
pub const TRUST_HINTS: [&str; 4] = [
    "Information about who owns and controls this publication",
    "Reliability score: based on factual consistency across past publications",
    "Historical bias tendency observed in editorial choices",
    "Background information about the publication's history and reputation",
];

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Line break after every sentence terminator followed by whitespace
pub fn sentence_breaks(html: &str) -> String {
    static_regex!(r"([.?!])\s+")
        .replace_all(html, "$1<br>")
        .into_owned()
}

/// Markdown-like formatting of a model reply.
///
/// Code is removed, `**bold**` and `*italic*` become tags, bullet lines
/// become one list, blank-line runs become paragraph breaks and the rest of
/// the newlines become line breaks. Safe to call on partial text.
pub fn format_model_output(text: &str) -> String {
    let text = escape_html(&strip_code(text));

    let html = static_regex!(r"\*\*(.+?)\*\*").replace_all(&text, "<strong>$1</strong>");
    let html = static_regex!(r"\*(.+?)\*").replace_all(&html, "<em>$1</em>");
    let html = static_regex!(r"(?m)^\s*[-*+]\s(.+)$").replace_all(&html, "<li>$1</li>");
    let html = static_regex!(r"\n{2,}").replace_all(&html, "<br><br>");
    let mut html = html.replace('\n', "<br>");

    if html.contains("<li>") {
        html = static_regex!(r"(?s)(<li>.*</li>)")
            .replace(&html, r#"<ul style="margin: 8px 0; padding-left: 20px;">$1</ul>"#)
            .into_owned();
    }

    static_regex!(r"^(<br>)+|(<br>)+$")
        .replace_all(&html, "")
        .into_owned()
}

/// Styled error card shown inside a section
pub fn error_card(title: &str, message: &str) -> String {
    format!(
        r#"<div class="ai-error" style="color: #ef4444; padding: 20px; text-align: center; background: rgba(239, 68, 68, 0.1); border-radius: 12px;"><strong>{}</strong><br>{}</div>"#,
        escape_html(title),
        escape_html(message)
    )
}

/// Bias verdict badge plus explanation
pub fn bias_html(verdict: &BiasVerdict) -> String {
    let color = verdict.leaning.color();
    format!(
        r#"<div class="ai-bias" data-leaning="{label}"><span class="ai-bias-badge" style="background: {color}; color: white; padding: 6px 14px; border-radius: 16px; font-weight: 700;">{label}</span><div class="ai-bias-explanation" style="margin-top: 12px; line-height: 1.6;">{explanation}</div></div>"#,
        label = verdict.leaning.label(),
        color = color,
        explanation = sentence_breaks(&escape_html(&verdict.explanation)),
    )
}

/// Deep analysis with clickable references; orphans stay plain text
pub fn cited_analysis_html(analysis: &CitedAnalysis) -> String {
    let body: String = analysis
        .segments
        .iter()
        .map(|segment| match segment {
            Segment::Text(text) => sentence_breaks(&escape_html(text)),
            Segment::Reference(k) => format!(
                r#"<span class="clickable-ref paragraph-ref" data-paragraph-index="{k}">[{k}]</span>"#,
                k = k
            ),
            Segment::Orphan(k) => format!("[{}]", k),
        })
        .collect();
    format!(r#"<div class="ai-analysis" style="line-height: 1.7;">{}</div>"#, body)
}

/// Indices of clickable references in rendered HTML
pub fn clickable_references(html: &str) -> Vec<usize> {
    static_regex!(r#"data-paragraph-index="(\d+)""#)
        .captures_iter(html)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

/// Tooltip contents for a hovered slice
pub fn topic_tooltip(slice: &TopicSlice) -> String {
    format!(
        r#"<strong>{}</strong><br>{}%<br><span style="font-size: 11px; opacity: 0.9;">{}</span>"#,
        slice.topic.name(),
        slice.percent,
        escape_html(&slice.insight)
    )
}

/// Legend with one colour chip per slice
pub fn legend_html(distribution: &TopicDistribution) -> String {
    distribution
        .slices
        .iter()
        .map(|slice| {
            format!(
                r#"<div class="ai-legend-item"><div style="width: 12px; height: 12px; background: {}; border-radius: 3px;"></div><span><strong>{}</strong>: {}%</span></div>"#,
                slice.color(),
                slice.topic.name(),
                slice.percent
            )
        })
        .collect()
}

/// Source-trust widget
pub fn trust_html(trust: &TrustRecord) -> String {
    let reliability_color = trust.reliability_color();
    format!(
        r#"<div class="ai-trust"><div class="trust-source"><span>Source</span><span style="font-family: monospace;">{source}</span></div><div class="trust-item" title="{hint0}"><span>Ownership</span><span>{ownership}</span></div><div class="trust-item" title="{hint1}"><span>Reliability Score</span><div style="width: 80px; height: 8px; background: #e5e7eb; border-radius: 4px; overflow: hidden;"><div class="trust-bar" style="width: {reliability}%; height: 100%; background: {reliability_color};"></div></div><span style="color: {reliability_color};">{reliability}</span></div><div class="trust-item" title="{hint2}"><span>Historical Bias</span><span class="trust-pill" style="background: {bias_color}; color: white;">{bias}</span></div><div class="trust-item" title="{hint3}"><span>Historical Context</span><span>{history}</span></div></div>"#,
        source = escape_html(&trust.source),
        ownership = escape_html(&trust.ownership),
        reliability = trust.reliability,
        reliability_color = reliability_color,
        bias_color = trust.bias.color(),
        bias = trust.bias.name(),
        history = escape_html(&trust.history),
        hint0 = escape_html(TRUST_HINTS[0]),
        hint1 = escape_html(TRUST_HINTS[1]),
        hint2 = escape_html(TRUST_HINTS[2]),
        hint3 = escape_html(TRUST_HINTS[3]),
    )
}

/// Score summary shown after grading
pub fn quiz_results_html(grade: &QuizGrade) -> String {
    format!(
        r#"<div class="ai-quiz-results" style="text-align: center;"><div style="font-size: 24px; font-weight: 700; color: {color};">{percent}%</div><div>{message}</div><div>You got {correct} out of {total} correct</div></div>"#,
        color = grade.tier.color(),
        percent = grade.percent,
        message = grade.tier.message(),
        correct = grade.correct,
        total = grade.total,
    )
}
