//! Topic breakdown and source-trust summary.

use tracing::debug;

use crate::domain::{AdvancedReport, Topic, TopicDistribution, TopicSlice, TrustBias, TrustRecord};

/// Raw topic values are capped so scaling cannot overflow
const MAX_RAW_VALUE: u64 = 1_000_000;

pub const PREAMBLE: &str =
    "You are an article analyzer. Analyze content and provide structured data.";

/// Advanced-analysis prompt naming the page host as the source
pub fn prompt(host: &str, article_text: &str) -> String {
    format!(
        "Analyze this article and provide topic breakdown percentages and source trust \
         information. Respond ONLY in this exact format:\n\n\
         TOPICS:\nPolitics: [0-100]\nEconomy: [0-100]\nScience: [0-100]\nTechnology: [0-100]\n\
         Society: [0-100]\nEnvironment: [0-100]\n\n\
         TRUST:\nSource: {}\nOwnership: [Brief ownership info]\nReliability: [0-100]\n\
         Bias: [Left/Center/Right]\nHistory: [Brief historical context]\n\n\
         Article: {}",
        host, article_text
    )
}

/// Distribution used when the reply carries no usable topics
pub fn default_distribution() -> TopicDistribution {
    let slice = |topic, percent, insight: &str| TopicSlice {
        topic,
        percent,
        insight: insight.to_string(),
    };
    TopicDistribution {
        slices: vec![
            slice(Topic::Politics, 30, "Focus on political developments"),
            slice(Topic::Economy, 20, "Economic and financial coverage"),
            slice(Topic::Society, 25, "Social and cultural topics"),
            slice(Topic::Technology, 15, "Tech-related content"),
            slice(Topic::Other, 10, "Miscellaneous topics"),
        ],
        is_default: true,
    }
}

/// Trust record paired with the default distribution
pub fn default_trust(host: &str) -> TrustRecord {
    TrustRecord {
        source: host.to_string(),
        ownership: "Information being analyzed".to_string(),
        reliability: 75,
        bias: TrustBias::Center,
        history: "Established news source".to_string(),
    }
}

/// Full default report (also used when the model fails)
pub fn default_report(host: &str) -> AdvancedReport {
    AdvancedReport {
        topics: default_distribution(),
        trust: default_trust(host),
    }
}

/// Scale raw values to integers summing to exactly 100.
///
/// Largest-remainder rounding; equal remainders favour the later entry.
/// Returns `None` when the values sum to zero.
pub fn normalise(values: &[u64]) -> Option<Vec<u8>> {
    let total: u64 = values.iter().sum();
    if total == 0 {
        return None;
    }

    let mut floors: Vec<u64> = values.iter().map(|v| v * 100 / total).collect();
    let assigned: u64 = floors.iter().sum();

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        let rem_a = values[a] * 100 % total;
        let rem_b = values[b] * 100 % total;
        rem_b.cmp(&rem_a).then(b.cmp(&a))
    });
    for &i in order.iter().take((100 - assigned) as usize) {
        floors[i] += 1;
    }

    Some(floors.into_iter().map(|v| v as u8).collect())
}

/// Parse the reply into a report; unusable topics yield the defaults
pub fn parse(reply: &str, host: &str) -> AdvancedReport {
    let raw: Vec<(Topic, u64)> = Topic::SCORED
        .iter()
        .filter_map(|topic| {
            let pattern = format!(r"(?i){}:\s*\[?(\d+)\]?", topic.name());
            let re = regex::Regex::new(&pattern).ok()?;
            let value = re.captures(reply)?[1].parse::<u64>().ok()?;
            Some((*topic, value.min(MAX_RAW_VALUE)))
        })
        .collect();

    let values: Vec<u64> = raw.iter().map(|(_, v)| *v).collect();
    let Some(percents) = normalise(&values) else {
        debug!(topics = raw.len(), "No usable topics, using defaults");
        return default_report(host);
    };

    let slices = raw
        .iter()
        .zip(percents)
        .map(|((topic, _), percent)| TopicSlice {
            topic: *topic,
            percent,
            insight: topic.insight().to_string(),
        })
        .collect();

    AdvancedReport {
        topics: TopicDistribution {
            slices,
            is_default: false,
        },
        trust: parse_trust(reply, host),
    }
}

fn parse_trust(reply: &str, host: &str) -> TrustRecord {
    let field = |re: &regex::Regex| re.captures(reply).map(|c| c[1].trim().to_string());

    let ownership = field(static_regex!(r"(?i)Ownership:\s*(.+)"));
    let reliability = field(static_regex!(r"(?i)Reliability:\s*\[?(\d+)\]?"))
        .and_then(|v| v.parse::<u64>().ok())
        .map(|v| v.min(100) as u8);
    let bias = field(static_regex!(r"(?i)Bias:\s*\[?(Left|Center|Right)\]?"))
        .and_then(|v| TrustBias::parse(&v));
    let history = field(static_regex!(r"(?i)History:\s*(.+)"));

    TrustRecord {
        source: host.to_string(),
        ownership: ownership.unwrap_or_else(|| "Information not available".to_string()),
        reliability: reliability.unwrap_or(50),
        bias: bias.unwrap_or_default(),
        history: history.unwrap_or_else(|| "No historical data available".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_equal_topics_normalise_to_100() {
        let report = parse("Politics: 40\nEconomy: 40\nSociety: 40", "news.example.com");

        let percents: Vec<(Topic, u8)> = report
            .topics
            .slices
            .iter()
            .map(|s| (s.topic, s.percent))
            .collect();
        assert_eq!(
            percents,
            vec![(Topic::Politics, 33), (Topic::Economy, 33), (Topic::Society, 34)]
        );
        assert_eq!(report.topics.total(), 100);
        assert!(!report.topics.is_default);

        assert_eq!(report.trust.source, "news.example.com");
        assert_eq!(report.trust.ownership, "Information not available");
        assert_eq!(report.trust.reliability, 50);
        assert_eq!(report.trust.bias, TrustBias::Center);
        assert_eq!(report.trust.history, "No historical data available");
    }

    #[test]
    fn test_full_reply_with_brackets() {
        let reply = "TOPICS:\nPolitics: [60]\nEconomy: 20\nScience: 0\nTechnology: [10]\n\
                     Society: 10\nEnvironment: 0\n\nTRUST:\nSource: example.com\n\
                     Ownership: Family-owned media group\nReliability: [82]\nBias: [Right]\n\
                     History: Founded in 1901.";
        let report = parse(reply, "example.com");

        assert_eq!(report.topics.slices.len(), 6);
        assert_eq!(report.topics.total(), 100);
        assert_eq!(report.topics.slices[0].percent, 60);
        assert_eq!(report.trust.ownership, "Family-owned media group");
        assert_eq!(report.trust.reliability, 82);
        assert_eq!(report.trust.bias, TrustBias::Right);
        assert_eq!(report.trust.history, "Founded in 1901.");
    }

    #[test]
    fn test_no_topics_uses_defaults() {
        let report = parse("I can't help with that.", "example.com");
        assert!(report.topics.is_default);
        assert_eq!(report.topics, default_distribution());
        assert_eq!(report.trust, default_trust("example.com"));

        let zero = parse("Politics: 0\nEconomy: 0", "example.com");
        assert!(zero.topics.is_default);
    }

    #[test]
    fn test_reliability_clamped() {
        let report = parse("Politics: 100\nReliability: 250", "example.com");
        assert_eq!(report.trust.reliability, 100);
    }

    #[test]
    fn test_normalise_always_sums_to_100() {
        let cases: &[&[u64]] = &[&[1, 1, 1], &[7], &[3, 3, 3, 3, 3, 3], &[99, 1, 1], &[5, 0, 2]];
        for values in cases {
            let percents = normalise(values).unwrap();
            let sum: u32 = percents.iter().map(|p| *p as u32).sum();
            assert_eq!(sum, 100, "{:?}", values);
        }
        assert!(normalise(&[0, 0]).is_none());
        assert!(normalise(&[]).is_none());
    }

    #[test]
    fn test_default_distribution_sums_to_100() {
        assert_eq!(default_distribution().total(), 100);
    }
}
