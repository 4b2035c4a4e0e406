//! Comprehension quiz generation and grading.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{OptionLetter, QuizItem};

use super::strip_code;

pub const PREAMBLE: &str =
    "You are a quiz generator. Create multiple choice questions to test comprehension.";

/// Number of questions requested
pub const QUESTION_COUNT: usize = 5;

/// Quiz prompt over the article text
pub fn prompt(article_text: &str) -> String {
    format!(
        "Create {} multiple choice questions about this article. Format EXACTLY as follows:\n\n\
         Q1: [question text here]\nA) [first option]\nB) [second option]\nC) [third option]\n\
         D) [fourth option]\nCORRECT: A\n\n\
         Q2: [question text here]\nA) [first option]\nB) [second option]\nC) [third option]\n\
         D) [fourth option]\nCORRECT: B\n\n\
         Continue this pattern for all {} questions. Use only letters A, B, C, or D for \
         correct answers.\n\nArticle:\n{}",
        QUESTION_COUNT, QUESTION_COUNT, article_text
    )
}

/// Parse every well-formed question block of a reply.
///
/// A block is kept only with a question line, exactly four options and a
/// correct letter. Malformed blocks are skipped.
pub fn parse(reply: &str) -> Vec<QuizItem> {
    let text = strip_code(reply);

    static_regex!(r"(?i)Q\d+:")
        .split(&text)
        .filter(|block| !block.trim().is_empty())
        .enumerate()
        .filter_map(|(i, block)| {
            let item = parse_block(block);
            if item.is_none() {
                debug!(block = i + 1, "Quiz block rejected");
            }
            item
        })
        .collect()
}

fn parse_block(block: &str) -> Option<QuizItem> {
    let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty());
    let question = lines.next()?.to_string();

    let mut options = Vec::new();
    let mut correct = None;
    for line in lines {
        if let Some(c) = static_regex!(r"(?i)^([A-D])\)\s*(.+)").captures(line) {
            options.push(c[2].trim().to_string());
            continue;
        }
        if let Some(c) = static_regex!(r"(?i)CORRECT:\s*([A-D])").captures(line) {
            correct = c[1].chars().next().and_then(OptionLetter::from_char);
            break;
        }
    }

    let options: [String; 4] = options.try_into().ok()?;
    Some(QuizItem {
        question,
        options,
        correct: correct?,
    })
}

/// Result tier of a graded quiz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    KeepStudying,
    GoodJob,
    Excellent,
}

impl Tier {
    pub fn from_percent(percent: u32) -> Self {
        match percent {
            0..=59 => Tier::KeepStudying,
            60..=79 => Tier::GoodJob,
            _ => Tier::Excellent,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Tier::KeepStudying => "Keep studying!",
            Tier::GoodJob => "Good job!",
            Tier::Excellent => "Excellent work!",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Tier::KeepStudying => "#ef4444",
            Tier::GoodJob => "#f59e0b",
            Tier::Excellent => "#22c55e",
        }
    }
}

/// How an option is shown after grading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionMark {
    Unmarked,
    /// The right answer (green)
    Correct,
    /// Chosen but wrong (red)
    Incorrect,
}

/// Outcome of grading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizGrade {
    pub correct: usize,
    pub total: usize,
    pub percent: u32,
    pub tier: Tier,
    /// One row of four marks per question
    pub marks: Vec<[OptionMark; 4]>,
}

/// A rendered quiz being answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    items: Vec<QuizItem>,
    answers: Vec<Option<OptionLetter>>,
    grade: Option<QuizGrade>,
}

impl QuizSession {
    pub fn new(items: Vec<QuizItem>) -> Self {
        let answers = vec![None; items.len()];
        Self {
            items,
            answers,
            grade: None,
        }
    }

    pub fn items(&self) -> &[QuizItem] {
        &self.items
    }

    pub fn answers(&self) -> &[Option<OptionLetter>] {
        &self.answers
    }

    pub fn grade(&self) -> Option<&QuizGrade> {
        self.grade.as_ref()
    }

    /// Record an answer; ignored once graded or for unknown questions
    pub fn select(&mut self, question: usize, letter: OptionLetter) -> bool {
        if self.grade.is_some() {
            return false;
        }
        match self.answers.get_mut(question) {
            Some(slot) => {
                *slot = Some(letter);
                true
            }
            None => false,
        }
    }

    /// Submit is enabled once every question has an answer
    pub fn all_answered(&self) -> bool {
        !self.items.is_empty() && self.answers.iter().all(Option::is_some)
    }

    /// Grade the quiz; `None` until every question is answered
    pub fn submit(&mut self) -> Option<&QuizGrade> {
        if !self.all_answered() {
            return None;
        }
        if self.grade.is_none() {
            self.grade = Some(self.compute_grade());
        }
        self.grade.as_ref()
    }

    fn compute_grade(&self) -> QuizGrade {
        let mut correct = 0;
        let marks = self
            .items
            .iter()
            .zip(&self.answers)
            .map(|(item, answer)| {
                if *answer == Some(item.correct) {
                    correct += 1;
                }
                let mut row = [OptionMark::Unmarked; 4];
                for letter in OptionLetter::ALL {
                    row[letter.index()] = if letter == item.correct {
                        OptionMark::Correct
                    } else if *answer == Some(letter) {
                        OptionMark::Incorrect
                    } else {
                        OptionMark::Unmarked
                    };
                }
                row
            })
            .collect();

        let total = self.items.len();
        let percent = (correct as f64 / total.max(1) as f64 * 100.0).round() as u32;
        QuizGrade {
            correct,
            total,
            percent,
            tier: Tier::from_percent(percent),
            marks,
        }
    }
}
