//! Grading records produced by the upstream grading service
//!
//! The overlay is always rebuilt from these records; nothing derived from them
//! is persisted on its own.

use serde::{Deserialize, Deserializer, Serialize};

use super::geometry::BoxRect;

/// One graded attachment image
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradingRecord {
    pub image_url: String,
    #[serde(default)]
    pub markup_status: String,
    #[serde(rename = "questions_info", default)]
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question_number", deserialize_with = "string_or_number")]
    pub number: String,
    /// Questions without a type are carried but never marked
    #[serde(rename = "question_type", default)]
    pub kind: Option<QuestionType>,
    #[serde(rename = "question_text", default)]
    pub text: String,
    #[serde(rename = "answer_steps", default)]
    pub steps: Vec<AnswerStep>,
}

impl Question {
    pub fn has_multiple_steps(&self) -> bool {
        self.steps.len() > 1
    }
}

/// Closed set of question categories; unknown labels map to `Other`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    Choice,
    TrueFalse,
    FillBlank,
    Matching,
    Worked,
    Application,
    Essay,
    Drawing,
    Other,
}

impl From<String> for QuestionType {
    fn from(label: String) -> Self {
        match label.trim() {
            "选择题" => QuestionType::Choice,
            "判断题" => QuestionType::TrueFalse,
            "填空题" => QuestionType::FillBlank,
            "连线题" => QuestionType::Matching,
            "解答题" => QuestionType::Worked,
            "应用题" => QuestionType::Application,
            "作文题" => QuestionType::Essay,
            "作图题" => QuestionType::Drawing,
            _ => QuestionType::Other,
        }
    }
}

impl From<QuestionType> for String {
    fn from(kind: QuestionType) -> Self {
        kind.label().to_string()
    }
}

impl QuestionType {
    pub fn label(self) -> &'static str {
        match self {
            QuestionType::Choice => "选择题",
            QuestionType::TrueFalse => "判断题",
            QuestionType::FillBlank => "填空题",
            QuestionType::Matching => "连线题",
            QuestionType::Worked => "解答题",
            QuestionType::Application => "应用题",
            QuestionType::Essay => "作文题",
            QuestionType::Drawing => "作图题",
            QuestionType::Other => "其他",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerStep {
    pub step_id: i64,
    #[serde(default)]
    pub student_answer: String,
    #[serde(rename = "analysis", default)]
    pub primary_analysis: String,
    #[serde(default)]
    pub is_correct: bool,
    /// Native image pixels
    #[serde(rename = "answer_location")]
    pub location: BoxRect,
    #[serde(default = "default_consistent")]
    pub models_consistent: bool,
    #[serde(rename = "qwen_result", default)]
    pub secondary_result: Option<SecondaryResult>,
}

/// Verdict of the second, independent grading model
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SecondaryResult {
    #[serde(default)]
    pub student_answer: String,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Combined verdict of both grading models for one step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepVerdict {
    /// Both models marked the step correct
    Correct,
    /// Primary model says correct, secondary disagrees
    DisputedCorrect,
    /// Primary model says incorrect, secondary disagrees
    DisputedIncorrect,
    /// Both models marked the step incorrect
    Incorrect,
}

impl AnswerStep {
    pub fn verdict(&self) -> StepVerdict {
        match (self.is_correct, self.models_consistent) {
            (true, true) => StepVerdict::Correct,
            (true, false) => StepVerdict::DisputedCorrect,
            (false, false) => StepVerdict::DisputedIncorrect,
            (false, true) => StepVerdict::Incorrect,
        }
    }

    /// Analysis shown in the side panel for this step's verdict
    pub fn analysis_for(&self, verdict: StepVerdict) -> &str {
        match verdict {
            StepVerdict::DisputedCorrect => self
                .secondary_result
                .as_ref()
                .map(|r| r.analysis.as_str())
                .unwrap_or(&self.primary_analysis),
            _ => &self.primary_analysis,
        }
    }
}

fn default_consistent() -> bool {
    true
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "question_number must be a string or number, got {other}"
        ))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<GradingRecord>),
    One(Box<GradingRecord>),
}

/// Parse grading JSON; a single object is treated as a one-element list
pub fn parse_grading_records(text: &str) -> Result<Vec<GradingRecord>, serde_json::Error> {
    Ok(match serde_json::from_str::<OneOrMany>(text)? {
        OneOrMany::Many(records) => records,
        OneOrMany::One(record) => vec![*record],
    })
}
