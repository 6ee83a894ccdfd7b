use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_PASSING_SCORE: i32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    #[default]
    SingleChoice,
    MultipleChoice,
    TrueFalse,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "SINGLE_CHOICE",
            QuestionType::MultipleChoice => "MULTIPLE_CHOICE",
            QuestionType::TrueFalse => "TRUE_FALSE",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SINGLE_CHOICE" => Ok(QuestionType::SingleChoice),
            "MULTIPLE_CHOICE" => Ok(QuestionType::MultipleChoice),
            "TRUE_FALSE" => Ok(QuestionType::TrueFalse),
            other => Err(format!("unknown question type: {}", other)),
        }
    }
}

/// Assessment attached to a module (at most one per module)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub passing_score: i32,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub description: Option<String>,
    pub passing_score: i32,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct QuizUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub passing_score: Option<i32>,
    pub time_limit_minutes: Option<Option<i32>>,
    pub max_attempts: Option<Option<i32>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub explanation: Option<String>,
    pub order_index: i32,
    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub explanation: Option<String>,
    /// Stored with order index = position in this list
    pub options: Vec<NewAnswerOption>,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionUpdate {
    pub question_text: Option<String>,
    pub question_type: Option<QuestionType>,
    pub points: Option<i32>,
    pub explanation: Option<Option<String>>,
}

/// One possible answer to a question
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub option_text: String,
    pub is_correct: bool,
    pub order_index: i32,
}

#[derive(Debug, Clone)]
pub struct NewAnswerOption {
    pub option_text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AnswerOptionUpdate {
    pub option_text: Option<String>,
    pub is_correct: Option<bool>,
}

/// A quiz with its ordered questions (each carrying its ordered options)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_type_parses_its_own_name() {
        for kind in [
            QuestionType::SingleChoice,
            QuestionType::MultipleChoice,
            QuestionType::TrueFalse,
        ] {
            assert_eq!(kind.as_str().parse::<QuestionType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_question_type_deserializes_from_api_name() {
        let kind: QuestionType = serde_json::from_str("\"TRUE_FALSE\"").unwrap();
        assert_eq!(kind, QuestionType::TrueFalse);
    }
}
