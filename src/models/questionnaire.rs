use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

pub const ORIGIN_COUNTRY: usize = 0;
pub const VACATION_TYPES: usize = 1;
pub const SEASONS: usize = 2;
pub const BUDGET: usize = 3;
pub const FAVORITE_COUNTRY: usize = 4;
pub const TRAVEL_DISTANCE: usize = 5;
pub const PLACE_TYPE: usize = 6;

/// Separator used when a multi-select answer is flattened to one label
pub const SELECTION_SEPARATOR: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// Free-text answer
    Open,
    /// One or more labels from a fixed option list
    MultiSelect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub prompt: &'static str,
    pub options: &'static [&'static str],
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        if self.options.is_empty() {
            QuestionKind::Open
        } else {
            QuestionKind::MultiSelect
        }
    }
}

/// The travel-preference questionnaire, in answer order
pub static QUESTIONS: [Question; 7] = [
    Question {
        prompt: "Where are you traveling from?",
        options: &[],
    },
    Question {
        prompt: "What type of vacation are you looking for?",
        options: &["Beach", "City", "Historical", "Adventure", "Nature", "Religious"],
    },
    Question {
        prompt: "What seasons do you like?",
        options: &["Spring", "Summer", "Fall", "Winter"],
    },
    Question {
        prompt: "What is your budget?",
        options: &["Budget Friendly", "Mid-Range", "Luxury", "Premium"],
    },
    Question {
        prompt: "What has been your favorite country you've visited?",
        options: &[],
    },
    Question {
        prompt: "How far do you want to travel?",
        options: &[
            "Within your Country",
            "Within your Continent",
            "Outside of your Continent",
            "Anywhere",
        ],
    },
    Question {
        prompt: "What type of place do you like?",
        options: &["Quiet", "Moderate", "Busy"],
    },
];

/// A single questionnaire answer, stored as a string or a list of labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Selections(Vec<String>),
}

impl Answer {
    /// The answer as one label; selections are pipe-joined
    pub fn joined(&self) -> String {
        match self {
            Answer::Text(text) => text.clone(),
            Answer::Selections(labels) => labels.join(SELECTION_SEPARATOR),
        }
    }

    /// The answer as a list of labels; text becomes a single-element list
    pub fn labels(&self) -> Vec<String> {
        match self {
            Answer::Text(text) => vec![text.clone()],
            Answer::Selections(labels) => labels.clone(),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Answer::Text(text) => text.trim().is_empty(),
            Answer::Selections(labels) => labels.is_empty(),
        }
    }
}

/// Answers keyed by question index.
///
/// The index is the only key type; the stored document spells it as the
/// decimal string of the index (`"0"`, `"1"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionnaireResponse {
    answers: BTreeMap<usize, Answer>,
}

impl QuestionnaireResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: usize, answer: Answer) {
        self.answers.insert(index, answer);
    }

    pub fn get(&self, index: usize) -> Option<&Answer> {
        self.answers.get(&index)
    }

    /// The answer to `index` flattened to one label, or empty when unanswered
    pub fn text(&self, index: usize) -> String {
        self.get(index).map(Answer::joined).unwrap_or_default()
    }

    /// The answer to `index` as a list of labels, or empty when unanswered
    pub fn selections(&self, index: usize) -> Vec<String> {
        self.get(index).map(Answer::labels).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Checks that every question has a non-empty answer of the right shape
    pub fn validate(&self) -> AppResult<()> {
        if let Some(index) = self.answers.keys().find(|i| **i >= QUESTIONS.len()) {
            return Err(AppError::InvalidInput(format!(
                "Answer for unknown question {}",
                index
            )));
        }

        for (index, question) in QUESTIONS.iter().enumerate() {
            let answer = self.get(index).ok_or_else(|| {
                AppError::InvalidInput(format!("Question {} is unanswered", index))
            })?;

            if answer.is_blank() {
                return Err(AppError::InvalidInput(format!(
                    "Question {} has an empty answer",
                    index
                )));
            }

            match (question.kind(), answer) {
                (QuestionKind::Open, Answer::Text(_)) => {}
                (QuestionKind::MultiSelect, Answer::Selections(labels)) => {
                    if let Some(unknown) = labels
                        .iter()
                        .find(|label| !question.options.contains(&label.as_str()))
                    {
                        return Err(AppError::InvalidInput(format!(
                            "'{}' is not an option for question {}",
                            unknown, index
                        )));
                    }
                }
                (QuestionKind::Open, Answer::Selections(_)) => {
                    return Err(AppError::InvalidInput(format!(
                        "Question {} expects a typed answer",
                        index
                    )));
                }
                (QuestionKind::MultiSelect, Answer::Text(_)) => {
                    return Err(AppError::InvalidInput(format!(
                        "Question {} expects selected options",
                        index
                    )));
                }
            }
        }

        Ok(())
    }

    /// Named-feature view used by the encoder
    pub fn features(&self) -> ProfileFeatures {
        ProfileFeatures {
            origin_country: self.text(ORIGIN_COUNTRY),
            vacation_types: self.text(VACATION_TYPES),
            seasons: self.text(SEASONS),
            budget: self.text(BUDGET),
            favorite_country_visited: self.text(FAVORITE_COUNTRY),
            travel_distance: self.text(TRAVEL_DISTANCE),
            place_type: self.text(PLACE_TYPE),
        }
    }
}

/// Questionnaire answers by feature name, multi-selects pipe-joined
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFeatures {
    pub origin_country: String,
    pub vacation_types: String,
    pub seasons: String,
    pub budget: String,
    pub favorite_country_visited: String,
    pub travel_distance: String,
    pub place_type: String,
}

impl ProfileFeatures {
    /// Raw value of a categorical feature by its metadata name
    pub fn categorical(&self, feature: &str) -> Option<&str> {
        let value = match feature {
            "origin_country" => &self.origin_country,
            "seasons" => &self.seasons,
            "budget" => &self.budget,
            "favorite_country_visited" => &self.favorite_country_visited,
            "travel_distance" => &self.travel_distance,
            "place_type" => &self.place_type,
            _ => return None,
        };
        Some(value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionnaireStep {
    /// Moved on to the question at this index
    Next(usize),
    /// Every question is answered
    Complete(QuestionnaireResponse),
}

/// Walks the questionnaire one question at a time
#[derive(Debug, Clone, Default)]
pub struct QuestionnaireFlow {
    index: usize,
    typed: String,
    selected: Vec<String>,
    responses: QuestionnaireResponse,
    complete: bool,
}

impl QuestionnaireFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> &'static Question {
        &QUESTIONS[self.index]
    }

    pub fn is_last(&self) -> bool {
        self.index == QUESTIONS.len() - 1
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn type_answer(&mut self, text: impl Into<String>) {
        self.typed = text.into();
    }

    /// Selects `option`, or unselects it if it was already selected.
    /// Returns whether the option is selected afterwards.
    pub fn toggle_option(&mut self, option: &str) -> AppResult<bool> {
        let question = self.current();
        if !question.options.contains(&option) {
            return Err(AppError::InvalidInput(format!(
                "'{}' is not an option for question {}",
                option, self.index
            )));
        }

        if let Some(pos) = self.selected.iter().position(|s| s == option) {
            self.selected.remove(pos);
            Ok(false)
        } else {
            self.selected.push(option.to_string());
            Ok(true)
        }
    }

    /// Stores the current answer and moves to the next question
    pub fn advance(&mut self) -> AppResult<QuestionnaireStep> {
        if self.complete {
            return Err(AppError::InvalidInput(
                "Questionnaire is already complete".to_string(),
            ));
        }

        let answer = match self.current().kind() {
            QuestionKind::Open => {
                if self.typed.trim().is_empty() {
                    return Err(AppError::InvalidInput(
                        "Answer required. Please type an answer.".to_string(),
                    ));
                }
                Answer::Text(std::mem::take(&mut self.typed))
            }
            QuestionKind::MultiSelect => {
                if self.selected.is_empty() {
                    return Err(AppError::InvalidInput(
                        "Answer required. Please select an answer.".to_string(),
                    ));
                }
                Answer::Selections(std::mem::take(&mut self.selected))
            }
        };

        self.responses.set(self.index, answer);

        if self.is_last() {
            self.complete = true;
            return Ok(QuestionnaireStep::Complete(self.responses.clone()));
        }

        self.index += 1;
        Ok(QuestionnaireStep::Next(self.index))
    }
}
