//! Answer assembly
//!
//! Folds the in-progress answer map into the per-variant wire shape at
//! submission time: a list of at most one option id for single choice, a
//! list for multiple choice, free text for open and code questions.

use crate::models::{AnswerValue, ExamAttempt, QuestionBody, SubmittedAnswer};

/// Assemble the submission payload in question order
///
/// Unanswered questions are omitted; an answer whose shape does not match
/// its question variant is dropped with a warning rather than submitted
/// malformed.
#[must_use]
pub fn assemble(attempt: &ExamAttempt) -> Vec<SubmittedAnswer> {
    attempt
        .questions
        .iter()
        .filter_map(|question| {
            let answer = attempt.answers.get(&question.id)?;
            match (&question.body, answer) {
                (QuestionBody::Single { .. }, AnswerValue::Selected(option_id)) => {
                    Some(SubmittedAnswer {
                        question_id: question.id,
                        selected_option_ids: vec![*option_id],
                        text: None,
                    })
                }
                (QuestionBody::Multiple { .. }, AnswerValue::SelectedMany(option_ids)) => {
                    Some(SubmittedAnswer {
                        question_id: question.id,
                        selected_option_ids: option_ids.clone(),
                        text: None,
                    })
                }
                (QuestionBody::Open, AnswerValue::Text(text))
                | (QuestionBody::Code { .. }, AnswerValue::Code(text)) => Some(SubmittedAnswer {
                    question_id: question.id,
                    selected_option_ids: Vec::new(),
                    text: Some(text.clone()),
                }),
                _ => {
                    log::warn!(
                        "Answer for question {} does not match its variant; dropping",
                        question.id
                    );
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChoiceOption, Question, TestInfo, TestKind};
    use chrono::{Duration, Utc};
    use std::collections::HashMap;

    fn option(id: i64) -> ChoiceOption {
        ChoiceOption {
            id,
            text: format!("option {id}"),
            is_correct: None,
        }
    }

    fn attempt() -> ExamAttempt {
        let now = Utc::now();
        ExamAttempt {
            assignment_id: 42,
            test: TestInfo {
                id: 1,
                name: "Quiz".to_string(),
                kind: TestKind::Exam,
                duration_minutes: 10,
                use_proctoring: true,
                allowed_attempts: None,
                has_ai_assistant: false,
                allow_sound_analysis: false,
                show_result: false,
                start_time: now - Duration::hours(1),
                deadline: now + Duration::hours(1),
            },
            questions: vec![
                Question {
                    id: 1,
                    text: "Pick one".to_string(),
                    body: QuestionBody::Single {
                        options: vec![option(10), option(11)],
                    },
                    attachments: vec![],
                },
                Question {
                    id: 2,
                    text: "Pick many".to_string(),
                    body: QuestionBody::Multiple {
                        options: vec![option(20), option(21), option(22)],
                    },
                    attachments: vec![],
                },
                Question {
                    id: 3,
                    text: "Explain".to_string(),
                    body: QuestionBody::Open,
                    attachments: vec![],
                },
                Question {
                    id: 4,
                    text: "Implement".to_string(),
                    body: QuestionBody::Code {
                        language: "rust".to_string(),
                        starter_code: None,
                    },
                    attachments: vec![],
                },
            ],
            answers: HashMap::new(),
            current_index: 0,
            submitted: false,
        }
    }

    #[test]
    fn test_each_variant_takes_its_shape() {
        let mut attempt = attempt();
        attempt.answers.insert(1, AnswerValue::Selected(11));
        attempt
            .answers
            .insert(2, AnswerValue::SelectedMany(vec![20, 22]));
        attempt
            .answers
            .insert(3, AnswerValue::Text("because".to_string()));
        attempt
            .answers
            .insert(4, AnswerValue::Code("fn main() {}".to_string()));

        let submitted = assemble(&attempt);
        assert_eq!(submitted.len(), 4);

        assert_eq!(submitted[0].selected_option_ids, vec![11]);
        assert!(submitted[0].text.is_none());

        assert_eq!(submitted[1].selected_option_ids, vec![20, 22]);

        assert!(submitted[2].selected_option_ids.is_empty());
        assert_eq!(submitted[2].text.as_deref(), Some("because"));

        assert_eq!(submitted[3].text.as_deref(), Some("fn main() {}"));
    }

    #[test]
    fn test_unanswered_questions_are_omitted() {
        let mut attempt = attempt();
        attempt.answers.insert(3, AnswerValue::Text("only this".to_string()));

        let submitted = assemble(&attempt);
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].question_id, 3);
    }

    #[test]
    fn test_single_choice_carries_at_most_one_id() {
        let mut attempt = attempt();
        attempt.answers.insert(1, AnswerValue::Selected(10));
        let submitted = assemble(&attempt);
        assert!(submitted[0].selected_option_ids.len() <= 1);
    }

    #[test]
    fn test_mismatched_answer_shape_is_dropped() {
        let mut attempt = attempt();
        // A text answer on a single-choice question must never go out
        attempt.answers.insert(1, AnswerValue::Text("huh".to_string()));
        assert!(assemble(&attempt).is_empty());
    }

    #[test]
    fn test_order_follows_question_sequence() {
        let mut attempt = attempt();
        attempt
            .answers
            .insert(4, AnswerValue::Code("x".to_string()));
        attempt.answers.insert(1, AnswerValue::Selected(10));

        let submitted = assemble(&attempt);
        assert_eq!(
            submitted.iter().map(|a| a.question_id).collect::<Vec<_>>(),
            vec![1, 4]
        );
    }
}
