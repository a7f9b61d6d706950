//! Pre-built test data

use crate::models::auth::{LoginResponse, Role, TokenPair, UserSummary};
use crate::models::{
    ChoiceOption, ExamAttempt, Question, QuestionBody, TestInfo, TestKind,
};
use crate::session::TokenStore;
use crate::storage::{MemoryStore, StateStore};
use crate::testing::constants;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

pub struct TestFixtures;

impl TestFixtures {
    /// Fresh in-memory browser-session store
    #[must_use]
    pub fn storage() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    /// Token store seeded with a logged-in, face-verified student
    #[must_use]
    pub fn authenticated_token_store(storage: &Arc<MemoryStore>) -> Arc<TokenStore> {
        let tokens = Arc::new(TokenStore::new(
            Arc::clone(storage) as Arc<dyn StateStore>
        ));
        tokens
            .store_login(&Self::login_response())
            .expect("fixture login should store");
        tokens
    }

    #[must_use]
    pub fn user() -> UserSummary {
        UserSummary {
            id: 7,
            email: constants::TEST_EMAIL.to_string(),
            role: Role::Student,
            face_verified: true,
            first_login: false,
        }
    }

    #[must_use]
    pub fn login_response() -> LoginResponse {
        LoginResponse {
            tokens: TokenPair {
                access: constants::TEST_ACCESS_TOKEN.to_string(),
                refresh: Some(constants::TEST_REFRESH_TOKEN.to_string()),
            },
            user: Self::user(),
        }
    }

    /// Unsigned JWT whose `exp` lies `offset_seconds` from now
    #[must_use]
    pub fn jwt_expiring_in(offset_seconds: i64) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
        let exp = Utc::now().timestamp() + offset_seconds;
        let payload = general_purpose::URL_SAFE_NO_PAD
            .encode(format!(r#"{{"exp":{exp},"sub":"student"}}"#).as_bytes());
        format!("{header}.{payload}.unsigned")
    }

    /// The canonical proctored attempt: 10 minutes, three questions
    /// (single, multiple, open)
    #[must_use]
    pub fn proctored_attempt() -> ExamAttempt {
        let now = Utc::now();
        ExamAttempt {
            assignment_id: constants::TEST_ASSIGNMENT_ID,
            test: TestInfo {
                id: 1,
                name: "Operating Systems midterm".to_string(),
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
                    text: "Which scheduler is preemptive?".to_string(),
                    body: QuestionBody::Single {
                        options: vec![Self::option(10, "FCFS"), Self::option(11, "Round robin")],
                    },
                    attachments: vec![],
                },
                Question {
                    id: 2,
                    text: "Select all IPC mechanisms".to_string(),
                    body: QuestionBody::Multiple {
                        options: vec![
                            Self::option(20, "Pipes"),
                            Self::option(21, "Semaphores"),
                            Self::option(22, "Templates"),
                        ],
                    },
                    attachments: vec![],
                },
                Question {
                    id: 3,
                    text: "Explain priority inversion".to_string(),
                    body: QuestionBody::Open,
                    attachments: vec![],
                },
            ],
            answers: HashMap::new(),
            current_index: 0,
            submitted: false,
        }
    }

    fn option(id: i64, text: &str) -> ChoiceOption {
        ChoiceOption {
            id,
            text: text.to_string(),
            is_correct: None,
        }
    }
}
