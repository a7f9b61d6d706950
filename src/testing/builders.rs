//! Fluent builders for test objects

use crate::models::auth::{Role, UserSummary};
use crate::models::{ExamAttempt, Question, TestKind};
use crate::testing::fixtures::TestFixtures;

/// Builder over the canonical proctored attempt fixture
pub struct TestAttemptBuilder {
    attempt: ExamAttempt,
}

impl TestAttemptBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempt: TestFixtures::proctored_attempt(),
        }
    }

    #[must_use]
    pub fn with_assignment_id(mut self, assignment_id: i64) -> Self {
        self.attempt.assignment_id = assignment_id;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: TestKind) -> Self {
        self.attempt.test.kind = kind;
        self
    }

    #[must_use]
    pub fn with_duration_minutes(mut self, minutes: u32) -> Self {
        self.attempt.test.duration_minutes = minutes;
        self
    }

    #[must_use]
    pub fn without_proctoring(mut self) -> Self {
        self.attempt.test.use_proctoring = false;
        self
    }

    #[must_use]
    pub fn with_sound_analysis(mut self) -> Self {
        self.attempt.test.allow_sound_analysis = true;
        self
    }

    #[must_use]
    pub fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.attempt.questions = questions;
        self
    }

    #[must_use]
    pub fn build(self) -> ExamAttempt {
        self.attempt
    }
}

impl Default for TestAttemptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for user summaries in guard tests
pub struct TestUserBuilder {
    user: UserSummary,
}

impl TestUserBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            user: TestFixtures::user(),
        }
    }

    #[must_use]
    pub fn unverified(mut self) -> Self {
        self.user.face_verified = false;
        self
    }

    #[must_use]
    pub fn first_login(mut self) -> Self {
        self.user.first_login = true;
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.user.role = role;
        self
    }

    #[must_use]
    pub fn build(self) -> UserSummary {
        self.user
    }
}

impl Default for TestUserBuilder {
    fn default() -> Self {
        Self::new()
    }
}
