/// Persistence store
///
/// `AcademyStore` is the only way the services touch persisted data. Two
/// implementations exist:
///
/// - `PgStore`: Postgres through sqlx, used in production
/// - `InMemoryStore`: a mutex-guarded map store for tests and local demos
///
/// Both honour the same contract:
///
/// - unique email, formation slug, quiz per module and sibling order index;
///   violations surface as `AppError` conflicts, never as a pre-read race
/// - deleting a parent removes its whole subtree
/// - `create_user` writes the user and its empty profile as one unit
/// - child creation computes `max(order_index) + 1` (0 for an empty scope)
///   and inserts in one atomic step
/// - a missing parent or id is reported as not found

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AnswerOption, AnswerOptionUpdate, Enrollment, Formation, FormationUpdate, Lesson,
    LessonUpdate, Module, ModuleUpdate, NewAnswerOption, NewFormation, NewLesson, NewModule,
    NewQuestion, NewQuiz, NewUser, Question, QuestionUpdate, Quiz, QuizUpdate, User, UserProfile,
    UserUpdate,
};

#[async_trait]
pub trait AcademyStore: Send + Sync {
    // Users
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_reset_token(&self, token_hash: &str) -> Result<Option<User>, AppError>;
    async fn list_users(&self) -> Result<Vec<User>, AppError>;
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, AppError>;
    /// Store a new password hash and clear any pending reset token
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;
    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn delete_user(&self, id: Uuid) -> Result<(), AppError>;
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError>;
    /// Idempotent: granting an existing enrollment returns it unchanged
    async fn grant_enrollment(
        &self,
        user_id: Uuid,
        formation_id: Uuid,
    ) -> Result<Enrollment, AppError>;
    async fn list_enrollments(&self, user_id: Uuid) -> Result<Vec<Enrollment>, AppError>;

    // Formations
    async fn list_formations(&self) -> Result<Vec<Formation>, AppError>;
    async fn find_formation(&self, id: Uuid) -> Result<Option<Formation>, AppError>;
    async fn create_formation(&self, formation: NewFormation) -> Result<Formation, AppError>;
    async fn update_formation(
        &self,
        id: Uuid,
        update: FormationUpdate,
    ) -> Result<Formation, AppError>;
    async fn delete_formation(&self, id: Uuid) -> Result<(), AppError>;

    // Modules
    async fn list_modules(&self, formation_id: Uuid) -> Result<Vec<Module>, AppError>;
    async fn find_module(&self, id: Uuid) -> Result<Option<Module>, AppError>;
    async fn create_module(&self, formation_id: Uuid, module: NewModule)
        -> Result<Module, AppError>;
    async fn update_module(&self, id: Uuid, update: ModuleUpdate) -> Result<Module, AppError>;
    async fn delete_module(&self, id: Uuid) -> Result<(), AppError>;

    // Lessons
    async fn list_lessons(&self, module_id: Uuid) -> Result<Vec<Lesson>, AppError>;
    async fn find_lesson(&self, id: Uuid) -> Result<Option<Lesson>, AppError>;
    async fn create_lesson(&self, module_id: Uuid, lesson: NewLesson) -> Result<Lesson, AppError>;
    async fn update_lesson(&self, id: Uuid, update: LessonUpdate) -> Result<Lesson, AppError>;
    async fn delete_lesson(&self, id: Uuid) -> Result<(), AppError>;

    // Quizzes
    async fn find_quiz(&self, id: Uuid) -> Result<Option<Quiz>, AppError>;
    async fn find_quiz_by_module(&self, module_id: Uuid) -> Result<Option<Quiz>, AppError>;
    async fn create_quiz(&self, module_id: Uuid, quiz: NewQuiz) -> Result<Quiz, AppError>;
    async fn update_quiz(&self, id: Uuid, update: QuizUpdate) -> Result<Quiz, AppError>;
    async fn delete_quiz(&self, id: Uuid) -> Result<(), AppError>;

    // Questions, returned with their ordered options
    async fn list_questions(&self, quiz_id: Uuid) -> Result<Vec<Question>, AppError>;
    async fn find_question(&self, id: Uuid) -> Result<Option<Question>, AppError>;
    async fn create_question(
        &self,
        quiz_id: Uuid,
        question: NewQuestion,
    ) -> Result<Question, AppError>;
    /// Apply `update` and replace the whole option set with `options`, atomically
    async fn update_question(
        &self,
        id: Uuid,
        update: QuestionUpdate,
        options: Vec<NewAnswerOption>,
    ) -> Result<Question, AppError>;
    async fn delete_question(&self, id: Uuid) -> Result<(), AppError>;

    // Options
    async fn list_options(&self, question_id: Uuid) -> Result<Vec<AnswerOption>, AppError>;
    async fn create_option(
        &self,
        question_id: Uuid,
        option: NewAnswerOption,
    ) -> Result<AnswerOption, AppError>;
    async fn update_option(
        &self,
        id: Uuid,
        update: AnswerOptionUpdate,
    ) -> Result<AnswerOption, AppError>;
    async fn delete_option(&self, id: Uuid) -> Result<(), AppError>;
}

/// Next order index for a sibling scope: one past the highest existing
/// index, or 0 when the scope is empty. Gaps left by deletes are kept.
pub fn next_order_index(existing: impl IntoIterator<Item = i32>) -> i32 {
    existing.into_iter().max().map_or(0, |max| max + 1)
}
