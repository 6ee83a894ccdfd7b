/// Domain models
///
/// Plain data carried between the store, the services and the HTTP layer.
/// `New*` structs hold validated input for inserts, `*Update` structs hold
/// partial updates where `None` leaves a field unchanged.

mod formation;
mod quiz;
mod user;

pub use formation::{
    Formation, FormationDetail, FormationUpdate, Lesson, LessonUpdate, Level, Module,
    ModuleDetail, ModuleUpdate, NewFormation, NewLesson, NewModule,
};
pub use quiz::{
    AnswerOption, AnswerOptionUpdate, NewAnswerOption, NewQuestion, NewQuiz, Question,
    QuestionType, QuestionUpdate, Quiz, QuizDetail, QuizUpdate, DEFAULT_PASSING_SCORE,
};
pub use user::{Enrollment, NewUser, Role, User, UserProfile, UserUpdate};
