/// Content hierarchy services
///
/// Validation, defaults and tree assembly for formations and everything
/// below them. Ordering, uniqueness and cascades belong to the store; this
/// layer turns request input into `New*` / `*Update` values and reports
/// missing records as not found.

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::error::{AppError, ValidationError};
use crate::models::{
    AnswerOption, AnswerOptionUpdate, Formation, FormationDetail, FormationUpdate, Lesson,
    LessonUpdate, Level, Module, ModuleDetail, ModuleUpdate, NewAnswerOption, NewFormation,
    NewLesson, NewModule, NewQuestion, NewQuiz, Question, QuestionType, QuestionUpdate, Quiz,
    QuizDetail, QuizUpdate, Role, DEFAULT_PASSING_SCORE,
};
use crate::store::AcademyStore;
use crate::validators::{derive_slug, is_valid_slug, non_negative, required_text, updated_text};

const DEFAULT_CURRENCY: &str = "EUR";
const DEFAULT_POINTS: i32 = 1;

// ============================================================================
// Request input
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Nullable<String>,
    pub level: Option<Level>,
    pub target_role: Option<Role>,
    pub is_published: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub duration_minutes: Nullable<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub price: Nullable<f64>,
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub thumbnail_url: Nullable<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Nullable<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub duration_minutes: Nullable<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Nullable<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub video_id: Nullable<String>,
    pub duration_seconds: Option<i32>,
    pub is_preview: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Nullable<String>,
    pub passing_score: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub time_limit_minutes: Nullable<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub max_attempts: Nullable<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    pub question_text: Option<String>,
    pub question_type: Option<QuestionType>,
    pub points: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub explanation: Nullable<String>,
    /// On update this replaces every existing option; absent means none
    #[serde(default)]
    pub options: Vec<OptionInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionInput {
    pub option_text: Option<String>,
    pub is_correct: Option<bool>,
}

/// A field that can be left out, set, or cleared with an explicit `null`
pub type Nullable<T> = Option<Option<T>>;

/// Absent stays `None`; `null` becomes `Some(None)`
fn nullable<'de, D, T>(deserializer: D) -> Result<Nullable<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Update value for a nullable text column; a blank string clears it too
fn cleared_text(value: Nullable<String>) -> Nullable<String> {
    value.map(optional_text)
}

fn cleared_count(field: &str, value: Nullable<i32>) -> Result<Nullable<i32>, ValidationError> {
    match value {
        Some(v @ Some(_)) => non_negative(field, v).map(Some),
        other => Ok(other),
    }
}

/// Blank optional strings are stored as absent
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn passing_score(value: Option<i32>) -> Result<Option<i32>, ValidationError> {
    match value {
        Some(score) if !(0..=100).contains(&score) => {
            Err(ValidationError::InvalidFormat("passingScore".to_string()))
        }
        other => Ok(other),
    }
}

fn price(value: Option<f64>) -> Result<Option<f64>, ValidationError> {
    match value {
        Some(p) if !p.is_finite() || p < 0.0 => {
            Err(ValidationError::InvalidFormat("price".to_string()))
        }
        other => Ok(other),
    }
}

fn currency(value: Option<String>) -> Result<Option<String>, ValidationError> {
    match optional_text(value) {
        Some(code) if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
            Ok(Some(code.to_ascii_uppercase()))
        }
        Some(_) => Err(ValidationError::InvalidFormat("currency".to_string())),
        None => Ok(None),
    }
}

fn new_option(input: OptionInput) -> Result<NewAnswerOption, ValidationError> {
    Ok(NewAnswerOption {
        option_text: required_text("optionText", input.option_text.as_deref())?,
        is_correct: input.is_correct.unwrap_or(false),
    })
}

fn new_options(inputs: Vec<OptionInput>) -> Result<Vec<NewAnswerOption>, ValidationError> {
    inputs.into_iter().map(new_option).collect()
}

// ============================================================================
// Formations
// ============================================================================

pub async fn list_formations(store: &dyn AcademyStore) -> Result<Vec<Formation>, AppError> {
    store.list_formations().await
}

/// Create a formation. Without an explicit slug one is derived from the title.
pub async fn create_formation(
    store: &dyn AcademyStore,
    input: FormationInput,
) -> Result<FormationDetail, AppError> {
    let title = required_text("title", input.title.as_deref())?;
    let slug = match optional_text(input.slug) {
        Some(slug) => is_valid_slug(&slug)?,
        None => is_valid_slug(&derive_slug(&title))?,
    };

    let formation = store
        .create_formation(NewFormation {
            title,
            slug,
            description: optional_text(input.description.flatten()),
            level: input.level.unwrap_or_default(),
            target_role: input.target_role.unwrap_or_default(),
            is_published: input.is_published.unwrap_or(false),
            duration_minutes: non_negative("durationMinutes", input.duration_minutes.flatten())?,
            price: price(input.price.flatten())?,
            currency: currency(input.currency)?.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            thumbnail_url: optional_text(input.thumbnail_url.flatten()),
        })
        .await?;

    tracing::info!(formation_id = %formation.id, slug = %formation.slug, "Formation created");
    Ok(FormationDetail {
        formation,
        modules: Vec::new(),
    })
}

/// The formation with its whole ordered content tree
pub async fn get_formation_detail(
    store: &dyn AcademyStore,
    id: Uuid,
) -> Result<FormationDetail, AppError> {
    let formation = store
        .find_formation(id)
        .await?
        .ok_or_else(|| AppError::not_found("Formation not found"))?;

    let mut modules = Vec::new();
    for module in store.list_modules(id).await? {
        let lessons = store.list_lessons(module.id).await?;
        let quiz = match store.find_quiz_by_module(module.id).await? {
            Some(quiz) => Some(quiz_detail(store, quiz).await?),
            None => None,
        };
        modules.push(ModuleDetail {
            module,
            lessons,
            quiz,
        });
    }

    Ok(FormationDetail { formation, modules })
}

pub async fn update_formation(
    store: &dyn AcademyStore,
    id: Uuid,
    input: FormationInput,
) -> Result<Formation, AppError> {
    let slug = match optional_text(input.slug) {
        Some(slug) => Some(is_valid_slug(&slug)?),
        None => None,
    };

    let update = FormationUpdate {
        title: updated_text("title", input.title.as_deref())?,
        slug,
        description: cleared_text(input.description),
        level: input.level,
        target_role: input.target_role,
        is_published: input.is_published,
        duration_minutes: cleared_count("durationMinutes", input.duration_minutes)?,
        price: match input.price {
            Some(p @ Some(_)) => Some(price(p)?),
            other => other,
        },
        currency: currency(input.currency)?,
        thumbnail_url: cleared_text(input.thumbnail_url),
    };
    store.update_formation(id, update).await
}

pub async fn delete_formation(store: &dyn AcademyStore, id: Uuid) -> Result<(), AppError> {
    store.delete_formation(id).await?;
    tracing::info!(formation_id = %id, "Formation deleted with its content");
    Ok(())
}

// ============================================================================
// Modules
// ============================================================================

pub async fn list_modules(
    store: &dyn AcademyStore,
    formation_id: Uuid,
) -> Result<Vec<Module>, AppError> {
    if store.find_formation(formation_id).await?.is_none() {
        return Err(AppError::not_found("Formation not found"));
    }
    store.list_modules(formation_id).await
}

pub async fn get_module(store: &dyn AcademyStore, id: Uuid) -> Result<Module, AppError> {
    store
        .find_module(id)
        .await?
        .ok_or_else(|| AppError::not_found("Module not found"))
}

pub async fn create_module(
    store: &dyn AcademyStore,
    formation_id: Uuid,
    input: ModuleInput,
) -> Result<Module, AppError> {
    let module = NewModule {
        title: required_text("title", input.title.as_deref())?,
        description: optional_text(input.description.flatten()),
        duration_minutes: non_negative("durationMinutes", input.duration_minutes.flatten())?,
    };
    let module = store.create_module(formation_id, module).await?;

    tracing::info!(
        module_id = %module.id,
        formation_id = %formation_id,
        order_index = module.order_index,
        "Module created"
    );
    Ok(module)
}

pub async fn update_module(
    store: &dyn AcademyStore,
    id: Uuid,
    input: ModuleInput,
) -> Result<Module, AppError> {
    let update = ModuleUpdate {
        title: updated_text("title", input.title.as_deref())?,
        description: cleared_text(input.description),
        duration_minutes: cleared_count("durationMinutes", input.duration_minutes)?,
    };
    store.update_module(id, update).await
}

pub async fn delete_module(store: &dyn AcademyStore, id: Uuid) -> Result<(), AppError> {
    store.delete_module(id).await
}

// ============================================================================
// Lessons
// ============================================================================

pub async fn list_lessons(
    store: &dyn AcademyStore,
    module_id: Uuid,
) -> Result<Vec<Lesson>, AppError> {
    get_module(store, module_id).await?;
    store.list_lessons(module_id).await
}

pub async fn get_lesson(store: &dyn AcademyStore, id: Uuid) -> Result<Lesson, AppError> {
    store
        .find_lesson(id)
        .await?
        .ok_or_else(|| AppError::not_found("Lesson not found"))
}

pub async fn create_lesson(
    store: &dyn AcademyStore,
    module_id: Uuid,
    input: LessonInput,
) -> Result<Lesson, AppError> {
    let lesson = NewLesson {
        title: required_text("title", input.title.as_deref())?,
        description: optional_text(input.description.flatten()),
        video_id: optional_text(input.video_id.flatten()),
        duration_seconds: non_negative("durationSeconds", input.duration_seconds)?.unwrap_or(0),
        is_preview: input.is_preview.unwrap_or(false),
    };
    let lesson = store.create_lesson(module_id, lesson).await?;

    tracing::info!(
        lesson_id = %lesson.id,
        module_id = %module_id,
        order_index = lesson.order_index,
        "Lesson created"
    );
    Ok(lesson)
}

pub async fn update_lesson(
    store: &dyn AcademyStore,
    id: Uuid,
    input: LessonInput,
) -> Result<Lesson, AppError> {
    let update = LessonUpdate {
        title: updated_text("title", input.title.as_deref())?,
        description: cleared_text(input.description),
        video_id: cleared_text(input.video_id),
        duration_seconds: non_negative("durationSeconds", input.duration_seconds)?,
        is_preview: input.is_preview,
    };
    store.update_lesson(id, update).await
}

pub async fn delete_lesson(store: &dyn AcademyStore, id: Uuid) -> Result<(), AppError> {
    store.delete_lesson(id).await
}

// ============================================================================
// Quizzes
// ============================================================================

async fn quiz_detail(store: &dyn AcademyStore, quiz: Quiz) -> Result<QuizDetail, AppError> {
    let questions = store.list_questions(quiz.id).await?;
    Ok(QuizDetail { quiz, questions })
}

pub async fn get_quiz(store: &dyn AcademyStore, id: Uuid) -> Result<QuizDetail, AppError> {
    let quiz = store
        .find_quiz(id)
        .await?
        .ok_or_else(|| AppError::not_found("Quiz not found"))?;
    quiz_detail(store, quiz).await
}

pub async fn get_module_quiz(
    store: &dyn AcademyStore,
    module_id: Uuid,
) -> Result<QuizDetail, AppError> {
    get_module(store, module_id).await?;
    let quiz = store
        .find_quiz_by_module(module_id)
        .await?
        .ok_or_else(|| AppError::not_found("Quiz not found"))?;
    quiz_detail(store, quiz).await
}

/// Attach a quiz to a module. A module holds at most one quiz; the store's
/// uniqueness on the module turns a second one into a conflict.
pub async fn create_quiz(
    store: &dyn AcademyStore,
    module_id: Uuid,
    input: QuizInput,
) -> Result<Quiz, AppError> {
    get_module(store, module_id).await?;

    let quiz = NewQuiz {
        title: required_text("title", input.title.as_deref())?,
        description: optional_text(input.description.flatten()),
        passing_score: passing_score(input.passing_score)?.unwrap_or(DEFAULT_PASSING_SCORE),
        time_limit_minutes: non_negative("timeLimitMinutes", input.time_limit_minutes.flatten())?,
        max_attempts: non_negative("maxAttempts", input.max_attempts.flatten())?,
    };
    let quiz = store.create_quiz(module_id, quiz).await?;

    tracing::info!(quiz_id = %quiz.id, module_id = %module_id, "Quiz created");
    Ok(quiz)
}

pub async fn update_quiz(
    store: &dyn AcademyStore,
    id: Uuid,
    input: QuizInput,
) -> Result<Quiz, AppError> {
    let update = QuizUpdate {
        title: updated_text("title", input.title.as_deref())?,
        description: cleared_text(input.description),
        passing_score: passing_score(input.passing_score)?,
        time_limit_minutes: cleared_count("timeLimitMinutes", input.time_limit_minutes)?,
        max_attempts: cleared_count("maxAttempts", input.max_attempts)?,
    };
    store.update_quiz(id, update).await
}

pub async fn delete_quiz(store: &dyn AcademyStore, id: Uuid) -> Result<(), AppError> {
    store.delete_quiz(id).await
}

// ============================================================================
// Questions
// ============================================================================

pub async fn list_questions(
    store: &dyn AcademyStore,
    quiz_id: Uuid,
) -> Result<Vec<Question>, AppError> {
    if store.find_quiz(quiz_id).await?.is_none() {
        return Err(AppError::not_found("Quiz not found"));
    }
    store.list_questions(quiz_id).await
}

pub async fn get_question(store: &dyn AcademyStore, id: Uuid) -> Result<Question, AppError> {
    store
        .find_question(id)
        .await?
        .ok_or_else(|| AppError::not_found("Question not found"))
}

/// Create a question with its options; option order follows the input list
pub async fn create_question(
    store: &dyn AcademyStore,
    quiz_id: Uuid,
    input: QuestionInput,
) -> Result<Question, AppError> {
    let question = NewQuestion {
        question_text: required_text("questionText", input.question_text.as_deref())?,
        question_type: input.question_type.unwrap_or_default(),
        points: non_negative("points", input.points)?.unwrap_or(DEFAULT_POINTS),
        explanation: optional_text(input.explanation.flatten()),
        options: new_options(input.options)?,
    };
    let question = store.create_question(quiz_id, question).await?;

    tracing::info!(
        question_id = %question.id,
        quiz_id = %quiz_id,
        options = question.options.len(),
        "Question created"
    );
    Ok(question)
}

/// Update a question and replace its whole option set with `input.options`
pub async fn update_question(
    store: &dyn AcademyStore,
    id: Uuid,
    input: QuestionInput,
) -> Result<Question, AppError> {
    let update = QuestionUpdate {
        question_text: updated_text("questionText", input.question_text.as_deref())?,
        question_type: input.question_type,
        points: non_negative("points", input.points)?,
        explanation: cleared_text(input.explanation),
    };
    let options = new_options(input.options)?;
    store.update_question(id, update, options).await
}

pub async fn delete_question(store: &dyn AcademyStore, id: Uuid) -> Result<(), AppError> {
    store.delete_question(id).await
}

// ============================================================================
// Options
// ============================================================================

pub async fn list_options(
    store: &dyn AcademyStore,
    question_id: Uuid,
) -> Result<Vec<AnswerOption>, AppError> {
    get_question(store, question_id).await?;
    store.list_options(question_id).await
}

pub async fn create_option(
    store: &dyn AcademyStore,
    question_id: Uuid,
    input: OptionInput,
) -> Result<AnswerOption, AppError> {
    let option = new_option(input)?;
    store.create_option(question_id, option).await
}

pub async fn update_option(
    store: &dyn AcademyStore,
    id: Uuid,
    input: OptionInput,
) -> Result<AnswerOption, AppError> {
    let update = AnswerOptionUpdate {
        option_text: updated_text("optionText", input.option_text.as_deref())?,
        is_correct: input.is_correct,
    };
    store.update_option(id, update).await
}

pub async fn delete_option(store: &dyn AcademyStore, id: Uuid) -> Result<(), AppError> {
    store.delete_option(id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn titled(title: &str) -> FormationInput {
        FormationInput {
            title: Some(title.to_string()),
            ..FormationInput::default()
        }
    }

    fn module(title: &str) -> ModuleInput {
        ModuleInput {
            title: Some(title.to_string()),
            ..ModuleInput::default()
        }
    }

    fn option(text: &str, correct: bool) -> OptionInput {
        OptionInput {
            option_text: Some(text.to_string()),
            is_correct: Some(correct),
        }
    }

    #[tokio::test]
    async fn test_formation_defaults_and_derived_slug() {
        let store = InMemoryStore::new();
        let detail = create_formation(&store, titled("Biohacking 101")).await.unwrap();

        assert_eq!(detail.formation.slug, "biohacking-101");
        assert_eq!(detail.formation.currency, "EUR");
        assert_eq!(detail.formation.level, Level::Beginner);
        assert_eq!(detail.formation.target_role, Role::Client);
        assert!(!detail.formation.is_published);
        assert!(detail.modules.is_empty());
    }

    #[tokio::test]
    async fn test_formation_requires_title_and_valid_slug() {
        let store = InMemoryStore::new();

        let missing = create_formation(&store, FormationInput::default()).await;
        assert!(matches!(missing, Err(AppError::Validation(ValidationError::EmptyField(_)))));

        let bad_slug = create_formation(
            &store,
            FormationInput {
                slug: Some("Not A Slug".to_string()),
                ..titled("Sleep")
            },
        )
        .await;
        assert!(matches!(bad_slug, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let store = InMemoryStore::new();
        create_formation(&store, titled("Breathwork")).await.unwrap();

        let err = create_formation(&store, titled("Breathwork")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_module_order_keeps_gaps() {
        let store = InMemoryStore::new();
        let formation = create_formation(&store, titled("Nutrition")).await.unwrap();
        let fid = formation.formation.id;

        let first = create_module(&store, fid, module("One")).await.unwrap();
        let second = create_module(&store, fid, module("Two")).await.unwrap();
        let third = create_module(&store, fid, module("Three")).await.unwrap();
        assert_eq!(
            (first.order_index, second.order_index, third.order_index),
            (0, 1, 2)
        );

        delete_module(&store, second.id).await.unwrap();
        let fourth = create_module(&store, fid, module("Four")).await.unwrap();
        assert_eq!(fourth.order_index, 3);

        let order: Vec<i32> = list_modules(&store, fid)
            .await
            .unwrap()
            .iter()
            .map(|m| m.order_index)
            .collect();
        assert_eq!(order, vec![0, 2, 3]);
    }

    #[tokio::test]
    async fn test_children_of_missing_parent_are_not_found() {
        let store = InMemoryStore::new();
        let missing = Uuid::new_v4();

        assert!(create_module(&store, missing, module("x")).await.unwrap_err().is_not_found());
        assert!(create_quiz(
            &store,
            missing,
            QuizInput {
                title: Some("Quiz".to_string()),
                ..QuizInput::default()
            }
        )
        .await
        .unwrap_err()
        .is_not_found());
        assert!(list_lessons(&store, missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_second_quiz_for_module_is_conflict() {
        let store = InMemoryStore::new();
        let formation = create_formation(&store, titled("Cold Exposure")).await.unwrap();
        let m = create_module(&store, formation.formation.id, module("Basics"))
            .await
            .unwrap();
        let input = QuizInput {
            title: Some("Check".to_string()),
            ..QuizInput::default()
        };

        let quiz = create_quiz(&store, m.id, input.clone()).await.unwrap();
        assert_eq!(quiz.passing_score, DEFAULT_PASSING_SCORE);

        assert!(create_quiz(&store, m.id, input).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_question_update_replaces_options() {
        let store = InMemoryStore::new();
        let formation = create_formation(&store, titled("Fasting")).await.unwrap();
        let m = create_module(&store, formation.formation.id, module("Intro"))
            .await
            .unwrap();
        let quiz = create_quiz(
            &store,
            m.id,
            QuizInput {
                title: Some("Quiz".to_string()),
                ..QuizInput::default()
            },
        )
        .await
        .unwrap();

        let question = create_question(
            &store,
            quiz.id,
            QuestionInput {
                question_text: Some("Is water allowed?".to_string()),
                question_type: Some(QuestionType::TrueFalse),
                options: vec![option("Yes", true), option("No", false)],
                ..QuestionInput::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(question.points, 1);
        let order: Vec<i32> = question.options.iter().map(|o| o.order_index).collect();
        assert_eq!(order, vec![0, 1]);

        let replaced = update_question(
            &store,
            question.id,
            QuestionInput {
                options: vec![option("Only water", true)],
                ..QuestionInput::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(replaced.question_text, "Is water allowed?");
        assert_eq!(replaced.options.len(), 1);
        assert_eq!(replaced.options[0].option_text, "Only water");

        let cleared = update_question(&store, question.id, QuestionInput::default())
            .await
            .unwrap();
        assert!(cleared.options.is_empty());
        assert!(list_options(&store, question.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_formation_detail_is_nested_and_ordered() {
        let store = InMemoryStore::new();
        let formation = create_formation(&store, titled("Longevity")).await.unwrap();
        let fid = formation.formation.id;
        let m = create_module(&store, fid, module("Sleep")).await.unwrap();
        for title in ["Light", "Temperature"] {
            create_lesson(
                &store,
                m.id,
                LessonInput {
                    title: Some(title.to_string()),
                    ..LessonInput::default()
                },
            )
            .await
            .unwrap();
        }

        let detail = get_formation_detail(&store, fid).await.unwrap();
        assert_eq!(detail.modules.len(), 1);
        let lessons: Vec<&str> = detail.modules[0]
            .lessons
            .iter()
            .map(|l| l.title.as_str())
            .collect();
        assert_eq!(lessons, vec!["Light", "Temperature"]);
        assert!(detail.modules[0].quiz.is_none());
    }

    #[tokio::test]
    async fn test_update_of_missing_record_is_not_found() {
        let store = InMemoryStore::new();
        let err = update_lesson(&store, Uuid::new_v4(), LessonInput::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_passing_score_range() {
        assert!(passing_score(Some(101)).is_err());
        assert!(passing_score(Some(-1)).is_err());
        assert_eq!(passing_score(Some(80)).unwrap(), Some(80));
    }

    #[test]
    fn test_currency_is_normalized() {
        assert_eq!(currency(Some("usd".to_string())).unwrap(), Some("USD".to_string()));
        assert!(currency(Some("euro".to_string())).is_err());
        assert_eq!(currency(None).unwrap(), None);
    }

    #[tokio::test]
    async fn test_accented_and_non_latin_titles_get_readable_slugs() {
        let store = InMemoryStore::new();

        let eveil = create_formation(&store, titled("Éveil")).await.unwrap();
        assert_eq!(eveil.formation.slug, "eveil");

        let guided = create_formation(&store, titled("Méditation guidée")).await.unwrap();
        assert_eq!(guided.formation.slug, "meditation-guidee");

        let zen = create_formation(&store, titled("瞑想")).await.unwrap();
        assert!(!zen.formation.slug.is_empty());

        let symbols = create_formation(&store, titled("★ ★ ★")).await.unwrap();
        assert!(is_valid_slug(&symbols.formation.slug).is_ok());
    }

    #[test]
    fn test_null_and_absent_fields_deserialize_differently() {
        let absent: LessonInput = serde_json::from_str(r#"{"title":"Light"}"#).unwrap();
        assert_eq!(absent.description, None);

        let cleared: LessonInput =
            serde_json::from_str(r#"{"description":null,"videoId":"v1"}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        assert_eq!(cleared.video_id, Some(Some("v1".to_string())));
    }

    #[tokio::test]
    async fn test_null_clears_optional_fields_and_absent_keeps_them() {
        let store = InMemoryStore::new();
        let formation = create_formation(&store, titled("Sleep")).await.unwrap();
        let module = create_module(&store, formation.formation.id, module("Night"))
            .await
            .unwrap();
        let quiz = create_quiz(
            &store,
            module.id,
            QuizInput {
                title: Some("Check".to_string()),
                description: Some(Some("Five questions".to_string())),
                time_limit_minutes: Some(Some(10)),
                ..QuizInput::default()
            },
        )
        .await
        .unwrap();

        let untouched = update_quiz(
            &store,
            quiz.id,
            QuizInput {
                title: Some("Renamed".to_string()),
                ..QuizInput::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(untouched.description.as_deref(), Some("Five questions"));
        assert_eq!(untouched.time_limit_minutes, Some(10));

        let cleared = update_quiz(
            &store,
            quiz.id,
            QuizInput {
                description: Some(Some("   ".to_string())),
                time_limit_minutes: Some(None),
                ..QuizInput::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.title, "Renamed");
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.time_limit_minutes, None);
    }

    #[tokio::test]
    async fn test_negative_value_is_rejected_on_update() {
        let store = InMemoryStore::new();
        let formation = create_formation(&store, titled("Cold")).await.unwrap();

        let err = update_formation(
            &store,
            formation.formation.id,
            FormationInput {
                price: Some(Some(-5.0)),
                ..FormationInput::default()
            },
        )
        .await;
        assert!(matches!(err, Err(AppError::Validation(_))));
    }
}
