/// Content administration (ADMIN or EMPLOYEE)
///
/// Thin handlers over `services::content`. Create answers 201, delete 204,
/// everything else 200 with the record as JSON.

use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::services::content::{
    self, FormationInput, LessonInput, ModuleInput, OptionInput, QuestionInput, QuizInput,
};
use crate::store::AcademyStore;

type Store = web::Data<dyn AcademyStore>;

// Formations

pub async fn list_formations(store: Store) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(content::list_formations(store.get_ref()).await?))
}

pub async fn create_formation(
    user: AuthenticatedUser,
    form: web::Json<FormationInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let detail = content::create_formation(store.get_ref(), form.into_inner()).await?;
    tracing::info!(formation_id = %detail.formation.id, by = %user.user_id, "Formation added");
    Ok(HttpResponse::Created().json(detail))
}

/// GET /admin/formations/{id}: the nested tree
pub async fn get_formation(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    let detail = content::get_formation_detail(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

pub async fn update_formation(
    path: web::Path<Uuid>,
    form: web::Json<FormationInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let formation =
        content::update_formation(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(formation))
}

pub async fn delete_formation(
    path: web::Path<Uuid>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    content::delete_formation(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// Modules

pub async fn list_modules(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    let modules = content::list_modules(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(modules))
}

pub async fn create_module(
    path: web::Path<Uuid>,
    form: web::Json<ModuleInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let module =
        content::create_module(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Created().json(module))
}

pub async fn get_module(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(content::get_module(store.get_ref(), path.into_inner()).await?))
}

pub async fn update_module(
    path: web::Path<Uuid>,
    form: web::Json<ModuleInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let module =
        content::update_module(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(module))
}

pub async fn delete_module(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    content::delete_module(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// Lessons

pub async fn list_lessons(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    let lessons = content::list_lessons(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(lessons))
}

pub async fn create_lesson(
    path: web::Path<Uuid>,
    form: web::Json<LessonInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let lesson =
        content::create_lesson(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Created().json(lesson))
}

pub async fn get_lesson(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(content::get_lesson(store.get_ref(), path.into_inner()).await?))
}

pub async fn update_lesson(
    path: web::Path<Uuid>,
    form: web::Json<LessonInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let lesson =
        content::update_lesson(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(lesson))
}

pub async fn delete_lesson(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    content::delete_lesson(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// Quizzes

/// GET /admin/modules/{id}/quiz
pub async fn get_module_quiz(
    path: web::Path<Uuid>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let quiz = content::get_module_quiz(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(quiz))
}

/// POST /admin/modules/{id}/quiz
///
/// # Errors
/// - 400 `CONFLICT`: the module already has a quiz
/// - 404: unknown module
pub async fn create_quiz(
    path: web::Path<Uuid>,
    form: web::Json<QuizInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let quiz = content::create_quiz(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Created().json(quiz))
}

pub async fn get_quiz(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(content::get_quiz(store.get_ref(), path.into_inner()).await?))
}

pub async fn update_quiz(
    path: web::Path<Uuid>,
    form: web::Json<QuizInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let quiz = content::update_quiz(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(quiz))
}

pub async fn delete_quiz(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    content::delete_quiz(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// Questions

pub async fn list_questions(
    path: web::Path<Uuid>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let questions = content::list_questions(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(questions))
}

pub async fn create_question(
    path: web::Path<Uuid>,
    form: web::Json<QuestionInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let question =
        content::create_question(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Created().json(question))
}

pub async fn get_question(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(content::get_question(store.get_ref(), path.into_inner()).await?))
}

/// PUT /admin/questions/{id}
///
/// Replaces all options with the `options` array of the body. Leaving the
/// array out removes every option.
pub async fn update_question(
    path: web::Path<Uuid>,
    form: web::Json<QuestionInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let question =
        content::update_question(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(question))
}

pub async fn delete_question(
    path: web::Path<Uuid>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    content::delete_question(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// Options

pub async fn list_options(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    let options = content::list_options(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(options))
}

pub async fn create_option(
    path: web::Path<Uuid>,
    form: web::Json<OptionInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let option =
        content::create_option(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Created().json(option))
}

pub async fn update_option(
    path: web::Path<Uuid>,
    form: web::Json<OptionInput>,
    store: Store,
) -> Result<HttpResponse, AppError> {
    let option =
        content::update_option(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(option))
}

pub async fn delete_option(path: web::Path<Uuid>, store: Store) -> Result<HttpResponse, AppError> {
    content::delete_option(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
