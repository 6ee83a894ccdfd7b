use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::AcademyStore;
use crate::error::AppError;
use crate::models::{
    AnswerOption, AnswerOptionUpdate, Enrollment, Formation, FormationUpdate, Lesson,
    LessonUpdate, Module, ModuleUpdate, NewAnswerOption, NewFormation, NewLesson, NewModule,
    NewQuestion, NewQuiz, NewUser, Question, QuestionUpdate, Quiz, QuizUpdate, User, UserProfile,
    UserUpdate,
};

/// Postgres-backed store.
///
/// Uniqueness, cascades and foreign keys are enforced by the schema in
/// `migrations/`; constraint violations are mapped to `AppError` by
/// `From<sqlx::Error>`. Child inserts lock the parent row so the next order
/// index is computed and used inside one transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    is_active: bool,
    email_verified: bool,
    reset_token_hash: Option<String>,
    reset_token_expiry: Option<DateTime<Utc>>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            role: row.role.parse().map_err(AppError::Internal)?,
            is_active: row.is_active,
            email_verified: row.email_verified,
            reset_token_hash: row.reset_token_hash,
            reset_token_expiry: row.reset_token_expiry,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    user_id: Uuid,
    phone: Option<String>,
    bio: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        UserProfile {
            id: row.id,
            user_id: row.user_id,
            phone: row.phone,
            bio: row.bio,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EnrollmentRow {
    id: Uuid,
    user_id: Uuid,
    formation_id: Uuid,
    granted_at: DateTime<Utc>,
}

impl From<EnrollmentRow> for Enrollment {
    fn from(row: EnrollmentRow) -> Self {
        Enrollment {
            id: row.id,
            user_id: row.user_id,
            formation_id: row.formation_id,
            granted_at: row.granted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FormationRow {
    id: Uuid,
    title: String,
    slug: String,
    description: Option<String>,
    level: String,
    target_role: String,
    is_published: bool,
    duration_minutes: Option<i32>,
    price: Option<f64>,
    currency: String,
    thumbnail_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FormationRow> for Formation {
    type Error = AppError;

    fn try_from(row: FormationRow) -> Result<Self, Self::Error> {
        Ok(Formation {
            id: row.id,
            title: row.title,
            slug: row.slug,
            description: row.description,
            level: row.level.parse().map_err(AppError::Internal)?,
            target_role: row.target_role.parse().map_err(AppError::Internal)?,
            is_published: row.is_published,
            duration_minutes: row.duration_minutes,
            price: row.price,
            currency: row.currency,
            thumbnail_url: row.thumbnail_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ModuleRow {
    id: Uuid,
    formation_id: Uuid,
    title: String,
    description: Option<String>,
    duration_minutes: Option<i32>,
    order_index: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ModuleRow> for Module {
    fn from(row: ModuleRow) -> Self {
        Module {
            id: row.id,
            formation_id: row.formation_id,
            title: row.title,
            description: row.description,
            duration_minutes: row.duration_minutes,
            order_index: row.order_index,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LessonRow {
    id: Uuid,
    module_id: Uuid,
    title: String,
    description: Option<String>,
    video_id: Option<String>,
    duration_seconds: i32,
    is_preview: bool,
    order_index: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LessonRow> for Lesson {
    fn from(row: LessonRow) -> Self {
        Lesson {
            id: row.id,
            module_id: row.module_id,
            title: row.title,
            description: row.description,
            video_id: row.video_id,
            duration_seconds: row.duration_seconds,
            is_preview: row.is_preview,
            order_index: row.order_index,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QuizRow {
    id: Uuid,
    module_id: Uuid,
    title: String,
    description: Option<String>,
    passing_score: i32,
    time_limit_minutes: Option<i32>,
    max_attempts: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        Quiz {
            id: row.id,
            module_id: row.module_id,
            title: row.title,
            description: row.description,
            passing_score: row.passing_score,
            time_limit_minutes: row.time_limit_minutes,
            max_attempts: row.max_attempts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: Uuid,
    quiz_id: Uuid,
    question_text: String,
    question_type: String,
    points: i32,
    explanation: Option<String>,
    order_index: i32,
}

impl QuestionRow {
    fn into_question(self, options: Vec<AnswerOption>) -> Result<Question, AppError> {
        Ok(Question {
            id: self.id,
            quiz_id: self.quiz_id,
            question_text: self.question_text,
            question_type: self.question_type.parse().map_err(AppError::Internal)?,
            points: self.points,
            explanation: self.explanation,
            order_index: self.order_index,
            options,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: Uuid,
    question_id: Uuid,
    option_text: String,
    is_correct: bool,
    order_index: i32,
}

impl From<OptionRow> for AnswerOption {
    fn from(row: OptionRow) -> Self {
        AnswerOption {
            id: row.id,
            question_id: row.question_id,
            option_text: row.option_text,
            is_correct: row.is_correct,
            order_index: row.order_index,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Lock a parent row for the rest of the transaction, or report it missing.
/// `table` is always a literal from this module.
async fn lock_parent(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    id: Uuid,
    label: &str,
) -> Result<(), AppError> {
    let found: Option<Uuid> =
        sqlx::query_scalar(&format!("SELECT id FROM {} WHERE id = $1 FOR UPDATE", table))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(AppError::not_found(format!("{} not found", label))),
    }
}

/// `max(order_index) + 1` within the scope, 0 when empty. Call with the
/// parent row locked.
async fn next_order_index(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    parent_column: &str,
    parent_id: Uuid,
) -> Result<i32, AppError> {
    let next: i32 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(MAX(order_index) + 1, 0) FROM {} WHERE {} = $1",
        table, parent_column
    ))
    .bind(parent_id)
    .fetch_one(&mut *tx)
    .await?;
    Ok(next)
}

async fn insert_options(
    tx: &mut Transaction<'_, Postgres>,
    question_id: Uuid,
    options: Vec<NewAnswerOption>,
) -> Result<Vec<AnswerOption>, AppError> {
    let mut inserted = Vec::with_capacity(options.len());
    for (position, option) in options.into_iter().enumerate() {
        let row = sqlx::query_as::<_, OptionRow>(
            r#"
            INSERT INTO answer_options (id, question_id, option_text, is_correct, order_index)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(question_id)
        .bind(option.option_text)
        .bind(option.is_correct)
        .bind(position as i32)
        .fetch_one(&mut *tx)
        .await?;
        inserted.push(row.into());
    }
    Ok(inserted)
}

fn deleted_or_not_found(rows_affected: u64, label: &str) -> Result<(), AppError> {
    if rows_affected == 0 {
        Err(AppError::not_found(format!("{} not found", label)))
    } else {
        Ok(())
    }
}

impl PgStore {
    async fn options_for(&self, question_ids: &[Uuid]) -> Result<Vec<AnswerOption>, AppError> {
        let rows = sqlx::query_as::<_, OptionRow>(
            r#"
            SELECT * FROM answer_options
            WHERE question_id = ANY($1)
            ORDER BY order_index ASC
            "#,
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AnswerOption::from).collect())
    }
}

// ============================================================================
// Store implementation
// ============================================================================

#[async_trait]
impl AcademyStore for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_reset_token(&self, token_hash: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE reset_token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role,
                               is_active, email_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.email_verified)
        .bind(now)
        .fetch_one(&mut tx)
        .await?;

        sqlx::query("INSERT INTO user_profiles (id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(row.id)
            .bind(now)
            .execute(&mut tx)
            .await?;

        tx.commit().await?;
        User::try_from(row)
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, AppError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active),
                avatar_url = COALESCE($6, avatar_url),
                updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.is_active)
        .bind(update.avatar_url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
        .and_then(User::try_from)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, reset_token_hash = NULL, reset_token_expiry = NULL,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        deleted_or_not_found(result.rows_affected(), "User")
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $2, reset_token_expiry = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        deleted_or_not_found(result.rows_affected(), "User")
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted_or_not_found(result.rows_affected(), "User")
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        Ok(
            sqlx::query_as::<_, ProfileRow>("SELECT * FROM user_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
                .map(UserProfile::from),
        )
    }

    async fn grant_enrollment(
        &self,
        user_id: Uuid,
        formation_id: Uuid,
    ) -> Result<Enrollment, AppError> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let row = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            INSERT INTO enrollments (id, user_id, formation_id, granted_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, formation_id)
            DO UPDATE SET granted_at = enrollments.granted_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(formation_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            err if err.is_not_found() => AppError::not_found("User or formation not found"),
            err => err,
        })?;
        Ok(row.into())
    }

    async fn list_enrollments(&self, user_id: Uuid) -> Result<Vec<Enrollment>, AppError> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            "SELECT * FROM enrollments WHERE user_id = $1 ORDER BY granted_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Enrollment::from).collect())
    }

    async fn list_formations(&self) -> Result<Vec<Formation>, AppError> {
        sqlx::query_as::<_, FormationRow>("SELECT * FROM formations ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Formation::try_from)
            .collect()
    }

    async fn find_formation(&self, id: Uuid) -> Result<Option<Formation>, AppError> {
        sqlx::query_as::<_, FormationRow>("SELECT * FROM formations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Formation::try_from)
            .transpose()
    }

    async fn create_formation(&self, formation: NewFormation) -> Result<Formation, AppError> {
        let row = sqlx::query_as::<_, FormationRow>(
            r#"
            INSERT INTO formations (id, title, slug, description, level, target_role,
                                    is_published, duration_minutes, price, currency,
                                    thumbnail_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&formation.title)
        .bind(&formation.slug)
        .bind(&formation.description)
        .bind(formation.level.as_str())
        .bind(formation.target_role.as_str())
        .bind(formation.is_published)
        .bind(formation.duration_minutes)
        .bind(formation.price)
        .bind(&formation.currency)
        .bind(&formation.thumbnail_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Formation::try_from(row)
    }

    async fn update_formation(
        &self,
        id: Uuid,
        update: FormationUpdate,
    ) -> Result<Formation, AppError> {
        sqlx::query_as::<_, FormationRow>(
            r#"
            UPDATE formations SET
                title = COALESCE($2, title),
                slug = COALESCE($3, slug),
                description = CASE WHEN $4 THEN $5::TEXT ELSE description END,
                level = COALESCE($6, level),
                target_role = COALESCE($7, target_role),
                is_published = COALESCE($8, is_published),
                duration_minutes = CASE WHEN $9 THEN $10::INTEGER ELSE duration_minutes END,
                price = CASE WHEN $11 THEN $12::DOUBLE PRECISION ELSE price END,
                currency = COALESCE($13, currency),
                thumbnail_url = CASE WHEN $14 THEN $15::TEXT ELSE thumbnail_url END,
                updated_at = $16
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.title)
        .bind(update.slug)
        .bind(update.description.is_some())
        .bind(update.description.flatten())
        .bind(update.level.map(|l| l.as_str()))
        .bind(update.target_role.map(|r| r.as_str()))
        .bind(update.is_published)
        .bind(update.duration_minutes.is_some())
        .bind(update.duration_minutes.flatten())
        .bind(update.price.is_some())
        .bind(update.price.flatten())
        .bind(update.currency)
        .bind(update.thumbnail_url.is_some())
        .bind(update.thumbnail_url.flatten())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Formation not found"))
        .and_then(Formation::try_from)
    }

    async fn delete_formation(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM formations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted_or_not_found(result.rows_affected(), "Formation")
    }

    async fn list_modules(&self, formation_id: Uuid) -> Result<Vec<Module>, AppError> {
        let rows = sqlx::query_as::<_, ModuleRow>(
            "SELECT * FROM modules WHERE formation_id = $1 ORDER BY order_index ASC",
        )
        .bind(formation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Module::from).collect())
    }

    async fn find_module(&self, id: Uuid) -> Result<Option<Module>, AppError> {
        Ok(sqlx::query_as::<_, ModuleRow>("SELECT * FROM modules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Module::from))
    }

    async fn create_module(
        &self,
        formation_id: Uuid,
        module: NewModule,
    ) -> Result<Module, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_parent(&mut tx, "formations", formation_id, "Formation").await?;
        let order_index = next_order_index(&mut tx, "modules", "formation_id", formation_id).await?;

        let row = sqlx::query_as::<_, ModuleRow>(
            r#"
            INSERT INTO modules (id, formation_id, title, description, duration_minutes,
                                 order_index, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(formation_id)
        .bind(&module.title)
        .bind(&module.description)
        .bind(module.duration_minutes)
        .bind(order_index)
        .bind(Utc::now())
        .fetch_one(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_module(&self, id: Uuid, update: ModuleUpdate) -> Result<Module, AppError> {
        let row = sqlx::query_as::<_, ModuleRow>(
            r#"
            UPDATE modules SET
                title = COALESCE($2, title),
                description = CASE WHEN $3 THEN $4::TEXT ELSE description END,
                duration_minutes = CASE WHEN $5 THEN $6::INTEGER ELSE duration_minutes END,
                updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.title)
        .bind(update.description.is_some())
        .bind(update.description.flatten())
        .bind(update.duration_minutes.is_some())
        .bind(update.duration_minutes.flatten())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Module not found"))?;
        Ok(row.into())
    }

    async fn delete_module(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted_or_not_found(result.rows_affected(), "Module")
    }

    async fn list_lessons(&self, module_id: Uuid) -> Result<Vec<Lesson>, AppError> {
        let rows = sqlx::query_as::<_, LessonRow>(
            "SELECT * FROM lessons WHERE module_id = $1 ORDER BY order_index ASC",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Lesson::from).collect())
    }

    async fn find_lesson(&self, id: Uuid) -> Result<Option<Lesson>, AppError> {
        Ok(sqlx::query_as::<_, LessonRow>("SELECT * FROM lessons WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Lesson::from))
    }

    async fn create_lesson(&self, module_id: Uuid, lesson: NewLesson) -> Result<Lesson, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_parent(&mut tx, "modules", module_id, "Module").await?;
        let order_index = next_order_index(&mut tx, "lessons", "module_id", module_id).await?;

        let row = sqlx::query_as::<_, LessonRow>(
            r#"
            INSERT INTO lessons (id, module_id, title, description, video_id, duration_seconds,
                                 is_preview, order_index, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(module_id)
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(&lesson.video_id)
        .bind(lesson.duration_seconds)
        .bind(lesson.is_preview)
        .bind(order_index)
        .bind(Utc::now())
        .fetch_one(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_lesson(&self, id: Uuid, update: LessonUpdate) -> Result<Lesson, AppError> {
        let row = sqlx::query_as::<_, LessonRow>(
            r#"
            UPDATE lessons SET
                title = COALESCE($2, title),
                description = CASE WHEN $3 THEN $4::TEXT ELSE description END,
                video_id = CASE WHEN $5 THEN $6::TEXT ELSE video_id END,
                duration_seconds = COALESCE($7, duration_seconds),
                is_preview = COALESCE($8, is_preview),
                updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.title)
        .bind(update.description.is_some())
        .bind(update.description.flatten())
        .bind(update.video_id.is_some())
        .bind(update.video_id.flatten())
        .bind(update.duration_seconds)
        .bind(update.is_preview)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Lesson not found"))?;
        Ok(row.into())
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted_or_not_found(result.rows_affected(), "Lesson")
    }

    async fn find_quiz(&self, id: Uuid) -> Result<Option<Quiz>, AppError> {
        Ok(sqlx::query_as::<_, QuizRow>("SELECT * FROM quizzes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Quiz::from))
    }

    async fn find_quiz_by_module(&self, module_id: Uuid) -> Result<Option<Quiz>, AppError> {
        Ok(
            sqlx::query_as::<_, QuizRow>("SELECT * FROM quizzes WHERE module_id = $1")
                .bind(module_id)
                .fetch_optional(&self.pool)
                .await?
                .map(Quiz::from),
        )
    }

    async fn create_quiz(&self, module_id: Uuid, quiz: NewQuiz) -> Result<Quiz, AppError> {
        // quizzes_module_id_key turns a second quiz into a conflict
        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            INSERT INTO quizzes (id, module_id, title, description, passing_score,
                                 time_limit_minutes, max_attempts, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(module_id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(quiz.passing_score)
        .bind(quiz.time_limit_minutes)
        .bind(quiz.max_attempts)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            err if err.is_not_found() => AppError::not_found("Module not found"),
            err => err,
        })?;
        Ok(row.into())
    }

    async fn update_quiz(&self, id: Uuid, update: QuizUpdate) -> Result<Quiz, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            UPDATE quizzes SET
                title = COALESCE($2, title),
                description = CASE WHEN $3 THEN $4::TEXT ELSE description END,
                passing_score = COALESCE($5, passing_score),
                time_limit_minutes = CASE WHEN $6 THEN $7::INTEGER ELSE time_limit_minutes END,
                max_attempts = CASE WHEN $8 THEN $9::INTEGER ELSE max_attempts END,
                updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.title)
        .bind(update.description.is_some())
        .bind(update.description.flatten())
        .bind(update.passing_score)
        .bind(update.time_limit_minutes.is_some())
        .bind(update.time_limit_minutes.flatten())
        .bind(update.max_attempts.is_some())
        .bind(update.max_attempts.flatten())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Quiz not found"))?;
        Ok(row.into())
    }

    async fn delete_quiz(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted_or_not_found(result.rows_affected(), "Quiz")
    }

    async fn list_questions(&self, quiz_id: Uuid) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT * FROM questions WHERE quiz_id = $1 ORDER BY order_index ASC",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|q| q.id).collect();
        let mut options_by_question: HashMap<Uuid, Vec<AnswerOption>> = HashMap::new();
        for option in self.options_for(&ids).await? {
            options_by_question
                .entry(option.question_id)
                .or_default()
                .push(option);
        }

        rows.into_iter()
            .map(|row| {
                let options = options_by_question.remove(&row.id).unwrap_or_default();
                row.into_question(options)
            })
            .collect()
    }

    async fn find_question(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let options = self.options_for(&[row.id]).await?;
                row.into_question(options).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn create_question(
        &self,
        quiz_id: Uuid,
        question: NewQuestion,
    ) -> Result<Question, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_parent(&mut tx, "quizzes", quiz_id, "Quiz").await?;
        let order_index = next_order_index(&mut tx, "questions", "quiz_id", quiz_id).await?;

        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            INSERT INTO questions (id, quiz_id, question_text, question_type, points,
                                   explanation, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(quiz_id)
        .bind(&question.question_text)
        .bind(question.question_type.as_str())
        .bind(question.points)
        .bind(&question.explanation)
        .bind(order_index)
        .fetch_one(&mut tx)
        .await?;

        let options = insert_options(&mut tx, row.id, question.options).await?;
        tx.commit().await?;
        row.into_question(options)
    }

    async fn update_question(
        &self,
        id: Uuid,
        update: QuestionUpdate,
        options: Vec<NewAnswerOption>,
    ) -> Result<Question, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            UPDATE questions SET
                question_text = COALESCE($2, question_text),
                question_type = COALESCE($3, question_type),
                points = COALESCE($4, points),
                explanation = CASE WHEN $5 THEN $6::TEXT ELSE explanation END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.question_text)
        .bind(update.question_type.map(|t| t.as_str()))
        .bind(update.points)
        .bind(update.explanation.is_some())
        .bind(update.explanation.flatten())
        .fetch_optional(&mut tx)
        .await?
        .ok_or_else(|| AppError::not_found("Question not found"))?;

        sqlx::query("DELETE FROM answer_options WHERE question_id = $1")
            .bind(id)
            .execute(&mut tx)
            .await?;
        let options = insert_options(&mut tx, id, options).await?;

        tx.commit().await?;
        row.into_question(options)
    }

    async fn delete_question(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted_or_not_found(result.rows_affected(), "Question")
    }

    async fn list_options(&self, question_id: Uuid) -> Result<Vec<AnswerOption>, AppError> {
        self.options_for(&[question_id]).await
    }

    async fn create_option(
        &self,
        question_id: Uuid,
        option: NewAnswerOption,
    ) -> Result<AnswerOption, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_parent(&mut tx, "questions", question_id, "Question").await?;
        let order_index =
            next_order_index(&mut tx, "answer_options", "question_id", question_id).await?;

        let row = sqlx::query_as::<_, OptionRow>(
            r#"
            INSERT INTO answer_options (id, question_id, option_text, is_correct, order_index)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(question_id)
        .bind(&option.option_text)
        .bind(option.is_correct)
        .bind(order_index)
        .fetch_one(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_option(
        &self,
        id: Uuid,
        update: AnswerOptionUpdate,
    ) -> Result<AnswerOption, AppError> {
        let row = sqlx::query_as::<_, OptionRow>(
            r#"
            UPDATE answer_options SET
                option_text = COALESCE($2, option_text),
                is_correct = COALESCE($3, is_correct)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.option_text)
        .bind(update.is_correct)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Option not found"))?;
        Ok(row.into())
    }

    async fn delete_option(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM answer_options WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted_or_not_found(result.rows_affected(), "Option")
    }
}
