use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{next_order_index, AcademyStore};
use crate::error::AppError;
use crate::models::{
    AnswerOption, AnswerOptionUpdate, Enrollment, Formation, FormationUpdate, Lesson,
    LessonUpdate, Module, ModuleUpdate, NewAnswerOption, NewFormation, NewLesson, NewModule,
    NewQuestion, NewQuiz, NewUser, Question, QuestionUpdate, Quiz, QuizUpdate, User, UserProfile,
    UserUpdate,
};

/// Store kept in process memory.
///
/// Every operation runs under one lock, which makes each call atomic and
/// gives the same uniqueness and cascade guarantees as the Postgres schema.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, UserProfile>,
    enrollments: Vec<Enrollment>,
    formations: HashMap<Uuid, Formation>,
    modules: HashMap<Uuid, Module>,
    lessons: HashMap<Uuid, Lesson>,
    quizzes: HashMap<Uuid, Quiz>,
    // stored without options; they live in `options`
    questions: HashMap<Uuid, Question>,
    options: HashMap<Uuid, AnswerOption>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
    }
}

impl State {
    fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }

    fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.formations
            .values()
            .any(|f| f.slug == slug && Some(f.id) != except)
    }

    fn options_of(&self, question_id: Uuid) -> Vec<AnswerOption> {
        sorted(
            self.options
                .values()
                .filter(|o| o.question_id == question_id)
                .cloned()
                .collect(),
            |o| o.order_index,
        )
    }

    fn with_options(&self, question: &Question) -> Question {
        Question {
            options: self.options_of(question.id),
            ..question.clone()
        }
    }

    fn insert_options(&mut self, question_id: Uuid, options: Vec<NewAnswerOption>) {
        for (position, option) in options.into_iter().enumerate() {
            let id = Uuid::new_v4();
            self.options.insert(
                id,
                AnswerOption {
                    id,
                    question_id,
                    option_text: option.option_text,
                    is_correct: option.is_correct,
                    order_index: position as i32,
                },
            );
        }
    }

    fn remove_question_tree(&mut self, question_id: Uuid) {
        self.questions.remove(&question_id);
        self.options.retain(|_, o| o.question_id != question_id);
    }

    fn remove_quiz_tree(&mut self, quiz_id: Uuid) {
        self.quizzes.remove(&quiz_id);
        let question_ids: Vec<Uuid> = self
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .map(|q| q.id)
            .collect();
        for id in question_ids {
            self.remove_question_tree(id);
        }
    }

    fn remove_module_tree(&mut self, module_id: Uuid) {
        self.modules.remove(&module_id);
        self.lessons.retain(|_, l| l.module_id != module_id);
        let quiz_ids: Vec<Uuid> = self
            .quizzes
            .values()
            .filter(|q| q.module_id == module_id)
            .map(|q| q.id)
            .collect();
        for id in quiz_ids {
            self.remove_quiz_tree(id);
        }
    }

    fn remove_formation_tree(&mut self, formation_id: Uuid) {
        self.formations.remove(&formation_id);
        self.enrollments.retain(|e| e.formation_id != formation_id);
        let module_ids: Vec<Uuid> = self
            .modules
            .values()
            .filter(|m| m.formation_id == formation_id)
            .map(|m| m.id)
            .collect();
        for id in module_ids {
            self.remove_module_tree(id);
        }
    }
}

fn sorted<T>(mut items: Vec<T>, key: impl Fn(&T) -> i32) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn apply_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

#[async_trait]
impl AcademyStore for InMemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .state()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_reset_token(&self, token_hash: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .state()?
            .users
            .values()
            .find(|u| u.reset_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let state = self.state()?;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.state()?;
        if state.email_taken(&user.email) {
            return Err(AppError::conflict("A user with this email already exists"));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_active: user.is_active,
            email_verified: user.email_verified,
            reset_token_hash: None,
            reset_token_expiry: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.id, created.clone());
        state
            .profiles
            .insert(created.id, UserProfile::empty(created.id));
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, AppError> {
        let mut state = self.state()?;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("User not found"))?;

        apply_opt(&mut user.first_name, update.first_name);
        apply_opt(&mut user.last_name, update.last_name);
        apply(&mut user.role, update.role);
        apply(&mut user.is_active, update.is_active);
        apply_opt(&mut user.avatar_url, update.avatar_url);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut state = self.state()?;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("User not found"))?;

        user.password_hash = password_hash.to_string();
        user.reset_token_hash = None;
        user.reset_token_expiry = None;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.state()?;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("User not found"))?;

        user.reset_token_hash = Some(token_hash.to_string());
        user.reset_token_expiry = Some(expires_at);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state()?;
        if state.users.remove(&id).is_none() {
            return Err(AppError::not_found("User not found"));
        }
        state.profiles.remove(&id);
        state.enrollments.retain(|e| e.user_id != id);
        Ok(())
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        Ok(self.state()?.profiles.get(&user_id).cloned())
    }

    async fn grant_enrollment(
        &self,
        user_id: Uuid,
        formation_id: Uuid,
    ) -> Result<Enrollment, AppError> {
        let mut state = self.state()?;
        if !state.users.contains_key(&user_id) {
            return Err(AppError::not_found("User not found"));
        }
        if !state.formations.contains_key(&formation_id) {
            return Err(AppError::not_found("Formation not found"));
        }
        if let Some(existing) = state
            .enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.formation_id == formation_id)
        {
            return Ok(existing.clone());
        }

        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            user_id,
            formation_id,
            granted_at: Utc::now(),
        };
        state.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn list_enrollments(&self, user_id: Uuid) -> Result<Vec<Enrollment>, AppError> {
        Ok(self
            .state()?
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_formations(&self) -> Result<Vec<Formation>, AppError> {
        let state = self.state()?;
        let mut formations: Vec<Formation> = state.formations.values().cloned().collect();
        formations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(formations)
    }

    async fn find_formation(&self, id: Uuid) -> Result<Option<Formation>, AppError> {
        Ok(self.state()?.formations.get(&id).cloned())
    }

    async fn create_formation(&self, formation: NewFormation) -> Result<Formation, AppError> {
        let mut state = self.state()?;
        if state.slug_taken(&formation.slug, None) {
            return Err(AppError::conflict("A formation with this slug already exists"));
        }

        let now = Utc::now();
        let created = Formation {
            id: Uuid::new_v4(),
            title: formation.title,
            slug: formation.slug,
            description: formation.description,
            level: formation.level,
            target_role: formation.target_role,
            is_published: formation.is_published,
            duration_minutes: formation.duration_minutes,
            price: formation.price,
            currency: formation.currency,
            thumbnail_url: formation.thumbnail_url,
            created_at: now,
            updated_at: now,
        };
        state.formations.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_formation(
        &self,
        id: Uuid,
        update: FormationUpdate,
    ) -> Result<Formation, AppError> {
        let mut state = self.state()?;
        if let Some(slug) = &update.slug {
            if state.slug_taken(slug, Some(id)) {
                return Err(AppError::conflict("A formation with this slug already exists"));
            }
        }
        let formation = state
            .formations
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Formation not found"))?;

        apply(&mut formation.title, update.title);
        apply(&mut formation.slug, update.slug);
        apply(&mut formation.description, update.description);
        apply(&mut formation.level, update.level);
        apply(&mut formation.target_role, update.target_role);
        apply(&mut formation.is_published, update.is_published);
        apply(&mut formation.duration_minutes, update.duration_minutes);
        apply(&mut formation.price, update.price);
        apply(&mut formation.currency, update.currency);
        apply(&mut formation.thumbnail_url, update.thumbnail_url);
        formation.updated_at = Utc::now();
        Ok(formation.clone())
    }

    async fn delete_formation(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state()?;
        if !state.formations.contains_key(&id) {
            return Err(AppError::not_found("Formation not found"));
        }
        state.remove_formation_tree(id);
        Ok(())
    }

    async fn list_modules(&self, formation_id: Uuid) -> Result<Vec<Module>, AppError> {
        let state = self.state()?;
        Ok(sorted(
            state
                .modules
                .values()
                .filter(|m| m.formation_id == formation_id)
                .cloned()
                .collect(),
            |m| m.order_index,
        ))
    }

    async fn find_module(&self, id: Uuid) -> Result<Option<Module>, AppError> {
        Ok(self.state()?.modules.get(&id).cloned())
    }

    async fn create_module(
        &self,
        formation_id: Uuid,
        module: NewModule,
    ) -> Result<Module, AppError> {
        let mut state = self.state()?;
        if !state.formations.contains_key(&formation_id) {
            return Err(AppError::not_found("Formation not found"));
        }

        let order_index = next_order_index(
            state
                .modules
                .values()
                .filter(|m| m.formation_id == formation_id)
                .map(|m| m.order_index),
        );
        let now = Utc::now();
        let created = Module {
            id: Uuid::new_v4(),
            formation_id,
            title: module.title,
            description: module.description,
            duration_minutes: module.duration_minutes,
            order_index,
            created_at: now,
            updated_at: now,
        };
        state.modules.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_module(&self, id: Uuid, update: ModuleUpdate) -> Result<Module, AppError> {
        let mut state = self.state()?;
        let module = state
            .modules
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Module not found"))?;

        apply(&mut module.title, update.title);
        apply(&mut module.description, update.description);
        apply(&mut module.duration_minutes, update.duration_minutes);
        module.updated_at = Utc::now();
        Ok(module.clone())
    }

    async fn delete_module(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state()?;
        if !state.modules.contains_key(&id) {
            return Err(AppError::not_found("Module not found"));
        }
        state.remove_module_tree(id);
        Ok(())
    }

    async fn list_lessons(&self, module_id: Uuid) -> Result<Vec<Lesson>, AppError> {
        let state = self.state()?;
        Ok(sorted(
            state
                .lessons
                .values()
                .filter(|l| l.module_id == module_id)
                .cloned()
                .collect(),
            |l| l.order_index,
        ))
    }

    async fn find_lesson(&self, id: Uuid) -> Result<Option<Lesson>, AppError> {
        Ok(self.state()?.lessons.get(&id).cloned())
    }

    async fn create_lesson(&self, module_id: Uuid, lesson: NewLesson) -> Result<Lesson, AppError> {
        let mut state = self.state()?;
        if !state.modules.contains_key(&module_id) {
            return Err(AppError::not_found("Module not found"));
        }

        let order_index = next_order_index(
            state
                .lessons
                .values()
                .filter(|l| l.module_id == module_id)
                .map(|l| l.order_index),
        );
        let now = Utc::now();
        let created = Lesson {
            id: Uuid::new_v4(),
            module_id,
            title: lesson.title,
            description: lesson.description,
            video_id: lesson.video_id,
            duration_seconds: lesson.duration_seconds,
            is_preview: lesson.is_preview,
            order_index,
            created_at: now,
            updated_at: now,
        };
        state.lessons.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_lesson(&self, id: Uuid, update: LessonUpdate) -> Result<Lesson, AppError> {
        let mut state = self.state()?;
        let lesson = state
            .lessons
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Lesson not found"))?;

        apply(&mut lesson.title, update.title);
        apply(&mut lesson.description, update.description);
        apply(&mut lesson.video_id, update.video_id);
        apply(&mut lesson.duration_seconds, update.duration_seconds);
        apply(&mut lesson.is_preview, update.is_preview);
        lesson.updated_at = Utc::now();
        Ok(lesson.clone())
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<(), AppError> {
        self.state()?
            .lessons
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Lesson not found"))
    }

    async fn find_quiz(&self, id: Uuid) -> Result<Option<Quiz>, AppError> {
        Ok(self.state()?.quizzes.get(&id).cloned())
    }

    async fn find_quiz_by_module(&self, module_id: Uuid) -> Result<Option<Quiz>, AppError> {
        Ok(self
            .state()?
            .quizzes
            .values()
            .find(|q| q.module_id == module_id)
            .cloned())
    }

    async fn create_quiz(&self, module_id: Uuid, quiz: NewQuiz) -> Result<Quiz, AppError> {
        let mut state = self.state()?;
        if !state.modules.contains_key(&module_id) {
            return Err(AppError::not_found("Module not found"));
        }
        if state.quizzes.values().any(|q| q.module_id == module_id) {
            return Err(AppError::conflict("A quiz already exists for this module"));
        }

        let now = Utc::now();
        let created = Quiz {
            id: Uuid::new_v4(),
            module_id,
            title: quiz.title,
            description: quiz.description,
            passing_score: quiz.passing_score,
            time_limit_minutes: quiz.time_limit_minutes,
            max_attempts: quiz.max_attempts,
            created_at: now,
            updated_at: now,
        };
        state.quizzes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_quiz(&self, id: Uuid, update: QuizUpdate) -> Result<Quiz, AppError> {
        let mut state = self.state()?;
        let quiz = state
            .quizzes
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Quiz not found"))?;

        apply(&mut quiz.title, update.title);
        apply(&mut quiz.description, update.description);
        apply(&mut quiz.passing_score, update.passing_score);
        apply(&mut quiz.time_limit_minutes, update.time_limit_minutes);
        apply(&mut quiz.max_attempts, update.max_attempts);
        quiz.updated_at = Utc::now();
        Ok(quiz.clone())
    }

    async fn delete_quiz(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state()?;
        if !state.quizzes.contains_key(&id) {
            return Err(AppError::not_found("Quiz not found"));
        }
        state.remove_quiz_tree(id);
        Ok(())
    }

    async fn list_questions(&self, quiz_id: Uuid) -> Result<Vec<Question>, AppError> {
        let state = self.state()?;
        let questions = state
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .map(|q| state.with_options(q))
            .collect();
        Ok(sorted(questions, |q| q.order_index))
    }

    async fn find_question(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        let state = self.state()?;
        Ok(state.questions.get(&id).map(|q| state.with_options(q)))
    }

    async fn create_question(
        &self,
        quiz_id: Uuid,
        question: NewQuestion,
    ) -> Result<Question, AppError> {
        let mut state = self.state()?;
        if !state.quizzes.contains_key(&quiz_id) {
            return Err(AppError::not_found("Quiz not found"));
        }

        let order_index = next_order_index(
            state
                .questions
                .values()
                .filter(|q| q.quiz_id == quiz_id)
                .map(|q| q.order_index),
        );
        let created = Question {
            id: Uuid::new_v4(),
            quiz_id,
            question_text: question.question_text,
            question_type: question.question_type,
            points: question.points,
            explanation: question.explanation,
            order_index,
            options: Vec::new(),
        };
        state.questions.insert(created.id, created.clone());
        state.insert_options(created.id, question.options);
        Ok(state.with_options(&created))
    }

    async fn update_question(
        &self,
        id: Uuid,
        update: QuestionUpdate,
        options: Vec<NewAnswerOption>,
    ) -> Result<Question, AppError> {
        let mut state = self.state()?;
        let question = state
            .questions
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Question not found"))?;

        apply(&mut question.question_text, update.question_text);
        apply(&mut question.question_type, update.question_type);
        apply(&mut question.points, update.points);
        apply(&mut question.explanation, update.explanation);
        let updated = question.clone();

        state.options.retain(|_, o| o.question_id != id);
        state.insert_options(id, options);
        Ok(state.with_options(&updated))
    }

    async fn delete_question(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state()?;
        if !state.questions.contains_key(&id) {
            return Err(AppError::not_found("Question not found"));
        }
        state.remove_question_tree(id);
        Ok(())
    }

    async fn list_options(&self, question_id: Uuid) -> Result<Vec<AnswerOption>, AppError> {
        Ok(self.state()?.options_of(question_id))
    }

    async fn create_option(
        &self,
        question_id: Uuid,
        option: NewAnswerOption,
    ) -> Result<AnswerOption, AppError> {
        let mut state = self.state()?;
        if !state.questions.contains_key(&question_id) {
            return Err(AppError::not_found("Question not found"));
        }

        let order_index = next_order_index(
            state
                .options
                .values()
                .filter(|o| o.question_id == question_id)
                .map(|o| o.order_index),
        );
        let created = AnswerOption {
            id: Uuid::new_v4(),
            question_id,
            option_text: option.option_text,
            is_correct: option.is_correct,
            order_index,
        };
        state.options.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_option(
        &self,
        id: Uuid,
        update: AnswerOptionUpdate,
    ) -> Result<AnswerOption, AppError> {
        let mut state = self.state()?;
        let option = state
            .options
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Option not found"))?;

        apply(&mut option.option_text, update.option_text);
        apply(&mut option.is_correct, update.is_correct);
        Ok(option.clone())
    }

    async fn delete_option(&self, id: Uuid) -> Result<(), AppError> {
        self.state()?
            .options
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Option not found"))
    }
}
