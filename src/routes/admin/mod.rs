/// Guarded administration API mounted under `/admin`

pub mod content;
pub mod users;

use actix_web::web;

/// `/admin/users/...`
pub fn user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::get().to(users::list_users))
            .route(web::post().to(users::create_user)),
    )
    .service(
        web::resource("/{id}")
            .route(web::get().to(users::get_user))
            .route(web::put().to(users::update_user))
            .route(web::delete().to(users::delete_user)),
    )
    .service(
        web::resource("/{id}/enrollments")
            .route(web::get().to(users::list_enrollments))
            .route(web::post().to(users::grant_enrollment)),
    );
}

/// `/admin/...` content routes
pub fn content_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/formations")
            .route(web::get().to(content::list_formations))
            .route(web::post().to(content::create_formation)),
    )
    .service(
        web::resource("/formations/{id}")
            .route(web::get().to(content::get_formation))
            .route(web::put().to(content::update_formation))
            .route(web::delete().to(content::delete_formation)),
    )
    .service(
        web::resource("/formations/{id}/modules")
            .route(web::get().to(content::list_modules))
            .route(web::post().to(content::create_module)),
    )
    .service(
        web::resource("/modules/{id}")
            .route(web::get().to(content::get_module))
            .route(web::put().to(content::update_module))
            .route(web::delete().to(content::delete_module)),
    )
    .service(
        web::resource("/modules/{id}/lessons")
            .route(web::get().to(content::list_lessons))
            .route(web::post().to(content::create_lesson)),
    )
    .service(
        web::resource("/modules/{id}/quiz")
            .route(web::get().to(content::get_module_quiz))
            .route(web::post().to(content::create_quiz)),
    )
    .service(
        web::resource("/lessons/{id}")
            .route(web::get().to(content::get_lesson))
            .route(web::put().to(content::update_lesson))
            .route(web::delete().to(content::delete_lesson)),
    )
    .service(
        web::resource("/quizzes/{id}")
            .route(web::get().to(content::get_quiz))
            .route(web::put().to(content::update_quiz))
            .route(web::delete().to(content::delete_quiz)),
    )
    .service(
        web::resource("/quizzes/{id}/questions")
            .route(web::get().to(content::list_questions))
            .route(web::post().to(content::create_question)),
    )
    .service(
        web::resource("/questions/{id}")
            .route(web::get().to(content::get_question))
            .route(web::put().to(content::update_question))
            .route(web::delete().to(content::delete_question)),
    )
    .service(
        web::resource("/questions/{id}/options")
            .route(web::get().to(content::list_options))
            .route(web::post().to(content::create_option)),
    )
    .service(
        web::resource("/options/{id}")
            .route(web::put().to(content::update_option))
            .route(web::delete().to(content::delete_option)),
    );
}
