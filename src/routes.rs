use crate::{
    api::{attendance, classroom, timetable},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let governor_config = GovernorConfigBuilder::default()
            .per_millisecond(60_000 / u64::from(requests_per_min))
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            // both inputs are clamped non-zero above
            .unwrap_or_default();
        Governor::new(&governor_config)
    }

    let login_limiter = build_limiter(config.rate_login_per_min);
    let register_limiter = build_limiter(config.rate_register_per_min);
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter)
                    .route(web::post().to(handlers::register)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .configure(protected),
    );
}

/// Routes that need an authenticated principal.
pub fn protected(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::me)
        .service(
            web::scope("/attendance")
                // /attendance
                .service(web::resource("").route(web::post().to(attendance::submit_attendance)))
                // /attendance/student
                .service(
                    web::resource("/student").route(web::get().to(attendance::student_attendance)),
                )
                // /attendance/session
                .service(
                    web::resource("/session").route(web::get().to(attendance::session_attendance)),
                ),
        )
        .service(
            web::scope("/classrooms")
                // /classrooms
                .service(
                    web::resource("")
                        .route(web::post().to(classroom::create_classroom))
                        .route(web::get().to(classroom::list_classrooms)),
                )
                // /classrooms/{id}
                .service(
                    web::resource("/{id}")
                        .route(web::get().to(classroom::get_classroom))
                        .route(web::put().to(classroom::update_classroom)),
                )
                // /classrooms/{id}/students
                .service(
                    web::resource("/{id}/students")
                        .route(web::get().to(classroom::list_students))
                        .route(web::post().to(classroom::enroll_student)),
                )
                // /classrooms/{id}/students/{student_id}
                .service(
                    web::resource("/{id}/students/{student_id}")
                        .route(web::delete().to(classroom::drop_student)),
                ),
        )
        .service(
            web::scope("/timetable")
                // /timetable
                .service(
                    web::resource("")
                        .route(web::get().to(timetable::get_timetable))
                        .route(web::put().to(timetable::upsert_slot)),
                )
                // /timetable/{id}
                .service(web::resource("/{id}").route(web::delete().to(timetable::delete_slot))),
        );
}

// LOGIN
//  └─ access_token (ACCESS_TOKEN_TTL, default 1h)

// API REQUEST
//  └─ Authorization: Bearer access_token
//       └─ auth_middleware → AuthUser in request extensions
