use crate::{
    api::{
        attendance, audit_log, leave_request, notifications, official_time, overall_attendance,
        page_access, payroll, person, reference, remittance,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::extractor_error,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Extractor rejections
    cfg.app_data(
        web::JsonConfig::default()
            .limit(config.max_upload_bytes)
            .error_handler(|err, _req| extractor_error(err)),
    )
    .app_data(web::QueryConfig::default().error_handler(|err, _req| extractor_error(err)))
    .app_data(web::PathConfig::default().error_handler(|err, _req| extractor_error(err)));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(
                web::scope("/users")
                    .service(web::resource("/register").route(web::post().to(handlers::register)))
                    .service(
                        web::resource("/bulk-register")
                            .route(web::post().to(handlers::bulk_register)),
                    ),
            )
            .service(
                web::scope("/personal-info")
                    .service(
                        web::resource("")
                            .route(web::get().to(person::list_people))
                            .route(web::post().to(person::create_person)),
                    )
                    .service(
                        web::resource("/employee/{employee_number}")
                            .route(web::get().to(person::get_person_by_employee_number)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(person::get_person))
                            .route(web::put().to(person::update_person))
                            .route(web::delete().to(person::delete_person)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::create_attendance)),
                    )
                    .service(
                        web::resource("/auto-save").route(web::post().to(attendance::auto_save)),
                    )
                    // CSV body, capped separately from JSON
                    .service(
                        web::resource("/import")
                            .app_data(web::PayloadConfig::new(config.max_upload_bytes))
                            .route(web::post().to(attendance::import_csv)),
                    )
                    .service(
                        web::resource("/raw")
                            .route(web::get().to(attendance::list_punches))
                            .route(web::post().to(attendance::add_punches)),
                    )
                    .service(web::resource("/compile").route(web::post().to(attendance::compile)))
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                    .service(
                        web::resource("/check-out").route(web::put().to(attendance::check_out)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            )
            .service(
                web::scope("/official-time")
                    .service(
                        web::resource("/entry/{id}")
                            .route(web::delete().to(official_time::delete_schedule_day)),
                    )
                    .service(
                        web::resource("/{employee_number}")
                            .route(web::get().to(official_time::get_schedule))
                            .route(web::put().to(official_time::save_schedule)),
                    ),
            )
            .service(
                web::scope("/overall-attendance")
                    .service(web::resource("").route(web::get().to(overall_attendance::list_overall)))
                    .service(
                        web::resource("/compute")
                            .route(web::post().to(overall_attendance::compute)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(overall_attendance::get_overall))
                            .route(web::put().to(overall_attendance::update_overall))
                            .route(web::delete().to(overall_attendance::delete_overall)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // /leave/{id}
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    // /leave/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    // /leave/{id}/reject
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    // /payroll
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll::create_payroll))
                            .route(web::get().to(payroll::list_payrolls)),
                    )
                    .service(
                        web::resource("/with-remittance")
                            .route(web::get().to(payroll::with_remittance)),
                    )
                    .service(web::resource("/search").route(web::get().to(payroll::search_payroll)))
                    .service(
                        web::resource("/finalize").route(web::post().to(payroll::finalize_payroll)),
                    )
                    .service(
                        web::resource("/processed").route(web::get().to(payroll::list_processed)),
                    )
                    .service(
                        web::resource("/processed/{id}")
                            .route(web::delete().to(payroll::delete_processed)),
                    )
                    .service(
                        web::resource("/release").route(web::post().to(payroll::release_payroll)),
                    )
                    .service(
                        web::resource("/released").route(web::get().to(payroll::list_released)),
                    )
                    .service(
                        web::resource("/payslip/{employee_number}")
                            .route(web::get().to(payroll::payslip)),
                    )
                    // /payroll/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payroll::get_payroll))
                            .route(web::put().to(payroll::update_payroll))
                            .route(web::delete().to(payroll::delete_payroll)),
                    ),
            )
            .service(
                web::scope("/remittance")
                    .service(web::resource("").route(web::get().to(remittance::list_remittances)))
                    .service(
                        web::resource("/entry/{id}")
                            .route(web::delete().to(remittance::delete_remittance)),
                    )
                    .service(
                        web::resource("/{employee_number}")
                            .route(web::get().to(remittance::get_remittance))
                            .route(web::put().to(remittance::save_remittance)),
                    ),
            )
            .service(
                web::scope("/philhealth")
                    .service(web::resource("").route(web::get().to(remittance::list_philhealth)))
                    // PUT takes an employee number, DELETE a row id
                    .service(
                        web::resource("/{key}")
                            .route(web::put().to(remittance::save_philhealth))
                            .route(web::delete().to(remittance::delete_philhealth)),
                    ),
            )
            .service(
                web::scope("/departments")
                    .service(
                        web::resource("")
                            .route(web::get().to(reference::list_departments))
                            .route(web::post().to(reference::create_department)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(reference::update_department))
                            .route(web::delete().to(reference::delete_department)),
                    ),
            )
            .service(
                web::scope("/department-assignments")
                    .service(web::resource("").route(web::get().to(reference::list_assignments)))
                    // PUT takes an employee number, DELETE a row id
                    .service(
                        web::resource("/{key}")
                            .route(web::put().to(reference::save_assignment))
                            .route(web::delete().to(reference::delete_assignment)),
                    ),
            )
            .service(
                web::scope("/items")
                    .service(
                        web::resource("")
                            .route(web::get().to(reference::list_items))
                            .route(web::post().to(reference::create_item)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(reference::get_item))
                            .route(web::put().to(reference::update_item))
                            .route(web::delete().to(reference::delete_item)),
                    ),
            )
            .service(
                web::scope("/salary-grades")
                    .service(
                        web::resource("")
                            .route(web::get().to(reference::list_salary_grades))
                            .route(web::post().to(reference::create_salary_grade)),
                    )
                    .service(web::resource("/rate").route(web::get().to(reference::salary_rate)))
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(reference::update_salary_grade))
                            .route(web::delete().to(reference::delete_salary_grade)),
                    ),
            )
            .service(web::resource("/audit-log").route(web::get().to(audit_log::list_audit_log)))
            .service(
                web::scope("/page-access")
                    .service(
                        web::resource("/{employee_number}")
                            .route(web::get().to(page_access::list_page_access))
                            .route(web::post().to(page_access::grant_page_access)),
                    )
                    .service(
                        web::resource("/{employee_number}/{page_id}")
                            .route(web::delete().to(page_access::revoke_page_access)),
                    ),
            )
            .service(
                web::resource("/notifications/stream")
                    .route(web::get().to(notifications::stream_notifications)),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token and rotates the refresh_token
