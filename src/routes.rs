use crate::{
    api::{attendance, enrollment, payments, payroll, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

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
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            ),
    );

    // The gateway redirects the payer here and also calls it server to
    // server, so both live outside the authenticated scope.
    cfg.service(
        web::scope("/payments")
            .service(web::resource("/callback").route(web::get().to(payments::callback)))
            .service(web::resource("/return").route(web::get().to(payments::callback))),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(web::resource("").route(web::get().to(attendance::list_staff)))
                    .service(
                        web::resource("/clock-in").route(web::post().to(attendance::clock_in)),
                    )
                    .service(
                        web::resource("/clock-out").route(web::post().to(attendance::clock_out)),
                    )
                    // admin corrections
                    .service(web::resource("/manual").route(web::post().to(attendance::manual_add)))
                    .service(
                        web::resource("/sheet")
                            .route(web::post().to(attendance::submit_sheet))
                            .route(web::get().to(attendance::sheet_for_date)),
                    )
                    .service(
                        web::resource("/{id}/resume").route(web::put().to(attendance::resume)),
                    )
                    .service(
                        web::resource("/{id}/times").route(web::put().to(attendance::correct_times)),
                    ),
            )
            .service(
                web::scope("/payments")
                    .service(web::resource("").route(web::get().to(payments::list)))
                    .service(web::resource("/initiate").route(web::post().to(payments::initiate)))
                    .service(
                        web::resource("/{tx_ref}/verify").route(web::post().to(payments::verify)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    // /payroll
                    .service(web::resource("").route(web::get().to(payroll::list)))
                    .service(web::resource("/generate").route(web::post().to(payroll::generate)))
                    .service(web::resource("/disburse").route(web::post().to(payroll::disburse)))
                    .service(web::resource("/{id}/paid").route(web::put().to(payroll::mark_paid))),
            )
            .service(
                web::scope("/enrollments")
                    .service(
                        web::resource("")
                            .route(web::post().to(enrollment::create))
                            .route(web::get().to(enrollment::list)),
                    )
                    .service(web::resource("/{id}").route(web::put().to(enrollment::update)))
                    .service(
                        web::resource("/{id}/active").route(web::put().to(enrollment::set_active)),
                    ),
            )
            .service(
                web::scope("/users")
                    .service(
                        web::resource("")
                            .route(web::post().to(users::create))
                            .route(web::get().to(users::list)),
                    )
                    .service(web::resource("/{id}").route(web::delete().to(users::delete)))
                    .service(
                        web::resource("/{id}/financials")
                            .route(web::put().to(users::update_financials)),
                    )
                    .service(web::resource("/{id}/active").route(web::put().to(users::set_active))),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)
//
// API REQUEST
//  └─ Authorization: Bearer access_token
//
// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token
