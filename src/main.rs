use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local;
use env_logger::{Env, Target};
use std::io::Write;
use std::time::Duration;

use logoped_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::Mailer,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{context}: {e}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config =
        Config::from_toml().map_err(|e| startup_error("Failed to load configuration", e))?;

    let pool = create_pool(&config.database)
        .await
        .map_err(|e| startup_error("Failed to create database connection pool", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| startup_error("Failed to run database migrations", e))?;

    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);
    let notifier = Mailer::new(config.mail.clone()).shared();

    let settlement_service = SettlementService::new(pool.clone());
    let lesson_service =
        LessonService::new(pool.clone(), settlement_service.clone(), notifier.clone());
    let pass_service = PassService::new(pool.clone());
    let commission_service = CommissionService::new(pool.clone());
    let finance_service = FinanceService::new(pool.clone());
    let payout_service = PayoutService::new(pool.clone(), notifier);

    tasks::spawn_all(
        pass_service.clone(),
        Duration::from_secs(config.tasks.pass_expiry_interval_secs),
    );

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .app_data(web::Data::new(settlement_service.clone()))
            .app_data(web::Data::new(lesson_service.clone()))
            .app_data(web::Data::new(pass_service.clone()))
            .app_data(web::Data::new(commission_service.clone()))
            .app_data(web::Data::new(finance_service.clone()))
            .app_data(web::Data::new(payout_service.clone()))
            .configure(swagger_config)
            .configure(handlers::health_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::lesson_config)
                    .configure(handlers::pass_config)
                    .configure(handlers::commission_config)
                    .configure(handlers::finance_config)
                    .configure(handlers::payout_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
