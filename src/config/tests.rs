use super::*;

#[test]
fn defaults_resolve_without_any_sources() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.database.backend, StoreBackendKind::Postgres);
    assert_eq!(settings.cache.backend, CacheBackendKind::Memory);
    assert_eq!(settings.cache.max_feed_items.get(), 10);
    assert_eq!(settings.cache.ttl_seconds.get(), 86_400);
    assert_eq!(settings.auth.jwt_issuer, "listings");
    assert!(settings.auth.jwt_secret.is_none());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.cache.max_feed_items = Some(20);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_max_feed_items: Some(5),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.cache.max_feed_items.get(), 5);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn redis_backend_requires_url() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some("redis".to_string());

    let err = Settings::from_raw(raw.clone()).expect_err("missing redis url");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.redis_url",
            ..
        }
    ));

    raw.cache.redis_url = Some("redis://127.0.0.1:6379".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.backend, CacheBackendKind::Redis);
}

#[test]
fn unknown_backends_are_rejected() {
    let mut raw = RawSettings::default();
    raw.database.backend = Some("sqlite".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.cache.backend = Some("memcached".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn zero_feed_bound_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.max_feed_items = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn short_jwt_secret_is_rejected() {
    let mut raw = RawSettings::default();
    raw.auth.jwt_secret = Some("short".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.auth.jwt_secret = Some("a-sufficiently-long-secret".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.auth.require_secret().expect("secret"),
        "a-sufficiently-long-secret"
    );
}

#[test]
fn blank_database_url_counts_as_missing() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.require_url().is_err());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["listings"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from([
        "listings",
        "migrate",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "listings",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-backend",
        "memory",
        "--cache-backend",
        "redis",
        "--cache-redis-url",
        "redis://cache:6379",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.database_backend.as_deref(), Some("memory"));
            assert_eq!(serve.overrides.cache_backend.as_deref(), Some("redis"));
            assert_eq!(
                serve.overrides.cache_redis_url.as_deref(),
                Some("redis://cache:6379")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
