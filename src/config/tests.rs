use super::*;

#[test]
fn defaults_resolve_without_any_sources() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert!(settings.database.url.is_none());
    assert!(settings.cache.redis_url.is_none());
    assert_eq!(settings.blob.bucket, "user-comments");
    assert_eq!(settings.blob.region, "us-east-1");
    assert!(settings.blob.endpoint.is_none());
    assert_eq!(settings.comments.cache_ttl, Duration::from_secs(3600));
    assert_eq!(settings.comments.page_size.get(), 10);
    assert_eq!(settings.comments.image_url_ttl, Duration::from_secs(86_400));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.comments.page_size = Some(25);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        comments_page_size: Some(5),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.comments.page_size.get(), 5);
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
fn blank_urls_are_treated_as_unset() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    raw.cache.redis_url = Some(String::new());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
    assert!(settings.cache.redis_url.is_none());
}

#[test]
fn zero_page_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.comments.page_size = Some(0);

    let err = Settings::from_raw(raw).expect_err("invalid page size");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "comments.page_size",
            ..
        }
    ));
}

#[test]
fn image_url_ttl_is_capped_at_seven_days() {
    let mut raw = RawSettings::default();
    raw.comments.image_url_ttl_seconds = Some(MAX_IMAGE_URL_TTL_SECS);
    Settings::from_raw(raw.clone()).expect("seven days is allowed");

    raw.comments.image_url_ttl_seconds = Some(MAX_IMAGE_URL_TTL_SECS + 1);
    let err = Settings::from_raw(raw).expect_err("too long");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "comments.image_url_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn redis_url_must_use_redis_scheme() {
    let mut raw = RawSettings::default();
    raw.cache.redis_url = Some("http://localhost:6379".to_string());

    let err = Settings::from_raw(raw).expect_err("wrong scheme");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.redis_url",
            ..
        }
    ));
}

#[test]
fn blob_endpoint_is_parsed() {
    let mut raw = RawSettings::default();
    raw.blob.endpoint = Some("http://localhost:9000".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    let endpoint = settings.blob.endpoint.expect("endpoint");
    assert_eq!(endpoint.host_str(), Some("localhost"));
    assert_eq!(endpoint.port(), Some(9000));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["commentary"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from([
        "commentary",
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
        "commentary",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-redis-url",
        "redis://cache:6379",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(
                serve.overrides.cache_redis_url.as_deref(),
                Some("redis://cache:6379")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn cache_ttl_above_ceiling_is_rejected() {
    let mut raw = RawSettings::default();
    raw.comments.cache_ttl_seconds = Some(u64::MAX);

    let err = Settings::from_raw(raw).expect_err("ttl too long");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "comments.cache_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn cache_ttl_at_ceiling_is_accepted() {
    let mut raw = RawSettings::default();
    raw.comments.cache_ttl_seconds = Some(MAX_CACHE_TTL_SECS);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.comments.cache_ttl,
        Duration::from_secs(MAX_CACHE_TTL_SECS)
    );
}

#[test]
fn page_size_above_ceiling_is_rejected() {
    for page_size in [MAX_PAGE_SIZE + 1, 100_000] {
        let mut raw = RawSettings::default();
        raw.comments.page_size = Some(page_size);

        let err = Settings::from_raw(raw).expect_err("page size too large");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "comments.page_size",
                ..
            }
        ));
    }

    let mut raw = RawSettings::default();
    raw.comments.page_size = Some(MAX_PAGE_SIZE);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.comments.page_size.get(), MAX_PAGE_SIZE);
}

#[test]
fn process_cache_capacity_defaults_and_rejects_zero() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert_eq!(settings.cache.process_capacity.get(), 10_000);

    let mut raw = RawSettings::default();
    raw.cache.process_capacity = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero capacity");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.process_capacity",
            ..
        }
    ));
}
