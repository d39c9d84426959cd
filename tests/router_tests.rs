use std::sync::Arc;

use http::{Method, StatusCode};
use pathrouter::endpoint::{Arg, Args, ParamKind, ParamSpec};
use pathrouter::error::ConfigError;
use pathrouter::router::{ParamType, PathRouter, Route, RouteSegment};
use pathrouter::server::Reply;
use uuid::Uuid;

fn noop(_: Args<'_>) -> anyhow::Result<Reply> {
    Ok(Reply::None)
}

fn typed_router(template: &str, name: &str, param_type: ParamType) -> PathRouter {
    let mut router = PathRouter::new();
    router
        .add_route(Route::get(template).param(name, param_type).handler(noop))
        .unwrap();
    router
}

fn path_arg(router: &PathRouter, path: &str, name: &str) -> Result<Arg, StatusCode> {
    router
        .resolve_route("GET", Some(path), None, None)
        .map(|(_, mut kwargs)| kwargs.remove(name).unwrap_or(Arg::Null))
        .map_err(|err| err.status())
}

#[test]
fn test_literal_routes_resolve_exactly() {
    let paths = ["/", "/a", "/a/b", "/a/b/c", "/z"];
    let mut router = PathRouter::new();
    for path in paths {
        router.add_route(Route::get(path).handler(noop)).unwrap();
    }

    for path in paths {
        let (endpoint, _) = router.resolve_route("GET", Some(path), None, None).unwrap();
        assert_eq!(endpoint.route_path(), path);
    }
    for path in ["/b", "/a/c", "/a/b/c/d", "/a/b/", "/A"] {
        let err = router.resolve_route("GET", Some(path), None, None).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(err.path(), Some(path));
    }
}

#[test]
fn test_int_conversion_values() {
    let router = typed_router("/n/{v}", "v", ParamType::INT);
    for (segment, expected) in [
        ("0", 0),
        ("-0", 0),
        ("7", 7),
        ("-12", -12),
        ("007", 7),
        ("9223372036854775807", i64::MAX),
        ("-9223372036854775808", i64::MIN),
    ] {
        assert_eq!(
            path_arg(&router, &format!("/n/{segment}"), "v"),
            Ok(Arg::Int(expected)),
            "{segment}"
        );
    }
    for segment in ["abc", "", "1.5", "+1", "-", "1e3", "9223372036854775808"] {
        assert_eq!(
            path_arg(&router, &format!("/n/{segment}"), "v"),
            Err(StatusCode::NOT_FOUND),
            "{segment:?}"
        );
    }
}

#[test]
fn test_bool_conversion_values() {
    let router = typed_router("/b/{v}", "v", ParamType::BOOL);
    for segment in ["1", "true", "yes", "on"] {
        assert_eq!(path_arg(&router, &format!("/b/{segment}"), "v"), Ok(Arg::Bool(true)));
    }
    for segment in ["0", "false", "no", "off"] {
        assert_eq!(path_arg(&router, &format!("/b/{segment}"), "v"), Ok(Arg::Bool(false)));
    }
    for segment in ["2", "TRUE", "y", "enabled"] {
        assert_eq!(
            path_arg(&router, &format!("/b/{segment}"), "v"),
            Err(StatusCode::NOT_FOUND)
        );
    }
}

#[test]
fn test_uuid_and_str_conversion() {
    let router = typed_router("/u/{v}", "v", ParamType::UUID);
    let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    assert_eq!(path_arg(&router, &format!("/u/{id}"), "v"), Ok(Arg::Uuid(id)));
    assert_eq!(
        path_arg(&router, &format!("/u/{}", id.to_string().to_uppercase()), "v"),
        Ok(Arg::Uuid(id))
    );
    assert_eq!(path_arg(&router, "/u/not-a-uuid", "v"), Err(StatusCode::NOT_FOUND));

    let router = typed_router("/s/{v}", "v", ParamType::STR);
    assert_eq!(
        path_arg(&router, "/s/hello%20world", "v"),
        Ok(Arg::Str("hello%20world".to_string()))
    );
}

#[test]
fn test_conflicts_detected_at_registration() {
    let mut router = PathRouter::new();
    router
        .add_route(Route::get("/x/{id}").param("id", ParamType::INT).handler(noop))
        .unwrap();

    let conflicting = [
        Route::post("/x/{id}").param("id", ParamType::STR).handler(noop),
        Route::post("/x/{key}").param("key", ParamType::INT).handler(noop),
        Route::post("/x/{id:uuid}/y").untyped("id").handler(noop),
    ];
    for route in conflicting {
        let template = route.path().to_string();
        let err = router.add_route(route).unwrap_err();
        assert!(
            matches!(err, ConfigError::IncompatibleParameter { .. }),
            "{template}: {err}"
        );
    }

    // the original route still resolves
    assert!(router.resolve_route("GET", Some("/x/5"), None, None).is_ok());
}

#[test]
fn test_variadic_parameters_do_not_need_defaults() {
    let mut router = PathRouter::new();
    router
        .add_route(
            Route::get("/v")
                .var_positional("args")
                .var_keyword("kwargs")
                .arg(ParamSpec::new("limit").default_value(5))
                .handler(noop),
        )
        .unwrap();
    let (_, kwargs) = router.resolve_route("GET", Some("/v"), None, None).unwrap();
    assert_eq!(kwargs.get("limit"), Some(&Arg::Int(5)));
    assert!(!kwargs.contains_key("args"));
}

#[test]
fn test_variadic_parameter_cannot_be_on_path() {
    let mut router = PathRouter::new();
    let err = router
        .add_route(
            Route::get("/v/{args:str}")
                .arg(ParamSpec::new("args").kind(ParamKind::VarPositional))
                .handler(noop),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "/v/{args:str}: path parameter args value passing by keyword not supported"
    );
}

#[test]
fn test_error_messages_name_the_route() {
    let mut router = PathRouter::new();
    let err = router
        .add_route(Route::get("/p/{missing}").handler(noop))
        .unwrap_err();
    assert!(err.to_string().starts_with("/p/{missing}"), "{err}");
}

#[test]
fn test_shared_handler_across_routes() {
    let handler: pathrouter::endpoint::RawHandler = Arc::new(noop);
    let mut router = PathRouter::new();
    router
        .add_route(Route::get("/one").shared_handler(Arc::clone(&handler)))
        .unwrap();
    router
        .add_route(Route::delete("/two").shared_handler(handler))
        .unwrap();

    let methods: Vec<(String, Method)> = router
        .routes()
        .into_iter()
        .map(|route| (route.template(), route.method))
        .collect();
    assert_eq!(
        methods,
        vec![
            ("/one".to_string(), Method::GET),
            ("/two".to_string(), Method::DELETE),
        ]
    );
}

#[test]
fn test_route_segments_are_reported() {
    let mut router = PathRouter::new();
    router
        .add_route(
            Route::get("/orgs/{org}/repos/{id:int}")
                .param("org", ParamType::STR)
                .untyped("id")
                .handler(noop),
        )
        .unwrap();
    let routes = router.routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(
        routes[0].segments,
        vec![
            RouteSegment::Literal("orgs".to_string()),
            RouteSegment::Parameter {
                name: "org".to_string(),
                param_type: ParamType::STR
            },
            RouteSegment::Literal("repos".to_string()),
            RouteSegment::Parameter {
                name: "id".to_string(),
                param_type: ParamType::INT
            },
        ]
    );
    assert_eq!(routes[0].template(), "/orgs/{org:str}/repos/{id:int}");
}

#[test]
fn test_resolution_is_shareable_across_threads() {
    let router = Arc::new(typed_router("/n/{v}", "v", ParamType::INT));
    let handles: Vec<_> = (0..4_i64)
        .map(|i| {
            let router = Arc::clone(&router);
            std::thread::spawn(move || {
                let (_, kwargs) = router
                    .resolve_route("GET", Some(&format!("/n/{i}")), None, None)
                    .unwrap();
                kwargs["v"].as_int()
            })
        })
        .collect();
    let results: Vec<Option<i64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![Some(0), Some(1), Some(2), Some(3)]);
}
