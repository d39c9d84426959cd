use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::json;

use super::*;
use crate::config::{AppConfig, DEFAULT_STR_CONTENT_TYPE};
use crate::error::ConfigError;
use crate::ids::RequestId;

/// Reader that counts how often it is polled.
struct CountingReader {
    inner: io::Cursor<Vec<u8>>,
    reads: Arc<AtomicUsize>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(buf)
    }
}

fn with_request<T>(config: &AppConfig, mut environ: Environ, f: impl FnOnce(&Request<'_>) -> T) -> T {
    let input = environ.take_input();
    let request = Request::new(config, &environ, input, RequestId::new());
    f(&request)
}

#[test]
fn test_cookie_parsing() {
    let jar = CookieJar::parse("session=abc; theme=\"dark\"; session=ignored; broken; =x");
    assert_eq!(jar.get("session"), Some("abc"));
    assert_eq!(jar.get("theme"), Some("dark"));
    assert!(!jar.contains("broken"));
    assert_eq!(jar.len(), 2);
    assert!(CookieJar::parse("").is_empty());
}

#[test]
fn test_request_cookies_from_header() {
    let config = AppConfig::default();
    let environ = Environ::new("GET", "/").with_header("cookie", "a=1; b=2");
    with_request(&config, environ, |request| {
        assert_eq!(request.cookies().get("a"), Some("1"));
        assert_eq!(request.cookies().get("b"), Some("2"));
    });

    let environ = Environ::new("GET", "/");
    with_request(&config, environ, |request| {
        assert!(request.cookies().is_empty());
    });
}

#[test]
fn test_content_length() {
    let config = AppConfig::default();
    with_request(&config, Environ::new("GET", "/"), |request| {
        assert_eq!(request.content_length().unwrap(), 0);
    });

    let environ = Environ::new("POST", "/").with_header("content-length", "12");
    with_request(&config, environ, |request| {
        assert_eq!(request.content_length().unwrap(), 12);
    });

    let environ = Environ::new("POST", "/").with_header("content-length", "twelve");
    with_request(&config, environ, |request| {
        assert_eq!(
            request.content_length().unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    });
}

#[test]
fn test_content_type_is_normalized() {
    let config = AppConfig::default();
    let environ =
        Environ::new("POST", "/").with_header("content-type", "Application/JSON; charset=UTF-8");
    with_request(&config, environ, |request| {
        assert_eq!(request.content_type(), Some("application/json"));
    });
    with_request(&config, Environ::new("GET", "/"), |request| {
        assert_eq!(request.content_type(), None);
    });
}

#[test]
fn test_body_errors() {
    let config = AppConfig::default().max_content_length(Some(4));

    with_request(&config, Environ::new("POST", "/"), |request| {
        assert_eq!(request.body().unwrap_err().status(), StatusCode::LENGTH_REQUIRED);
    });

    let environ = Environ::new("POST", "/").with_header("content-length", "-3");
    with_request(&config, environ, |request| {
        assert_eq!(request.body().unwrap_err().status(), StatusCode::BAD_REQUEST);
    });

    let environ = Environ::new("POST", "/").with_body(b"too long".to_vec());
    with_request(&config, environ, |request| {
        assert_eq!(
            request.body().unwrap_err().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    });

    let environ = Environ::new("POST", "/").with_header("content-length", "0");
    with_request(&config, environ, |request| {
        assert!(request.body().unwrap().is_empty());
    });
}

#[test]
fn test_body_read_once_and_limited_to_declared_length() {
    let reads = Arc::new(AtomicUsize::new(0));
    let reader = CountingReader {
        inner: io::Cursor::new(b"abcdefgh".to_vec()),
        reads: Arc::clone(&reads),
    };
    let config = AppConfig::default();
    let environ = Environ::new("POST", "/")
        .with_header("content-length", "4")
        .with_input(Box::new(reader));

    with_request(&config, environ, |request| {
        assert_eq!(request.body().unwrap(), b"abcd");
        let after_first = reads.load(Ordering::SeqCst);
        assert_eq!(request.body().unwrap(), b"abcd");
        assert_eq!(reads.load(Ordering::SeqCst), after_first);
    });
}

#[test]
fn test_json_decoding() {
    let config = AppConfig::default();
    let environ = Environ::new("POST", "/")
        .with_header("content-type", "application/json")
        .with_body(br#"{"a":[1,2]}"#.to_vec());
    with_request(&config, environ, |request| {
        assert_eq!(request.json().unwrap(), &json!({"a": [1, 2]}));
        assert!(std::ptr::eq(request.json().unwrap(), request.json().unwrap()));
    });

    let environ = Environ::new("POST", "/")
        .with_header("content-type", "application/json")
        .with_body(b"{not json".to_vec());
    with_request(&config, environ, |request| {
        assert_eq!(request.json().unwrap_err().status(), StatusCode::BAD_REQUEST);
    });

    let environ = Environ::new("POST", "/")
        .with_header("content-type", "text/plain")
        .with_body(b"{}".to_vec());
    with_request(&config, environ, |request| {
        assert_eq!(
            request.json().unwrap_err().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    });
}

#[test]
fn test_form_decoding() {
    let config = AppConfig::default();
    let environ = Environ::new("POST", "/")
        .with_header("content-type", CONTENT_TYPE_FORM_URLENCODED)
        .with_body(b"a=1&b=x%20y&a=2".to_vec());
    with_request(&config, environ, |request| {
        let form = request.form().unwrap();
        assert_eq!(form.get_first("a"), Some("1"));
        assert_eq!(form.get_all("a").len(), 2);
        assert_eq!(form.get_first("b"), Some("x y"));
    });

    let environ = Environ::new("POST", "/")
        .with_header("content-type", CONTENT_TYPE_FORM_URLENCODED)
        .with_input(Box::new(io::Cursor::new(b"a=1".to_vec())));
    with_request(&config, environ, |request| {
        assert_eq!(request.form().unwrap_err().status(), StatusCode::BAD_REQUEST);
    });

    let environ = Environ::new("POST", "/")
        .with_header("content-type", "application/json")
        .with_body(b"{}".to_vec());
    with_request(&config, environ, |request| {
        assert_eq!(
            request.form().unwrap_err().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    });
}

#[test]
fn test_multipart_form_decoding() {
    let body = concat!(
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"title\"\r\n",
        "\r\n",
        "hello\r\n",
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "file body\r\n",
        "--XyZ--\r\n",
    );
    let config = AppConfig::default();
    let environ = Environ::new("POST", "/")
        .with_header("content-type", "multipart/form-data; boundary=XyZ")
        .with_body(body.as_bytes().to_vec());
    with_request(&config, environ, |request| {
        let form = request.form().unwrap();
        assert_eq!(form.get_first("title"), Some("hello"));
        assert_eq!(
            form.get("upload"),
            Some(&FormValue::File {
                filename: "a.txt".to_string(),
                content_type: Some("text/plain".to_string()),
                data: b"file body".to_vec(),
            })
        );
    });
}

#[test]
fn test_query_parameters() {
    let config = AppConfig::default();
    let environ = Environ::new("GET", "/").with_query("page=2&tag=a&tag=b");
    with_request(&config, environ, |request| {
        let params = request.query_parameters().unwrap();
        assert_eq!(params.get("page").map(String::as_str), Some("2"));
        assert_eq!(params.get("tag").map(String::as_str), Some("a"));
    });

    let environ = Environ::new("GET", "/").with_query("flag");
    with_request(&config, environ, |request| {
        assert_eq!(
            request.query_parameters().unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    });

    let environ = Environ::new("GET", "/").with_query("a=1&&b=2");
    with_request(&config, environ, |request| {
        assert_eq!(
            request.query_parameters().unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    });

    // undecodable escapes are kept literally
    let environ = Environ::new("GET", "/").with_query("a=%zz&b=%41");
    with_request(&config, environ, |request| {
        let params = request.query_parameters().unwrap();
        assert_eq!(params.get("a").map(String::as_str), Some("%zz"));
        assert_eq!(params.get("b").map(String::as_str), Some("A"));
    });

    with_request(&config, Environ::new("GET", "/"), |request| {
        assert!(request.query_parameters().unwrap().is_empty());
    });
}

#[test]
fn test_environ_from_http() {
    let request = http::Request::builder()
        .method("PUT")
        .uri("http://localhost/items/3?dry=1")
        .header("content-length", "2")
        .body(b"{}".to_vec())
        .unwrap();
    let mut environ = Environ::from_http(request);
    assert_eq!(environ.method(), "PUT");
    assert_eq!(environ.path_info(), Some("/items/3"));
    assert_eq!(environ.query_string(), Some("dry=1"));
    assert_eq!(environ.header("content-length"), Some("2"));
    assert!(environ.take_input().is_some());
    assert!(environ.take_input().is_none());
}

#[test]
fn test_convert_json_reply() {
    let config = AppConfig::default();
    let response = convert_reply(&config, Reply::Json(json!({}))).unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers[CONTENT_TYPE], CONTENT_TYPE_APPLICATION_JSON);
    assert_eq!(response.headers[CONTENT_LENGTH], "2");
    assert_eq!(response.body.into_bytes(), b"{}".to_vec());
}

#[test]
fn test_convert_text_and_none() {
    let config = AppConfig::default();
    let response = convert_reply(&config, Reply::text("hi")).unwrap();
    assert_eq!(response.headers[CONTENT_TYPE], DEFAULT_STR_CONTENT_TYPE);
    assert_eq!(response.headers[CONTENT_LENGTH], "2");

    let response = convert_reply(&config, Reply::None).unwrap();
    assert_eq!(response.headers[CONTENT_LENGTH], "0");
    assert!(response.body.is_empty());

    let response = convert_reply(&config, Reply::status(StatusCode::ACCEPTED)).unwrap();
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.headers[CONTENT_LENGTH], "0");
}

#[test]
fn test_convert_status_with_headers() {
    let config = AppConfig::default();
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    headers.insert("x-total", HeaderValue::from_static("3"));

    let response = convert_reply(
        &config,
        Reply::with_headers(StatusCode::CREATED, Some(Reply::text("a,b")), headers),
    )
    .unwrap();
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.headers[CONTENT_TYPE], "text/csv");
    assert_eq!(response.headers["x-total"], "3");
    assert_eq!(response.status_line(), "201 Created");
}

#[test]
fn test_convert_bytes_requires_content_type() {
    let config = AppConfig::default();
    assert_eq!(
        convert_reply(&config, Reply::bytes(vec![1, 2])).unwrap_err(),
        ConfigError::UnknownBinaryContentType
    );

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
    let response = convert_reply(
        &config,
        Reply::with_headers(StatusCode::OK, Some(Reply::bytes(vec![1, 2])), headers),
    )
    .unwrap();
    assert_eq!(response.headers[CONTENT_LENGTH], "2");
}

#[test]
fn test_convert_rejects_nested_status_and_no_content_body() {
    let config = AppConfig::default();
    let nested = Reply::with_status(StatusCode::OK, Reply::status(StatusCode::CREATED));
    assert_eq!(
        convert_reply(&config, nested).unwrap_err(),
        ConfigError::InvalidResultTuple
    );

    let err = convert_reply(
        &config,
        Reply::with_status(StatusCode::NO_CONTENT, Reply::text("x")),
    )
    .unwrap_err();
    assert_eq!(err, ConfigError::UnexpectedResultForStatus { status: 204 });

    let response = convert_reply(&config, Reply::status(StatusCode::NOT_MODIFIED)).unwrap();
    assert!(response.body.is_empty());
    assert!(!response.headers.contains_key(CONTENT_LENGTH));
}

#[test]
fn test_convert_stream() {
    let config = AppConfig::default();
    let response =
        convert_reply(&config, Reply::stream(vec![b"ab".to_vec(), b"cd".to_vec()])).unwrap();
    assert_eq!(response.body.len(), None);
    let chunks: Vec<Vec<u8>> = response.body.collect();
    assert_eq!(chunks, vec![b"ab".to_vec(), b"cd".to_vec()]);
}

#[test]
fn test_convert_objects() {
    #[derive(serde::Serialize)]
    struct Item {
        id: i64,
    }
    struct Csv(Vec<&'static str>);

    let config = AppConfig::default().result_converter(ResultConverter::for_type::<Csv, _>(
        |csv, headers| {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/csv"));
            Ok(Body::Full(csv.0.join(",").into_bytes()))
        },
    ));

    let response = convert_reply(&config, Reply::object(Csv(vec!["a", "b"]))).unwrap();
    assert_eq!(response.headers[CONTENT_TYPE], "text/csv");
    assert_eq!(response.body.into_bytes(), b"a,b".to_vec());

    let response = convert_reply(&config, Reply::record(Item { id: 7 })).unwrap();
    assert_eq!(response.body.into_bytes(), br#"{"id":7}"#.to_vec());

    let err = convert_reply(&config, Reply::object(42_u8)).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownResultType { type_name } if type_name == "u8"));
}

#[test]
fn test_http_error_into_reply() {
    let config = AppConfig::default();
    let response =
        convert_reply(&config, Reply::from(crate::error::HttpError::not_found(Some("/x")))).unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body.into_bytes(), b"Not Found".to_vec());
}

#[test]
fn test_body_iterator_drains_once() {
    let mut body = Body::Full(b"x".to_vec());
    assert_eq!(body.next(), Some(b"x".to_vec()));
    assert_eq!(body.next(), None);
}

#[test]
fn test_request_accessors() {
    let config = AppConfig::default();
    let environ = Environ::new("GET", "/").with_header("x-trace", "t-1");
    with_request(&config, environ, |request| {
        assert_eq!(request.method(), "GET");
        assert_eq!(request.http_method(), Some(http::Method::GET));
        assert_eq!(request.header("x-trace"), Some("t-1"));
        assert_eq!(request.environ().path_info(), Some("/"));
    });
}
