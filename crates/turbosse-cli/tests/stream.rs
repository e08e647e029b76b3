//! Running the CLI stream loop against a mock server.

use clap::Parser;
use turbosse_cli::{Cli, CliError};
use wiremock::matchers::{header, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn args(url: &str, extra: &[&str]) -> Cli {
    Cli::try_parse_from(["turbosse", url].into_iter().chain(extra.iter().copied())).unwrap()
}

#[tokio::test]
async fn test_stream_ends_on_done_token() {
    let server = MockServer::start().await;
    Mock::given(path("/events"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string("data: one\ndata: [DONE]\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/events", server.uri());
    let cli = args(
        &url,
        &["-H", "Authorization: Bearer abc", "--done-token", "[DONE]", "--json"],
    );
    turbosse_cli::stream(&cli).await.unwrap();
}

#[tokio::test]
async fn test_stream_failure_is_an_error() {
    let cli = args("http://127.0.0.1:9/events", &[]);
    let err = turbosse_cli::stream(&cli).await.unwrap_err();
    assert!(matches!(err, CliError::Stream(_)));
    assert!(!err.suggestions().is_empty());
}

#[tokio::test]
async fn test_redirect_loop_suggests_raising_limit() {
    let server = MockServer::start().await;
    Mock::given(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .expect(2)
        .mount(&server)
        .await;

    let url = format!("{}/loop", server.uri());
    let cli = args(&url, &["--max-redirects", "1"]);
    let err = turbosse_cli::stream(&cli).await.unwrap_err();
    assert!(err.to_string().contains("Too many redirects"));
    assert_eq!(err.suggestions(), vec!["Raise the limit with --max-redirects"]);
}
