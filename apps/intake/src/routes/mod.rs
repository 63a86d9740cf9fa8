pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

/// Room for multipart framing and the `options` field on top of the file itself.
const MULTIPART_SLACK_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let max_file = usize::try_from(state.config.defaults.max_file_size_bytes).unwrap_or(usize::MAX);
    let body_limit = max_file.saturating_add(MULTIPART_SLACK_BYTES);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/resumes/parse", post(handlers::handle_parse))
        .route(
            "/api/v1/resumes/analyze-text",
            post(handlers::handle_analyze_text),
        )
        .route("/api/v1/resumes/merge", post(handlers::handle_merge))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::ingest::ocr::tests::ScriptedOcr;
    use crate::ingest::ocr::OcrEngine;
    use crate::models::resume::ParsedResumeData;
    use crate::pipeline::ResumePipeline;

    const BOUNDARY: &str = "intake-test-boundary";

    const RESUME: &str = "Jane Doe\n\
        jane.doe@example.com | (415) 555-0100\n\
        Oakland, CA\n\
        \n\
        EXPERIENCE\n\
        Data Engineer at Globex | Mar 2020 - Present\n\
        • Migrated batch jobs to Spark\n\
        \n\
        EDUCATION\n\
        M.S. in Statistics, University of Washington, 2019\n\
        \n\
        SKILLS\n\
        Python, SQL, Spark, Airflow\n";

    fn router() -> Router {
        router_with(&[])
    }

    fn router_with(vars: &[(&str, &str)]) -> Router {
        let vars: Vec<(String, String)> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let config = Config::from_lookup(|key| {
            vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap();
        let engine: Arc<dyn OcrEngine> = Arc::new(ScriptedOcr::new(Vec::new()));
        let pipeline = Arc::new(ResumePipeline::new(engine, config.pipeline_settings()));
        build_router(AppState { config, pipeline })
    }

    fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Body {
        let mut body = String::new();
        for (name, filename, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match filename {
                Some(filename) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: text/plain\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Body::from(body)
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        send_to(router(), request).await
    }

    async fn send_to(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn multipart_request(body: Body) -> Request<Body> {
        Request::post("/api/v1/resumes/parse")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "intake");
    }

    #[tokio::test]
    async fn test_parse_uploaded_text_file() {
        let body = multipart(&[
            ("file", Some("jane.txt"), RESUME),
            ("options", None, r#"{"enableOCR": false}"#),
        ]);
        let (status, body) = send(multipart_request(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processedData"]["contact"]["email"], "jane.doe@example.com");
        let employer = body["processedData"]["workExperiences"][0]["employer"]
            .as_str()
            .unwrap();
        assert!(employer.contains("Globex"));
        assert_eq!(body["metadata"]["extractionMethod"], "plaintext");
    }

    #[tokio::test]
    async fn test_parse_without_file_is_rejected() {
        let body = multipart(&[("options", None, "{}")]);
        let (status, body) = send(multipart_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "FILE_NOT_PROVIDED");
    }

    #[tokio::test]
    async fn test_upload_over_body_limit_is_too_large() {
        let app = router_with(&[("PARSER_MAX_FILE_SIZE_BYTES", "1024")]);
        let oversized = "a".repeat(MULTIPART_SLACK_BYTES + 64 * 1024);
        let body = multipart(&[("file", Some("huge.txt"), oversized.as_str())]);
        let (status, body) = send_to(app, multipart_request(body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["code"], "FILE_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_parse_with_malformed_options_is_rejected() {
        let body = multipart(&[
            ("file", Some("jane.txt"), RESUME),
            ("options", None, "{not json"),
        ]);
        let (status, body) = send(multipart_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_analyze_text() {
        let (status, body) = send(json_request(
            "/api/v1/resumes/analyze-text",
            json!({ "text": RESUME, "filename": "paste.txt" }),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processedData"]["contact"]["firstName"], "Jane");
        assert_eq!(body["metadata"]["filename"], "paste.txt");
    }

    #[tokio::test]
    async fn test_analyze_blank_text_is_rejected() {
        let (status, _) = send(json_request(
            "/api/v1/resumes/analyze-text",
            json!({ "text": "   " }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_merge_applies_corrections() {
        let (status, body) = send(json_request(
            "/api/v1/resumes/merge",
            json!({
                "processedData": ParsedResumeData::default(),
                "corrections": [{ "path": "contact.email", "value": "jane@example.com" }]
            }),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resume"]["contact"]["email"], "jane@example.com");
        assert_eq!(body["applied"][0], "contact.email");
    }
}
