use crate::api_result::{safe_api_call, ApiException, ApiResult, RawResponse};
use crate::models::{LogRequest, Task, TaskLog, TaskRequest};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use std::time::Duration;
use url::Url;

/// The Taskio REST endpoints, one method per route.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn health(&self) -> ApiResult<String>;

    async fn create_task(&self, request: &TaskRequest) -> ApiResult<Task>;

    async fn list_tasks(&self) -> ApiResult<Vec<Task>>;

    async fn get_task(&self, task_id: &str) -> ApiResult<Task>;

    async fn update_task(&self, task_id: &str, request: &TaskRequest) -> ApiResult<Task>;

    async fn delete_task(&self, task_id: &str) -> ApiResult<()>;

    async fn list_logs(&self, task_id: &str) -> ApiResult<Vec<TaskLog>>;

    async fn create_log(&self, task_id: &str, request: &LogRequest) -> ApiResult<TaskLog>;

    async fn update_log(&self, log_id: &str, request: &LogRequest) -> ApiResult<TaskLog>;

    async fn delete_log(&self, log_id: &str) -> ApiResult<()>;
}

pub struct HttpTaskApi {
    client: Client,
    base_url: Url,
}

impl HttpTaskApi {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiException> {
        let mut base_url =
            Url::parse(base_url).map_err(|err| ApiException::InvalidUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiException::InvalidUrl(format!(
                "{} cannot be used as a base url",
                base_url
            )));
        }
        // Segments get appended, so an empty trailing segment would double the slash.
        if let Ok(mut segments) = base_url.path_segments_mut() {
            segments.pop_if_empty();
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(HttpTaskApi { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiException> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiException::InvalidUrl(self.base_url.to_string()))?
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiException> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%method, %url, "sending request");
        Ok(self.client.request(method, url))
    }
}

async fn send(builder: RequestBuilder) -> Result<RawResponse, ApiException> {
    let res = builder.send().await?;
    let status = res.status().as_u16();
    let bytes = res.bytes().await?;
    tracing::debug!(status, len = bytes.len(), "response received");
    Ok(RawResponse::from_parts(status, bytes.to_vec()))
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn health(&self) -> ApiResult<String> {
        safe_api_call(async { send(self.request(Method::GET, &["health"])?).await }).await
    }

    async fn create_task(&self, request: &TaskRequest) -> ApiResult<Task> {
        safe_api_call(async {
            send(self.request(Method::POST, &["tasks"])?.json(request)).await
        })
        .await
    }

    async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        safe_api_call(async { send(self.request(Method::GET, &["tasks"])?).await }).await
    }

    async fn get_task(&self, task_id: &str) -> ApiResult<Task> {
        safe_api_call(async { send(self.request(Method::GET, &["tasks", task_id])?).await }).await
    }

    async fn update_task(&self, task_id: &str, request: &TaskRequest) -> ApiResult<Task> {
        safe_api_call(async {
            send(self.request(Method::PUT, &["tasks", task_id])?.json(request)).await
        })
        .await
    }

    async fn delete_task(&self, task_id: &str) -> ApiResult<()> {
        safe_api_call(async { send(self.request(Method::DELETE, &["tasks", task_id])?).await })
            .await
    }

    async fn list_logs(&self, task_id: &str) -> ApiResult<Vec<TaskLog>> {
        safe_api_call(async {
            send(self.request(Method::GET, &["tasks", task_id, "logs"])?).await
        })
        .await
    }

    async fn create_log(&self, task_id: &str, request: &LogRequest) -> ApiResult<TaskLog> {
        safe_api_call(async {
            send(
                self.request(Method::POST, &["tasks", task_id, "logs"])?
                    .json(request),
            )
            .await
        })
        .await
    }

    async fn update_log(&self, log_id: &str, request: &LogRequest) -> ApiResult<TaskLog> {
        safe_api_call(async {
            send(self.request(Method::PUT, &["logs", log_id])?.json(request)).await
        })
        .await
    }

    async fn delete_log(&self, log_id: &str) -> ApiResult<()> {
        safe_api_call(async { send(self.request(Method::DELETE, &["logs", log_id])?).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn task_json(id: &str, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "description": null,
            "is_active": true,
            "created_at": "2025-01-15T10:30:00Z",
            "updated_at": "2025-01-15T10:30:00Z"
        })
    }

    async fn api_for(server: &MockServer) -> HttpTaskApi {
        HttpTaskApi::new(&format!("{}/api/v1/", server.uri()), None).expect("client init")
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let api = HttpTaskApi::new("http://localhost:3000/api/v1/", None).expect("client init");
        let url = api.endpoint(&["tasks", "a b/c"]).expect("endpoint");
        assert_eq!(url.as_str(), "http://localhost:3000/api/v1/tasks/a%20b%2Fc");

        let api = HttpTaskApi::new("http://localhost:3000/api/v1", None).expect("client init");
        let url = api.endpoint(&["health"]).expect("endpoint");
        assert_eq!(url.as_str(), "http://localhost:3000/api/v1/health");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            HttpTaskApi::new("not a url", None),
            Err(ApiException::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpTaskApi::new("mailto:someone@example.com", None),
            Err(ApiException::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_list_tasks_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/tasks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([task_json("b", "Second"), task_json("a", "First")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        match api.list_tasks().await {
            ApiResult::Success(tasks) => {
                let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
                assert_eq!(ids, vec!["b", "a"]);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_task_sends_request_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/tasks"))
            .and(body_json(json!({"title": "Buy milk", "description": null})))
            .respond_with(ResponseTemplate::new(201).set_body_json(task_json("n1", "Buy milk")))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let request = TaskRequest {
            title: "Buy milk".to_string(),
            description: None,
        };
        match api.create_task(&request).await {
            ApiResult::Success(task) => assert_eq!(task.id, "n1"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_task_not_found_uses_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/tasks/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": "NotFound", "message": "task not found"})),
            )
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        match api.get_task("missing").await {
            ApiResult::Error { code, message } => {
                assert_eq!(code, 404);
                assert_eq!(message, "task not found");
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_task_uses_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/tasks/t1"))
            .and(body_json(json!({"title": "Renamed", "description": "notes"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_json("t1", "Renamed")))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let request = TaskRequest {
            title: "Renamed".to_string(),
            description: Some("notes".to_string()),
        };
        assert!(matches!(
            api.update_task("t1", &request).await,
            ApiResult::Success(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_task_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/tasks/t1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        assert!(matches!(api.delete_task("t1").await, ApiResult::Success(())));
    }

    #[tokio::test]
    async fn test_delete_task_accepts_ok_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/tasks/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        assert!(matches!(api.delete_task("t1").await, ApiResult::Success(())));
    }

    #[tokio::test]
    async fn test_health_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        match api.health().await {
            ApiResult::Success(text) => assert_eq!(text, "ok"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_logs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/tasks/t1/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "l1",
                "task_id": "t1",
                "start_at": "2025-01-15T09:00:00Z",
                "end_at": "2025-01-15T10:30:00Z",
                "duration_min": 90,
                "memo": "deep work",
                "created_at": "2025-01-15T09:00:00Z",
                "updated_at": "2025-01-15T10:30:00Z"
            }])))
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        match api.list_logs("t1").await {
            ApiResult::Success(logs) => {
                assert_eq!(logs.len(), 1);
                assert_eq!(logs[0].duration_min, Some(90));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    fn log_json(end_at: Option<&str>) -> serde_json::Value {
        json!({
            "id": "l1",
            "task_id": "t1",
            "start_at": "2025-01-15T09:00:00Z",
            "end_at": end_at,
            "duration_min": end_at.map(|_| 90),
            "memo": null,
            "created_at": "2025-01-15T09:00:00Z",
            "updated_at": "2025-01-15T09:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_create_log_posts_under_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/tasks/t1/logs"))
            .and(body_json(json!({
                "start_at": "2025-01-15T09:00:00Z",
                "end_at": null,
                "memo": null
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(log_json(None)))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let request = LogRequest {
            start_at: Some("2025-01-15T09:00:00Z".parse().expect("timestamp")),
            end_at: None,
            memo: None,
        };
        match api.create_log("t1", &request).await {
            ApiResult::Success(log) => {
                assert_eq!(log.id, "l1");
                assert_eq!(log.end_at, None);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_and_delete_log() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/logs/l1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(log_json(Some("2025-01-15T10:30:00Z"))),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/logs/l1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let request = LogRequest {
            start_at: None,
            end_at: Some("2025-01-15T10:30:00Z".parse().expect("timestamp")),
            memo: None,
        };
        match api.update_log("l1", &request).await {
            ApiResult::Success(log) => assert_eq!(log.duration_min, Some(90)),
            other => panic!("expected success, got {:?}", other),
        }
        assert!(matches!(api.delete_log("l1").await, ApiResult::Success(())));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/tasks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let api = HttpTaskApi::new(
            &format!("{}/api/v1/", server.uri()),
            Some(Duration::from_millis(50)),
        )
        .expect("client init");
        assert!(matches!(
            api.list_tasks().await,
            ApiResult::Exception(ApiException::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_malformed_list_is_exception() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": []})))
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        assert!(matches!(
            api.list_tasks().await,
            ApiResult::Exception(ApiException::Decode(_))
        ));
    }
}
