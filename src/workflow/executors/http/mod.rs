mod models;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    error::NodeExecutionError,
    providers::CredentialResolver,
    runtime::Context,
    workflow::{
        executors::{NodeExecutor, NodeOutput, parse_config},
        node::{Node, NodeType},
    },
};

pub use models::*;

/// Calls an HTTP endpoint.
///
/// Output: `{statusCode, headers, body}`, where a JSON response body is parsed.
/// Statuses of 400 and above fail the node as provider errors.
pub struct HttpExecutor {
    client: reqwest::Client,
    credentials: Option<Arc<dyn CredentialResolver>>,
}

impl HttpExecutor {
    pub fn new(credentials: Option<Arc<dyn CredentialResolver>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    fn apply_auth(
        auth: &AuthConfig,
        headers: &mut HeaderMap,
    ) -> Result<(), NodeExecutionError> {
        if auth.auth_type == AuthType::None {
            return Ok(());
        }
        let api_key = auth.api_key.as_deref().ok_or_else(|| NodeExecutionError::config("auth.apiKey is required for api-key authorization"))?;
        let value = match auth.auth_type {
            AuthType::Bearer => format!("Bearer {}", api_key),
            AuthType::Basic if api_key.contains(':') => format!("Basic {}", STANDARD.encode(api_key.as_bytes())),
            AuthType::Basic => format!("Basic {}", api_key),
            AuthType::Custom | AuthType::None => api_key.to_string(),
        };
        insert_header(headers, auth.header.as_deref().unwrap_or("Authorization"), &value)
    }

    async fn build_request(
        &self,
        config: &HttpConfig,
        ctx: &Context,
    ) -> Result<reqwest::RequestBuilder, NodeExecutionError> {
        let url = ctx.resolve_template(&config.url);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("accept"), HeaderValue::from_static("*/*"));
        if let Some(auth) = &config.auth {
            let auth = AuthConfig {
                api_key: auth.api_key.as_deref().map(|k| ctx.resolve_template(k)),
                ..auth.clone()
            };
            Self::apply_auth(&auth, &mut headers)?;
        }
        if let Some(credential_id) = &config.credential_id {
            let resolver = self.credentials.as_ref().ok_or_else(|| NodeExecutionError::config(format!("no credential resolver for credential {}", credential_id)))?;
            let credential = resolver.resolve(credential_id).await?;
            for (key, value) in &credential.headers {
                insert_header(&mut headers, key, value)?;
            }
        }
        for (key, value) in &config.headers {
            insert_header(&mut headers, key, &ctx.resolve_template(value))?;
        }

        let query: Vec<(String, String)> = config.params.iter().map(|(k, v)| (k.clone(), ctx.resolve_template(v))).collect();
        let method = config.method.as_ref().parse::<reqwest::Method>().map_err(|e| NodeExecutionError::config(e.to_string()))?;
        let mut request = self.client.request(method, &url).headers(headers).query(&query);

        if let Some(HttpBody {
            content_type,
            data: Some(data),
        }) = &config.body
        {
            let data = ctx.resolve_json(data);
            request = match content_type {
                ContentType::None => request,
                ContentType::Text => request.body(text(&data)),
                ContentType::Json => request.header("content-type", "application/json").body(data.to_string()),
                ContentType::Urlencoded | ContentType::FormData => {
                    let form = data.as_object().ok_or_else(|| NodeExecutionError::config("form body must be an object"))?;
                    let form: HashMap<&String, String> = form.iter().map(|(k, v)| (k, text(v))).collect();
                    request.form(&form)
                }
                ContentType::Binary => {
                    let encoded = data.as_str().ok_or_else(|| NodeExecutionError::config("binary body must be a base64 string"))?;
                    request.body(STANDARD.decode(encoded).map_err(|e| NodeExecutionError::config(e.to_string()))?)
                }
            };
        }

        if let Some(timeout) = config.timeout {
            request = request.timeout(Duration::from_millis(timeout));
        }
        Ok(request)
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn insert_header(
    headers: &mut HeaderMap,
    key: &str,
    value: &str,
) -> Result<(), NodeExecutionError> {
    let name = key.parse::<HeaderName>().map_err(|e| NodeExecutionError::config(format!("invalid header name '{}': {}", key, e)))?;
    let value = value.parse::<HeaderValue>().map_err(|e| NodeExecutionError::config(format!("invalid value for header '{}': {}", key, e)))?;
    headers.insert(name, value);
    Ok(())
}

fn transport_error(err: reqwest::Error) -> NodeExecutionError {
    if err.is_timeout() {
        NodeExecutionError::timeout(format!("http request timed out: {}", err))
    } else if err.is_builder() {
        NodeExecutionError::config(format!("invalid http request: {}", err))
    } else {
        NodeExecutionError::provider(format!("http error: {}", err), err.status().map(|s| s.as_u16()))
    }
}

#[async_trait]
impl NodeExecutor for HttpExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Http
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "minLength": 1 },
                "method": { "type": "string", "enum": ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"] },
                "headers": { "type": "object", "additionalProperties": { "type": "string" } },
                "params": { "type": "object", "additionalProperties": { "type": "string" } },
                "body": {
                    "type": "object",
                    "properties": {
                        "contentType": { "type": "string", "enum": ["none", "text", "json", "urlencoded", "form-data", "binary"] },
                        "data": {}
                    }
                },
                "auth": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string", "enum": ["none", "bearer", "basic", "custom"] },
                        "apiKey": { "type": "string" },
                        "header": { "type": "string" }
                    }
                },
                "timeout": { "type": "integer", "minimum": 0 },
                "credentialId": { "type": "string" },
                "outputVariable": { "type": "string" }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: HttpConfig = parse_config(node, &self.schema())?;
        let request = self.build_request(&config, &ctx).await?;

        debug!(execution_id = %ctx.execution_id(), node_id = %node.id, method = config.method.as_ref(), "sending http request");
        let res = request.send().await.map_err(transport_error)?;
        let status = res.status();
        let headers: HashMap<String, String> = res.headers().iter().map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string())).collect();
        let raw = res.text().await.map_err(transport_error)?;
        let body = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));

        if status.is_client_error() || status.is_server_error() {
            return Err(NodeExecutionError::provider(format!("http status {}: {}", status.as_u16(), text(&body)), Some(status.as_u16())));
        }

        let output = json!({
            "statusCode": status.as_u16(),
            "headers": headers,
            "body": body,
        });
        Ok(NodeOutput::with_variable(node.output_variable(), output))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap as AxumHeaders, StatusCode},
        routing::{get, post},
    };

    use super::*;
    use crate::{
        common::Vars,
        error::NodeErrorKind,
        providers::Credential,
        workflow::executors::testing,
    };

    async fn serve() -> String {
        let app = Router::new()
            .route(
                "/echo",
                get(|Query(q): Query<HashMap<String, String>>, headers: AxumHeaders| async move {
                    let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
                    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
                    Json(json!({ "query": q, "auth": auth, "key": key }))
                }),
            )
            .route("/body", post(|Json(body): Json<Value>| async move { Json(body) }))
            .route("/busy", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }))
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "nope") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    struct StaticCredentials;

    #[async_trait]
    impl CredentialResolver for StaticCredentials {
        async fn resolve(
            &self,
            credential_id: &str,
        ) -> Result<Credential, NodeExecutionError> {
            let mut headers = HashMap::new();
            headers.insert("x-api-key".to_string(), format!("secret-{}", credential_id));
            Ok(Credential {
                headers,
            })
        }
    }

    #[tokio::test]
    async fn test_get_with_templates_and_auth() {
        let base = serve().await;
        let (ctx, _rx) = testing::context(Vars::new().with("base", base).with("q", "rust").with("token", "t0k"));
        let node = testing::node(
            NodeType::Http,
            json!({
                "url": "{{base}}/echo",
                "params": {"search": "{{q}}"},
                "auth": {"type": "bearer", "apiKey": "{{token}}"},
                "credentialId": "c1",
                "outputVariable": "resp"
            }),
        );

        let out = HttpExecutor::new(Some(Arc::new(StaticCredentials))).execute(&node, ctx).await.unwrap();
        assert_eq!(out.output["statusCode"], json!(200));
        assert_eq!(out.output["body"]["query"], json!({"search": "rust"}));
        assert_eq!(out.output["body"]["auth"], json!("Bearer t0k"));
        assert_eq!(out.output["body"]["key"], json!("secret-c1"));
        assert!(out.emitted.contains("resp"));
    }

    #[tokio::test]
    async fn test_post_json_body() {
        let base = serve().await;
        let (ctx, _rx) = testing::context(Vars::new().with("base", base).with("n", 7));
        let node = testing::node(
            NodeType::Http,
            json!({"url": "{{base}}/body", "method": "POST", "body": {"contentType": "json", "data": {"n": "{{n}}"}}}),
        );

        let out = HttpExecutor::new(None).execute(&node, ctx).await.unwrap();
        assert_eq!(out.output["body"], json!({"n": 7}));
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let base = serve().await;
        let (ctx, _rx) = testing::context(Vars::new().with("base", base));
        let executor = HttpExecutor::new(None);

        let err = executor.execute(&testing::node(NodeType::Http, json!({"url": "{{base}}/busy"})), ctx.clone()).await.unwrap_err();
        assert_eq!(err.kind, NodeErrorKind::ProviderError);
        assert!(err.retryable);

        let err = executor.execute(&testing::node(NodeType::Http, json!({"url": "{{base}}/missing"})), ctx.clone()).await.unwrap_err();
        assert_eq!(err.kind, NodeErrorKind::ProviderError);
        assert!(!err.retryable);

        let err = executor.execute(&testing::node(NodeType::Http, json!({"url": "{{base}}/slow", "timeout": 50})), ctx).await.unwrap_err();
        assert_eq!(err.kind, NodeErrorKind::TimeoutError);
    }

    #[tokio::test]
    async fn test_credential_without_resolver() {
        let (ctx, _rx) = testing::context(Vars::new());
        let node = testing::node(NodeType::Http, json!({"url": "http://127.0.0.1:1/x", "credentialId": "c1"}));
        let err = HttpExecutor::new(None).execute(&node, ctx).await.unwrap_err();
        assert_eq!(err.kind, NodeErrorKind::ConfigError);
    }
}
