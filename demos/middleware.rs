use async_trait::async_trait;
use micro_req::handler::LogHandler;
use micro_req::{Client, Context, Handler, handler_fn};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

/// Adds a bearer token to every request, refusing to send without one.
struct BearerAuth {
    token: Option<String>,
}

#[async_trait]
impl Handler for BearerAuth {
    async fn handle(&self, ctx: &mut Context) {
        let Some(token) = &self.token else {
            ctx.abort_with_error("no api token configured");
            return;
        };

        let value = format!("Bearer {token}");
        match value.parse() {
            Ok(value) => {
                ctx.request_mut().headers_mut().insert(http::header::AUTHORIZATION, value);
                ctx.next().await;
            }
            Err(_) => ctx.abort_with_error("api token is not a valid header value"),
        }
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let timing = handler_fn(|ctx| {
        Box::pin(async move {
            let start = Instant::now();
            ctx.next().await;
            info!(url = %ctx.request().url(), took = ?start.elapsed(), "call finished");
        })
    });

    let client = Client::builder()
        .prefix_path("http://127.0.0.1:8080")
        .timeout(Duration::from_secs(5))
        .handler(LogHandler::new().with_response_body(true))
        .handler(timing)
        .handler(BearerAuth { token: std::env::var("API_TOKEN").ok() })
        .build()
        .expect("client should be built");

    let mut response = client.get("/users").with_query_param("page", "1").send().await;
    match response.as_json::<Value>().await {
        Ok(users) => info!(users = %users, "users loaded"),
        Err(e) => info!(cause = %e, "users not loaded"),
    }

    // a request scoped handler only runs for this one call
    let mut response = client
        .post("/users")
        .with_json_body(&serde_json::json!({"name": "zhangsan"}))
        .use_handler(handler_fn(|ctx| {
            Box::pin(async move {
                ctx.request_mut().headers_mut().insert("x-request-id", http::HeaderValue::from_static("demo-1"));
                ctx.next().await;
            })
        }))
        .send()
        .await;
    info!(status = ?response.status(), body = %response.text().await, "user created");
}
