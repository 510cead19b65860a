//! Credential-refresh pattern: a request hook stamps the current token and
//! a response-rejection hook reacts to a 401 by re-entering the pipeline
//! with a fresh one.

use std::sync::{Arc, Mutex};

use echox::prelude::{Echo, EchoConfig, EchoError, Interceptor, Recovery};
use http::StatusCode;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "echox=debug".into()),
        )
        .init();

    let token = Arc::new(Mutex::new("stale-token".to_owned()));

    let client = Echo::builder().base_url("https://httpbin.org").try_build()?;

    let current = Arc::clone(&token);
    client.interceptors().request().use_interceptor(
        "auth",
        Interceptor::new().on_fulfilled(move |config: EchoConfig| {
            let token = current.lock().map(|token| token.clone()).unwrap_or_default();
            async move { Ok(config.header("Authorization", format!("Bearer {token}"))) }
        }),
    );

    let refresh_client = client.clone();
    let refreshable = Arc::clone(&token);
    client.interceptors().response().use_interceptor(
        "refresh",
        Interceptor::new().on_rejected(move |error: EchoError| {
            let client = refresh_client.clone();
            let token = Arc::clone(&refreshable);
            async move {
                if error.status() == Some(StatusCode::UNAUTHORIZED) {
                    if let Ok(mut guard) = token.lock() {
                        *guard = "fresh-token".to_owned();
                    }
                    println!("token expired, retrying with a fresh one");
                    let retried = client
                        .request(EchoConfig::new("/bearer"))
                        .await?;
                    return Ok(Recovery::Recovered(retried));
                }
                Ok(Recovery::Passthrough(error))
            }
        }),
    );

    match client.get("/bearer", EchoConfig::default()).await {
        Ok(response) => println!("authorized: status={}", response.status),
        Err(error) => println!("failed: {error}"),
    }
    Ok(())
}
