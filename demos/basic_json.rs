use echox::prelude::{Echo, EchoConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Slideshow {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SlideshowEnvelope {
    slideshow: Slideshow,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "echox=debug".into()),
        )
        .init();

    let client = Echo::builder()
        .base_url("https://httpbin.org")
        .default_header("Accept", "application/json")
        .try_build()?;

    let response = client.get("/json", EchoConfig::default()).await?;
    println!("status={} {}", response.status, response.status_text);

    let envelope: SlideshowEnvelope = response.json()?;
    println!("slideshow title: {}", envelope.slideshow.title);
    Ok(())
}
