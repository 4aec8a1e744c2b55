use mimalloc::MiMalloc;
use saluscribe::{AudioPayload, Config, SaluteSpeech};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let salute = cfg.salute();
    info!(
        url_access_token = %salute.url_access_token,
        url_rest = %salute.url_rest,
        scope = %salute.scope,
        proxy = %salute.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        simultaneous_requests = salute.simultaneous_requests,
        check_interval = ?salute.check_interval,
        loglevel = %cfg.basic.loglevel,
    );

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        warn!("No audio files given; usage: saluscribe <file.ogg|wav|mp3|flac>...");
        return Ok(());
    }

    let mut audios = Vec::with_capacity(paths.len());
    for path in &paths {
        let format = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();
        let data = tokio::fs::read(path).await?;
        audios.push(AudioPayload::new(data, format));
    }

    let speech = SaluteSpeech::new(&salute)?;
    speech.start().await?;

    let outcomes = speech.transcribe_many(audios).await;
    for (path, outcome) in paths.iter().zip(&outcomes) {
        if outcome.is_success() {
            println!("{path}: {}", outcome.texts().join(" "));
        } else {
            println!("{path}: {outcome}");
        }
    }

    speech.stop();
    Ok(())
}
