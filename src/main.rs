use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use texsnap_lib::{
    init_logging, ConversionSession, EngineConfig, ModelId, SampleRecognizer, SettingsPatch,
    SourceImage,
};

#[derive(Parser, Debug)]
#[command(name = "texsnap")]
#[command(about = "Convert images of math into LaTeX")]
#[command(version)]
struct Cli {
    /// JSON engine config; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recognition model (mathpix-v3, latex-ocr, mathml-converter, custom-model)
    #[arg(long, value_parser = parse_model)]
    model: Option<ModelId>,

    /// Confidence threshold, 50-100 in steps of 5
    #[arg(long, value_parser = clap::value_parser!(u8).range(50..=100))]
    confidence: Option<u8>,

    /// Skip the preprocessing stage
    #[arg(long)]
    no_preprocess: bool,

    /// Images to convert, in order
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

impl Cli {
    fn settings_patch(&self) -> SettingsPatch {
        SettingsPatch {
            model: self.model,
            confidence_threshold: self.confidence,
            preprocessing_enabled: self.no_preprocess.then_some(false),
        }
    }
}

fn parse_model(value: &str) -> Result<ModelId, String> {
    ModelId::parse(value).ok_or_else(|| format!("unknown model '{value}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    log::info!("texsnap starting up...");

    let args = Cli::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides()?;

    let recognizer = Arc::new(SampleRecognizer::with_delay(Duration::from_millis(
        config.sample_delay_ms,
    )));
    let session = ConversionSession::new(recognizer, config);
    session.update_settings(args.settings_patch()).await?;

    let mut logs = session.subscribe_logs().await;
    let printer = tokio::spawn(async move {
        loop {
            match logs.recv().await {
                Ok(entry) => println!("{}", entry.display_line()),
                Err(RecvError::Lagged(skipped)) => log::warn!("log printer skipped {skipped} entries"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    for path in &args.images {
        let image = match SourceImage::from_path(path).await {
            Ok(image) => image,
            Err(err) => {
                log::error!("{err:#}");
                continue;
            }
        };
        // Failures are already in the event log.
        if let Err(err) = session.submit_image(image).await {
            log::debug!("submission of {} ended early: {err}", path.display());
        }
        session.wait_until_idle().await;
    }

    let history = session.history().await;
    drop(session);
    printer.await.context("log printer task failed")?;

    println!("{}", serde_json::to_string_pretty(&history)?);
    Ok(())
}
