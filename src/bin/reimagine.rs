//! CLI for Reimagine - reference-image transformation.

use anyhow::Context;
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use reimagine::credentials::{ApiKey, Credentials, KeySelector};
use reimagine::{
    Banner, FileUpload, GeminiProvider, IntakeOutcome, RefineOutcome, Studio, StudioView,
    SynthesisOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reimagine")]
#[command(about = "Transform a character image with AI suggestions, prompt refinement and synthesis (Gemini)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// API key (otherwise GEMINI_API_KEY, API_KEY, GOOGLE_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model used for suggestions and refinement
    #[arg(long, global = true)]
    text_model: Option<String>,

    /// Model used for image synthesis
    #[arg(long, global = true)]
    image_model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Suggest transformations for an image
    Suggest(SuggestArgs),

    /// Refine a casual prompt into a detailed edit prompt
    Refine(RefineArgs),

    /// Transform an image
    Transform(TransformArgs),

    /// Show rotating tips
    Tips(TipsArgs),

    /// Enter an API key interactively and check it resolves
    SelectKey,
}

#[derive(Args)]
struct SuggestArgs {
    /// Reference image
    image: PathBuf,
}

#[derive(Args)]
struct RefineArgs {
    /// Casual description of the change
    prompt: String,
}

#[derive(Args)]
struct TransformArgs {
    /// Reference image
    image: PathBuf,

    /// Transformation prompt
    #[arg(short, long, conflicts_with = "pick")]
    prompt: Option<String>,

    /// Use suggestion N (1-based) as the prompt; it is refined automatically
    #[arg(long)]
    pick: Option<usize>,

    /// Refine the prompt before synthesis
    #[arg(long)]
    refine: bool,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Retries on transient provider errors
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

#[derive(Args)]
struct TipsArgs {
    /// Number of tips to show before exiting
    #[arg(long, default_value_t = 4)]
    count: usize,
}

/// Reads a key from stdin.
struct StdinKeySelector;

#[async_trait]
impl KeySelector for StdinKeySelector {
    async fn select_key(&self) -> reimagine::Result<Option<ApiKey>> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(b"Enter API key (empty to cancel): ").await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(ApiKey::new(line))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("REIMAGINE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Suggest(ref args) => suggest(&cli, args).await?,
        Commands::Refine(ref args) => refine(&cli, args).await?,
        Commands::Transform(ref args) => transform(&cli, args).await?,
        Commands::Tips(ref args) => tips(args, cli.json).await?,
        Commands::SelectKey => select_key(&cli).await?,
    }

    Ok(())
}

fn build_studio(cli: &Cli, retries: u32) -> anyhow::Result<Studio> {
    let mut builder = GeminiProvider::builder();
    if let Some(ref model) = cli.text_model {
        builder = builder.text_model(model);
    }
    if let Some(ref model) = cli.image_model {
        builder = builder.image_model(model);
    }
    let provider = builder.build()?;

    let credentials = match cli.api_key.as_deref().and_then(ApiKey::new) {
        Some(key) => Credentials::with_key(key),
        None => Credentials::from_env(),
    };

    Ok(Studio::builder(Arc::new(provider))
        .credentials(credentials)
        .key_selector(Arc::new(StdinKeySelector))
        .retries(retries)
        .build())
}

fn status_text(view: &StudioView) -> String {
    view.status
        .as_ref()
        .map(|s| s.text.clone())
        .unwrap_or_default()
}

async fn load_image(studio: &Studio, path: &Path) -> anyhow::Result<()> {
    let file = FileUpload::from_path(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    match studio.upload(file).await {
        IntakeOutcome::Accepted(_) => Ok(()),
        IntakeOutcome::Rejected => anyhow::bail!("{}", status_text(&studio.view().await)),
        IntakeOutcome::Malformed => anyhow::bail!("could not decode {}", path.display()),
    }
}

async fn suggest(cli: &Cli, args: &SuggestArgs) -> anyhow::Result<()> {
    let studio = build_studio(cli, 0)?;
    if !studio.credentials().is_configured().await {
        anyhow::bail!("API Key missing.");
    }
    load_image(&studio, &args.image).await?;

    let view = studio.view().await;
    if cli.json {
        let result = serde_json::json!({
            "type": "suggestions",
            "image": args.image.display().to_string(),
            "suggestions": view.suggestions.iter().map(|s| &s.label).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if view.suggestions.is_empty() {
        println!("No suggestions.");
    } else {
        for (i, suggestion) in view.suggestions.iter().enumerate() {
            println!("{}. {}", i + 1, suggestion.label);
        }
    }
    Ok(())
}

async fn refine(cli: &Cli, args: &RefineArgs) -> anyhow::Result<()> {
    let studio = build_studio(cli, 0)?;
    studio.set_prompt(&args.prompt).await;

    let refined = match studio.refine_prompt().await {
        RefineOutcome::Refined(prompt) => prompt,
        RefineOutcome::Failed(e) => return Err(e).context("Refinement failed."),
        RefineOutcome::Rejected | RefineOutcome::Busy => {
            anyhow::bail!("{}", status_text(&studio.view().await))
        }
    };

    if cli.json {
        let result = serde_json::json!({
            "type": "refinement",
            "input": args.prompt,
            "prompt": refined,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", refined);
    }
    Ok(())
}

async fn transform(cli: &Cli, args: &TransformArgs) -> anyhow::Result<()> {
    let studio = build_studio(cli, args.retries)?;
    load_image(&studio, &args.image).await?;

    if let Some(n) = args.pick {
        let index = n.checked_sub(1).context("--pick is 1-based")?;
        match studio.select_suggestion(index).await {
            None => anyhow::bail!("no suggestion #{}", n),
            Some(RefineOutcome::Failed(e)) => return Err(e).context("Refinement failed."),
            Some(_) => {}
        }
    } else if let Some(ref prompt) = args.prompt {
        studio.set_prompt(prompt).await;
    }

    if args.refine {
        if let RefineOutcome::Failed(e) = studio.refine_prompt().await {
            return Err(e).context("Refinement failed.");
        }
    }

    let image = match studio.synthesize().await {
        SynthesisOutcome::Completed(image) => image,
        SynthesisOutcome::Failed(e) => return Err(e.into()),
        SynthesisOutcome::Rejected | SynthesisOutcome::Busy => {
            anyhow::bail!("{}", status_text(&studio.view().await))
        }
    };

    image.save(&args.output)?;
    let view = studio.view().await;

    if cli.json {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "output": args.output.display().to_string(),
            "prompt": view.prompt,
            "size_bytes": image.size(),
            "format": image.format.extension(),
            "model": image.metadata.model,
            "duration_ms": image.metadata.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Transformed image: {} ({} bytes)",
            args.output.display(),
            image.size()
        );
        println!("Prompt: {}", view.prompt);
        if let Some(duration) = image.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }
    Ok(())
}

async fn tips(args: &TipsArgs, json_output: bool) -> anyhow::Result<()> {
    let handle = Banner::new().spawn();
    let mut frames = handle.subscribe();

    let mut shown = 0;
    let mut frame = handle.current();
    while shown < args.count {
        if !frame.faded {
            if json_output {
                println!("{}", serde_json::to_string(&frame)?);
            } else {
                println!("{}", frame.tip);
            }
            shown += 1;
            if shown == args.count {
                break;
            }
        }
        frames.changed().await?;
        frame = *frames.borrow_and_update();
    }

    handle.dismiss().await;
    Ok(())
}

async fn select_key(cli: &Cli) -> anyhow::Result<()> {
    let studio = build_studio(cli, 0)?;
    let selected = Banner::new().request_key_selection(&studio).await?;
    let configured = studio.credentials().is_configured().await;

    if cli.json {
        let result = serde_json::json!({
            "selected": selected,
            "configured": configured,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if selected {
        println!("API key selected for this session.");
    } else if configured {
        println!("No key entered; using the key from the environment.");
    } else {
        println!("API Key missing.");
    }
    Ok(())
}
