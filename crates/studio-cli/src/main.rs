use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use studio_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use studio_contracts::conversation::{latest_image, Conversation, ConversationTurn, ImageBlob};
use studio_contracts::deferred::PendingGeneration;
use studio_contracts::memory::{Attribute, AttributeMode};
use studio_contracts::result::GenerationResult;
use studio_engine::{
    AudioClip, DispatchPolicy, DryrunGateway, EngineConfig, GeminiGateway, ImageTier,
    ModelGateway, Session, Studio, TurnRequest,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "studio-rs", version, about = "Studio chat and image orchestration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat session.
    Chat(ChatArgs),
    /// Generate one image at a fixed aspect ratio.
    Generate(GenerateArgs),
    /// Outpaint an image file to a new aspect ratio.
    Resize(ResizeArgs),
    /// Synthesize speech for a line of text.
    Speak(SpeakArgs),
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Directory for generated images and audio.
    #[arg(long)]
    out: PathBuf,
    /// Directory for per-session `events.jsonl` logs (default: <out>/sessions).
    #[arg(long)]
    events: Option<PathBuf>,
    /// Use the offline backend instead of Gemini.
    #[arg(long)]
    dryrun: bool,
    /// Make the primary image tier fail with a quota error (dryrun only).
    #[arg(long, requires = "dryrun")]
    fail_primary: bool,
    /// Print results as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "1:1")]
    ratio: String,
}

#[derive(Debug, Args)]
struct ResizeArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    ratio: String,
    /// Description of the original scene.
    #[arg(long)]
    prompt: Option<String>,
}

#[derive(Debug, Args)]
struct SpeakArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    text: String,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("studio-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(args),
        Command::Resize(args) => run_resize(args),
        Command::Speak(args) => run_speak(args),
    }
}

fn build_studio(common: &CommonArgs) -> Result<Studio> {
    let gateway: Arc<dyn ModelGateway> = if common.dryrun {
        let mut gateway = DryrunGateway::new();
        if common.fail_primary {
            gateway = gateway.with_failing_tier(ImageTier::Primary);
        }
        Arc::new(gateway)
    } else {
        let config = EngineConfig::from_env().context("failed to load engine config")?;
        if config.api_key.is_none() {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY must be set (or pass --dryrun)");
        }
        Arc::new(GeminiGateway::new(config))
    };

    fs::create_dir_all(&common.out)
        .with_context(|| format!("failed to create {}", common.out.display()))?;
    let events_dir = common
        .events
        .clone()
        .unwrap_or_else(|| common.out.join("sessions"));
    Ok(Studio::new(gateway, DispatchPolicy::default()).with_events_dir(events_dir))
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let studio = build_studio(&args.common)?;
    let session = studio.open_session();
    let message_id = Uuid::new_v4().to_string();
    let result = session.resume_deferred(&message_id, &args.prompt, &args.ratio);
    report(&args.common, &result)?;
    Ok(exit_code(&result))
}

fn run_resize(args: ResizeArgs) -> Result<i32> {
    let studio = build_studio(&args.common)?;
    let session = studio.open_session();
    let image = read_image(&args.image)?;
    let result = session.resize(&image, &args.ratio, args.prompt.as_deref());
    report(&args.common, &result)?;
    Ok(exit_code(&result))
}

fn run_speak(args: SpeakArgs) -> Result<i32> {
    let studio = build_studio(&args.common)?;
    let session = studio.open_session();
    match session.speak(&args.text) {
        Ok(clip) => {
            let path = save_audio(&args.common.out, &clip)?;
            println!("Saved speech to {}", path.display());
            Ok(0)
        }
        Err(err) => {
            println!("Speech failed: {err}");
            Ok(1)
        }
    }
}

fn exit_code(result: &GenerationResult) -> i32 {
    if result.is_error() {
        1
    } else {
        0
    }
}

struct ChatState {
    conversation: Conversation,
    attached: Vec<ImageBlob>,
    last_deferred: Option<PendingGeneration>,
    last_prompt: Option<String>,
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let studio = build_studio(&args.common)?;
    let session = studio.open_session();
    let mut state = ChatState {
        conversation: Conversation::new(),
        attached: Vec::new(),
        last_deferred: None,
        last_prompt: None,
    };

    let stdin = io::stdin();
    let mut line = String::new();
    println!("Studio chat started (session {}). Type /help for commands.", session.id());

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        if intent.action == "quit" {
            break;
        }
        if let Err(err) = handle_intent(&args.common, &session, &mut state, &intent) {
            println!("Error: {err:#}");
        }
    }
    Ok(())
}

fn handle_intent(
    common: &CommonArgs,
    session: &Session,
    state: &mut ChatState,
    intent: &Intent,
) -> Result<()> {
    match intent.action.as_str() {
        "noop" => {}
        "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
        "attach" => {
            let paths = intent.arg_list("paths");
            if paths.is_empty() {
                println!("/attach requires at least one path");
                return Ok(());
            }
            for path in paths {
                state.attached.push(read_image(Path::new(&path))?);
            }
            println!(
                "{} image(s) will be sent with your next message.",
                state.attached.len()
            );
        }
        "resume_deferred" => {
            let Some(pending) = state.last_deferred.clone() else {
                println!("No image is waiting for an aspect ratio.");
                return Ok(());
            };
            let result = session.resume_deferred(&pending.message_id, &pending.prompt, intent.arg_str("ratio"));
            if !session
                .pending()
                .iter()
                .any(|entry| entry.message_id == pending.message_id)
            {
                state.last_deferred = None;
            }
            finish_model_turn(common, state, &result)?;
        }
        "resize" => {
            let Some(image) = latest_image(state.conversation.turns()).cloned() else {
                println!("No image to resize yet. Attach or generate one first.");
                return Ok(());
            };
            let scene = Some(intent.arg_str("scene"))
                .filter(|scene| !scene.is_empty())
                .map(str::to_string)
                .or_else(|| state.last_prompt.clone());
            let result = session.resize(&image, intent.arg_str("ratio"), scene.as_deref());
            finish_model_turn(common, state, &result)?;
        }
        "set_reference" => {
            let attribute = parse_attribute(intent)?;
            let path = intent.arg_str("path");
            if path.is_empty() {
                bail!("/reference requires an attribute and a path");
            }
            session.set_reference(attribute, read_image(Path::new(path))?);
            println!("Stored {} reference from {path}", attribute.as_str());
        }
        "extract_reference" => {
            let attribute = parse_attribute(intent)?;
            let Some(image) = latest_image(state.conversation.turns()).cloned() else {
                println!("No image to extract from yet.");
                return Ok(());
            };
            let result = session.extract_reference(attribute, &image);
            report(common, &result)?;
        }
        "clear_reference" => {
            let attribute = parse_attribute(intent)?;
            session.clear_reference(attribute);
            println!("Forgot the {} reference.", attribute.as_str());
        }
        "keep_attribute" | "change_attribute" => {
            let attribute = parse_attribute(intent)?;
            let mode = if intent.action == "keep_attribute" {
                AttributeMode::Consistent
            } else {
                AttributeMode::Change
            };
            session.set_attribute_mode(attribute, mode);
            println!("{}: {:?}", attribute.as_str(), mode);
        }
        "reset_memory" => {
            session.reset_memory();
            println!("All references cleared.");
        }
        "show_memory" => {
            let snapshot = session.snapshot();
            let settings = session.settings();
            for attribute in Attribute::ALL {
                let slot = snapshot
                    .get(attribute)
                    .map(|image| format!("{} bytes ({})", image.data.len(), image.mime_type))
                    .unwrap_or_else(|| "empty".to_string());
                println!(
                    "{:<12} {:<11} {slot}",
                    attribute.as_str(),
                    format!("{:?}", settings.mode(attribute)).to_lowercase()
                );
            }
        }
        "show_pending" => {
            let pending = session.pending();
            if pending.is_empty() {
                println!("Nothing pending.");
            }
            for entry in pending {
                println!("{}  {}", entry.message_id, entry.prompt);
            }
        }
        "speak" => {
            let text = intent.arg_str("text");
            if text.is_empty() {
                println!("/speak requires text");
                return Ok(());
            }
            match session.speak(text) {
                Ok(clip) => println!("Saved speech to {}", save_audio(&common.out, &clip)?.display()),
                Err(err) => println!("Speech failed: {err}"),
            }
        }
        "send_turn" => {
            let text = intent.prompt.clone().unwrap_or_default();
            let request = TurnRequest::new(text, std::mem::take(&mut state.attached));
            let result = session.send_turn(request.clone(), state.conversation.turns());
            state.conversation.push(request.to_turn());
            if result.needs_aspect_ratio {
                state.last_deferred = result.pending_prompt.clone().map(|prompt| PendingGeneration {
                    message_id: result.message_id.clone(),
                    prompt,
                });
            }
            finish_model_turn(common, state, &result)?;
            if result.needs_aspect_ratio {
                println!("Reply with /ratio <ratio> to continue.");
            }
        }
        _ => {
            let command = intent.arg_str("command");
            println!("Unknown command /{command}. Type /help for commands.");
        }
    }
    Ok(())
}

fn parse_attribute(intent: &Intent) -> Result<Attribute> {
    let raw = intent.arg_str("attribute");
    Attribute::parse(raw).with_context(|| {
        format!("unknown attribute \"{raw}\" (use face, dress, background or environment)")
    })
}

/// Prints the result and records it as the model's turn.
fn finish_model_turn(common: &CommonArgs, state: &mut ChatState, result: &GenerationResult) -> Result<()> {
    let image = result_image(result)?;
    if let Some(prompt) = result.prompt.as_ref() {
        state.last_prompt = Some(prompt.clone());
    }
    state.conversation.push(ConversationTurn::model(
        result.text.clone(),
        image.into_iter().collect(),
    ));
    report(common, result)
}

fn result_image(result: &GenerationResult) -> Result<Option<ImageBlob>> {
    result
        .image
        .as_deref()
        .map(|uri| ImageBlob::from_encoded(uri, "image/png").context("result image is not valid base64"))
        .transpose()
}

fn report(common: &CommonArgs, result: &GenerationResult) -> Result<()> {
    let saved = match result_image(result)? {
        Some(image) => Some(save_image(&common.out, &result.message_id, &image)?),
        None => None,
    };

    if common.json {
        let mut value = serde_json::to_value(result)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("image");
            if let Some(path) = saved.as_ref() {
                object.insert(
                    "savedTo".to_string(),
                    Value::String(path.to_string_lossy().to_string()),
                );
            }
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", result.text);
    for source in result.sources.iter().flatten() {
        println!("  - {} <{}>", source.title, source.uri);
    }
    if let Some(path) = saved {
        println!("Saved image to {}", path.display());
    }
    if let Some(kind) = result.failure {
        warn!(failure = ?kind, message_id = result.message_id.as_str(), "turn failed");
    }
    Ok(())
}

fn read_image(path: &Path) -> Result<ImageBlob> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if data.is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(ImageBlob::new(data, mime_for_path(path)))
}

fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    let base = mime.split(';').next().unwrap_or_default().trim();
    match base {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/mpeg" => "mp3",
        value if value.starts_with("audio/") => "pcm",
        _ => "png",
    }
}

fn save_image(out: &Path, message_id: &str, image: &ImageBlob) -> Result<PathBuf> {
    let path = out.join(format!(
        "image-{}.{}",
        message_id,
        extension_for_mime(&image.mime_type)
    ));
    fs::write(&path, &image.data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Raw payload as returned; PCM clips are not wrapped or decoded.
fn save_audio(out: &Path, clip: &AudioClip) -> Result<PathBuf> {
    let path = out.join(format!(
        "speech-{}.{}",
        Uuid::new_v4(),
        extension_for_mime(&clip.mime_type)
    ));
    fs::write(&path, &clip.data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
