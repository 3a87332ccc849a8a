use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::path::PathBuf;

use draftlab::protocol::{PortableValue, PropertyMeta, ValueKind};
use draftlab::sync::{AuthoringContext, MessageBus, RenderingContext};
use draftlab::{Hint, Host, deserialize, serialize, transpile};

#[derive(ClapParser)]
#[command(name = "draftlab")]
#[command(about = "Component playground core CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a fragment file transpiles
    Check {
        /// Path to the fragment file
        file: PathBuf,
    },
    /// Serialize an inline fragment and print the resulting value
    Eval {
        /// The fragment to serialize
        code: String,
        /// Declared value kind (string, number, bool, object, shape, array,
        /// function, markup)
        #[arg(long, default_value = "object")]
        kind: String,
        /// Take the text verbatim instead of transpiling
        #[arg(long)]
        raw: bool,
    },
    /// Reformat an inline fragment
    Fmt {
        /// The fragment to reformat
        code: String,
        /// Declared value kind (string, number, bool, object, shape, array,
        /// function, markup)
        #[arg(long, default_value = "object")]
        kind: String,
        /// Multi-line output
        #[arg(long)]
        pretty: bool,
    },
    /// Run a scripted authoring/rendering session and trace the sync flow
    Demo,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { file } => match fs::read_to_string(&file) {
            Ok(code) => check_code(&code, &file),
            Err(e) => {
                eprintln!("Error reading file: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Eval { code, kind, raw } => eval_code(&code, &kind, raw),
        Commands::Fmt { code, kind, pretty } => fmt_code(&code, &kind, pretty),
        Commands::Demo => run_demo(),
    }
}

fn parse_kind(kind: &str) -> Option<ValueKind> {
    Some(match kind {
        "string" => ValueKind::String,
        "number" => ValueKind::Number,
        "bool" => ValueKind::Bool,
        "object" => ValueKind::Object,
        "shape" => ValueKind::Shape,
        "array" => ValueKind::Array,
        "function" => ValueKind::Function,
        "markup" => ValueKind::Markup,
        _ => return None,
    })
}

fn check_code(code: &str, file: &PathBuf) {
    eprintln!("Checking: {}", file.display());
    match transpile(code) {
        Ok(artifact) => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "ok",
                    "statements": artifact.statements.len(),
                })
            );
        }
        Err(error) => {
            eprintln!("{}", error.report);
            println!(
                "{}",
                serde_json::json!({
                    "status": "error",
                    "error": error.message,
                })
            );
            std::process::exit(1);
        }
    }
}

fn eval_code(code: &str, kind: &str, raw: bool) {
    let Some(kind) = parse_kind(kind) else {
        eprintln!("Unknown kind: {}", kind);
        std::process::exit(1);
    };

    let host = Host::new();
    host.set_alert(|message| eprintln!("[alert] {}", message));

    let hints: &[Hint] = if raw { &[Hint::String] } else { &[] };
    match serialize(code, kind, hints, &host) {
        Ok(value) => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "ok",
                    "kind": value.kind_name(),
                    "text": deserialize(&value, false),
                })
            );
        }
        Err(error) => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "error",
                    "error": error.to_string(),
                })
            );
            std::process::exit(1);
        }
    }
}

fn fmt_code(code: &str, kind: &str, pretty: bool) {
    let Some(kind) = parse_kind(kind) else {
        eprintln!("Unknown kind: {}", kind);
        std::process::exit(1);
    };

    let host = Host::new();
    match serialize(code, kind, &[], &host) {
        Ok(value) => println!("{}", deserialize(&value, pretty)),
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    }
}

/// A fixed end-to-end walkthrough: select a component, edit a property,
/// watch the rendering side mount.
fn run_demo() {
    let catalog = vec![draftlab::protocol::ComponentSpec::new(
        "Greeting",
        vec![
            PropertyMeta::required("name", ValueKind::String)
                .with_default(PortableValue::Text("world".to_owned())),
            PropertyMeta::required("body", ValueKind::Markup),
        ],
    )];

    let (authoring_end, rendering_end) = MessageBus::pair();
    let mut authoring = AuthoringContext::new(catalog, authoring_end, Host::new());
    let mut rendering = RenderingContext::new(rendering_end);

    authoring.rendering_loaded();
    if let Err(error) = rendering.announce_ready() {
        eprintln!("handshake failed: {}", error);
        std::process::exit(1);
    }
    authoring.pump();

    let id = authoring.catalog()[0].id;
    authoring.select_component(id);
    eprintln!("selected Greeting; decision: {:?}", rendering.pump());

    authoring.open_editor("body");
    authoring.edit_text("<div>hello <b>world</b></div>");
    let decision = rendering.pump();
    eprintln!("edited body; decision: {:?}", decision);

    let snapshot = rendering
        .replica()
        .map(|(spec, states)| {
            serde_json::json!({
                "component": spec.name,
                "props": states
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.clone(),
                            serde_json::Value::String(deserialize(value, false)),
                        )
                    })
                    .collect::<serde_json::Map<String, serde_json::Value>>(),
            })
        })
        .unwrap_or(serde_json::Value::Null);

    println!(
        "{}",
        serde_json::json!({
            "status": "ok",
            "decision": format!("{:?}", decision),
            "replica": snapshot,
        })
    );
}
