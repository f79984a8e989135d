use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use num_format::{Locale, ToFormattedString};
use prompt_editor::config::{source_name_for_file, EngineConfig, InstanceSettings};
use prompt_editor::config_io::{default_settings_root, FileSettingsStore};
use prompt_editor::host::{Position, PromptBuffer};
use prompt_editor::partial_config::PartialInstanceSettings;
use prompt_editor::primitives::highlighter::{tokenize_line, PromptLanguage};
use prompt_editor::services::completion::{CompletionList, CompletionRequest};
use prompt_editor::services::dynamic_suggest::TriggerOutcome;
use prompt_editor::PromptEngine;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Query the prompt tag completion engine
#[derive(Parser, Debug)]
#[command(name = "prompt-editor")]
#[command(about = "Tag completion for image-generation prompts", long_about = None)]
#[command(version)]
struct Args {
    /// CSV tag files to load (default: the files named in the configuration)
    #[arg(long = "csv", value_name = "PATH")]
    csv: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Minimum popularity count for suggested tags
    #[arg(long)]
    threshold: Option<f64>,

    /// Extra-network list as TYPE=name1,name2 (e.g., lora=add_detail)
    #[arg(long = "extra", value_name = "TYPE=NAMES")]
    extra: Vec<String>,

    /// Insert tags with spaces instead of underscores
    #[arg(long)]
    replace_underscore: bool,

    /// Prompt line to complete
    #[arg(long)]
    line: Option<String>,

    /// Cursor column in the line (default: end of line)
    #[arg(long)]
    column: Option<usize>,

    /// Character that triggered completion
    #[arg(long)]
    trigger: Option<char>,

    /// Maximum number of suggestions to print
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Directory searched for */snippets/*.json
    #[arg(long, value_name = "DIR")]
    snippets: Option<PathBuf>,

    /// Run a dynamic suggestion by keybinding instead of tag completion
    #[arg(long, value_name = "KEY")]
    keybinding: Option<String>,

    /// Print the tokens of the line instead of completions
    #[arg(long)]
    tokenize: bool,

    /// Language id used by --tokenize
    #[arg(long, default_value = "sd-prompt")]
    language: String,

    /// Root holding persisted settings (default: ./.prompt-editor)
    #[arg(long, value_name = "DIR")]
    settings_root: Option<PathBuf>,

    /// Load the persisted settings of this user instead of the global ones
    #[arg(long)]
    user: Option<String>,

    /// Ignore persisted settings
    #[arg(long)]
    no_settings: bool,

    /// Print the JSON schema of the instance settings and exit
    #[arg(long)]
    schema: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn load_config(args: &Args) -> AnyhowResult<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if args.snippets.is_some() {
        config.snippet_dir = args.snippets.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_list(list: &CompletionList, limit: usize) {
    for suggestion in list.suggestions.iter().take(limit) {
        println!(
            "{}\t{}\t{}",
            suggestion.label,
            suggestion.insert_text,
            suggestion.description.as_deref().unwrap_or_default()
        );
    }
    if list.len() > limit {
        println!("... {} more", (list.len() - limit).to_formatted_string(&Locale::en));
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> AnyhowResult<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();

    if args.schema {
        let schema = schemars::schema_for!(InstanceSettings);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = load_config(&args)?;
    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let Some(line) = args.line.clone() else {
        anyhow::bail!("Nothing to do: pass --line, --schema or --dump-config");
    };

    let mut buffer = PromptBuffer::new(&line);
    if let Some(column) = args.column {
        buffer.set_cursor(Position::new(0, column));
    }

    if args.tokenize {
        let language = PromptLanguage::from_id(&args.language)
            .with_context(|| format!("Unknown language id {:?}", args.language))?;
        for token in tokenize_line(language, &line) {
            println!("{:?}\t{:?}", token.kind, &line[token.range]);
        }
        return Ok(());
    }

    let mut engine = PromptEngine::new(config).with_user(args.user.clone());
    if !args.no_settings {
        let root = match &args.settings_root {
            Some(root) => root.clone(),
            None => default_settings_root(
                &std::env::current_dir().context("Failed to read the working directory")?,
            ),
        };
        let store = FileSettingsStore::new(root);
        engine
            .load_settings(&store)
            .await
            .context("Failed to load persisted settings")?;
    }
    if args.replace_underscore {
        engine.update_settings(&PartialInstanceSettings {
            replace_underscore: Some(true),
            ..Default::default()
        });
    }

    if args.csv.is_empty() && engine.config().csv_dir.is_some() {
        engine.load_configured_csv().await;
    }
    for path in &args.csv {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .with_context(|| format!("Not a file: {}", path.display()))?;
        let name = source_name_for_file(&file_name)?;
        engine
            .add_csv_file(&name, path)
            .await
            .with_context(|| format!("Failed to load {}", path.display()))?;
    }

    for spec in &args.extra {
        let (kind, names) = spec
            .split_once('=')
            .with_context(|| format!("Expected TYPE=NAMES, got {:?}", spec))?;
        let names: Vec<String> = names
            .split(',')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        engine.add_data(kind, &names, false);
    }

    eprintln!(
        "{} entries, {} above threshold",
        engine.get_count().to_formatted_string(&Locale::en),
        engine.tags().filtered().len().to_formatted_string(&Locale::en)
    );

    if let Some(keybinding) = &args.keybinding {
        engine.register_snippets();
        let outcome = engine
            .handle_keybinding(keybinding, &mut buffer)
            .await
            .with_context(|| format!("Nothing bound to {}", keybinding))?;
        if let TriggerOutcome::Opened(_) = outcome {
            let request = CompletionRequest::from_host(&buffer, None);
            let handle = buffer
                .registered_sources()
                .last()
                .map(|(handle, _)| *handle)
                .context("No completion source registered")?;
            if let Some(list) = engine.provide(handle, &request) {
                print_list(&list, args.limit);
            }
            engine.tick(&mut buffer);
        }
        return Ok(());
    }

    engine.register_completion_sources(&mut buffer);
    let request = CompletionRequest::from_host(&buffer, args.trigger);
    print_list(&engine.complete(&request), args.limit);
    engine.dispose_completion_sources(&mut buffer);

    Ok(())
}
