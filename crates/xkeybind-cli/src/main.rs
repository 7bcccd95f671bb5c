//! xkeybind CLI
//!
//! Inspect the X server's keyboard mapping and try out key bindings.

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use xkeybind::{keysym, Binding, KeybindError, Keymap, KeymapOptions, X11Source};
use xkeybind_config::Config;

type X11Keymap = Keymap<X11Source<RustConnection>>;

#[derive(Parser, Debug)]
#[command(name = "xkeybind")]
#[command(about = "Keyboard mapping and key binding tool for X11")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/xkeybind/config.kdl")]
    config: String,

    /// X display to connect to (overrides config and $DISPLAY)
    #[arg(short, long)]
    display: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the modifier table
    Modmap,

    /// Resolve binding strings such as "Mod4-j" to a mask and keycode
    Resolve {
        #[arg(required = true)]
        specs: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Look up keysyms by name
    Lookup {
        #[arg(required = true)]
        names: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Resolve every binding in the configuration file
    Check,

    /// Grab the configured bindings and report key presses
    Watch,
}

#[derive(Serialize)]
struct ResolveOutput<'a> {
    spec: &'a str,
    modifiers: u16,
    modifier_names: String,
    keycode: Option<u8>,
}

#[derive(Serialize)]
struct LookupOutput<'a> {
    name: &'a str,
    keysym: Option<u32>,
    canonical: Option<&'static str>,
    keycode: Option<u8>,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path = shellexpand::tilde(&cli.config).into_owned();
    let config = xkeybind_config::load_config(Path::new(&config_path))?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.global.log_level.as_filter())
            }),
        )
        .init();

    let display = cli.display.or_else(|| config.global.display.clone());
    let (keymap, screen) = connect(display.as_deref(), &config)?;

    match cli.command {
        Commands::Modmap => cmd_modmap(&keymap),
        Commands::Resolve { specs, json } => cmd_resolve(&keymap, &specs, json),
        Commands::Lookup { names, json } => cmd_lookup(&keymap, &names, json),
        Commands::Check => cmd_check(&keymap, &config, &config_path),
        Commands::Watch => cmd_watch(&keymap, screen, &config),
    }
}

fn connect(display: Option<&str>, config: &Config) -> miette::Result<(X11Keymap, usize)> {
    let (conn, screen) = x11rb::connect(display).map_err(KeybindError::from)?;
    let display_name = display.unwrap_or("$DISPLAY");
    tracing::info!("Connected to display {}", display_name);

    let options = KeymapOptions {
        refresh_timeout: config.global.refresh_timeout,
    };
    let keymap = Keymap::initialize(X11Source::new(Arc::new(conn)), options)?;
    Ok((keymap, screen))
}

fn cmd_modmap(keymap: &X11Keymap) -> miette::Result<()> {
    keymap.dump_modifier_table();
    Ok(())
}

fn cmd_resolve(keymap: &X11Keymap, specs: &[String], json: bool) -> miette::Result<()> {
    // one generation for the whole batch
    let mapping = keymap.snapshot();
    let resolved: Vec<ResolveOutput> = specs
        .iter()
        .map(|spec| {
            let binding = mapping.parse_binding(spec);
            ResolveOutput {
                spec,
                modifiers: binding.modifiers.bits(),
                modifier_names: binding.modifiers.to_string(),
                keycode: binding.keycode,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved).into_diagnostic()?);
        return Ok(());
    }

    for out in &resolved {
        let names = if out.modifier_names.is_empty() {
            "none"
        } else {
            out.modifier_names.as_str()
        };
        let keycode = out
            .keycode
            .map(|k| k.to_string())
            .unwrap_or_else(|| "unresolved".to_string());
        println!(
            "{}: mask=0x{:04x} ({}) keycode={}",
            out.spec,
            out.modifiers,
            names,
            keycode
        );
    }
    Ok(())
}

fn cmd_lookup(keymap: &X11Keymap, names: &[String], json: bool) -> miette::Result<()> {
    let mapping = keymap.snapshot();
    let found: Vec<LookupOutput> = names
        .iter()
        .map(|name| {
            let sym = keymap.lookup_keysym(name);
            LookupOutput {
                name,
                keysym: sym,
                canonical: sym.and_then(keysym::name),
                keycode: sym.and_then(|s| mapping.keycode_for_keysym(s)),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&found).into_diagnostic()?);
        return Ok(());
    }

    for out in &found {
        match out.keysym {
            None => println!("{}: unknown keysym", out.name),
            Some(sym) => {
                let keycode = out
                    .keycode
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "not on keyboard".to_string());
                println!(
                    "{}: {} (0x{:x}) keycode={}",
                    out.name,
                    out.canonical.unwrap_or("?"),
                    sym,
                    keycode
                );
            }
        }
    }
    Ok(())
}

fn cmd_check(keymap: &X11Keymap, config: &Config, config_path: &str) -> miette::Result<()> {
    println!("Checking bindings in {}", config_path);

    if config.bindings.is_empty() {
        println!("No bindings configured");
        return Ok(());
    }

    let mapping = keymap.snapshot();
    let mut failed = 0;
    for entry in &config.bindings {
        let at = entry
            .location
            .map(|l| format!(" (line {})", l.line))
            .unwrap_or_default();
        match mapping.try_parse_binding(&entry.spec) {
            Ok(binding) => println!("  ok    {}{}: {}", entry.spec, at, binding),
            Err(e) => {
                failed += 1;
                println!("  FAIL  {}{}: {}", entry.spec, at, e);
            }
        }
    }

    if failed > 0 {
        return Err(miette::miette!(
            "{} of {} binding(s) could not be resolved",
            failed,
            config.bindings.len()
        ));
    }
    println!("All {} binding(s) resolved", config.bindings.len());
    Ok(())
}

/// Resolve and grab every configured binding, skipping the ones that fail.
fn grab_all(keymap: &X11Keymap, root: u32, config: &Config) -> Vec<(String, Binding)> {
    let conn = keymap.source().connection();
    let mut grabbed = Vec::new();
    for entry in &config.bindings {
        let binding = match keymap.try_parse_binding(&entry.spec) {
            Ok(binding) => binding,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", entry.spec, e);
                continue;
            }
        };
        match xkeybind::grab_key(conn.as_ref(), root, &binding) {
            Ok(()) => grabbed.push((entry.spec.clone(), binding)),
            Err(e) => tracing::warn!("Could not grab {}: {}", entry.spec, e),
        }
    }
    grabbed
}

fn ungrab_all(keymap: &X11Keymap, root: u32, grabbed: &[(String, Binding)]) {
    let conn = keymap.source().connection();
    for (spec, binding) in grabbed {
        if let Err(e) = xkeybind::ungrab_key(conn.as_ref(), root, binding) {
            tracing::warn!("Could not release {}: {}", spec, e);
        }
    }
}

fn cmd_watch(keymap: &X11Keymap, screen: usize, config: &Config) -> miette::Result<()> {
    let conn = Arc::clone(keymap.source().connection());
    let root = conn.setup().roots[screen].root;

    let mut grabbed = grab_all(keymap, root, config);
    if grabbed.is_empty() {
        return Err(miette::miette!("No bindings could be grabbed"));
    }
    println!("Watching {} binding(s), press Ctrl-C to stop", grabbed.len());

    loop {
        let event = conn.wait_for_event().map_err(KeybindError::from)?;

        match &event {
            Event::KeyPress(press) => {
                for (spec, binding) in &grabbed {
                    if binding.matches_event(press) {
                        println!("{} pressed", spec);
                        tracing::info!(
                            "Binding {} fired (state=0x{:x})",
                            spec,
                            u16::from(press.state)
                        );
                    }
                }
            }
            Event::MappingNotify(_) => {
                // a failed refresh leaves nothing trustworthy to grab with
                let Some(mapping) = keymap.handle_event(&event)? else {
                    continue;
                };
                tracing::info!(
                    "Keyboard mapping changed, now generation {}",
                    mapping.generation
                );
                // the old bindings still hold the keycodes that were grabbed
                ungrab_all(keymap, root, &grabbed);
                grabbed = grab_all(keymap, root, config);
            }
            _ => {}
        }
    }
}
