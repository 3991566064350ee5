//! MCPShield CLI Binary
//!
//! Parses arguments, builds the runtime, dispatches to the workflows, and
//! maps workflow results onto the process exit-code contract.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use mcpshield_lib::cli::{CacheCommands, Cli, Commands, ConfigCommands, json_output, render, sarif};
use mcpshield_lib::config::Settings;
use mcpshield_lib::core::error::{EXIT_FAILURE, EXIT_OK, EXIT_UNEXPECTED};
use mcpshield_lib::core::{ContentCache, ShieldError, paths};
use mcpshield_lib::lockfile::LockfileStore;
use mcpshield_lib::workflows::{self, AddOptions, ScanOptions, VerifyOptions};

#[cfg(not(target_env = "msvc"))]
use mimalloc::MiMalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", render::error(&err.to_string()));
            err.exit_code()
        }
    };
    u8::try_from(code).map_or(ExitCode::from(EXIT_UNEXPECTED as u8), ExitCode::from)
}

fn dispatch(cli: Cli) -> Result<i32, ShieldError> {
    let settings =
        Settings::load().map_err(|e| ShieldError::Unexpected(format!("settings: {e}")))?;
    let store = LockfileStore::new(
        cli.lockfile
            .clone()
            .unwrap_or_else(paths::default_lockfile_path),
    );
    let policy_path = cli
        .policy
        .clone()
        .unwrap_or_else(paths::default_policy_path);
    let cache = ContentCache::new();
    let json = cli.json;
    let show_progress = !json;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| ShieldError::Unexpected(format!("runtime: {e}")))?;

    match cli.command {
        Commands::Add {
            namespace,
            yes,
            non_interactive,
        } => {
            let options = AddOptions {
                interactive: !non_interactive,
                approve_all: yes,
                show_progress,
            };
            let report = rt.block_on(workflows::add(
                &namespace,
                &options,
                &settings,
                &store,
                &policy_path,
                &cache,
            ))?;
            if json {
                json_output::print_json(&report);
            } else {
                render::render_add(&report);
            }
            Ok(EXIT_OK)
        }

        Commands::Scan {
            enforce,
            offline,
            sarif: sarif_path,
        } => {
            let options = ScanOptions {
                enforce,
                offline,
                show_progress,
            };
            let report = rt.block_on(workflows::scan(
                &options,
                &settings,
                &store,
                &policy_path,
                &cache,
            ))?;
            if let Some(path) = sarif_path {
                let document = sarif::sarif_report(&report);
                let mut body = serde_json::to_string_pretty(&document)?;
                body.push('\n');
                std::fs::write(&path, body)?;
                tracing::info!(path = %path.display(), "wrote SARIF report");
            }
            if json {
                json_output::print_json(&report);
            } else {
                render::render_scan(&report);
            }
            Ok(workflows::scan::exit_code(&report))
        }

        Commands::Verify { offline } => {
            let options = VerifyOptions {
                offline,
                show_progress,
            };
            let report =
                rt.block_on(workflows::verify(&options, &settings, &store, &cache))?;
            if json {
                json_output::print_json(&report);
            } else {
                render::render_verify(&report);
            }
            Ok(workflows::verify::exit_code(&report))
        }

        Commands::Remove { namespace } => {
            if store.remove_server(&namespace)? {
                println!("{}", render::success(&format!("removed {namespace}")));
                Ok(EXIT_OK)
            } else {
                Err(ShieldError::User(format!("'{namespace}' is not pinned")))
            }
        }

        Commands::List => {
            let lockfile = store.read()?;
            if json {
                json_output::print_json(&lockfile);
            } else {
                render::render_list(&lockfile);
            }
            Ok(EXIT_OK)
        }

        Commands::Validate => {
            let report = workflows::validate(&store, &policy_path)?;
            if json {
                json_output::print_json(&report);
            } else {
                render::render_validate(&report);
            }
            Ok(workflows::validate::exit_code(&report))
        }

        Commands::Doctor => {
            let report = workflows::doctor(&settings, &store, &policy_path, &cache)?;
            if json {
                json_output::print_json(&report);
            } else {
                render::render_doctor(&report);
            }
            Ok(if report.ok { EXIT_OK } else { EXIT_FAILURE })
        }

        Commands::Cache { command } => run_cache(&command, &settings, &cache, json),

        Commands::Config { command } => run_config(&command, &settings, json),
    }
}

fn run_config(
    command: &ConfigCommands,
    settings: &Settings,
    json: bool,
) -> Result<i32, ShieldError> {
    match command {
        ConfigCommands::Init { force } => {
            let path = Settings::config_path();
            if path.exists() && !force {
                return Err(ShieldError::User(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            Settings::default()
                .save()
                .map_err(|e| ShieldError::Unexpected(format!("settings: {e}")))?;
            println!("{}", render::success(&format!("wrote {}", path.display())));
            Ok(EXIT_OK)
        }
        ConfigCommands::Show => {
            if json {
                json_output::print_json(settings);
            } else {
                let rendered = toml::to_string_pretty(settings)
                    .map_err(|e| ShieldError::Unexpected(format!("settings: {e}")))?;
                print!("{rendered}");
            }
            Ok(EXIT_OK)
        }
    }
}

fn run_cache(
    command: &CacheCommands,
    settings: &Settings,
    cache: &ContentCache,
    json: bool,
) -> Result<i32, ShieldError> {
    match command {
        CacheCommands::Info => {
            let (bytes, files) = cache.stats()?;
            if json {
                json_output::print_json(&serde_json::json!({
                    "root": cache.root(),
                    "files": files,
                    "bytes": bytes,
                }));
            } else {
                println!("cache root: {}", cache.root().display());
                println!("{files} file(s), {bytes} bytes");
            }
            Ok(EXIT_OK)
        }
        CacheCommands::Cleanup { max_age_days } => {
            let days = max_age_days.unwrap_or(settings.cache_max_age_days);
            let removed = cache.cleanup(Duration::from_secs(days * 24 * 60 * 60))?;
            println!(
                "{}",
                render::success(&format!("removed {removed} entr(ies) older than {days}d"))
            );
            Ok(EXIT_OK)
        }
        CacheCommands::Purge { yes } => {
            if !yes {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!("Remove everything under {}?", cache.root().display()))
                    .default(false)
                    .interact()
                    .map_err(|e| ShieldError::Unexpected(format!("prompt failed: {e}")))?;
                if !confirmed {
                    return Err(ShieldError::User("purge aborted".into()));
                }
            }
            let removed = cache.purge()?;
            println!("{}", render::success(&format!("purged {removed} file(s)")));
            Ok(EXIT_OK)
        }
    }
}
