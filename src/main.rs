//! OneLauncher add-on manager - Main entry point.
//!
//! Usage: onelauncher-addons <COMMAND> [ARGS]
//!
//! Commands:
//!   install <FILE>...              Install local .zip archives or .abc files
//!   install-remote <KIND> <ID>     Install an add-on from the remote catalog
//!   uninstall <KIND> <NAME|ID>     Uninstall an add-on
//!   update [<KIND> <ID>]           Update one add-on, or every outdated one
//!   refresh                        Rescan installed add-ons and fetch feeds
//!   search <KIND> <installed|remote> [WORDS]...
//!                                  Search the catalog
//!   enable-script <KIND> <ID>      Enable an add-on's startup script
//!   disable-script <KIND> <ID>     Disable an add-on's startup script
//!
//! Options:
//!   --game <lotro|ddo>   Override the configured game
//!   --config <PATH>      Use another config file
//!   --version, -v        Show version
//!   --help, -h           Show this help

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use onelauncher::addons::{
    AddonKind, AddonManager, CatalogStore, HttpFetcher, InstallObserver, InstallOutcome,
    Locality, StartupScripts, TableKey,
};
use onelauncher::config::{Config, GameType};
use onelauncher::logging;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "Usage: onelauncher-addons [--game lotro|ddo] [--config PATH] <COMMAND> [ARGS]

Commands:
  install <FILE>...              Install local .zip archives or .abc files
  install-remote <KIND> <ID>     Install an add-on from the remote catalog
  uninstall <KIND> <NAME|ID>     Uninstall an add-on
  update [<KIND> <ID>]           Update one add-on, or every outdated one
  refresh                        Rescan installed add-ons and fetch feeds
  search <KIND> <installed|remote> [WORDS]...
                                 Search the catalog
  enable-script <KIND> <ID>      Enable an add-on's startup script
  disable-script <KIND> <ID>     Disable an add-on's startup script

KIND is one of: plugin, skin, music";

/// Observer that prints to the terminal and asks on stdin.
struct CliObserver {
    bar: Option<ProgressBar>,
}

impl CliObserver {
    fn new() -> Self {
        Self { bar: None }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl InstallObserver for CliObserver {
    fn log(&mut self, message: &str) {
        debug!("[ADDON-CLI] {}", message);
        match &self.bar {
            Some(bar) => bar.println(message),
            None => println!("{}", message),
        }
    }

    fn progress(&mut self, fraction: f32) {
        let bar = self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(100);
            let style = ProgressStyle::with_template("{bar:40} {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        bar.set_position((fraction.clamp(0.0, 1.0) * 100.0) as u64);
        if fraction >= 1.0 {
            self.finish();
        }
    }

    fn confirm(&mut self, prompt: &str, details: &str) -> bool {
        self.finish();
        println!("{}", prompt);
        if !details.is_empty() {
            println!("----------------------------------------");
            println!("{}", details);
            println!("----------------------------------------");
        }
        print!("Continue? [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version" || a == "-v") {
        println!("onelauncher-addons v{}", VERSION);
        return Ok(());
    }
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config_path = take_option(&mut args, "--config")?.map(PathBuf::from);
    let game_override = take_option(&mut args, "--game")?;

    let mut config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    if let Some(game) = game_override {
        config.game = GameType::parse(&game).ok_or_else(|| format!("Unknown game: {game}"))?;
    }

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let catalog = CatalogStore::open(&config.catalog_path())?;
    let scripts = StartupScripts::load(&config.startup_scripts_path())?;
    let mut manager = AddonManager::new(&config, catalog, scripts, Box::new(HttpFetcher::new()));
    let mut observer = CliObserver::new();

    let command = args.remove(0);
    let result = dispatch(&mut manager, &mut observer, &command, &args);
    observer.finish();
    manager.close()?;
    result
}

fn dispatch(
    manager: &mut AddonManager,
    observer: &mut CliObserver,
    command: &str,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        "install" => {
            arg(args, 0, "FILE")?;
            for file in args {
                // One bad archive doesn't stop the rest
                match manager.install_local(&PathBuf::from(file), observer) {
                    Ok(outcome) => report(outcome),
                    Err(e) => eprintln!("{}: {}", file, e),
                }
            }
        }
        "install-remote" => {
            let kind = kind_arg(args)?;
            manager.refresh_all()?;
            report(manager.install_remote(kind, arg(args, 1, "ID")?, observer)?);
        }
        "uninstall" => {
            let kind = kind_arg(args)?;
            manager.refresh_installed(kind)?;
            if !manager.uninstall(kind, arg(args, 1, "NAME|ID")?, observer)? {
                println!("Uninstall cancelled.");
            }
        }
        "update" if !args.is_empty() => {
            let kind = kind_arg(args)?;
            manager.refresh_all()?;
            report(manager.update(kind, arg(args, 1, "ID")?, observer)?);
        }
        "update" => {
            let outdated = manager.check_for_updates()?;
            if outdated.is_empty() {
                println!("All add-ons are up to date.");
            } else {
                let updated = manager.update_all(observer)?;
                println!("Updated {} of {} add-on(s).", updated, outdated.len());
            }
        }
        "refresh" => {
            manager.refresh_all()?;
            for kind in manager.game().kinds() {
                let installed = manager.catalog().rows(TableKey::installed(kind))?.len();
                let remote = manager.catalog().rows(TableKey::remote(kind))?.len();
                println!(
                    "{:<8} {:>4} installed, {:>5} available",
                    kind.as_str(),
                    installed,
                    remote
                );
            }
        }
        "search" => {
            let kind = kind_arg(args)?;
            let locality = arg(args, 1, "installed|remote")?;
            let locality = Locality::parse(locality)
                .ok_or_else(|| format!("Expected installed or remote, got {locality}"))?;
            let text = args.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();
            let key = TableKey { kind, locality };
            for record in manager.search(key, &text)? {
                println!(
                    "{:>6}  {:<40} {:<12} {:<20} {}",
                    record.id, record.name, record.version, record.author, record.category
                );
            }
        }
        "enable-script" => {
            let kind = kind_arg(args)?;
            manager.refresh_installed(kind)?;
            if manager.enable_startup_script(kind, arg(args, 1, "ID")?, observer)? {
                println!("Startup script enabled.");
            }
        }
        "disable-script" => {
            let kind = kind_arg(args)?;
            manager.refresh_installed(kind)?;
            if manager.disable_startup_script(kind, arg(args, 1, "ID")?)? {
                println!("Startup script disabled.");
            }
        }
        other => return Err(format!("Unknown command: {other}\n\n{USAGE}").into()),
    }
    Ok(())
}

fn report(outcome: InstallOutcome) {
    match outcome {
        InstallOutcome::Installed(addon) => {
            println!("Installed {} {} to {}", addon.kind, addon.name, addon.path.display());
        }
        InstallOutcome::Rejected(reason) => println!("Not installed: {}", reason),
    }
}

/// Removes `--flag VALUE` from `args` and returns the value.
fn take_option(args: &mut Vec<String>, flag: &str) -> Result<Option<String>, String> {
    let Some(index) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if index + 1 >= args.len() {
        return Err(format!("{flag} needs a value"));
    }
    let value = args.remove(index + 1);
    args.remove(index);
    Ok(Some(value))
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str, String> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing argument <{name}>\n\n{USAGE}"))
}

fn kind_arg(args: &[String]) -> Result<AddonKind, String> {
    let value = arg(args, 0, "KIND")?;
    AddonKind::parse(value).ok_or_else(|| format!("Unknown add-on kind: {value}"))
}
