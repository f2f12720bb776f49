//! rpcstub compiler CLI.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebounceEventResult};
use tracing_subscriber::EnvFilter;

use rpcstub_compiler::{CallingConvention, CompileResult, Compiler, CompilerConfig, CompilerError};

mod ui;

#[derive(Parser)]
#[command(name = "rpcstub")]
#[command(about = "rpcstub compiler - generates RPC client and server stubs from an IDL syntax tree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate stubs and write them to the output directory
    Compile(BuildArgs),

    /// Run the whole pipeline without writing anything
    Check(BuildArgs),

    /// Recompile whenever the syntax tree changes
    Watch(BuildArgs),
}

#[derive(Args, Clone)]
struct BuildArgs {
    /// Syntax tree to compile
    idl: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target ecosystem (repeatable): python, typescript
    #[arg(short, long = "target")]
    targets: Vec<String>,

    /// Calling convention: direct, async, dynamic
    #[arg(long)]
    convention: Option<String>,

    /// Service version to pin requests to
    #[arg(long)]
    service_ver: Option<String>,

    /// Default service URL baked into generated clients
    #[arg(long)]
    url: Option<String>,

    /// Syntax tree interchange format
    #[arg(long)]
    format: Option<String>,

    /// Skip server skeletons
    #[arg(long)]
    no_server: bool,
}

impl BuildArgs {
    fn into_config(self) -> miette::Result<CompilerConfig> {
        let mut config = match &self.config {
            Some(path) => CompilerConfig::load(path)?,
            None => CompilerConfig::default(),
        };

        if let Some(idl) = self.idl {
            config.idl_path = idl;
        }
        if let Some(output) = self.output {
            config.out_dir = output;
        }
        if !self.targets.is_empty() {
            config.targets = self.targets;
        }
        if let Some(convention) = self.convention {
            config.convention = CallingConvention::from_str(&convention).ok_or_else(|| {
                miette::miette!(
                    help = "Use one of: direct, async, dynamic",
                    "Unknown calling convention '{}'",
                    convention
                )
            })?;
        }
        if self.service_ver.is_some() {
            config.service_ver = self.service_ver;
        }
        if self.url.is_some() {
            config.url = self.url;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.no_server {
            config.emit_server = false;
        }

        if config.idl_path.as_os_str().is_empty() {
            return Err(miette::miette!(
                help = "Pass the syntax tree path or set idl_path in --config",
                "No syntax tree given"
            ));
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile(args) => {
            let config = args.into_config()?;
            compile_once(config)?;
        }
        Commands::Check(args) => {
            let config = args.into_config()?;
            check(config)?;
        }
        Commands::Watch(args) => {
            let config = args.into_config()?;
            run_watch_mode(config).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RPCSTUB_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn compile_once(config: CompilerConfig) -> miette::Result<()> {
    let out_dir = config.out_dir.clone();
    let spinner = ui::spinner("Generating stubs...");
    let start = Instant::now();

    match Compiler::new(config).compile() {
        Ok(result) => {
            spinner.finish_and_clear();
            ui::success(&format!("Wrote {} files to {}", result.files, out_dir.display()));
            print_summary(&result);
            ui::timing("Compiled", start.elapsed().as_millis());
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(report_failure(e))
        }
    }
}

fn check(config: CompilerConfig) -> miette::Result<()> {
    let spinner = ui::spinner("Checking syntax tree...");

    match Compiler::new(config).check() {
        Ok(result) => {
            spinner.finish_and_clear();
            ui::looking_good();
            print_summary(&result);
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(report_failure(e))
        }
    }
}

fn print_summary(result: &CompileResult) {
    println!(
        "    {} modules {} {} functions {} {} types {} {} files",
        result.modules,
        ui::symbols::DOT,
        result.functions,
        ui::symbols::DOT,
        result.types,
        ui::symbols::DOT,
        result.files
    );
    if !result.tuple_arities.is_empty() {
        let arities: Vec<String> = result.tuple_arities.iter().map(usize::to_string).collect();
        ui::dim(&format!("    tuple arities: {}", arities.join(", ")));
    }
}

fn report_failure(error: CompilerError) -> miette::Report {
    ui::error_header();
    if error.is_round_trip() {
        ui::info("Existing stubs were left untouched. Fix the region markers and run again.");
        println!();
    }
    miette::Report::new(error)
}

/// Recompiles on every debounced change to the syntax tree file.
async fn run_watch_mode(config: CompilerConfig) -> miette::Result<()> {
    let idl_path = config.idl_path.clone();
    let watch_dir = watch_dir(&idl_path);
    let file_name = idl_path.file_name().map(|n| n.to_os_string());

    ui::info(&format!("Watching {}", idl_path.display()));
    if let Err(e) = compile_once(config.clone()) {
        eprintln!("{:?}", e);
    }

    let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
    let mut debouncer = new_debouncer(Duration::from_millis(300), move |result: DebounceEventResult| {
        match result {
            Ok(events) => {
                let touched = events
                    .iter()
                    .any(|event| event.path.file_name().map(|n| n.to_os_string()) == file_name);
                if touched {
                    let _ = tx.try_send(());
                }
            }
            Err(e) => tracing::warn!(error = %e, "file watcher error"),
        }
    })
    .map_err(|e| miette::miette!("Failed to create file watcher: {}", e))?;

    debouncer
        .watcher()
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|e| miette::miette!("Failed to watch {}: {}", watch_dir.display(), e))?;

    println!();
    ui::info("Ready. Waiting for changes...");

    loop {
        tokio::select! {
            Some(()) = rx.recv() => {
                println!();
                if let Err(e) = compile_once(config.clone()) {
                    eprintln!("{:?}", e);
                }
                println!();
                ui::info("Ready. Waiting for changes...");
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                ui::dim("Stopping watch mode.");
                break;
            }
        }
    }

    Ok(())
}

fn watch_dir(idl_path: &Path) -> PathBuf {
    match idl_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> BuildArgs {
        let mut argv = vec!["rpcstub", "compile"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Compile(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "calc.json",
            "-o",
            "out",
            "-t",
            "python",
            "-t",
            "ts",
            "--convention",
            "async",
            "--no-server",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.idl_path, PathBuf::from("calc.json"));
        assert_eq!(config.out_dir, PathBuf::from("out"));
        assert_eq!(config.targets, vec!["python".to_string(), "ts".to_string()]);
        assert_eq!(config.convention, CallingConvention::Async);
        assert!(!config.emit_server);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rpcstub.json");
        std::fs::write(
            &path,
            r#"{ "idl_path": "svc.json", "out_dir": "gen", "convention": "dynamic" }"#,
        )
        .unwrap();

        let config = parse(&["-c", path.to_str().unwrap(), "-o", "elsewhere"])
            .into_config()
            .unwrap();
        assert_eq!(config.idl_path, PathBuf::from("svc.json"));
        assert_eq!(config.out_dir, PathBuf::from("elsewhere"));
        assert_eq!(config.convention, CallingConvention::Dynamic);
    }

    #[test]
    fn test_unknown_convention_is_rejected() {
        assert_eq!(parse(&[]).into_config().unwrap().idl_path, PathBuf::from("idl.json"));
        assert!(parse(&["calc.json", "--convention", "rest"]).into_config().is_err());
    }

    #[test]
    fn test_watch_dir_defaults_to_current() {
        assert_eq!(watch_dir(Path::new("calc.json")), PathBuf::from("."));
        assert_eq!(watch_dir(Path::new("idl/calc.json")), PathBuf::from("idl"));
    }
}
