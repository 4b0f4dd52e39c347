//! tcgen CLI - Command-line interface
//!
//! Commands:
//!   run      - Generate test cases and a gap report from a manifest
//!   schema   - Print JSON schema for an input or output type
//!   version  - Print version

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tcgen::*;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "run" => cmd_run(&args[2..]),
        "schema" => cmd_schema(&args[2..]),
        "version" | "--version" | "-v" => {
            println!("tcgen {}", VERSION);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            Err("Unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"
tcgen - Test case generation with coverage gap analysis

USAGE:
    tcgen <COMMAND> [OPTIONS]

COMMANDS:
    run <manifest.yaml>              Generate cases and a gap report
    schema [name]                    Print JSON schema (manifest, config, output, replay)
    version                          Print version

OPTIONS:
    --config <file>                   Generator config (overrides manifest `config`)
    --replay <file>                   Recorded suggestions (overrides manifest `replay`)
    --rule-based                      Ignore any replay file and use built-in rules
    --output <file>                   Output file (default: stdout)
    --json                            JSON output format
    --strict                          Fail when requirement coverage is below threshold

ENVIRONMENT:
    RUST_LOG                          Log filter, e.g. RUST_LOG=tcgen=debug

EXAMPLES:
    tcgen run login/manifest.yaml
    tcgen run login/manifest.yaml --replay login/answers.yaml --json > run.json
    tcgen schema manifest
"#
    );
}

fn cmd_run(args: &[String]) -> Result<()> {
    let Some(manifest_path) = args.first().filter(|a| !a.starts_with("--")) else {
        return Err("Usage: tcgen run <manifest.yaml> [--config f] [--replay f] [--json]".into());
    };
    let json_output = args.contains(&"--json".to_string());
    let strict = args.contains(&"--strict".to_string());
    let rule_based = args.contains(&"--rule-based".to_string());
    let output_path = parse_path_arg(args, "--output");

    let manifest = Manifest::load(Path::new(manifest_path))?;

    let config = match parse_path_arg(args, "--config") {
        Some(path) => GeneratorConfig::load(&path)?,
        None => match &manifest.config {
            Some(path) => GeneratorConfig::load(&manifest.resolve_path(path))?,
            None => GeneratorConfig::default(),
        },
    };

    let replay_path = if rule_based {
        None
    } else {
        parse_path_arg(args, "--replay").or_else(|| manifest.replay.as_ref().map(|p| manifest.resolve_path(p)))
    };
    let source: Arc<dyn SuggestionSource> = match replay_path {
        Some(path) => Arc::new(ReplaySource::load(&path)?),
        None => Arc::new(RuleBasedSource),
    };

    let (inputs, load_diagnostics) = manifest.load_sources();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers.clamp(1, 8))
        .enable_all()
        .build()
        .map_err(Error::Io)?;

    let mut output = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling run");
                on_signal.cancel();
            }
        });
        run_pipeline(&config, &inputs, &manifest.context, source, &cancel).await
    })?;
    let mut diagnostics = load_diagnostics;
    diagnostics.append(&mut output.diagnostics);
    output.diagnostics = diagnostics;

    let mut buffer = Vec::new();
    let generated_at = chrono::Utc::now();
    if json_output {
        JsonSink::new(&mut buffer).stamped(generated_at).accept(&output)?;
    } else {
        TextSink::new(&mut buffer).stamped(generated_at).accept(&output)?;
    }
    write_output(&output_path, &buffer)?;

    if strict && !output.gaps.summary.meets_threshold {
        return Err(format!(
            "Requirement coverage {:.0}% is below threshold {:.0}%",
            output.gaps.summary.requirements.ratio * 100.0,
            output.gaps.summary.threshold * 100.0
        )
        .into());
    }
    Ok(())
}

fn cmd_schema(args: &[String]) -> Result<()> {
    let schema_name = args.first().map(|s| s.as_str()).unwrap_or("list");

    match schema_name {
        "list" => {
            println!("Available schemas: manifest, config, output, replay");
            Ok(())
        }
        "manifest" => print_schema::<Manifest>(),
        "config" => print_schema::<GeneratorConfig>(),
        "output" => print_schema::<RunOutput>(),
        "replay" => print_schema::<std::collections::BTreeMap<String, Vec<CandidateRecord>>>(),
        _ => Err(format!("Unknown schema: {}", schema_name).into()),
    }
}

fn print_schema<T: schemars::JsonSchema>() -> Result<()> {
    let schema = schemars::schema_for!(T);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn parse_path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    for (i, arg) in args.iter().enumerate() {
        if arg == flag {
            if let Some(path) = args.get(i + 1) {
                return Some(PathBuf::from(path));
            }
        }
    }
    None
}

fn write_output(path: &Option<PathBuf>, content: &[u8]) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content).map_err(Error::Io)?;
            eprintln!("Wrote {}", p.display());
        }
        None => {
            use std::io::Write;
            let mut stdout = io::stdout().lock();
            stdout.write_all(content).map_err(Error::Io)?;
        }
    }
    Ok(())
}
