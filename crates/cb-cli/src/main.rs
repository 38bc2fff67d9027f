//! Content blocker converter CLI
//!
//! Compiles filter lists into per-ruleset host JSON files, validates
//! emitted rulesets and resets them to the neutral state.

mod lanes;
mod store;

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};

use cb_compiler::entry::Entry;
use cb_compiler::{
    allowlist_rule, inverted_allowlist_rule, CancellationToken, ConversionResult, ConvertOptions,
    ErrorCounter,
};
use cb_core::{validate_regex, HostVersion};

use lanes::{convert_chunks, LaneConfig};
use store::{fingerprint, reload_all, CachedRules, CommandReloader, RulesetStore};

const DEFAULT_RULESETS: &str = "adBlock privacy banners trackers advanced secure basic";
const RELOAD_ATTEMPTS: usize = 3;

#[derive(Parser)]
#[command(name = "cb-cli")]
#[command(about = "Filter list to content blocker JSON converter")]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert filter lists into host rulesets
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Output directory for `<ruleset>.json` files
        #[arg(short, long, default_value = "rulesets")]
        output: String,

        /// Host version (13, 14, 15, 16, 16.4, 17, 18)
        #[arg(long, default_value_t = HostVersion::LATEST)]
        host_version: HostVersion,

        /// Write the extended rules next to the rulesets
        #[arg(long)]
        advanced: bool,

        /// Byte cap per ruleset JSON
        #[arg(long)]
        max_json_size: Option<usize>,

        /// Lines per ruleset chunk
        #[arg(long, default_value_t = 140_000)]
        chunk_size: usize,

        /// Parallel conversion lanes
        #[arg(long, default_value_t = 4)]
        lanes: usize,

        /// Space separated ruleset identifiers, one per chunk
        #[arg(long, default_value = DEFAULT_RULESETS)]
        rulesets: String,

        /// Domains where blocking is disabled
        #[arg(long)]
        allow: Vec<String>,

        /// Domains where blocking stays enabled; disabled everywhere else
        #[arg(long)]
        only: Vec<String>,

        /// Command run with each ruleset identifier after writing
        #[arg(long)]
        reload_command: Option<String>,

        /// Ignore and overwrite the conversion cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Check a ruleset JSON file against host limits
    Validate {
        /// Ruleset JSON file
        #[arg(short, long)]
        input: String,

        #[arg(long, default_value_t = HostVersion::LATEST)]
        host_version: HostVersion,
    },

    /// Write the neutral ruleset to every identifier
    Disable {
        #[arg(short, long, default_value = "rulesets")]
        output: String,

        #[arg(long, default_value = DEFAULT_RULESETS)]
        rulesets: String,

        #[arg(long)]
        reload_command: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    env_logger::builder()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let result = match cli.command {
        Commands::Compile {
            input,
            output,
            host_version,
            advanced,
            max_json_size,
            chunk_size,
            lanes,
            rulesets,
            allow,
            only,
            reload_command,
            no_cache,
        } => {
            let options = ConvertOptions::new(host_version)
                .with_advanced_blocking(advanced)
                .with_max_json_size(max_json_size);
            let job = CompileJob {
                inputs: input,
                output,
                options,
                lanes: LaneConfig { chunk_size, lanes },
                ruleset_ids: split_ids(&rulesets),
                allow,
                only,
                reload_command,
                use_cache: !no_cache,
            };
            cmd_compile(&job)
        }
        Commands::Validate { input, host_version } => cmd_validate(&input, host_version),
        Commands::Disable {
            output,
            rulesets,
            reload_command,
        } => cmd_disable(&output, &split_ids(&rulesets), reload_command.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

struct CompileJob {
    inputs: Vec<String>,
    output: String,
    options: ConvertOptions,
    lanes: LaneConfig,
    ruleset_ids: Vec<String>,
    allow: Vec<String>,
    only: Vec<String>,
    reload_command: Option<String>,
    use_cache: bool,
}

fn split_ids(rulesets: &str) -> Vec<String> {
    rulesets.split_whitespace().map(str::to_string).collect()
}

/// Read every input and append the allowlist exceptions.
fn collect_lines(job: &CompileJob) -> Result<Vec<String>, String> {
    let mut lines = Vec::new();
    for path in &job.inputs {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        let before = lines.len();
        lines.extend(content.lines().map(str::to_string));
        info!("Read {} lines from '{}'", lines.len() - before, path);
    }

    lines.extend(job.allow.iter().map(|domain| allowlist_rule(domain)));
    if let Some(rule) = inverted_allowlist_rule(job.only.as_slice()) {
        lines.push(rule);
    }
    Ok(lines)
}

fn cmd_compile(job: &CompileJob) -> Result<(), String> {
    if job.inputs.is_empty() {
        return Err("No input files specified".to_string());
    }
    if job.ruleset_ids.is_empty() {
        return Err("No ruleset identifiers specified".to_string());
    }

    let start = Instant::now();
    let lines = collect_lines(job)?;
    let store = RulesetStore::new(&job.output);
    let key = fingerprint(&lines, &job.options, job.lanes.chunk_size);

    let cached = if job.use_cache {
        store.load_cache(key)
    } else {
        None
    };

    let rules = match cached {
        Some(rules) => rules,
        None => {
            let rules = convert_all(lines, job)?;
            if let Err(err) = store.save_cache(key, &rules) {
                warn!("{err}");
            }
            rules
        }
    };

    let failures = store.write_rulesets(&job.ruleset_ids, &rules.chunks);
    if let Some(text) = &rules.extended {
        store.write_extended(text)?;
    }

    println!(
        "Wrote {} rulesets to '{}' ({} chunks, {} write failures)",
        job.ruleset_ids.len(),
        job.output,
        rules.chunks.len(),
        failures
    );
    println!("  Time: {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

    if let Some(command) = &job.reload_command {
        reload(command, &job.ruleset_ids);
    }
    Ok(())
}

fn convert_all(lines: Vec<String>, job: &CompileJob) -> Result<CachedRules, String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

    let cancel = Arc::new(CancellationToken::new());
    let counter = Arc::new(ErrorCounter::new());

    let results = runtime.block_on(async {
        let on_interrupt = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling conversion");
                on_interrupt.cancel();
            }
        });

        convert_chunks(
            Arc::new(lines),
            job.lanes,
            job.options,
            Arc::clone(&cancel),
            Arc::clone(&counter),
        )
        .await
    })?;

    for (index, result) in results.iter().enumerate() {
        info!("Chunk {index}:\n{result}");
    }
    info!("Total conversion errors: {}", counter.count());

    Ok(merge_results(results))
}

fn merge_results(results: Vec<ConversionResult>) -> CachedRules {
    let mut chunks = Vec::with_capacity(results.len());
    let mut extended = Vec::new();
    for result in results {
        chunks.push(result.json);
        extended.extend(result.extended_text);
    }
    CachedRules {
        chunks,
        extended: (!extended.is_empty()).then(|| extended.join("\n")),
    }
}

fn reload(command: &str, ids: &[String]) {
    let Some(reloader) = CommandReloader::parse(command) else {
        warn!("Empty reload command, skipping reload");
        return;
    };
    let failed = reload_all(&reloader, ids, RELOAD_ATTEMPTS);
    if failed.is_empty() {
        info!("Reloaded {} rulesets", ids.len());
    } else {
        warn!("Failed to reload: {}", failed.join(", "));
    }
}

fn cmd_validate(input: &str, version: HostVersion) -> Result<(), String> {
    let content = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let entries: Vec<Entry> = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid ruleset JSON: {}", e))?;

    let problems = check_entries(&entries, version);
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("  {problem}");
        }
        return Err(format!("'{}' has {} problems", input, problems.len()));
    }

    println!("Ruleset '{}' is valid", input);
    println!("  Entries:  {} (limit {})", entries.len(), version.rules_limit());
    println!("  Size:     {} bytes ({:.1} KB)", content.len(), content.len() as f64 / 1024.0);
    Ok(())
}

fn check_entries(entries: &[Entry], version: HostVersion) -> Vec<String> {
    let mut problems = Vec::new();
    if entries.len() > version.rules_limit() {
        problems.push(format!(
            "{} entries exceed the limit of {} for host {}",
            entries.len(),
            version.rules_limit(),
            version
        ));
    }
    for (index, entry) in entries.iter().enumerate() {
        if let Err(err) = validate_regex(&entry.trigger.url_filter) {
            problems.push(format!("entry {index}: {err}"));
        }
    }
    problems
}

fn cmd_disable(output: &str, ids: &[String], reload_command: Option<&str>) -> Result<(), String> {
    if ids.is_empty() {
        return Err("No ruleset identifiers specified".to_string());
    }
    let store = RulesetStore::new(output);
    store.clear_cache()?;
    let failures = store.write_rulesets(ids, &[]);
    println!(
        "Reset {} rulesets in '{}' ({} write failures)",
        ids.len(),
        output,
        failures
    );
    if let Some(command) = reload_command {
        reload(command, ids);
    }
    Ok(())
}
