//! cellquery - compile and run PRQL notebook scripts.

use cellquery::assembler::compile_script;
use cellquery::chunk::{segment, FragmentKind};
use cellquery::cli::{read_script, Cli, Command, CompileArgs, OutputFormat, RunArgs};
use cellquery::config::Config;
use cellquery::dsl::PrqlCompiler;
use cellquery::engine;
use cellquery::error::{CellQueryError, Result};
use cellquery::logging;
use cellquery::output::{render_json, render_table};
use cellquery::query::{QueryPipeline, RunOutcome};
use tracing::{error, info, warn};

fn main() {
    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => {
            let path = path.clone().unwrap_or_else(logging::default_log_path);
            logging::init_file_logging(&path);
        }
        None => logging::init_stderr_logging(),
    }

    if let Err(e) = run(cli) {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_defaults()?;
    cli.apply_to(&mut config)?;

    let script = read_script(cli.script())?;

    match &cli.command {
        Command::Compile(args) => compile(&script, args, &config),
        Command::Run(args) => {
            let runtime = tokio::runtime::Runtime::new()
                .map_err(|e| CellQueryError::internal(format!("Failed to start runtime: {e}")))?;
            runtime.block_on(execute(&script, args, &config))
        }
    }
}

fn compile(script: &str, args: &CompileArgs, config: &Config) -> Result<()> {
    let statement = compile_script(script, &PrqlCompiler, &config.assemble_options())?;

    if args.json {
        let json = serde_json::to_string_pretty(&statement)
            .map_err(|e| CellQueryError::internal(format!("Failed to serialize: {e}")))?;
        println!("{json}");
    } else {
        println!("{}", statement.into_sql());
    }
    Ok(())
}

async fn execute(script: &str, args: &RunArgs, config: &Config) -> Result<()> {
    let format: OutputFormat = args.parse_output_format().map_err(CellQueryError::config)?;

    info!("Engine: {}", config.engine.display_string());
    let engine = engine::open(&config.engine).await?;
    let backend = engine.backend();
    let has_pivot = segment(script).iter().any(|f| f.kind == FragmentKind::Pivot);
    if has_pivot && !backend.supports_pivot() {
        warn!("{} does not support PIVOT blocks", backend.as_str());
    }
    for load in &args.loads {
        info!("Loading {} as {}", load.path.display(), load.table);
        engine.load_csv(&load.table, &load.path).await?;
    }

    let pipeline = QueryPipeline::new(PrqlCompiler, engine, config.assemble_options());
    match pipeline.execute(script).await {
        RunOutcome::Success(result) => {
            match format {
                OutputFormat::Table => println!("{}", render_table(&result)),
                OutputFormat::Json => println!("{}", render_json(&result)?),
            }
            Ok(())
        }
        RunOutcome::CompileFailed(e) => Err(e.into()),
        RunOutcome::ExecutionFailed(msg) => Err(CellQueryError::engine(msg)),
    }
}
