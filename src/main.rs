//! Formwork CLI entrypoint.
//!
//! This is the main entrypoint for the formwork command-line tool.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use formwork::cli::{self, Cli, Commands};
use formwork::config::Project;
use formwork::differ::Direction;
use formwork::error::Result;
use formwork::region::{Region, RegionOptions};
use formwork::remote::CloudFormationClient;
use formwork::stack::Stack;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Init => cmd_init(&cli),
        Commands::List => cmd_list(&load_region(&cli).await?),
        Commands::Show { stack } => cmd_show(&load_region(&cli).await?, stack).await,
        Commands::Status { stack } => {
            cmd_status(&load_region(&cli).await?, stack.as_deref()).await
        }
        Commands::Diff { stack } => cmd_diff(&load_region(&cli).await?, stack.as_deref()).await,
        Commands::Update {
            stack,
            allow_destructive,
            yes,
        } => {
            cmd_update(
                &load_region(&cli).await?,
                stack.as_deref(),
                *allow_destructive,
                *yes,
            )
            .await
        }
        Commands::Dump { stack, yes } => {
            cmd_dump(&load_region(&cli).await?, stack.as_deref(), *yes).await
        }
    }
}

/// Loads the project and builds the region for this invocation.
async fn load_region(cli: &Cli) -> Result<Region> {
    let project = Project::new(&cli.path);
    project.load_dotenv()?;

    let config = project.load_region_config(&cli.region, &cli.environment)?;
    let stack_prefix = project.stack_prefix(&cli.environment)?;

    let client = CloudFormationClient::connect(&cli.region).await;
    Region::new(
        &cli.region,
        config,
        project.templates_path(),
        RegionOptions {
            stack_prefix,
            project_path: project.path().to_path_buf(),
        },
        Arc::new(client),
    )
}

/// Selects one declared stack, or all of them in declaration order.
fn selected<'r>(region: &'r Region, name: Option<&str>) -> Result<Vec<Stack<'r>>> {
    name.map_or_else(|| Ok(region.stacks()), |n| Ok(vec![region.stack(n)?]))
}

/// Logs per-stack operational failures and keeps going; anything else is
/// fatal to the invocation.
fn report_or_bail(name: &str, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_operational() => {
            error!("{name}: {err}");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Initialize a new project.
fn cmd_init(cli: &Cli) -> Result<()> {
    info!("Initializing new Formwork project in: {}", cli.path.display());

    let project = Project::new(&cli.path);
    project.scaffold(&cli.region)?;

    eprintln!("Project initialized.");
    eprintln!("Next steps:");
    eprintln!("  1. Edit regions/{}.yml with your stacks", cli.region);
    eprintln!("  2. Add templates under templates/");
    eprintln!("  3. Run 'formwork diff' to compare against the deployed state");
    eprintln!("  4. Run 'formwork update' to apply");

    Ok(())
}

/// List declared stacks.
fn cmd_list(region: &Region) -> Result<()> {
    for stack in region.stacks() {
        println!("{} (template: {})", stack.name(), stack.template_name());
    }
    Ok(())
}

/// Show deployed details of one stack.
async fn cmd_show(region: &Region, name: &str) -> Result<()> {
    let mut stack = region.stack(name)?;
    match stack.describe().await? {
        Some(description) => println!("{}", cli::stack_details(&description)),
        None => eprintln!("{name}: not deployed"),
    }
    Ok(())
}

/// Show deployed status for one or all stacks.
async fn cmd_status(region: &Region, name: Option<&str>) -> Result<()> {
    for mut stack in selected(region, name)? {
        let shown = match stack.status().await? {
            Some(status) => cli::colored_status(&status),
            None => String::from("not deployed"),
        };
        println!("{}: {shown}", stack.name());
    }
    Ok(())
}

/// Diff local templates and parameters against the deployed state.
async fn cmd_diff(region: &Region, name: Option<&str>) -> Result<()> {
    for mut stack in selected(region, name)? {
        let result = diff_stack(&mut stack).await;
        report_or_bail(stack.name(), result)?;
    }
    Ok(())
}

async fn diff_stack(stack: &mut Stack<'_>) -> Result<()> {
    let template = stack.template_diff(Direction::Up, true).await?;
    let parameters = stack.parameter_diff(Direction::Up, true).await?;

    if template.is_empty() && parameters.is_empty() {
        info!("{} is up to date", stack.name());
        return Ok(());
    }

    println!("=== {} ===", stack.name());
    if !template.is_empty() {
        println!("--- template\n{template}");
    }
    if !parameters.is_empty() {
        println!("--- parameters\n{parameters}");
    }
    Ok(())
}

/// Create or update one or all stacks.
async fn cmd_update(
    region: &Region,
    name: Option<&str>,
    allow_destructive: bool,
    yes: bool,
) -> Result<()> {
    for mut stack in selected(region, name)? {
        let result = update_stack(&mut stack, allow_destructive, yes).await;
        report_or_bail(stack.name(), result)?;
    }
    Ok(())
}

async fn update_stack(stack: &mut Stack<'_>, allow_destructive: bool, yes: bool) -> Result<()> {
    let started = Instant::now();

    if !stack.exists().await? {
        eprintln!("{} is not deployed yet.", stack.name());
        if !yes && !cli::confirm(&format!("Create stack {}?", stack.name()))? {
            info!("{}: create skipped", stack.name());
            return Ok(());
        }
        stack.create().await?;
        info!("{} created in {:.0?}", stack.name(), started.elapsed());
        return Ok(());
    }

    let template = stack.template_diff(Direction::Up, true).await?;
    let parameters = stack.parameter_diff(Direction::Up, true).await?;
    if template.is_empty() && parameters.is_empty() {
        info!("{} is up to date", stack.name());
        return Ok(());
    }

    if !template.is_empty() {
        println!("--- template\n{template}");
    }
    if !parameters.is_empty() {
        println!("--- parameters\n{parameters}");
    }

    let staged = stack.stage_update().await?;
    println!("{}", cli::change_set_table(&staged.entries));

    if !staged.destructive_entries().is_empty() && !allow_destructive {
        warn!(
            "{}: change set contains destructive changes; rerun with --allow-destructive to apply them",
            stack.name()
        );
    }

    if !yes && !cli::confirm(&format!("Execute this change set on {}?", stack.name()))? {
        info!("{}: update skipped", stack.name());
        return Ok(());
    }

    stack.execute_update(&staged, allow_destructive).await?;
    info!("{} updated in {:.0?}", stack.name(), started.elapsed());
    Ok(())
}

/// Write deployed templates over the local files.
async fn cmd_dump(region: &Region, name: Option<&str>, yes: bool) -> Result<()> {
    for mut stack in selected(region, name)? {
        let result = dump_stack(&mut stack, yes).await;
        report_or_bail(stack.name(), result)?;
    }
    Ok(())
}

async fn dump_stack(stack: &mut Stack<'_>, yes: bool) -> Result<()> {
    // Without a local file there is nothing to compare or overwrite, so
    // write the deployed template straight away.
    if stack.template_mut().exists() {
        let diff = stack.template_diff(Direction::Down, true).await?;
        if diff.is_empty() {
            info!("{} already matches the deployed template", stack.name());
            return Ok(());
        }

        println!("=== {} ===\n{diff}", stack.name());
        if !yes && !cli::confirm(&format!("Overwrite local template for {}?", stack.name()))? {
            info!("{}: dump skipped", stack.name());
            return Ok(());
        }
    }

    let path = stack.template_mut().dump().await?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}
