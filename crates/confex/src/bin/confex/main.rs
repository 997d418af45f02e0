mod cli;

use confex::documents::Documents;
use confex::{ExpressionManager, FunctionTable, MapStore, Value, Variables};

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CONFEX_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Evaluate(eval_cli) => evaluate(eval_cli),
        cli::Command::Resolve(resolve_cli) => resolve(resolve_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn evaluate(cli: cli::EvaluateCommand) -> anyhow::Result<()> {
    let (mut store, manager) = prepare(&cli.input)?;

    let value = manager.execute_input(&cli.expression, &mut store)?;

    output(&cli.output, &value)?;
    Ok(())
}

pub fn resolve(cli: cli::ResolveCommand) -> anyhow::Result<()> {
    let (mut store, manager) = prepare(&cli.input)?;

    manager.execute_all(&mut store)?;

    output(&cli.output, &store.into_value())?;
    Ok(())
}

fn prepare(input: &cli::InputArgs) -> anyhow::Result<(MapStore, ExpressionManager)> {
    let store = load(input)?.merged();

    let variables: Variables = input
        .variables
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
        .collect();

    let manager = ExpressionManager::new(&store.snapshot(), variables, FunctionTable::new())?;
    Ok((store, manager))
}

fn load(input: &cli::InputArgs) -> anyhow::Result<Documents> {
    if !input.workdir && input.files.is_empty() && input.directories.is_empty() {
        let stdin = std::io::read_to_string(std::io::stdin())?;
        if stdin.trim().is_empty() {
            return Ok(MapStore::new().into());
        }
        return Ok(MapStore::from_yaml(&stdin)?.into());
    }

    let mut documents = Documents::default();

    if input.workdir {
        documents.load_directory(&std::env::current_dir()?)?;
    }

    for file_path in &input.files {
        documents.load_file(file_path)?;
    }

    for dir_path in &input.directories {
        documents.load_directory(dir_path)?;
    }

    anyhow::ensure!(documents.source_count() > 0, "No files loaded");

    Ok(documents)
}

fn output(output: &cli::OutputArgs, value: &Value) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}

/// developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    let (_, manager) = prepare(&cli.input)?;

    match cli.command {
        Registry => {
            for (path, expressions) in manager.registry().iter() {
                println!("{path}");
                for expression in expressions {
                    println!("  {}  ->  {expression}", expression.source);
                }
            }
        }
        Graph => {
            for vertex in manager.graph().vertices() {
                let dependencies: Vec<&str> = manager
                    .graph()
                    .dependencies_of(vertex)
                    .into_iter()
                    .flatten()
                    .collect();
                println!("{vertex}: [{}]", dependencies.join(", "));
            }
        }
        Order => {
            for vertex in manager.graph().topological_sort() {
                println!("{vertex}");
            }
        }
    }

    Ok(())
}
