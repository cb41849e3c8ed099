use std::{
    fs,
    path::{Path, PathBuf},
    process::exit,
};

use anyhow::Context;
use clap::Parser;
use colored::Colorize;

use rill::{parse, Environment};

fn main() {
    color_backtrace::install();
    init_tracing();

    let app = App::parse();

    if let Err(error) = app.execute() {
        eprintln!("{} {:#}", "error:".red().bold(), error);
        exit(1);
    }
}

/// Only installs a subscriber when `RUST_LOG` is set
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

#[derive(Parser)]
#[command(name = "rill", version, about = "Run rill programs")]
enum App {
    /// Run a program
    #[command(alias = "r")]
    Run { path: PathBuf },
    /// Print each top-level form in canonical form
    #[command(alias = "f")]
    Fmt { path: PathBuf },
}

impl App {
    fn path(&self) -> &Path {
        match self {
            App::Run { path } | App::Fmt { path } => path.as_path(),
        }
    }
    fn execute(&self) -> anyhow::Result<()> {
        let path = self.path();
        let input = fs::read_to_string(path)
            .with_context(|| format!("Unable to read {}", path.display()))?;
        let nodes = parse(&input)?;
        #[cfg(feature = "debug")]
        println!("{:#?}", nodes);
        match self {
            App::Run { .. } => {
                let mut env = Environment::with_prelude();
                for node in nodes {
                    node.evaluate(&mut env)?;
                }
            }
            App::Fmt { .. } => {
                for node in nodes {
                    println!("{}", node);
                }
            }
        }
        Ok(())
    }
}
