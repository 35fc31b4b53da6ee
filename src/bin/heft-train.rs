//! Train the weight estimator from catalog history and save the artifact.

use heft::catalog::open_catalog;
use heft::cli::{CommandLine, parse_command_line};
use heft::config::Settings;
use heft::error::PipelineError;
use heft::training::{TrainingReport, run_training};
use heft::{logging, outcome};

fn main() {
    if let Err(err) = logging::init(env!("CARGO_BIN_NAME")) {
        eprintln!("Logging disabled: {err}");
    }
    let args = match parse_command_line(std::env::args().skip(1).collect()) {
        Ok(args) => args,
        Err(err) => std::process::exit(outcome::finish::<()>(Err(err.into()))),
    };
    if args.help {
        println!("{}", help_text());
        return;
    }
    std::process::exit(outcome::finish(run(&args)));
}

fn run(args: &CommandLine) -> Result<TrainingReport, PipelineError> {
    args.at_most(2)?;
    let location = args.catalog_location(0)?;
    let settings = args.apply(Settings::load()?);
    let catalog = open_catalog(&location, &settings.table).map_err(PipelineError::CatalogRead)?;
    run_training(catalog.as_ref(), &settings.model_path)
}

fn help_text() -> String {
    [
        "heft-train",
        "",
        "Fit the weight model on every catalog row with a real weight.",
        "",
        "Usage:",
        "  heft-train [catalog-url] [service-key] [--model <path>]",
        "",
        "Defaults:",
        "  --model ml/weight_model.json",
    ]
    .join("\n")
}
