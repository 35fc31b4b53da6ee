//! Estimate every pending product without a weight and mark it estimated.

use heft::catalog::open_catalog;
use heft::cli::{CommandLine, parse_command_line};
use heft::config::Settings;
use heft::error::PipelineError;
use heft::estimator::Estimator;
use heft::reconcile::{ReconcileReport, run_reconcile};
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

fn run(args: &CommandLine) -> Result<ReconcileReport, PipelineError> {
    args.at_most(2)?;
    let location = args.catalog_location(0)?;
    let settings = args.apply(Settings::load()?);
    let estimator = Estimator::load(&settings.model_path)?;
    let catalog = open_catalog(&location, &settings.table).map_err(PipelineError::CatalogRead)?;
    run_reconcile(catalog.as_ref(), &estimator)
}

fn help_text() -> String {
    [
        "heft-reconcile",
        "",
        "Write a model estimate into real_weight for every pending product",
        "that has none, and mark those products estimated.",
        "",
        "Usage:",
        "  heft-reconcile [catalog-url] [service-key] [--model <path>]",
    ]
    .join("\n")
}
