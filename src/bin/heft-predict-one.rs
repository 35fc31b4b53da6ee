//! Predict the weight of one pending product and record it.

use heft::catalog::open_catalog;
use heft::cli::{CommandLine, parse_command_line};
use heft::config::{ConfigError, Settings};
use heft::error::PipelineError;
use heft::estimator::Estimator;
use heft::resolve::{ResolveOutcome, resolve_product};
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
    std::process::exit(outcome::finish_with(run(&args), outcome::resolve_line));
}

fn run(args: &CommandLine) -> Result<ResolveOutcome, PipelineError> {
    args.at_most(3)?;
    let raw_id = args.required(0, "product-id")?;
    let id: i64 = raw_id
        .parse()
        .map_err(|_| ConfigError::Usage(format!("Invalid product id: {raw_id}")))?;
    let location = args.catalog_location(1)?;
    let settings = args.apply(Settings::load()?);
    let estimator = Estimator::load(&settings.model_path)?;
    let catalog = open_catalog(&location, &settings.table).map_err(PipelineError::CatalogRead)?;
    resolve_product(catalog.as_ref(), &estimator, id)
}

fn help_text() -> String {
    [
        "heft-predict-one",
        "",
        "Predict the weight of one pending product and store it in predicted_weight.",
        "Products that are not pending are left untouched.",
        "",
        "Usage:",
        "  heft-predict-one <product-id> [catalog-url] [service-key] [--model <path>]",
    ]
    .join("\n")
}
