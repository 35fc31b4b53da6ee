//! Print a weight prediction for a category pair without touching the catalog.

use heft::cli::{CommandLine, parse_command_line};
use heft::config::Settings;
use heft::error::PipelineError;
use heft::estimator::{Estimator, Features};
use heft::logging;

fn main() {
    if let Err(err) = logging::init(env!("CARGO_BIN_NAME")) {
        eprintln!("Logging disabled: {err}");
    }
    let result = parse_command_line(std::env::args().skip(1).collect())
        .map_err(PipelineError::from)
        .and_then(|args| {
            if args.help {
                println!("{}", help_text());
                return Ok(());
            }
            run(&args)
        });
    if let Err(err) = result {
        std::process::exit(heft::outcome::finish::<()>(Err(err)));
    }
}

fn run(args: &CommandLine) -> Result<(), PipelineError> {
    args.at_most(3)?;
    let category = args.required(0, "category")?;
    let sub_category = args.required(1, "sub_category")?;
    let product_name = args.required(2, "product_name")?;
    let settings = args.apply(Settings::load()?);
    let estimator = Estimator::load(&settings.model_path)?;
    let weight = estimator.predict(&Features::new(category, sub_category))?;
    println!("Predicted weight for '{product_name}' ({category} / {sub_category}): {weight:.2}");
    Ok(())
}

fn help_text() -> String {
    [
        "heft-predict",
        "",
        "Predict a weight from the saved model.",
        "",
        "Usage:",
        "  heft-predict <category> <sub_category> <product_name> [--model <path>]",
    ]
    .join("\n")
}
