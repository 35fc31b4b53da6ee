//! Import historical product weights from a spreadsheet into the catalog.

use std::path::Path;

use heft::catalog::open_catalog;
use heft::cli::{CommandLine, parse_command_line};
use heft::config::Settings;
use heft::error::PipelineError;
use heft::ingest::{IngestReport, run_ingest};
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

fn run(args: &CommandLine) -> Result<IngestReport, PipelineError> {
    args.at_most(3)?;
    let source = args.required(0, "source")?;
    let location = args.catalog_location(1)?;
    let settings = args.apply(Settings::load()?);
    let catalog = open_catalog(&location, &settings.table).map_err(PipelineError::CatalogRead)?;
    run_ingest(catalog.as_ref(), Path::new(source), settings.insert_batch_size)
}

fn help_text() -> String {
    [
        "heft-import",
        "",
        "Load measured product weights from a spreadsheet as history rows.",
        "",
        "Usage:",
        "  heft-import <source.xlsx|.xls|.ods|.csv> [catalog-url] [service-key] [--batch-size <n>]",
        "",
        "Required columns (any alias, case-insensitive):",
        "  product_name | name | item_name",
        "  category | group | type",
        "  sub_category | sub_group | sub_type",
        "  real_weight | weight | actual_weight",
        "",
        "The catalog URL may be sqlite://<path> for a local database.",
    ]
    .join("\n")
}
