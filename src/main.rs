//! Entry point for the weight inference service.

use std::sync::Arc;

use heft::cli::parse_command_line;
use heft::config::Settings;
use heft::error::PipelineError;
use heft::estimator::Estimator;
use heft::{logging, outcome, service};

#[tokio::main]
async fn main() {
    if let Err(err) = logging::init(env!("CARGO_BIN_NAME")) {
        eprintln!("Logging disabled: {err}");
    }
    let code = match run().await {
        Ok(()) => 0,
        Err(err) => outcome::finish::<()>(Err(err)),
    };
    std::process::exit(code);
}

async fn run() -> Result<(), PipelineError> {
    let args = parse_command_line(std::env::args().skip(1).collect())?;
    if args.help {
        println!("{}", help_text());
        return Ok(());
    }
    args.at_most(0)?;
    let settings = args.apply(Settings::load()?);
    let estimator = Estimator::load(&settings.model_path)?;
    tracing::info!(
        "Loaded model from {} ({} training rows)",
        settings.model_path.display(),
        estimator.training_rows
    );
    service::serve(Arc::new(estimator), &settings.bind_addr).await?;
    Ok(())
}

fn help_text() -> String {
    [
        "heft",
        "",
        "Serve weight predictions over HTTP.",
        "",
        "Usage:",
        "  heft [--model <path>]",
        "",
        "Endpoints:",
        "  GET  /         liveness",
        "  POST /predict  {\"category\", \"sub_category\", \"product_name\"?}",
        "                 (optional feature1..3 are accepted and ignored)",
        "",
        "Environment:",
        "  PORT              listen port (default 8000)",
        "  HEFT_MODEL_PATH   model artifact (default ml/weight_model.json)",
    ]
    .join("\n")
}
