use std::path::Path;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use tracing::{error, info};

use plant_identifier::identify::cancel_pair;
use plant_identifier::presentation::{confidence_percent, display_name, PHOTO_TIPS};
use plant_identifier::utils::logging::init_logging;
use plant_identifier::{Config, IdentifyError, ImageHandle, Orchestrator};

const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    image: String,
    fetch_care: bool,
}

fn usage() -> &'static str {
    "Usage: plant-id <image-path-or-uri> [--no-care]"
}

fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let mut image = None;
    let mut fetch_care = true;

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--no-care" => fetch_care = false,
            "-h" | "--help" => return Err(anyhow!(usage())),
            flag if flag.starts_with("--") => {
                return Err(anyhow!("Unknown option {flag}\n{}", usage()));
            }
            value => {
                if image.replace(value.to_string()).is_some() {
                    return Err(anyhow!("Only one image can be identified at a time\n{}", usage()));
                }
            }
        }
    }

    let image = image.ok_or_else(|| anyhow!(usage()))?;
    Ok(CliArgs { image, fetch_care })
}

async fn run(cli: CliArgs) -> anyhow::Result<ExitCode> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let _guards = init_logging(&config.log_level, Path::new("logs"));

    let orchestrator = Orchestrator::from_config(&config)?.with_care_lookup(cli.fetch_care);
    let handle = ImageHandle::parse(&cli.image)?;

    let (cancel, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, abandoning identification");
            cancel.cancel();
        }
    });

    match orchestrator.identify_with_cancel(&handle, signal).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            match outcome.result.top().filter(|_| outcome.is_identified()) {
                Some(top) => eprintln!(
                    "{} ({}%)",
                    display_name(top),
                    confidence_percent(top.score)
                ),
                None => eprintln!("{}", PHOTO_TIPS.render()),
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(IdentifyError::Cancelled) => Ok(ExitCode::from(EXIT_INTERRUPTED)),
        Err(err) => {
            error!("Identification failed: {err}");
            Err(err.into())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let result = match parse_args(&args) {
        Ok(cli) => run(cli).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        std::iter::once("plant-id")
            .chain(values.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_image_and_flags() {
        assert_eq!(
            parse_args(&args(&["leaf.jpg", "--no-care"])).unwrap(),
            CliArgs {
                image: "leaf.jpg".into(),
                fetch_care: false
            }
        );
        assert!(parse_args(&args(&["leaf.jpg"])).unwrap().fetch_care);
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["a.jpg", "b.jpg"])).is_err());
        assert!(parse_args(&args(&["a.jpg", "--verbose"])).is_err());
    }
}
