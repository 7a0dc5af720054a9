//! gclean - mirror a Gmail mailbox locally and bulk-delete from it safely
//!
//! Exit status is 2 for usage errors and 1 for any other failure.

use std::process::ExitCode;

use clap::Parser;
use log::warn;

mod cli;
mod commands;
mod output;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(filter) = &cli.log_level {
        logger.parse_filters(filter);
    }
    logger.format_timestamp_millis().init();

    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    match commands::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    let usage = err
        .chain()
        .any(|cause| cause.downcast_ref::<mail::Error>().is_some_and(mail::Error::is_usage));
    if usage { 2 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let usage = anyhow::Error::new(mail::Error::usage("no filters"));
        assert_eq!(exit_status(&usage), 2);

        let wrapped = anyhow::Error::new(mail::Error::usage("no filters")).context("select");
        assert_eq!(exit_status(&wrapped), 2);

        let other = anyhow::anyhow!("network down");
        assert_eq!(exit_status(&other), 1);
    }
}
