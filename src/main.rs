#![allow(clippy::enum_variant_names)]

use clap::Parser as _;

use crate::{
    application::{Application, ApplicationError},
    cli::Cli,
};

mod application;
mod cli;
mod config;
mod ext;
mod filesystem;
mod logging;
mod mirror;
mod scheduler;
mod validation;

#[compio::main]
#[snafu::report]
async fn main() -> Result<(), ApplicationError> {
    let cli_args = Cli::parse();

    Application::run(cli_args).await?;

    Ok(())
}
