use clap::Parser;
use imgpush::{
    config::Settings, distribution::RegistryClient, error::Result, request::OutRequest,
    trust::NotarySigner,
};
use std::{io, path::PathBuf};

/// Push an image tarball to a registry with resolved tags
///
/// The request is read as JSON from stdin, and the response is written to stdout.
#[derive(Debug, Parser)]
#[clap(version)]
struct Opt {
    /// Directory where `image` and `additional_tags` params are resolved
    source: PathBuf,

    /// notary executable used for content trust
    #[clap(long, default_value = "notary")]
    notary: PathBuf,
}

fn main() {
    let opt = Opt::parse();
    if let Err(e) = run(opt) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let request = OutRequest::from_reader(io::stdin().lock())?;
    let settings = Settings::from_source(&request.source);

    env_logger::Builder::new()
        .filter_level(settings.log_level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let mut registry = RegistryClient::new();
    let mut signer = NotarySigner::new(opt.notary);
    let response = imgpush::out::run(
        &request,
        &opt.source,
        &mut registry,
        &mut signer,
        &settings,
    )?;
    serde_json::to_writer(io::stdout().lock(), &response)?;
    println!();
    Ok(())
}
