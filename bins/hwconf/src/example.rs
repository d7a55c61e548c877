//! Example command - print an example parameter file.

use clap::{Args, ValueEnum};
use hwconf::params::HwConfigParams;

#[derive(Args)]
pub struct ExampleArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

pub fn run(args: ExampleArgs) -> anyhow::Result<()> {
    let example = HwConfigParams::example();

    match args.format {
        OutputFormat::Yaml => {
            println!("# Two target devices, e.g. --dev eth0 --dev eth1");
            print!("{}", example.to_yaml()?);
        }
        OutputFormat::Json => println!("{}", example.to_json()?),
    }

    Ok(())
}
