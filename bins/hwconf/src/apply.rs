//! Apply command - configure, run, restore.

use anyhow::Context;
use clap::Args;
use hwconf::concerns::common_hw_config;
use hwconf::record::HwConfigRecord;
use tokio::process::Command;

use crate::targets::TargetArgs;

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Command to run while the devices are configured. Without one, wait
    /// for Ctrl-C.
    #[arg(last = true, value_name = "CMD")]
    pub command: Vec<String>,
}

async fn run_command(command: &[String]) -> anyhow::Result<i32> {
    let (program, args) = command
        .split_first()
        .context("empty command")?;
    let status = Command::new(program)
        .args(args)
        .status()
        .await
        .with_context(|| format!("running {}", program))?;
    Ok(status.code().unwrap_or(-1))
}

async fn wait_for_interrupt() -> anyhow::Result<i32> {
    eprintln!("configured, press Ctrl-C to restore");
    tokio::signal::ctrl_c().await?;
    Ok(0)
}

pub async fn run(args: ApplyArgs) -> anyhow::Result<()> {
    let params = args.target.load_params()?;
    let targets = args.target.targets()?;
    let chain = common_hw_config(&params, &targets)?;

    let mut record = HwConfigRecord::new();
    let configured = chain.configure(&mut record).await;

    let exit_code = match &configured {
        Ok(()) => {
            for line in chain.describe(&record) {
                println!("{}", line);
            }
            if args.command.is_empty() {
                Some(wait_for_interrupt().await)
            } else {
                Some(run_command(&args.command).await)
            }
        }
        Err(_) => None,
    };

    let report = chain.deconfigure(&mut record).await;
    for failure in &report.errors {
        eprintln!("warning: failed to restore {}", failure);
    }

    configured.context("configuring devices")?;
    if let Some(code) = exit_code.transpose()? {
        if code != 0 {
            std::process::exit(code);
        }
    }
    report.into_result().context("restoring devices")?;

    Ok(())
}
