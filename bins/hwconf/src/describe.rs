//! Describe command - validate parameters and print the plan.

use clap::Args;
use hwconf::concerns::common_hw_config;

use crate::targets::TargetArgs;

#[derive(Args)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

pub fn run(args: DescribeArgs) -> anyhow::Result<()> {
    let params = args.target.load_params()?;
    let targets = args.target.targets()?;
    let chain = common_hw_config(&params, &targets)?;

    let plan = chain.plan();
    if plan.is_empty() {
        println!("nothing to configure");
    }
    for line in plan {
        println!("{}", line);
    }

    Ok(())
}
