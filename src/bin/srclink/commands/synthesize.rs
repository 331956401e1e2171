//! `srclink` run

use std::io::IsTerminal;

use anyhow::Result;

use crate::cli::Cli;
use srclink::ops::{self, SynthesizeOptions};
use srclink::util::GlobalContext;

pub fn execute(args: Cli) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(args.verbose);

    let opts = SynthesizeOptions {
        progress: !args.no_progress && !ctx.is_verbose() && std::io::stderr().is_terminal(),
    };

    let report = ops::synthesize(&ctx, &opts)?;
    println!("{}", report);

    Ok(())
}
