mod app;
mod cli;
mod paths;
mod routes;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::run(args)
}
