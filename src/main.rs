use anyhow::Result;
use strata::settings;
use strata::sweep::Sweep;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = settings::load_config()?;
    println!("{}", settings);

    let mut sweep = Sweep::new(settings)?;
    sweep.solve()?;
    sweep.writeup()?;
    Ok(())
}
