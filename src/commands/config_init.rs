use crate::cli::ConfigInitArgs;
use crate::config::Config;
use anyhow::Result;

pub fn run(args: ConfigInitArgs, config: Config) -> Result<()> {
    if config.path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite",
            config.path.display()
        );
    }
    let defaults = Config {
        path: config.path.clone(),
        ..Config::default()
    };
    defaults.save()?;
    println!("wrote default config to {}", defaults.path.display());
    Ok(())
}
