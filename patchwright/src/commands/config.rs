//! Effective configuration

use anyhow::Result;
use std::path::Path;

use crate::config::Config;

pub fn show(config: &Config, explicit: Option<&Path>) -> Result<()> {
    match explicit.map(Path::to_path_buf).or_else(Config::default_path) {
        Some(path) if path.is_file() => println!("# {}", path.display()),
        Some(path) => println!("# {} (not present, using defaults)", path.display()),
        None => println!("# no configuration directory"),
    }
    print!("{}", config.to_yaml()?);
    println!("# cache: {}", config.cache_dir().display());
    println!("# work: {}", config.work_dir().display());
    println!("# keystore: {}", config.keystore_dir().display());
    Ok(())
}
