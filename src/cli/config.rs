use crate::config::Config;
use std::fs;

/// Write a default config file, or print it to stdout.
pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let yaml = serde_yaml::to_string(&Config::default())?;

    if stdout {
        print!("{}", yaml);
        return Ok(());
    }

    let home_dir = dirs::home_dir().ok_or("could not determine home directory")?;
    let config_dir = home_dir.join(".config/journalship");
    let config_path = config_dir.join("config.yml");

    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}, not overwriting",
            config_path.display()
        )
        .into());
    }

    fs::create_dir_all(&config_dir)?;
    fs::write(&config_path, yaml)?;
    println!("Wrote default config to {}", config_path.display());
    Ok(())
}
