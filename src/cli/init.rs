use std::path::Path;

use spec_enrich::Config;
use tracing::instrument;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Overwrite an existing configuration file
    #[arg(long)]
    force: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, config_path: &Path) -> anyhow::Result<()> {
        if config_path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                config_path.display()
            );
        }

        let config = Config::default();
        config
            .save(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", config_path.display()))?;

        println!("Created {}", config_path.display());
        println!();
        println!("Next steps:");
        println!(
            "  spec-enrich import --dir {} --jsonl {}",
            config.segment_dir.display(),
            config.metadata_path.display()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn writes_default_config_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".tdd/config.toml");

        Command { force: false }.run(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());

        assert!(Command { force: false }.run(&path).is_err());
        Command { force: true }.run(&path).unwrap();
    }
}
