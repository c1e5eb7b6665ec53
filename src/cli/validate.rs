use std::path::PathBuf;

use spec_enrich::{Config, Directory, SpecStore, domain::validate_dependencies};
use tracing::instrument;

use super::terminal::Tone;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Directory holding the spec files (defaults to `spec_dir` from the
    /// configuration)
    #[arg(long)]
    dir: Option<PathBuf>,
}

impl Command {
    #[instrument(level = "debug", skip(config))]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let root = self.dir.unwrap_or_else(|| config.spec_dir.clone());
        let specs = Directory::new(root.clone()).read_all()?;

        let mut problems: Vec<String> = specs
            .iter()
            .filter_map(|spec| spec.validate().err())
            .map(|e| e.to_string())
            .collect();

        if let Err(e) = validate_dependencies(&specs) {
            problems.push(e.to_string());
        }

        if problems.is_empty() {
            println!(
                "{}",
                Tone::Success.paint(format!("✅ {} specs valid in {}", specs.len(), root.display()))
            );
            return Ok(());
        }

        for problem in &problems {
            eprintln!("  {} {problem}", Tone::Error.paint("✗"));
        }
        anyhow::bail!("{} problem(s) found in {}", problems.len(), root.display())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn run(dir: &TempDir) -> anyhow::Result<()> {
        Command {
            dir: Some(dir.path().to_path_buf()),
        }
        .run(&Config::default())
    }

    #[test]
    fn valid_store_passes() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("REQ-001.yml"), "id: REQ-001\ntitle: a\n").unwrap();
        fs::write(
            tmp.path().join("REQ-002.yml"),
            "id: REQ-002\ntitle: b\ndepends: [REQ-001]\n",
        )
        .unwrap();

        run(&tmp).unwrap();
    }

    #[test]
    fn cycle_fails() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("REQ-001.yml"),
            "id: REQ-001\ntitle: a\ndepends: [REQ-002]\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("REQ-002.yml"),
            "id: REQ-002\ntitle: b\ndepends: [REQ-001]\n",
        )
        .unwrap();

        assert!(run(&tmp).is_err());
    }

    #[test]
    fn incomplete_example_fails() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("REQ-001.yml"),
            "id: REQ-001\ntitle: a\nexamples:\n- given: g\n  when: w\n  then: ''\n",
        )
        .unwrap();

        assert!(run(&tmp).is_err());
    }
}
