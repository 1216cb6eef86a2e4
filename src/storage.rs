//! ACES Core - Run Archive
//!
//! File-backed persistence of a run's artifacts in the layout presentation
//! collaborators consume: `config.json`, `evolution_log.json` and the two
//! Hall of Fame archives, plus a manifest stamping the run. Same seed, same
//! config, same bytes - the archive is the replay contract.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EvolutionConfig;
use crate::error::AcesResult;
use crate::evolution::EvolutionOutcome;

pub const CONFIG_FILE: &str = "config.json";
pub const EVOLUTION_LOG_FILE: &str = "evolution_log.json";
pub const HOF_ATTACKERS_FILE: &str = "hall_of_fame_attackers.json";
pub const HOF_DEFENDERS_FILE: &str = "hall_of_fame_defenders.json";
pub const MANIFEST_FILE: &str = "run_manifest.json";

/// Identity stamp for one archived run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub generations_completed: u32,
    pub cancelled: bool,
}

/// Writer for one run's result directory
#[derive(Debug, Clone)]
pub struct RunArchive {
    dir: PathBuf,
}

impl RunArchive {
    /// Create (or reuse) the archive directory
    pub fn create(dir: impl AsRef<Path>) -> AcesResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> AcesResult<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.dir.join(file), json)?;
        Ok(())
    }

    /// Persist the exact configuration the run was started with
    pub fn write_config(&self, config: &EvolutionConfig) -> AcesResult<()> {
        self.write_json(CONFIG_FILE, config)
    }

    /// Persist the evolution log and both Hall of Fame archives
    pub fn write_outcome(&self, outcome: &EvolutionOutcome) -> AcesResult<()> {
        self.write_json(EVOLUTION_LOG_FILE, &outcome.history)?;
        self.write_json(HOF_ATTACKERS_FILE, &outcome.attacker_hall_of_fame)?;
        self.write_json(HOF_DEFENDERS_FILE, &outcome.defender_hall_of_fame)?;
        info!(
            "archived {} generations to {}",
            outcome.generations_completed,
            self.dir.display()
        );
        Ok(())
    }

    /// Stamp the run with its identity and wall-clock bounds
    pub fn write_manifest(
        &self,
        outcome: &EvolutionOutcome,
        started_at: DateTime<Utc>,
    ) -> AcesResult<RunManifest> {
        let manifest = RunManifest {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            generations_completed: outcome.generations_completed,
            cancelled: outcome.cancelled,
        };
        self.write_json(MANIFEST_FILE, &manifest)?;
        Ok(manifest)
    }

    pub fn read_to_string(&self, file: &str) -> AcesResult<String> {
        Ok(fs::read_to_string(self.dir.join(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::CoEvolution;
    use crate::network::corporate_medium;

    fn quick_config(dir: &Path) -> EvolutionConfig {
        EvolutionConfig {
            population_size: 8,
            num_generations: 3,
            matchups_per_eval: 2,
            max_attack_chain_length: 4,
            defender_budget: 5,
            hall_of_fame_size: 3,
            output_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn archive_produces_the_expected_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let config = quick_config(tmp.path());
        let mut engine = CoEvolution::new(config.clone(), corporate_medium()).unwrap();
        let started = Utc::now();
        let outcome = engine.run().unwrap();

        let archive = RunArchive::create(&config.output_dir).unwrap();
        archive.write_config(&config).unwrap();
        archive.write_outcome(&outcome).unwrap();
        archive.write_manifest(&outcome, started).unwrap();

        for file in [
            CONFIG_FILE,
            EVOLUTION_LOG_FILE,
            HOF_ATTACKERS_FILE,
            HOF_DEFENDERS_FILE,
            MANIFEST_FILE,
        ] {
            assert!(tmp.path().join(file).exists(), "{} missing", file);
        }

        let reloaded: EvolutionConfig =
            serde_json::from_str(&archive.read_to_string(CONFIG_FILE).unwrap()).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn manifest_records_the_run_bounds() {
        let tmp = tempfile::tempdir().unwrap();
        let config = quick_config(tmp.path());
        let mut engine = CoEvolution::new(config.clone(), corporate_medium()).unwrap();
        let started = Utc::now();
        let outcome = engine.run().unwrap();
        let archive = RunArchive::create(tmp.path()).unwrap();
        let manifest = archive.write_manifest(&outcome, started).unwrap();
        assert_eq!(manifest.generations_completed, 3);
        assert!(!manifest.cancelled);
        let reloaded: RunManifest =
            serde_json::from_str(&archive.read_to_string(MANIFEST_FILE).unwrap()).unwrap();
        assert_eq!(reloaded, manifest);
    }
}
