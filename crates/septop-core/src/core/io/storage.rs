use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage file not found: '{path}'")]
    NotFound { path: String },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },

    #[error("TOML serialization error for '{path}': {source}")]
    TomlSerialize {
        path: String,
        source: toml::ser::Error,
    },

    #[error("Storage '{path}' is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
}

fn label(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Sampler metadata written alongside the replica-state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CheckpointMetadata {
    pub n_replicas: usize,
    pub n_states: usize,
    /// Number of stored iterations, including the initial one.
    pub n_iterations: usize,
    pub checkpoint_interval: usize,
}

/// Read access to the output of a multistate sampler run.
///
/// The primary file is a CSV table with one row per iteration (`iteration,replica_0,...`)
/// holding the thermodynamic state visited by each replica. The checkpoint file is a TOML
/// table of [`CheckpointMetadata`] and is always resolved in the primary file's directory.
#[derive(Debug, Clone)]
pub struct MultiStateStorage {
    primary: PathBuf,
    checkpoint: PathBuf,
    metadata: CheckpointMetadata,
}

impl MultiStateStorage {
    /// Opens an existing storage read-only, never creating or modifying files.
    pub fn open_read_only(primary: &Path, checkpoint_name: &Path) -> Result<Self, StorageError> {
        let checkpoint = checkpoint_path(primary, checkpoint_name);
        for path in [primary, checkpoint.as_path()] {
            if !path.is_file() {
                return Err(StorageError::NotFound { path: label(path) });
            }
        }
        let content = fs::read_to_string(&checkpoint).map_err(|e| StorageError::Io {
            path: label(&checkpoint),
            source: e,
        })?;
        let metadata: CheckpointMetadata =
            toml::from_str(&content).map_err(|e| StorageError::Toml {
                path: label(&checkpoint),
                source: e,
            })?;
        Ok(Self {
            primary: primary.to_path_buf(),
            checkpoint,
            metadata,
        })
    }

    pub fn metadata(&self) -> &CheckpointMetadata {
        &self.metadata
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn checkpoint(&self) -> &Path {
        &self.checkpoint
    }

    /// The state index of every replica at every stored iteration (`[iteration][replica]`).
    pub fn read_replica_thermodynamic_states(&self) -> Result<Vec<Vec<usize>>, StorageError> {
        let path = label(&self.primary);
        let corrupt = |reason: String| StorageError::Corrupt {
            path: path.clone(),
            reason,
        };
        let mut reader = csv::Reader::from_path(&self.primary).map_err(|e| StorageError::Csv {
            path: path.clone(),
            source: e,
        })?;

        let mut states = Vec::with_capacity(self.metadata.n_iterations);
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| StorageError::Csv {
                path: path.clone(),
                source: e,
            })?;
            if record.len() != self.metadata.n_replicas + 1 {
                return Err(corrupt(format!(
                    "iteration row {row} has {} replica columns, expected {}",
                    record.len().saturating_sub(1),
                    self.metadata.n_replicas
                )));
            }
            let parse = |field: &str| {
                field
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| corrupt(format!("non-integer value '{field}' in row {row}")))
            };
            let iteration = parse(&record[0])?;
            if iteration != row {
                return Err(corrupt(format!(
                    "row {row} is labelled iteration {iteration}"
                )));
            }
            let replicas = record
                .iter()
                .skip(1)
                .map(|field| {
                    let state = parse(field)?;
                    if state >= self.metadata.n_states {
                        return Err(corrupt(format!(
                            "state index {state} in row {row} exceeds {} states",
                            self.metadata.n_states
                        )));
                    }
                    Ok(state)
                })
                .collect::<Result<Vec<_>, _>>()?;
            states.push(replicas);
        }

        if states.len() != self.metadata.n_iterations {
            return Err(corrupt(format!(
                "found {} iterations, checkpoint records {}",
                states.len(),
                self.metadata.n_iterations
            )));
        }
        Ok(states)
    }

    /// Writes a storage pair in the format read by [`MultiStateStorage::open_read_only`].
    pub fn write(
        primary: &Path,
        checkpoint_name: &Path,
        metadata: &CheckpointMetadata,
        replica_states: &[Vec<usize>],
    ) -> Result<(), StorageError> {
        let mut writer = csv::Writer::from_path(primary).map_err(|e| StorageError::Csv {
            path: label(primary),
            source: e,
        })?;
        let csv_error = |e: csv::Error| StorageError::Csv {
            path: label(primary),
            source: e,
        };
        let header = std::iter::once("iteration".to_string())
            .chain((0..metadata.n_replicas).map(|r| format!("replica_{r}")));
        writer.write_record(header).map_err(csv_error)?;
        for (iteration, row) in replica_states.iter().enumerate() {
            let fields =
                std::iter::once(iteration.to_string()).chain(row.iter().map(|s| s.to_string()));
            writer.write_record(fields).map_err(csv_error)?;
        }
        writer.flush().map_err(|e| StorageError::Io {
            path: label(primary),
            source: e,
        })?;

        let checkpoint = checkpoint_path(primary, checkpoint_name);
        let content = toml::to_string(metadata).map_err(|e| StorageError::TomlSerialize {
            path: label(&checkpoint),
            source: e,
        })?;
        fs::write(&checkpoint, content).map_err(|e| StorageError::Io {
            path: label(&checkpoint),
            source: e,
        })
    }
}

/// Resolves the checkpoint file name relative to the directory of the primary file.
pub fn checkpoint_path(primary: &Path, checkpoint_name: &Path) -> PathBuf {
    let file_name = checkpoint_name.file_name().unwrap_or(checkpoint_name.as_os_str());
    match primary.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn metadata(n_iterations: usize) -> CheckpointMetadata {
        CheckpointMetadata {
            n_replicas: 3,
            n_states: 3,
            n_iterations,
            checkpoint_interval: 10,
        }
    }

    #[test]
    fn written_storage_reads_back_replica_states() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("complex.nc");
        let states = vec![vec![0, 1, 2], vec![1, 0, 2], vec![2, 0, 1]];
        MultiStateStorage::write(
            &primary,
            Path::new("complex_checkpoint.nc"),
            &metadata(3),
            &states,
        )
        .unwrap();

        let storage =
            MultiStateStorage::open_read_only(&primary, Path::new("complex_checkpoint.nc"))
                .unwrap();
        assert_eq!(storage.metadata(), &metadata(3));
        assert_eq!(storage.read_replica_thermodynamic_states().unwrap(), states);
    }

    #[test]
    fn checkpoint_is_resolved_next_to_primary() {
        let resolved = checkpoint_path(
            Path::new("/runs/unit_1/solvent.nc"),
            Path::new("elsewhere/solvent_checkpoint.nc"),
        );
        assert_eq!(resolved, PathBuf::from("/runs/unit_1/solvent_checkpoint.nc"));
    }

    #[test]
    fn missing_files_are_reported_as_not_found() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("solvent.nc");
        let result = MultiStateStorage::open_read_only(&primary, Path::new("checkpoint.nc"));
        assert!(matches!(result, Err(StorageError::NotFound { .. })));

        fs::write(&primary, "iteration,replica_0\n0,0\n").unwrap();
        let result = MultiStateStorage::open_read_only(&primary, Path::new("checkpoint.nc"));
        match result {
            Err(StorageError::NotFound { path }) => assert!(path.ends_with("checkpoint.nc")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_state_index_is_corrupt() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("solvent.nc");
        MultiStateStorage::write(
            &primary,
            Path::new("checkpoint.nc"),
            &metadata(1),
            &[vec![0, 1, 7]],
        )
        .unwrap();
        let storage =
            MultiStateStorage::open_read_only(&primary, Path::new("checkpoint.nc")).unwrap();
        assert!(matches!(
            storage.read_replica_thermodynamic_states(),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn iteration_count_mismatch_is_corrupt() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("solvent.nc");
        MultiStateStorage::write(
            &primary,
            Path::new("checkpoint.nc"),
            &metadata(5),
            &[vec![0, 1, 2]],
        )
        .unwrap();
        let storage =
            MultiStateStorage::open_read_only(&primary, Path::new("checkpoint.nc")).unwrap();
        let err = storage.read_replica_thermodynamic_states().unwrap_err();
        assert!(err.to_string().contains("found 1 iterations, checkpoint records 5"));
    }

    #[test]
    fn malformed_checkpoint_is_a_toml_error() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("solvent.nc");
        fs::write(&primary, "iteration,replica_0\n").unwrap();
        fs::write(dir.path().join("checkpoint.nc"), "not = [valid").unwrap();
        assert!(matches!(
            MultiStateStorage::open_read_only(&primary, Path::new("checkpoint.nc")),
            Err(StorageError::Toml { .. })
        ));
    }
}
