use super::infoset::InfoKey;
use super::infoset::InfoSet;
use super::store::InfoSetStore;
use crate::config::TrainConfig;
use crate::error::SolverError;
use crate::tree::path::Path;
use crate::tree::street::Street;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use byteorder::BE;
use std::collections::BTreeMap;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;

const MAGIC: &[u8; 8] = b"LCFRSNAP";
const VERSION: u32 = 1;
const TRAILER: u16 = 0xFFFF;

/// Everything needed to resume training exactly where it stopped:
/// the iteration counter, the master rng seed, the configuration,
/// the exploitability history, and a dump of every infoset record.
/// Round-trips through the wire format bit for bit.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub iteration: u64,
    pub seed: u64,
    pub config: TrainConfig,
    pub history: Vec<f64>,
    pub records: BTreeMap<InfoKey, InfoSet>,
}

/// header-only view of a checkpoint on disk
#[derive(Debug, Clone)]
pub struct CheckpointEntry {
    pub path: std::path::PathBuf,
    pub iteration: u64,
}

impl Snapshot {
    pub fn capture(
        store: &InfoSetStore,
        iteration: u64,
        seed: u64,
        config: &TrainConfig,
        history: &[f64],
    ) -> Self {
        Self {
            iteration,
            seed,
            config: config.clone(),
            history: history.to_vec(),
            records: store.records(),
        }
    }

    /// replace the store's live state with this snapshot's records.
    /// idempotent: restoring twice leaves the same state.
    pub fn restore_into(&self, store: &InfoSetStore) {
        store.restore(self.records.iter().map(|(k, v)| (*k, v.clone())));
    }

    pub fn write(&self, path: &std::path::Path) -> Result<(), SolverError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let mut w = BufWriter::new(file);
        w.write_all(MAGIC)?;
        w.write_u32::<BE>(VERSION)?;
        w.write_u64::<BE>(self.iteration)?;
        w.write_u64::<BE>(self.seed)?;
        let config = serde_json::to_vec(&self.config)
            .map_err(|e| SolverError::CheckpointIo(e.to_string()))?;
        w.write_u32::<BE>(config.len() as u32)?;
        w.write_all(&config)?;
        w.write_u32::<BE>(self.history.len() as u32)?;
        for value in self.history.iter() {
            w.write_f64::<BE>(*value)?;
        }
        w.write_u64::<BE>(self.records.len() as u64)?;
        for (key, record) in self.records.iter() {
            w.write_u8(key.seat)?;
            w.write_u8(u8::from(key.street))?;
            w.write_u64::<BE>(u64::from(key.history))?;
            w.write_u16::<BE>(key.hole)?;
            w.write_u32::<BE>(key.board)?;
            w.write_u16::<BE>(key.texture)?;
            w.write_u64::<BE>(record.id)?;
            w.write_u16::<BE>(record.num_actions() as u16)?;
            for regret in record.regrets.iter() {
                w.write_f64::<BE>(*regret)?;
            }
            for sum in record.strategy_sum.iter() {
                w.write_f64::<BE>(*sum)?;
            }
            w.write_u64::<BE>(record.last_iteration)?;
        }
        w.write_u16::<BE>(TRAILER)?;
        w.flush()?;
        Ok(())
    }

    pub fn read(path: &std::path::Path) -> Result<Self, SolverError> {
        let file = std::fs::File::open(path)
            .map_err(|e| SolverError::CheckpointIo(format!("{}: {}", path.display(), e)))?;
        let mut r = BufReader::new(file);
        let (iteration, seed) = Self::read_header(&mut r, path)?;
        let mut config = vec![0u8; r.read_u32::<BE>()? as usize];
        r.read_exact(&mut config)?;
        let config: TrainConfig = serde_json::from_slice(&config)
            .map_err(|e| SolverError::CheckpointIo(format!("config blob: {}", e)))?;
        let n_history = r.read_u32::<BE>()? as usize;
        let mut history = Vec::with_capacity(n_history);
        for _ in 0..n_history {
            history.push(r.read_f64::<BE>()?);
        }
        let n_records = r.read_u64::<BE>()? as usize;
        let mut records = BTreeMap::new();
        for _ in 0..n_records {
            let key = InfoKey {
                seat: r.read_u8()?,
                street: Street::from(r.read_u8()?),
                history: Path::from(r.read_u64::<BE>()?),
                hole: r.read_u16::<BE>()?,
                board: r.read_u32::<BE>()?,
                texture: r.read_u16::<BE>()?,
            };
            let id = r.read_u64::<BE>()?;
            let n = r.read_u16::<BE>()? as usize;
            let mut record = InfoSet::new(id, n);
            for regret in record.regrets.iter_mut() {
                *regret = r.read_f64::<BE>()?;
            }
            for sum in record.strategy_sum.iter_mut() {
                *sum = r.read_f64::<BE>()?;
            }
            record.last_iteration = r.read_u64::<BE>()?;
            records.insert(key, record);
        }
        if r.read_u16::<BE>()? != TRAILER {
            return Err(SolverError::CheckpointIo(format!(
                "{}: missing trailer",
                path.display()
            )));
        }
        Ok(Self {
            iteration,
            seed,
            config,
            history,
            records,
        })
    }

    fn read_header(
        r: &mut impl Read,
        path: &std::path::Path,
    ) -> Result<(u64, u64), SolverError> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(SolverError::CheckpointIo(format!(
                "{}: bad magic",
                path.display()
            )));
        }
        let version = r.read_u32::<BE>()?;
        if version != VERSION {
            return Err(SolverError::CheckpointIo(format!(
                "{}: version {} unsupported (expected {})",
                path.display(),
                version,
                VERSION
            )));
        }
        Ok((r.read_u64::<BE>()?, r.read_u64::<BE>()?))
    }

    /// enumerate checkpoints in a directory by header only,
    /// newest iteration first
    pub fn list(dir: &std::path::Path) -> Result<Vec<CheckpointEntry>, SolverError> {
        let mut entries = Vec::new();
        if !dir.exists() {
            return Ok(entries);
        }
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("ckpt") {
                continue;
            }
            let file = std::fs::File::open(&path)?;
            let mut r = BufReader::new(file);
            match Self::read_header(&mut r, &path) {
                Ok((iteration, _)) => entries.push(CheckpointEntry { path, iteration }),
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }
        entries.sort_by(|a, b| b.iteration.cmp(&a.iteration));
        Ok(entries)
    }

    /// conventional file name for a checkpoint at an iteration
    pub fn file_name(iteration: u64) -> String {
        format!("iter-{:09}.ckpt", iteration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::Arbitrary;

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("limitcfr-checkpoint-tests");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn sample_snapshot() -> Snapshot {
        let store = InfoSetStore::new(&ResourceConfig::default());
        for _ in 0..32 {
            let key = InfoKey::random();
            let record = InfoSet::random();
            let handle = store.get_or_create(key, record.num_actions());
            store
                .update_regrets(
                    &handle,
                    &record.regrets,
                    record.last_iteration,
                    super::super::store::UpdateRule::Vanilla,
                )
                .unwrap();
            store
                .update_strategy_sum(&handle, &record.strategy_sum, 1.0)
                .unwrap();
        }
        Snapshot::capture(
            &store,
            1234,
            0xdeadbeef,
            &TrainConfig::default(),
            &[0.5, 0.25, 0.125],
        )
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let snapshot = sample_snapshot();
        let path = scratch("round-trip.ckpt");
        snapshot.write(&path).unwrap();
        let back = Snapshot::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(snapshot.iteration, back.iteration);
        assert_eq!(snapshot.seed, back.seed);
        assert_eq!(snapshot.history, back.history);
        assert_eq!(snapshot.records, back.records);
    }

    #[test]
    fn restore_round_trips_through_store() {
        let snapshot = sample_snapshot();
        let store = InfoSetStore::new(&ResourceConfig::default());
        snapshot.restore_into(&store);
        let again = Snapshot::capture(
            &store,
            snapshot.iteration,
            snapshot.seed,
            &snapshot.config,
            &snapshot.history,
        );
        assert_eq!(snapshot.records, again.records);
        // idempotent
        snapshot.restore_into(&store);
        assert_eq!(store.records(), snapshot.records);
    }

    #[test]
    fn corrupt_magic_is_rejected() {
        let path = scratch("corrupt.ckpt");
        std::fs::write(&path, b"NOTASNAPxxxxxxxxxxxxxxxx").unwrap();
        let result = Snapshot::read(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(SolverError::CheckpointIo(_))));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let snapshot = sample_snapshot();
        let path = scratch("version.ckpt");
        snapshot.write(&path).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[8..12].copy_from_slice(&99u32.to_be_bytes());
        std::fs::write(&path, bytes).unwrap();
        let result = Snapshot::read(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(SolverError::CheckpointIo(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = Snapshot::read(std::path::Path::new("/nonexistent/x.ckpt"));
        assert!(matches!(result, Err(SolverError::CheckpointIo(_))));
    }

    #[test]
    fn list_orders_by_iteration() {
        let dir = scratch("list-dir");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        for iteration in [5u64, 50, 20] {
            let mut snapshot = sample_snapshot();
            snapshot.iteration = iteration;
            snapshot
                .write(&dir.join(Snapshot::file_name(iteration)))
                .unwrap();
        }
        let entries = Snapshot::list(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        let iterations: Vec<u64> = entries.iter().map(|e| e.iteration).collect();
        assert_eq!(iterations, vec![50, 20, 5]);
    }

    #[test]
    fn list_of_missing_directory_is_empty() {
        let entries = Snapshot::list(std::path::Path::new("/nonexistent-dir-xyz")).unwrap();
        assert!(entries.is_empty());
    }
}
