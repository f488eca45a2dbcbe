use super::policy;
use super::store::InfoSetStore;
use crate::error::SolverError;
use serde::Deserialize;
use serde::Serialize;

/// One information set's average strategy, ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRow {
    pub id: u64,
    pub key: String,
    pub num_actions: usize,
    pub avg_strategy: Vec<f64>,
}

/// Extract the average strategy of every information set, ordered by
/// key. Normalization happens here: `strategy_sum / Σ strategy_sum`,
/// uniform where nothing has accumulated.
pub fn export_strategy(store: &InfoSetStore) -> Vec<StrategyRow> {
    use rayon::prelude::*;
    store
        .records()
        .into_iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(key, record)| StrategyRow {
            id: record.id,
            key: key.to_string(),
            num_actions: record.num_actions(),
            avg_strategy: policy::average(&record.strategy_sum),
        })
        .collect()
}

/// write one JSON object per line
pub fn write_jsonl(rows: &[StrategyRow], path: &std::path::Path) -> Result<(), SolverError> {
    use std::io::Write;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for row in rows {
        let line = serde_json::to_string(row)
            .map_err(|e| SolverError::CheckpointIo(e.to_string()))?;
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::infoset::InfoKey;
    use crate::config::ResourceConfig;
    use crate::Arbitrary;

    #[test]
    fn rows_are_normalized() {
        let store = InfoSetStore::new(&ResourceConfig::default());
        let handle = store.get_or_create(InfoKey::random(), 2);
        store.update_strategy_sum(&handle, &[3.0, 1.0], 1.0).unwrap();
        let rows = export_strategy(&store);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].num_actions, 2);
        assert!((rows[0].avg_strategy[0] - 0.75).abs() < 1e-12);
        assert!((rows[0].avg_strategy[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn untouched_records_export_uniform() {
        let store = InfoSetStore::new(&ResourceConfig::default());
        store.get_or_create(InfoKey::random(), 3);
        let rows = export_strategy(&store);
        for p in rows[0].avg_strategy.iter() {
            assert!((p - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn jsonl_round_trips() {
        let store = InfoSetStore::new(&ResourceConfig::default());
        for _ in 0..5 {
            store.get_or_create(InfoKey::random(), 2);
        }
        let rows = export_strategy(&store);
        let dir = std::env::temp_dir().join("limitcfr-export-tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("strategy.jsonl");
        write_jsonl(&rows, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let back: Vec<StrategyRow> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(rows, back);
    }
}
