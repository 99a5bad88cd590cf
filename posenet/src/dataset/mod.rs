mod reader;

pub use reader::{read_tables, RawDataset, TableKeys};

use std::path::Path;

use candle_core::{DType, Device, Result as CandleResult, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, SeedableRng};

use crate::error::DataError;

/// Sensor code for a saturated (out of range) beam.
pub const OUT_OF_RANGE: f64 = 100.0;
pub const OUT_OF_RANGE_FILL: f64 = 7.0;

/// Sensor code for an invalid reading.
pub const INVALID_READING: f64 = -1.0;
pub const INVALID_READING_FILL: f64 = 0.0;

/// Pose column holding theta, squared when the theta transform is enabled.
pub const THETA_COLUMN: usize = 3;

pub const DEFAULT_TRAIN_RATIO: f64 = 0.9;

/// Pose columns regressed by default: x, y and theta.
pub const DEFAULT_TARGET_COLUMNS: [usize; 3] = [0, 1, THETA_COLUMN];

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Fraction of rows assigned to the training split.
    pub train_ratio: f64,
    /// Seed for the row permutation. `None` draws from entropy.
    pub seed: Option<u64>,
    pub keys: TableKeys,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            train_ratio: DEFAULT_TRAIN_RATIO,
            seed: None,
            keys: TableKeys::default(),
        }
    }
}

/// Train/test split ready for training, kept on the CPU.
///
/// Scans are `f32` shaped `(rows, channels, 1)`, one input channel per scan
/// for 1-D convolution. Poses are `f32` shaped `(rows, pose_dim)`.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub input_dim: usize,
    pub pose_dim: usize,
    pub train_x: Tensor,
    pub train_y: Tensor,
    pub test_x: Tensor,
    pub test_y: Tensor,
}

/// The prepared split uploaded to a device.
pub struct TensorSplit {
    pub train_x: Tensor,
    pub train_y: Tensor,
    pub test_x: Tensor,
    pub test_y: Tensor,
}

impl PreparedData {
    /// Uploads the split, keeping only the `targets` pose columns as labels.
    pub fn to_tensors(&self, targets: &[usize], device: &Device) -> Result<TensorSplit, DataError> {
        if let Some(&column) = targets.iter().find(|&&c| c >= self.pose_dim) {
            return Err(DataError::TargetColumn {
                column,
                available: self.pose_dim,
            });
        }

        let columns: Vec<u32> = targets.iter().map(|&c| c as u32).collect();
        let columns = Tensor::from_vec(columns, targets.len(), self.train_y.device())?;

        Ok(TensorSplit {
            train_x: self.train_x.to_device(device)?,
            train_y: self.train_y.index_select(&columns, 1)?.to_device(device)?,
            test_x: self.test_x.to_device(device)?,
            test_y: self.test_y.index_select(&columns, 1)?.to_device(device)?,
        })
    }

    pub fn train_len(&self) -> usize {
        self.train_x.dims()[0]
    }

    pub fn test_len(&self) -> usize {
        self.test_x.dims()[0]
    }

    pub fn log(&self) {
        log::info!("Sensor channels: {}", self.input_dim);
        log::info!("Pose dimensions: {}", self.pose_dim);
        log::info!(
            "Train samples: {}, test samples: {}",
            self.train_len(),
            self.test_len()
        );
    }
}

/// Reads a data file and prepares the train/test split.
pub fn load_data(
    path: &Path,
    square_theta: bool,
    options: &LoadOptions,
) -> Result<PreparedData, DataError> {
    log::info!("Loading data from {}", path.display());
    let raw = read_tables(path, &options.keys)?;
    prepare(raw, square_theta, options)
}

/// Cleans, shuffles, splits and reshapes a raw dataset. The order of the
/// steps is fixed: remapping and permuting happen on the full table, the
/// theta transform on each split.
pub fn prepare(
    raw: RawDataset,
    square_theta: bool,
    options: &LoadOptions,
) -> Result<PreparedData, DataError> {
    let sensors = raw.sensors.to_dtype(DType::F64)?;
    let poses = raw.poses.to_dtype(DType::F64)?;

    let (rows, input_dim) = sensors.dims2()?;
    let (pose_rows, pose_dim) = poses.dims2()?;
    if rows != pose_rows {
        return Err(DataError::RowMismatch {
            features: rows,
            labels: pose_rows,
        });
    }
    if square_theta && pose_dim <= THETA_COLUMN {
        return Err(DataError::TooFewColumns(pose_dim));
    }
    if !(0.0..=1.0).contains(&options.train_ratio) {
        return Err(DataError::TrainRatio(options.train_ratio));
    }

    let sensors = remap_sentinels(&sensors)?;

    let perm = Tensor::from_vec(permutation(rows, options.seed), rows, sensors.device())?;
    let sensors = sensors.index_select(&perm, 0)?;
    let poses = poses.index_select(&perm, 0)?;

    let train_size = split_point(rows, options.train_ratio);
    let (train_x, test_x) = split_rows(&sensors, train_size)?;
    let (mut train_y, mut test_y) = split_rows(&poses, train_size)?;

    if square_theta {
        train_y = square_column(&train_y, THETA_COLUMN)?;
        test_y = square_column(&test_y, THETA_COLUMN)?;
    }

    Ok(PreparedData {
        input_dim,
        pose_dim,
        train_x: to_scans(&train_x)?,
        train_y: train_y.to_dtype(DType::F32)?,
        test_x: to_scans(&test_x)?,
        test_y: test_y.to_dtype(DType::F32)?,
    })
}

/// Replaces sentinel codes by exact value, not by range.
pub fn remap_sentinels(sensors: &Tensor) -> CandleResult<Tensor> {
    let saturated = sensors.eq(OUT_OF_RANGE)?;
    let invalid = sensors.eq(INVALID_READING)?;

    let sensors = saturated.where_cond(
        &Tensor::full(OUT_OF_RANGE_FILL, sensors.dims(), sensors.device())?,
        sensors,
    )?;
    invalid.where_cond(
        &Tensor::full(INVALID_READING_FILL, sensors.dims(), sensors.device())?,
        &sensors,
    )
}

pub fn permutation(len: usize, seed: Option<u64>) -> Vec<u32> {
    let mut indices: Vec<u32> = (0..len as u32).collect();
    match seed {
        Some(seed) => indices.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => indices.shuffle(&mut thread_rng()),
    }
    indices
}

/// Number of training rows: `floor(len * ratio)` for a ratio in `[0, 1]`.
pub fn split_point(len: usize, ratio: f64) -> usize {
    ((len as f64 * ratio) as usize).min(len)
}

/// Rows `[0, at)` and `[at, rows)`.
fn split_rows(table: &Tensor, at: usize) -> CandleResult<(Tensor, Tensor)> {
    let rows = table.dim(0)?;
    Ok((table.narrow(0, 0, at)?, table.narrow(0, at, rows - at)?))
}

fn square_column(table: &Tensor, col: usize) -> CandleResult<Tensor> {
    let cols = table.dim(1)?;
    let mask: Vec<u8> = (0..cols).map(|c| u8::from(c == col)).collect();
    let mask = Tensor::from_vec(mask, (1, cols), table.device())?.broadcast_as(table.dims())?;
    mask.where_cond(&table.sqr()?, table)
}

fn to_scans(sensors: &Tensor) -> CandleResult<Tensor> {
    sensors.to_dtype(DType::F32)?.unsqueeze(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> LoadOptions {
        LoadOptions {
            seed: Some(seed),
            ..LoadOptions::default()
        }
    }

    fn table(rows: &[Vec<f64>]) -> Tensor {
        let cols = rows[0].len();
        let values: Vec<f64> = rows.concat();
        Tensor::from_vec(values, (rows.len(), cols), &Device::Cpu).unwrap()
    }

    /// Labels carry the row's original index in column 0 so correspondence
    /// can be checked after shuffling.
    fn indexed_dataset(sensors: Vec<Vec<f64>>) -> RawDataset {
        let poses: Vec<Vec<f64>> = (0..sensors.len())
            .map(|i| vec![i as f64, 0.5, 0.25, i as f64 + 1.0])
            .collect();
        RawDataset {
            sensors: table(&sensors),
            poses: table(&poses),
        }
    }

    fn scans(x: &Tensor) -> Vec<Vec<f32>> {
        x.squeeze(2).unwrap().to_vec2::<f32>().unwrap()
    }

    fn poses(y: &Tensor) -> Vec<Vec<f32>> {
        y.to_vec2::<f32>().unwrap()
    }

    fn all_scans(data: &PreparedData) -> Vec<Vec<f32>> {
        let mut rows = scans(&data.train_x);
        rows.extend(scans(&data.test_x));
        rows
    }

    #[test]
    fn test_sentinels_are_remapped() {
        let raw = indexed_dataset(vec![
            vec![100.0, 1.0, -1.0],
            vec![-1.0, 100.0, 2.5],
            vec![99.5, -0.5, 0.0],
        ]);
        let data = prepare(raw, false, &seeded(1)).unwrap();

        for scan in all_scans(&data) {
            assert!(!scan.contains(&100.0));
            assert!(!scan.contains(&-1.0));
        }

        let mut scans = all_scans(&data);
        scans.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(
            scans,
            vec![
                vec![0.0, 7.0, 2.5],
                vec![7.0, 1.0, 0.0],
                vec![99.5, -0.5, 0.0],
            ]
        );
    }

    #[test]
    fn test_split_sizes() {
        for rows in [2, 9, 10, 11, 57, 100] {
            let sensors = (0..rows).map(|i| vec![i as f64, 1.0]).collect();
            let data = prepare(indexed_dataset(sensors), false, &seeded(7)).unwrap();

            assert_eq!(data.train_len() + data.test_len(), rows);
            assert_eq!(data.train_len(), (rows as f64 * 0.9).floor() as usize);
            assert_eq!(data.train_y.dims()[0], data.train_len());
            assert_eq!(data.test_y.dims()[0], data.test_len());
        }
    }

    #[test]
    fn test_rows_stay_paired_after_shuffle() {
        let sensors = (0..50).map(|i| vec![i as f64 * 2.0, 3.0]).collect();
        let data = prepare(indexed_dataset(sensors), false, &seeded(3)).unwrap();

        let check = |x: &Tensor, y: &Tensor| {
            for (scan, pose) in scans(x).iter().zip(poses(y)) {
                assert_eq!(scan[0], pose[0] * 2.0);
            }
        };
        check(&data.train_x, &data.train_y);
        check(&data.test_x, &data.test_y);
    }

    #[test]
    fn test_theta_is_squared_in_both_splits() {
        let sensors = (0..20).map(|i| vec![i as f64]).collect();
        let data = prepare(indexed_dataset(sensors), true, &seeded(11)).unwrap();

        let check = |y: &Tensor| {
            for row in poses(y) {
                let index = row[0];
                assert_eq!(row[1], 0.5);
                assert_eq!(row[2], 0.25);
                assert_eq!(row[3], (index + 1.0) * (index + 1.0));
            }
        };
        check(&data.train_y);
        check(&data.test_y);
    }

    #[test]
    fn test_theta_untouched_without_flag() {
        let sensors = (0..10).map(|i| vec![i as f64]).collect();
        let data = prepare(indexed_dataset(sensors), false, &seeded(11)).unwrap();

        for row in poses(&data.train_y).into_iter().chain(poses(&data.test_y)) {
            assert_eq!(row[3], row[0] + 1.0);
        }
    }

    #[test]
    fn test_scans_are_rank_three() {
        for channels in [1, 8, 360] {
            let sensors = (0..12).map(|_| vec![1.0; channels]).collect();
            let data = prepare(indexed_dataset(sensors), false, &seeded(5)).unwrap();

            assert_eq!(data.input_dim, channels);
            assert_eq!(data.train_x.dims(), &[10, channels, 1]);
            assert_eq!(data.test_x.dims(), &[2, channels, 1]);
            assert_eq!(data.train_x.dtype(), DType::F32);

            let tensors = data
                .to_tensors(&DEFAULT_TARGET_COLUMNS, &Device::Cpu)
                .unwrap();
            assert_eq!(tensors.train_x.dims(), &[10, channels, 1]);
            assert_eq!(tensors.test_y.dims(), &[2, 3]);
        }
    }

    #[test]
    fn test_ten_row_scenario() {
        let mut sensors = vec![vec![100.0, -1.0]];
        sensors.extend((0..9).map(|_| vec![5.0, 3.0]));
        let data = prepare(indexed_dataset(sensors), false, &LoadOptions::default()).unwrap();

        assert_eq!(data.train_len(), 9);
        assert_eq!(data.test_len(), 1);

        let cleaned = all_scans(&data)
            .into_iter()
            .filter(|row| row == &[7.0, 0.0])
            .count();
        assert_eq!(cleaned, 1);
    }

    #[test]
    fn test_same_seed_same_split() {
        let sensors: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let a = prepare(indexed_dataset(sensors.clone()), false, &seeded(42)).unwrap();
        let b = prepare(indexed_dataset(sensors.clone()), false, &seeded(42)).unwrap();
        let c = prepare(indexed_dataset(sensors), false, &seeded(43)).unwrap();

        assert_eq!(scans(&a.train_x), scans(&b.train_x));
        assert_eq!(poses(&a.test_y), poses(&b.test_y));
        assert_ne!(scans(&a.train_x), scans(&c.train_x));
    }

    #[test]
    fn test_row_mismatch_is_rejected() {
        let raw = RawDataset {
            sensors: table(&[vec![1.0], vec![2.0], vec![3.0]]),
            poses: table(&[vec![0.0, 0.0, 0.0, 0.0]]),
        };
        let err = prepare(raw, false, &LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DataError::RowMismatch {
                features: 3,
                labels: 1
            }
        ));
    }

    #[test]
    fn test_theta_needs_four_columns() {
        let raw = RawDataset {
            sensors: table(&[vec![1.0]]),
            poses: table(&[vec![0.0, 0.0, 0.0]]),
        };
        let err = prepare(raw, true, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DataError::TooFewColumns(3)));
    }

    #[test]
    fn test_train_ratio_out_of_range_is_rejected() {
        for ratio in [-0.1, 1.5, f64::NAN] {
            let sensors = (0..10).map(|i| vec![i as f64]).collect();
            let options = LoadOptions {
                train_ratio: ratio,
                ..seeded(1)
            };
            let err = prepare(indexed_dataset(sensors), false, &options).unwrap_err();
            assert!(matches!(err, DataError::TrainRatio(_)));
        }

        let sensors = (0..10).map(|i| vec![i as f64]).collect();
        let options = LoadOptions {
            train_ratio: 1.0,
            ..seeded(1)
        };
        let data = prepare(indexed_dataset(sensors), false, &options).unwrap();
        assert_eq!(data.train_len(), 10);
    }

    #[test]
    fn test_target_columns() {
        let sensors = (0..10).map(|i| vec![i as f64]).collect();
        let data = prepare(indexed_dataset(sensors), true, &seeded(2)).unwrap();

        let tensors = data.to_tensors(&[0, 3], &Device::Cpu).unwrap();
        let labels = poses(&tensors.train_y);
        for (row, scan) in labels.iter().zip(scans(&data.train_x)) {
            assert_eq!(row[0], scan[0]);
            assert_eq!(row[1], (scan[0] + 1.0) * (scan[0] + 1.0));
        }

        let err = data.to_tensors(&[0, 4], &Device::Cpu).err().unwrap();
        assert!(matches!(
            err,
            DataError::TargetColumn {
                column: 4,
                available: 4
            }
        ));
    }

    #[test]
    fn test_permutation_covers_every_row() {
        let mut perm = permutation(100, None);
        perm.sort_unstable();
        assert_eq!(perm, (0..100).collect::<Vec<u32>>());
    }
}
