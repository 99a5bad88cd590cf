use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use matfile::{MatFile, NumericData};

use crate::error::DataError;

/// Names of the two tables inside a data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableKeys {
    pub sensors: String,
    pub poses: String,
}

impl Default for TableKeys {
    fn default() -> Self {
        Self {
            sensors: "data_sensor".to_string(),
            poses: "data_pose".to_string(),
        }
    }
}

/// Sensor and pose tables exactly as stored on disk, as `(rows, cols)`
/// `f64` tensors on the CPU.
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub sensors: Tensor,
    pub poses: Tensor,
}

enum Format {
    Mat,
    Npz,
    Safetensors,
}

impl Format {
    fn detect(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "mat" => Some(Self::Mat),
            "npz" => Some(Self::Npz),
            "safetensors" => Some(Self::Safetensors),
            _ => None,
        }
    }
}

/// Reads both tables from a `.mat`, `.npz` or `.safetensors` file.
pub fn read_tables(path: &Path, keys: &TableKeys) -> Result<RawDataset, DataError> {
    let format = Format::detect(path).ok_or_else(|| DataError::UnsupportedFormat(path.into()))?;

    // Surface a missing file as an I/O error regardless of the container
    fs::metadata(path).map_err(|e| DataError::io(path, e))?;

    let (sensors, poses) = match format {
        Format::Mat => read_mat(path, keys)?,
        Format::Npz => {
            let tensors: HashMap<String, Tensor> = Tensor::read_npz(path)?.into_iter().collect();
            from_tensors(&tensors, keys)?
        }
        Format::Safetensors => {
            let tensors = candle_core::safetensors::load(path, &Device::Cpu)?;
            from_tensors(&tensors, keys)?
        }
    };

    log::debug!(
        "Read {:?} sensor table and {:?} pose table from {}",
        sensors.dims(),
        poses.dims(),
        path.display()
    );

    Ok(RawDataset { sensors, poses })
}

fn read_mat(path: &Path, keys: &TableKeys) -> Result<(Tensor, Tensor), DataError> {
    let file = File::open(path).map_err(|e| DataError::io(path, e))?;
    let mat = MatFile::parse(BufReader::new(file))
        .map_err(|e| DataError::Format(format!("{:?}", e)))?;

    let table = |name: &str| -> Result<Tensor, DataError> {
        let array = mat
            .find_by_name(name)
            .ok_or_else(|| DataError::MissingTable(name.to_string()))?;

        let shape = array.size();
        if shape.len() != 2 {
            return Err(DataError::NotMatrix {
                name: name.to_string(),
                shape: shape.clone(),
            });
        }

        // MATLAB stores columns contiguously
        let values = widen(array.data())?;
        let columns = Tensor::from_vec(values, (shape[1], shape[0]), &Device::Cpu)?;
        Ok(columns.t()?.contiguous()?)
    };

    Ok((table(&keys.sensors)?, table(&keys.poses)?))
}

/// Converts any real MATLAB numeric class to f64.
#[allow(unreachable_patterns)]
fn widen(data: &NumericData) -> Result<Vec<f64>, DataError> {
    let values = match data {
        NumericData::Double { real, .. } => real.clone(),
        NumericData::Single { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        _ => return Err(DataError::Format("unsupported MATLAB numeric class".into())),
    };
    Ok(values)
}

fn from_tensors(
    tensors: &HashMap<String, Tensor>,
    keys: &TableKeys,
) -> Result<(Tensor, Tensor), DataError> {
    let table = |name: &str| -> Result<Tensor, DataError> {
        let tensor = tensors
            .get(name)
            .ok_or_else(|| DataError::MissingTable(name.to_string()))?;
        if tensor.rank() != 2 {
            return Err(DataError::NotMatrix {
                name: name.to_string(),
                shape: tensor.dims().to_vec(),
            });
        }
        Ok(tensor.to_dtype(DType::F64)?)
    };

    Ok((table(&keys.sensors)?, table(&keys.poses)?))
}
