//! Writes a synthetic sensor dataset (CSV and Parquet) and a small demo model
//! so the pipeline can be tried end to end without real data.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use rusty_wrench::model::{
    Classifier, FeatureFile, HandleUnknown, ModelFile, ModelStore, OneHotColumn, Preprocessor,
    TreeNode, timestamp_now,
};

#[derive(Parser)]
#[command(about = "Generate sample sensor data and a demo model")]
struct Args {
    /// Output directory for the datasets
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Directory to write the demo model into
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    #[arg(long, default_value_t = 500)]
    rows: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Seeded SplitMix64 stream. Normal draws use the polar method and keep
/// the second value of each pair for the next call.
struct SensorRng {
    state: u64,
    spare: Option<f64>,
}

impl SensorRng {
    fn seeded(seed: u64) -> Self {
        Self { state: seed, spare: None }
    }

    fn bits(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    fn uniform(&mut self) -> f64 {
        (self.bits() >> 11) as f64 * f64::EPSILON / 2.0
    }

    fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        if let Some(z) = self.spare.take() {
            return mean + sd * z;
        }
        loop {
            let u = 2.0 * self.uniform() - 1.0;
            let v = 2.0 * self.uniform() - 1.0;
            let r = u * u + v * v;
            if r > 0.0 && r < 1.0 {
                let k = (-2.0 * r.ln() / r).sqrt();
                self.spare = Some(v * k);
                return mean + sd * u * k;
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct SensorRow {
    #[serde(rename = "UDI")]
    udi: i64,
    #[serde(rename = "Product ID")]
    product_id: String,
    #[serde(rename = "Type")]
    machine_type: String,
    #[serde(rename = "Air temperature [K]")]
    air_temperature: f64,
    #[serde(rename = "Process temperature [K]")]
    process_temperature: f64,
    #[serde(rename = "Rotational speed [rpm]")]
    rotational_speed: f64,
    #[serde(rename = "Torque [Nm]")]
    torque: f64,
    #[serde(rename = "Tool wear [min]")]
    tool_wear: f64,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn generate_rows(n: usize, rng: &mut SensorRng) -> Vec<SensorRow> {
    (0..n)
        .map(|i| {
            let machine_type = match rng.uniform() {
                p if p < 0.6 => "L",
                p if p < 0.9 => "M",
                _ => "H",
            };
            let air = rng.normal(300.0, 2.0);
            SensorRow {
                udi: i as i64 + 1,
                product_id: format!("{machine_type}{}", 47181 + i),
                machine_type: machine_type.to_string(),
                air_temperature: round1(air),
                process_temperature: round1(air + 10.0 + rng.normal(0.0, 1.0)),
                rotational_speed: rng.normal(1540.0, 180.0).round().max(1100.0),
                torque: round1(rng.normal(40.0, 10.0).max(3.0)),
                tool_wear: (rng.uniform() * 250.0).round(),
            }
        })
        .collect()
}

fn write_csv(path: &Path, rows: &[SensorRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, rows: &[SensorRow]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("UDI", DataType::Int64, false),
        Field::new("Product ID", DataType::Utf8, false),
        Field::new("Type", DataType::Utf8, false),
        Field::new("Air temperature [K]", DataType::Float64, false),
        Field::new("Process temperature [K]", DataType::Float64, false),
        Field::new("Rotational speed [rpm]", DataType::Float64, false),
        Field::new("Torque [Nm]", DataType::Float64, false),
        Field::new("Tool wear [min]", DataType::Float64, false),
    ]));

    let floats = |f: fn(&SensorRow) -> f64| Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(rows.iter().map(|r| r.udi).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|r| r.product_id.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|r| r.machine_type.as_str()).collect::<Vec<_>>())),
            floats(|r| r.air_temperature),
            floats(|r| r.process_temperature),
            floats(|r| r.rotational_speed),
            floats(|r| r.torque),
            floats(|r| r.tool_wear),
        ],
    )
    .context("Failed to create RecordBatch")?;

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Worn tools and high torque fail; H-type machines tolerate a little more.
fn demo_model() -> (ModelFile, FeatureFile) {
    let features = [
        "Type",
        "Air temperature [K]",
        "Process temperature [K]",
        "Rotational speed [rpm]",
        "Torque [Nm]",
        "Tool wear [min]",
    ];
    // Transformed layout: 5 numeric inputs, then one-hot H, L, M.
    let model = ModelFile {
        preprocessor: Preprocessor {
            numeric: features[1..].iter().map(|s| s.to_string()).collect(),
            categorical: vec![OneHotColumn {
                column: "Type".into(),
                categories: vec!["H".into(), "L".into(), "M".into()],
                handle_unknown: HandleUnknown::Ignore,
            }],
        },
        classifier: Classifier::DecisionTree {
            root: TreeNode::split(
                4,
                200.0,
                TreeNode::split(
                    3,
                    60.0,
                    TreeNode::leaf(95.0, 5.0),
                    TreeNode::split(5, 0.5, TreeNode::leaf(30.0, 70.0), TreeNode::leaf(55.0, 45.0)),
                ),
                TreeNode::leaf(20.0, 80.0),
            ),
        },
    };
    let feature_file = FeatureFile {
        features: features.iter().map(|s| s.to_string()).collect(),
        target: Some("Machine failure".into()),
        ..Default::default()
    };
    (model, feature_file)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut rng = SensorRng::seeded(args.seed);
    let rows = generate_rows(args.rows, &mut rng);

    fs::create_dir_all(&args.out)?;
    let csv_path = args.out.join("sample_sensors.csv");
    let parquet_path = args.out.join("sample_sensors.parquet");
    write_csv(&csv_path, &rows)?;
    write_parquet(&parquet_path, &rows)?;

    let (model, features) = demo_model();
    let store = ModelStore::new(&args.model_dir);
    let (model_path, _) = store.write_artifact(&timestamp_now(), &model, &features)?;

    println!(
        "Wrote {} rows to {} and {}; demo model at {}",
        rows.len(),
        csv_path.display(),
        parquet_path.display(),
        model_path.display()
    );
    Ok(())
}
