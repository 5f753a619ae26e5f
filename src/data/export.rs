use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, Float32Array, Float64Array, Float64Builder, LargeListArray, ListArray, ListBuilder,
    StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use super::model::Corpus;

// ---------------------------------------------------------------------------
// Corpus <-> Parquet
// ---------------------------------------------------------------------------

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    Ok(())
}

/// Write the corpus as one row per sample: `label`, `source`, `features`.
pub fn write_corpus_parquet(corpus: &Corpus, path: &Path) -> Result<()> {
    ensure_parent(path)?;

    let mut features = ListBuilder::new(Float64Builder::new());
    for row in corpus.features() {
        features.values().append_slice(row);
        features.append(true);
    }
    let features = features.finish();

    let labels = StringArray::from(corpus.labels().iter().map(String::as_str).collect::<Vec<_>>());
    let sources = StringArray::from(
        corpus
            .sources()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>(),
    );

    let schema = Arc::new(Schema::new(vec![
        Field::new("label", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new(
            "features",
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            false,
        ),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(labels), Arc::new(sources), Arc::new(features)],
    )
    .context("building corpus record batch")?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing corpus batch")?;
    writer.close().context("closing parquet writer")?;

    debug!("wrote {} corpus rows to {}", corpus.len(), path.display());
    Ok(())
}

/// Read a corpus written by [`write_corpus_parquet`].
///
/// The feature length is taken from the first row; every other row must match.
pub fn read_corpus_parquet(path: &Path) -> Result<Corpus> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut corpus: Option<Corpus> = None;
    let mut row_no = 0usize;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let labels = string_column(&batch, "label")?;
        let sources = string_column(&batch, "source")?;
        let features_idx = batch
            .schema()
            .index_of("features")
            .map_err(|_| anyhow::anyhow!("corpus file missing 'features' column"))?;
        let features_col = batch.column(features_idx);

        for row in 0..batch.num_rows() {
            let features = extract_f64_list(features_col, row)
                .with_context(|| format!("row {row_no}: failed to read 'features'"))?;
            let target = corpus.get_or_insert_with(|| Corpus::new(features.len()));
            target
                .push(
                    features,
                    labels.value(row),
                    PathBuf::from(sources.value(row)),
                )
                .with_context(|| format!("row {row_no}"))?;
            row_no += 1;
        }
    }

    Ok(corpus.unwrap_or_default())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| anyhow::anyhow!("corpus file missing '{name}' column"))?;
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .with_context(|| format!("column '{name}' is not Utf8"))
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .context("expected ListArray")?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .context("expected LargeListArray")?
            .value(row),
        other => bail!("expected List or LargeList column, got {other:?}"),
    };

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "list inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

// ---------------------------------------------------------------------------
// Embedding coordinates and run report
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EmbeddingRow<'a> {
    index: usize,
    label: &'a str,
    source: String,
    x: f64,
    y: f64,
}

/// Write `index,label,source,x,y`, one line per embedded sample.
pub fn write_embedding_csv(path: &Path, corpus: &Corpus, points: &[[f64; 2]]) -> Result<()> {
    if points.len() != corpus.len() {
        bail!(
            "{} embedded points for {} corpus rows",
            points.len(),
            corpus.len()
        );
    }
    ensure_parent(path)?;
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for (index, ((label, source), point)) in corpus
        .labels()
        .iter()
        .zip(corpus.sources())
        .zip(points)
        .enumerate()
    {
        writer
            .serialize(EmbeddingRow {
                index,
                label,
                source: source.display().to_string(),
                x: point[0],
                y: point[1],
            })
            .with_context(|| format!("writing CSV row {index}"))?;
    }
    writer.flush().context("flushing embedding CSV")?;
    Ok(())
}

/// Pretty-printed JSON of any serializable value.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let text = serde_json::to_string_pretty(value).context("serializing JSON")?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}
