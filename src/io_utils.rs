//! File output helpers: the master-series CSV writer, pretty JSON reports
//! and SHA-256 fingerprints of written artifacts.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use csv::QuoteStyle;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::frame::Frame;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Delimiter for an output file: an explicit choice wins, then the file
/// extension, then a comma.
pub fn resolve_output_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating output directory {parent:?}"))?;
    }
    Ok(())
}

pub fn open_csv_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(BufWriter::new(file)))
}

/// Writes `frame` with a header row. Missing cells are written empty.
pub fn write_frame_csv(frame: &Frame, path: &Path, delimiter: u8) -> Result<()> {
    let mut writer = open_csv_writer(path, delimiter)?;
    writer
        .write_record(frame.column_names())
        .with_context(|| format!("Writing header to {path:?}"))?;
    for row in 0..frame.height() {
        let record = frame.columns().iter().map(|column| {
            column.values[row]
                .as_ref()
                .map(|value| value.as_display())
                .unwrap_or_default()
        });
        writer
            .write_record(record)
            .with_context(|| format!("Writing row {} to {path:?}", row + 1))?;
    }
    writer
        .flush()
        .with_context(|| format!("Flushing output file {path:?}"))?;
    Ok(())
}

pub fn write_json_pretty<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("Creating report {path:?}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Serializing report {path:?}"))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("Opening {path:?} for hashing"))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader
            .read(&mut buffer)
            .with_context(|| format!("Reading {path:?} for hashing"))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, frame::Column};
    use tempfile::tempdir;

    #[test]
    fn csv_writer_leaves_missing_cells_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("master.csv");
        let frame = Frame::from_columns(vec![
            Column::new("fecha", vec![Some(Value::Text("2023-01-01".into())), None]),
            Column::from_f64("v", vec![Some(1.5), None]),
        ])
        .unwrap();
        write_frame_csv(&frame, &path, b',').unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "fecha,v\n2023-01-01,1.5\n,\n");
    }

    #[test]
    fn sha256_matches_known_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn delimiter_follows_extension_unless_given() {
        assert_eq!(resolve_output_delimiter(Path::new("m.tsv"), None), b'\t');
        assert_eq!(resolve_output_delimiter(Path::new("m.csv"), None), b',');
        assert_eq!(resolve_output_delimiter(Path::new("m.tsv"), Some(b';')), b';');
        assert_eq!(printable_delimiter(b'\t'), "\\t");
    }
}
