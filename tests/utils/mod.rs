use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use ddf_datapoints::{EtlConfig, LocalMetadata, Pipeline, RunReport};
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

/// Source priority used by the fixtures, best first
pub const SOURCES: [&str; 3] = ["BA:1", "BA:2", "HS:3"];

/// Write a gzip-compressed text file
pub fn write_gz(path: &Path, content: &str) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

/// A throwaway source, metadata and output directory layout
pub struct Fixture {
    pub root: TempDir,
    catalog: Vec<(String, String)>,
}

impl Fixture {
    #[must_use]
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        for dir in ["source", "metadata", "output"] {
            fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        let fixture = Self {
            root,
            catalog: Vec::new(),
        };
        fixture.write_metadata("source", &format!("source\n{}\n", SOURCES.join("\n")));
        fixture.write_metadata("note_source", "note_source\nR1\nR2\n");
        fixture.write_catalog();
        fixture
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.path().join("source")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.path().join("metadata")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("output")
    }

    pub fn write_metadata(&self, table: &str, content: &str) {
        fs::write(self.metadata_dir().join(format!("{table}.csv")), content).unwrap();
    }

    /// List an indicator in the catalog without writing its raw table
    pub fn catalog_entry(&mut self, id: &str, freq: &str) {
        self.catalog.push((id.to_string(), freq.to_string()));
        self.write_catalog();
    }

    /// List an annual indicator and write its raw table
    pub fn add_indicator(&mut self, id: &str, content: &str) {
        self.catalog_entry(id, "A");
        write_gz(&self.source_dir().join(format!("{id}.csv.gz")), content);
    }

    fn write_catalog(&self) {
        let mut text = String::from("id,freq,indicator,indicator_label,n_records\n");
        for (id, freq) in &self.catalog {
            text.push_str(&format!("{id},{freq},{id},{id} label,\n"));
        }
        self.write_metadata("indicators", &text);
    }

    /// Configuration pointing at the fixture, without derived indicators
    #[must_use]
    pub fn config(&self) -> EtlConfig {
        EtlConfig {
            source_dir: self.source_dir(),
            metadata_dir: self.metadata_dir(),
            output_dir: self.output_dir(),
            num_threads: Some(2),
            derived: Vec::new(),
            ..EtlConfig::default()
        }
    }

    pub fn run(&self, config: EtlConfig) -> ddf_datapoints::Result<RunReport> {
        let metadata = LocalMetadata::new(self.metadata_dir());
        Pipeline::new(config, Box::new(metadata))?.run()
    }

    /// Contents of an output file, relative to the output directory
    pub fn read_output(&self, name: &str) -> String {
        fs::read_to_string(self.output_dir().join(name)).unwrap()
    }
}

/// Every file under a directory with its bytes, keyed by relative path
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path.strip_prefix(dir).unwrap().to_path_buf();
                files.insert(relative, fs::read(&path).unwrap());
            }
        }
    }
    files
}

/// Data lines of a CSV file, split into fields
pub fn data_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .skip(1)
        .map(|line| line.split(',').map(ToString::to_string).collect())
        .collect()
}
