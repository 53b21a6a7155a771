//! Product id catalog built from the USGS Landsat bulk metadata files.
use crate::download;
use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

pub const PRODUCT_ID_COLUMN: &str = "LANDSAT_PRODUCT_ID";
const REAL_TIME_SUFFIX: &str = "RT";

const BULK_METADATA: &str = "https://landsat.usgs.gov/landsat/metadata_service/bulk_metadata_files";

/// One bulk metadata archive. `id_column` is only used when the file has no
/// `LANDSAT_PRODUCT_ID` header.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CatalogSource {
    pub url: String,
    pub id_column: usize,
}

impl CatalogSource {
    /// Landsat 5 TM, Landsat 7 ETM+ and Landsat 8 OLI/TIRS collection 1.
    pub fn landsat_collection1() -> Vec<Self> {
        [("LANDSAT_TM_C1", 26), ("LANDSAT_ETM_C1", 29), ("LANDSAT_8_C1", 31)]
            .into_iter()
            .map(|(name, id_column)| Self {
                url: format!("{BULK_METADATA}/{name}.csv.gz"),
                id_column,
            })
            .collect()
    }
}

/// Fetch every source archive into `root_folder` and merge their product ids
/// into `root_folder/filename`. Any failure aborts the build.
pub async fn build_catalog(
    client: &Client,
    sources: &[CatalogSource],
    root_folder: &Path,
    filename: &str,
) -> Result<PathBuf> {
    info!("Downloading latest Landsat bulk metadata files");
    let mut archives = vec![];
    for source in sources {
        // Always refresh; the bulk files change daily under the same name
        let name = download::file_name_from_url(&source.url)?;
        let stale = root_folder.join(name);
        if stale.exists() {
            std::fs::remove_file(&stale)?;
        }
        let path = download::download_file(client, &source.url, root_folder)
            .await
            .with_context(|| format!("Unable to fetch {}", source.url))?;
        archives.push((path, source.id_column));
    }

    let output = root_folder.join(filename);
    let count = merge_archives(&archives, &output)?;
    info!("Saved {count} Landsat product ids in {}", output.display());
    Ok(output)
}

/// Merge gzip-compressed metadata CSVs into a single-column catalog, keeping
/// source order. Returns the number of ids written.
pub fn merge_archives(archives: &[(PathBuf, usize)], output: &Path) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(output)
        .with_context(|| format!("Unable to create {}", output.display()))?;
    writer.write_record([PRODUCT_ID_COLUMN])?;

    let mut count = 0;
    for (archive, fallback_column) in archives {
        info!("Unzipping {}", archive.display());
        let file = File::open(archive)
            .with_context(|| format!("Unable to open {}", archive.display()))?;
        let decoder = GzDecoder::new(BufReader::new(file));
        let ids = read_product_ids(decoder, *fallback_column)
            .with_context(|| format!("Unable to read {}", archive.display()))?;
        for id in &ids {
            writer.write_record([id])?;
        }
        count += ids.len();
    }
    writer.flush()?;
    Ok(count)
}

fn read_product_ids(input: impl std::io::Read, fallback_column: usize) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut ids = vec![];
    let mut column = None;
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let column = *column.get_or_insert_with(|| {
            record
                .iter()
                .position(|field| field == PRODUCT_ID_COLUMN)
                .unwrap_or(fallback_column)
        });
        let id = record
            .get(column)
            .ok_or(anyhow!("Row {} has no column {}", index + 1, column))?;
        if id == PRODUCT_ID_COLUMN || id.ends_with(REAL_TIME_SUFFIX) {
            continue;
        }
        ids.push(id.to_string());
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;

    fn write_gz(path: &Path, content: &str) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    /// A CSV row with `id` at `column`, padded with filler fields.
    fn row(columns: usize, column: usize, id: &str) -> String {
        (0..columns)
            .map(|i| if i == column { id.to_string() } else { format!("f{i}") })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn synthetic_archives(dir: &Path) -> Vec<(PathBuf, usize)> {
        let tm = [
            row(30, 26, PRODUCT_ID_COLUMN),
            row(30, 26, "LT05_L1TP_091084_20110105_20161011_01_T1"),
            row(30, 26, "LT05_L1TP_091084_20110121_20161010_01_T1"),
        ];
        // No header: falls back to the fixed offset
        let etm = [
            row(32, 29, "LE07_L1TP_091084_20170109_20170204_01_T1"),
            row(32, 29, "LE07_L1TP_091084_20170125_20170125_01_RT"),
        ];
        let oli = [
            row(40, 31, PRODUCT_ID_COLUMN),
            row(40, 31, "LC08_L1TP_091084_20170117_20170117_01_RT"),
            row(40, 31, "LC08_L1TP_091084_20170101_20170218_01_T1"),
        ];

        let mut archives = vec![];
        for (name, rows, column) in [("tm", &tm[..], 26), ("etm", &etm[..], 29), ("oli", &oli[..], 31)] {
            let path = dir.join(format!("{name}.csv.gz"));
            write_gz(&path, &(rows.join("\n") + "\n"));
            archives.push((path, column));
        }
        archives
    }

    #[test]
    fn test_merge_excludes_header_and_real_time_rows() {
        let dir = tempfile::tempdir().unwrap();
        let archives = synthetic_archives(dir.path());
        let output = dir.path().join("ids.csv");

        let count = merge_archives(&archives, &output).unwrap();
        assert_eq!(count, 4);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "LANDSAT_PRODUCT_ID\n\
             LT05_L1TP_091084_20110105_20161011_01_T1\n\
             LT05_L1TP_091084_20110121_20161010_01_T1\n\
             LE07_L1TP_091084_20170109_20170204_01_T1\n\
             LC08_L1TP_091084_20170101_20170218_01_T1\n"
        );
    }

    #[test]
    fn test_named_column_wins_over_offset() {
        let csv = format!(
            "{}\n{}\n",
            row(5, 1, PRODUCT_ID_COLUMN),
            row(5, 1, "LC08_L1TP_091084_20170101_20170218_01_T1")
        );
        let ids = read_product_ids(csv.as_bytes(), 31).unwrap();
        assert_eq!(ids, vec!["LC08_L1TP_091084_20170101_20170218_01_T1"]);
    }

    #[test]
    fn test_short_row_is_an_error() {
        let csv = "a,b,c\n";
        assert!(read_product_ids(csv.as_bytes(), 26).is_err());
    }

    #[test]
    fn test_merge_is_byte_identical_on_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let archives = synthetic_archives(dir.path());
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");

        merge_archives(&archives, &first).unwrap();
        merge_archives(&archives, &second).unwrap();
        assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
    }

    #[test]
    fn test_corrupt_archive_aborts_merge() {
        let dir = tempfile::tempdir().unwrap();
        let mut archives = synthetic_archives(dir.path());
        let broken = dir.path().join("broken.csv.gz");
        fs::write(&broken, b"not gzip at all").unwrap();
        archives.push((broken, 31));

        assert!(merge_archives(&archives, &dir.path().join("ids.csv")).is_err());
    }

    #[test]
    fn test_default_sources() {
        let sources = CatalogSource::landsat_collection1();
        assert_eq!(
            sources.iter().map(|s| s.id_column).collect::<Vec<_>>(),
            vec![26, 29, 31]
        );
        assert!(sources[2].url.ends_with("/LANDSAT_8_C1.csv.gz"));
    }
}
