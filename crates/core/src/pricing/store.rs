use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::product::ProductKey;
use crate::errors::ApplicationError;
use crate::pricing::table::PriceTable;

#[derive(Debug, Error)]
pub enum PriceTableError {
    #[error("price table directory `{0}` does not exist")]
    MissingDirectory(PathBuf),
    #[error("could not list price table directory `{path}`: {source}")]
    ReadDirectory { path: PathBuf, source: std::io::Error },
    #[error("could not read price table `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse price table `{path}`: {source}")]
    Parse { path: PathBuf, source: csv::Error },
    #[error("no CSV price tables found in `{0}`")]
    NoTables(PathBuf),
}

impl From<PriceTableError> for ApplicationError {
    fn from(value: PriceTableError) -> Self {
        Self::Configuration(value.to_string())
    }
}

/// Read-only set of price tables keyed by canonical product name.
#[derive(Clone, Debug, Default)]
pub struct PriceTableStore {
    tables: BTreeMap<ProductKey, PriceTable>,
}

impl PriceTableStore {
    pub fn new(tables: impl IntoIterator<Item = PriceTable>) -> Self {
        Self { tables: tables.into_iter().map(|table| (table.product().clone(), table)).collect() }
    }

    /// Loads every `*.csv` file in `directory`; the file stem names the product.
    pub fn load_dir(directory: &Path) -> Result<Self, PriceTableError> {
        if !directory.is_dir() {
            return Err(PriceTableError::MissingDirectory(directory.to_path_buf()));
        }

        let entries = fs::read_dir(directory).map_err(|source| PriceTableError::ReadDirectory {
            path: directory.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PriceTableError::ReadDirectory {
                path: directory.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && has_csv_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tables = BTreeMap::new();
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!(path = %path.display(), "skipping price table with non UTF-8 file name");
                continue;
            };
            let product = ProductKey::new(stem);
            let content = fs::read_to_string(&path)
                .map_err(|source| PriceTableError::ReadFile { path: path.clone(), source })?;
            let table = PriceTable::from_csv_str(product.clone(), &content)
                .map_err(|source| PriceTableError::Parse { path: path.clone(), source })?;

            if !table.is_usable() {
                warn!(
                    event_name = "pricing.table.unusable",
                    product = %product,
                    path = %path.display(),
                    "price table has no numeric axes and cannot be used for lookup"
                );
            }
            info!(
                event_name = "pricing.table.loaded",
                product = %product,
                widths = table.widths().len(),
                heights = table.heights().len(),
                cells = table.cell_count(),
                "price table loaded"
            );

            if tables.insert(product.clone(), table).is_some() {
                warn!(product = %product, "duplicate price table name, later file wins");
            }
        }

        if tables.is_empty() {
            return Err(PriceTableError::NoTables(directory.to_path_buf()));
        }

        Ok(Self { tables })
    }

    pub fn get(&self, product: &ProductKey) -> Option<&PriceTable> {
        self.tables.get(product)
    }

    pub fn product_keys(&self) -> impl Iterator<Item = &ProductKey> {
        self.tables.keys()
    }

    pub fn tables(&self) -> impl Iterator<Item = &PriceTable> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"))
}
