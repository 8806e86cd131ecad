//! Input name list.
//!
//! A CSV (or one-name-per-line text) file. If the first row names a column
//! we recognize (`name`, `organization`, ...), that column is read;
//! otherwise the first column is, and the first row is data.

use std::fs::File;
use std::path::Path;

use tracing::{debug, info};

use crate::error::InputError;
use crate::types::target::OrganizationName;

/// Header values that mark the name column.
pub const NAME_HEADERS: &[&str] = &[
    "name",
    "names",
    "organization",
    "organisation",
    "organization name",
    "organization_name",
    "org",
    "org_name",
    "company",
    "company_name",
    "idn",
    "idn_name",
    "system",
    "system_name",
];

fn is_header_value(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    NAME_HEADERS.contains(&value.as_str())
}

/// Load organization names in file order.
///
/// Blank rows and repeated header rows are skipped. Duplicates are kept;
/// the coordinator collapses them.
pub fn load_names(path: impl AsRef<Path>) -> Result<Vec<OrganizationName>, InputError> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(InputError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    let names = read_names(file)?;
    info!(path = %path.display(), count = names.len(), "loaded input names");
    Ok(names)
}

/// Parse names from any reader.
pub fn read_names<R: std::io::Read>(reader: R) -> Result<Vec<OrganizationName>, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut column = 0;
    let mut names = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if row == 0 {
            if let Some(idx) = record.iter().position(is_header_value) {
                debug!(column = idx, header = &record[idx], "name column found by header");
                column = idx;
                continue;
            }
        }

        let Some(value) = record.get(column) else {
            continue;
        };
        if is_header_value(value) {
            continue;
        }
        if let Some(name) = OrganizationName::new(value) {
            names.push(name);
        }
    }
    Ok(names)
}
