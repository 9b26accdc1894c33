//! JSON export of harvested products

use crate::storage::HarvestArchive;
use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use url::Url;

/// Writes an execution's products to `path` as a pretty-printed JSON array
///
/// Parent directories are created as needed. Records keep their insertion
/// order.
///
/// # Returns
///
/// * `Ok(usize)` - Number of products written
/// * `Err(HarvestError)` - Query, serialization or write failed
pub fn export_products_json(
    archive: &dyn HarvestArchive,
    execution_id: i64,
    path: &Path,
) -> Result<usize> {
    let products = archive.products_for_execution(execution_id)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &products)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!("Exported {} products to {}", products.len(), path.display());
    Ok(products.len())
}

/// File name for an execution's results: `<host>_<execution>.json`
///
/// Characters other than ASCII alphanumerics, `.` and `-` in the host are
/// replaced with `_`.
pub fn results_file_name(root: &Url, execution_number: u32) -> String {
    let host: String = root
        .host_str()
        .unwrap_or("site")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}.json", host, execution_number)
}
