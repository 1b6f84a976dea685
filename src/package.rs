//! Zip packaging of rendered products.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::DeliveryError;
use crate::render::Product;

/// Collect all product images into one deflate-compressed zip archive.
///
/// Entry names are the bare image filenames. Returns the archive path.
pub fn zip_products(products: &[Product], archive_path: &Path) -> Result<PathBuf, DeliveryError> {
    if products.is_empty() {
        return Err(DeliveryError::NoProducts);
    }

    let file = File::create(archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for product in products {
        let name = product
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.png", product.name));
        zip.start_file(name, options)?;
        let bytes = std::fs::read(&product.path)?;
        zip.write_all(&bytes)?;
    }
    zip.finish()?;

    info!(
        path = %archive_path.display(),
        entries = products.len(),
        "Created delivery archive"
    );
    Ok(archive_path.to_path_buf())
}
