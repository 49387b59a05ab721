use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;

const READ_BUFFER: usize = 1024 * 1024;

/// Open the dump for streaming. `.bz2` files are decompressed on the fly and
/// `-` reads standard input.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::with_capacity(READ_BUFFER, std::io::stdin())));
    }

    let file = File::open(path)
        .with_context(|| format!("Error opening file: {}", path.display()))?;
    let is_bz2 = path.extension().is_some_and(|e| e == "bz2");

    if is_bz2 {
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER, BzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER, file)))
    }
}
