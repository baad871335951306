//! Writing rendered output to its destination.

use crate::error::{VaultifyError, VaultifyResult};
use crate::traits::FileSystem;
use std::path::Path;

/// Write `rendered` to `destination`, or to standard output when there is none.
///
/// Files are created readable and writable by their owner only, whatever the
/// umask or the mode of a file being replaced.
pub fn materialize(
    fs: &dyn FileSystem,
    rendered: &[u8],
    destination: Option<&Path>,
) -> VaultifyResult<()> {
    match destination {
        Some(path) => fs
            .write_private(path, rendered)
            .map_err(|e| VaultifyError::io(path, e)),
        None => fs
            .write_stdout(rendered)
            .map_err(|e| VaultifyError::io("<stdout>", e)),
    }
}
