//! Projection (`.prj`) definitions looked up by spatial reference id.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

use crate::CodecError;

/// Directory of ESRI WKT projection files laid out as `epsg/<srid>.prj`.
pub struct ProjectionLibrary {
    root: Utf8PathBuf,
    dir: fs_utf8::Dir,
}

impl ProjectionLibrary {
    /// Open the library rooted at `root`.
    ///
    /// # Errors
    /// Returns [`CodecError::Projection`] when the directory cannot be opened.
    pub fn open(root: impl AsRef<Utf8Path>) -> Result<Self, CodecError> {
        let path = root.as_ref().to_path_buf();
        let dir = fs_utf8::Dir::open_ambient_dir(&path, ambient_authority()).map_err(|source| {
            CodecError::Projection {
                path: path.clone(),
                source,
            }
        })?;
        Ok(Self { root: path, dir })
    }

    /// Root directory of the library.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Projection text for `srid`.
    ///
    /// # Errors
    /// Returns [`CodecError::Projection`] naming the file when it is missing
    /// or unreadable.
    pub fn definition(&self, srid: u32) -> Result<String, CodecError> {
        let relative = Utf8PathBuf::from(format!("epsg/{srid}.prj"));
        self.dir
            .read_to_string(&relative)
            .map(|text| text.trim_end().to_owned())
            .map_err(|source| CodecError::Projection {
                path: self.root.join(&relative),
                source,
            })
    }
}

impl fmt::Debug for ProjectionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionLibrary")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
