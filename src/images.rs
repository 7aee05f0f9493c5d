// 🖼️ Local image cache
//
// Files are named from the set code and image index so a re-import finds the
// same file again. Existing files are reused, never overwritten.

use crate::catalog::CatalogSource;
use crate::error::ImageError;
use std::path::{Path, PathBuf};

/// At most this many images are kept per card
pub const MAX_IMAGES_PER_CARD: usize = 3;

const DEFAULT_EXTENSION: &str = ".jpg";

/// Extension (with dot) taken from the URL path; `.jpg` when absent or implausible.
///
/// ```
/// use ygo_library::images::extension_from_url;
/// assert_eq!(extension_from_url("https://img/cards/46986414.png?v=2"), ".png");
/// assert_eq!(extension_from_url("https://img/cards/46986414"), ".jpg");
/// ```
pub fn extension_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let last_segment = path.rsplit('/').next().unwrap_or("");

    // Leading dots belong to the stem (".hidden" has no extension)
    let stem_start = last_segment.len() - last_segment.trim_start_matches('.').len();
    let ext = last_segment[stem_start..]
        .rfind('.')
        .map(|i| &last_segment[stem_start + i..])
        .unwrap_or("");

    if ext.len() <= 1 || ext.len() > 5 {
        DEFAULT_EXTENSION.to_string()
    } else {
        ext.to_string()
    }
}

/// "SDK/EN-001", 0, ".jpg" → "SDK_EN-001_0.jpg"
pub fn image_file_name(set_code: &str, index: usize, url: &str) -> String {
    format!(
        "{}_{}{}",
        set_code.replace('/', "_"),
        index,
        extension_from_url(url)
    )
}

/// Directory of downloaded card images.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ImageCache { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, set_code: &str, index: usize, url: &str) -> PathBuf {
        self.dir.join(image_file_name(set_code, index, url))
    }

    /// Make sure image `index` of `set_code` exists locally; download it if not.
    ///
    /// Returns the stored path with `/` separators.
    pub fn fetch<C: CatalogSource + ?Sized>(
        &self,
        catalog: &C,
        set_code: &str,
        index: usize,
        url: &str,
    ) -> Result<String, ImageError> {
        let path = self.path_for(set_code, index, url);
        if path.exists() {
            return Ok(display_path(&path));
        }

        let bytes = catalog.fetch_image(url)?;

        std::fs::create_dir_all(&self.dir).map_err(|source| ImageError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;

        // Write under a temporary name so a failed write never leaves a file that looks cached
        let tmp = path.with_extension("part");
        std::fs::write(&tmp, &bytes)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|source| {
                let _ = std::fs::remove_file(&tmp);
                ImageError::Io {
                    path: path.display().to_string(),
                    source,
                }
            })?;

        Ok(display_path(&path))
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
