/// Packaging slice images into a zip archive
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::config::SlicingSettings;
use crate::error::Result;

/// File name of slice `index`, e.g. `slice007.png` for three digits.
pub fn slice_file_name(prefix: &str, index: usize, digits: usize) -> String {
    format!("{prefix}{index:0digits$}.png")
}

/// In-memory archive that slice images are appended to in order.
pub struct SliceArchive {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    file_name: String,
    prefix: String,
    digits: usize,
    entries: Vec<String>,
}

impl SliceArchive {
    pub fn new(settings: &SlicingSettings) -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .compression_level(Some(6)),
            file_name: format!("{}.zip", settings.archive_name),
            prefix: settings.file_prefix.clone(),
            digits: settings.digits,
            entries: Vec::new(),
        }
    }

    /// Encode `image` as PNG and store it as the next slice. Returns the
    /// slice index.
    pub fn add_image(&mut self, image: &RgbaImage) -> Result<usize> {
        let name = slice_file_name(&self.prefix, self.entries.len(), self.digits);

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        self.zip.start_file(name.as_str(), self.options)?;
        self.zip.write_all(&png)?;
        debug!(entry = %name, bytes = png.len(), "archived slice");

        self.entries.push(name);
        Ok(self.entries.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Result<SlicedArchive> {
        let bytes = self.zip.finish()?.into_inner();
        Ok(SlicedArchive {
            file_name: self.file_name,
            bytes,
            entries: self.entries,
        })
    }
}

/// A finished slice archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicedArchive {
    /// Suggested download name, `slicing.zip` by default
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Entry names in slice order
    pub entries: Vec<String>,
}

impl SlicedArchive {
    /// Write the archive into `dir` under its own file name.
    pub fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.file_name);
        self.write(&path)?;
        Ok(path)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Read;

    #[test]
    fn test_slice_file_name_padding() {
        assert_eq!(slice_file_name("slice", 0, 3), "slice000.png");
        assert_eq!(slice_file_name("slice", 42, 3), "slice042.png");
        assert_eq!(slice_file_name("slice", 1234, 3), "slice1234.png");
        assert_eq!(slice_file_name("layer_", 7, 5), "layer_00007.png");
    }

    #[test]
    fn test_archive_entries_in_order() {
        let mut archive = SliceArchive::new(&SlicingSettings::default());
        for shade in [0u8, 128, 255] {
            let image = RgbaImage::from_pixel(4, 3, Rgba([shade, shade, shade, 255]));
            archive.add_image(&image).unwrap();
        }
        assert_eq!(archive.len(), 3);

        let finished = archive.finish().unwrap();
        assert_eq!(finished.file_name, "slicing.zip");
        assert_eq!(
            finished.entries,
            ["slice000.png", "slice001.png", "slice002.png"]
        );

        let mut zip = zip::ZipArchive::new(Cursor::new(finished.bytes)).unwrap();
        assert_eq!(zip.len(), 3);
        let mut entry = zip.by_index(1).unwrap();
        assert_eq!(entry.name(), "slice001.png");
        let mut png = Vec::new();
        entry.read_to_end(&mut png).unwrap();

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn test_empty_archive() {
        let archive = SliceArchive::new(&SlicingSettings::default());
        assert!(archive.is_empty());
        let finished = archive.finish().unwrap();
        assert!(finished.entries.is_empty());
        assert!(!finished.bytes.is_empty());
    }

    #[test]
    fn test_save_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = SliceArchive::new(&SlicingSettings::default());
        archive.add_image(&RgbaImage::new(2, 2)).unwrap();
        let finished = archive.finish().unwrap();

        let path = finished.save_to(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "slicing.zip");
        assert_eq!(std::fs::read(path).unwrap(), finished.bytes);
    }
}
