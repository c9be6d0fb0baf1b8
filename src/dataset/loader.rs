//! Banana Leaf Dataset Loader
//!
//! Discovers the class folders under the training root, lists their images
//! and provides the image decoding helpers shared by training and inference.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::utils::error::{ImageResultExt, LeafError, Result};

/// File extensions accepted as images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "ppm", "tif", "tiff"];

/// A single image sample with its label and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class name (e.g., "Black Sigatoka")
    pub class_name: String,
}

/// List the class names under `root`.
///
/// Class names are the immediate subdirectory names, sorted byte-wise; index
/// `i` of the returned list is label `i`. Plain files are ignored.
pub fn discover_class_names<P: AsRef<Path>>(root: P) -> Result<Vec<String>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(LeafError::PathNotFound(root.to_path_buf()));
    }

    let mut class_names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        // `Path::is_dir` follows symlinks, `DirEntry::file_type` does not
        if !entry.path().is_dir() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) => class_names.push(name.to_string()),
            None => warn!("Skipping class directory with non UTF-8 name: {:?}", entry.path()),
        }
    }
    class_names.sort();

    Ok(class_names)
}

/// Check whether a path has one of the accepted image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Banana leaf dataset: class list plus every image sample on disk
#[derive(Debug, Clone)]
pub struct LeafDataset {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// Class names, index = label
    pub class_names: Vec<String>,
    /// All samples, grouped by class, sorted by path within a class
    pub samples: Vec<ImageSample>,
}

impl LeafDataset {
    /// Load the dataset index from a directory
    ///
    /// The directory should be structured as:
    /// ```text
    /// root_dir/
    /// ├── Black Sigatoka/
    /// │   ├── image1.jpg
    /// │   └── image2.jpg
    /// ├── Healthy/
    /// │   └── ...
    /// └── ...
    /// ```
    ///
    /// Images are found recursively below each class folder.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading banana leaf dataset from: {:?}", root_dir);

        let class_names = discover_class_names(&root_dir)?;
        info!("Found {} classes", class_names.len());

        let mut samples = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let class_dir = root_dir.join(class_name);

            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| is_image_file(p))
                .collect();
            // A directory's own files come before those of its subdirectories
            paths.sort_by_cached_key(|p| {
                (
                    p.parent().map(|d| d.to_string_lossy().into_owned()),
                    p.file_name().map(|f| f.to_string_lossy().into_owned()),
                )
            });

            debug!(
                "Class '{}' (label {}): {} samples",
                class_name,
                label,
                paths.len()
            );

            samples.extend(paths.into_iter().map(|path| ImageSample {
                path,
                label,
                class_name: class_name.clone(),
            }));
        }

        info!("Loaded {} total samples", samples.len());

        Ok(Self {
            root_dir,
            class_names,
            samples,
        })
    }

    /// Get the number of samples in the dataset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the number of classes
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Split every class into training and validation samples
    pub fn split(&self, validation_fraction: f64) -> Result<super::split::DatasetSplit> {
        super::split::DatasetSplit::from_samples(
            &self.samples,
            self.num_classes(),
            validation_fraction,
        )
    }

    /// Get statistics about the dataset
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.class_names.clone(),
        }
    }
}

/// Statistics about the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\n📊 Dataset Statistics:");
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        for (idx, (name, count)) in self
            .class_names
            .iter()
            .zip(self.class_counts.iter())
            .enumerate()
        {
            let bar_len = if self.total_samples > 0 {
                (*count as f32 / self.total_samples as f32 * 40.0) as usize
            } else {
                0
            };
            let bar: String = "█".repeat(bar_len);
            println!("    {:3}. {:30} {:5} {}", idx, name, count, bar);
        }
    }
}

/// Resize an image to `image_size x image_size` RGB with nearest-neighbour
/// filtering. Aspect ratio is not preserved.
pub fn resize_for_model(img: &DynamicImage, image_size: usize) -> RgbImage {
    img.resize_exact(image_size as u32, image_size as u32, FilterType::Nearest)
        .to_rgb8()
}

/// Decode an image file and resize it to the network input size
pub fn load_image(path: &Path, image_size: usize) -> Result<RgbImage> {
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .for_image(path)?;

    Ok(resize_for_model(&img, image_size))
}

/// Convert an RGB image to CHW float data with every value `pixel / 255`
pub fn to_chw_tensor_data(rgb: &RgbImage) -> Vec<f32> {
    let (width, height) = rgb.dimensions();
    let plane = width as usize * height as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * width as usize + x as usize;
        data[offset] = pixel[0] as f32 / 255.0;
        data[plane + offset] = pixel[1] as f32 / 255.0;
        data[2 * plane + offset] = pixel[2] as f32 / 255.0;
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    fn write_image(path: &Path, color: [u8; 3]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(20, 10, Rgb(color)).save(path).unwrap();
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write_image(&root.join("Healthy/b.png"), [0, 255, 0]);
        write_image(&root.join("Healthy/a.png"), [0, 200, 0]);
        write_image(&root.join("Healthy/nested/c.jpg"), [0, 100, 0]);
        write_image(&root.join("Black Sigatoka/x.PNG"), [20, 20, 20]);
        std::fs::write(root.join("Healthy/notes.txt"), "not an image").unwrap();
        std::fs::write(root.join("README.md"), "ignored").unwrap();
        dir
    }

    #[test]
    fn test_discover_class_names_sorted_dirs_only() {
        let dir = sample_tree();
        let names = discover_class_names(dir.path()).unwrap();
        assert_eq!(names, vec!["Black Sigatoka".to_string(), "Healthy".to_string()]);
    }

    #[test]
    fn test_discover_class_names_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = discover_class_names(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, LeafError::PathNotFound(_)));
    }

    #[test]
    fn test_dataset_lists_images_recursively() {
        let dir = sample_tree();
        let dataset = LeafDataset::new(dir.path()).unwrap();

        assert_eq!(dataset.num_classes(), 2);
        assert_eq!(dataset.len(), 4);

        let healthy: Vec<_> = dataset
            .samples
            .iter()
            .filter(|s| s.label == 1)
            .map(|s| s.path.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            healthy,
            vec![
                PathBuf::from("Healthy/a.png"),
                PathBuf::from("Healthy/b.png"),
                PathBuf::from("Healthy/nested/c.jpg"),
            ]
        );

        let stats = dataset.stats();
        assert_eq!(stats.class_counts, vec![1, 3]);
    }

    #[test]
    fn test_files_listed_before_subdirectories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write_image(&root.join("Healthy/z.png"), [0, 255, 0]);
        write_image(&root.join("Healthy/nested/a.png"), [0, 200, 0]);
        write_image(&root.join("Healthy/nested/b.png"), [0, 150, 0]);
        write_image(&root.join("Healthy/m.png"), [0, 100, 0]);

        let dataset = LeafDataset::new(root).unwrap();
        let order: Vec<_> = dataset
            .samples
            .iter()
            .map(|s| s.path.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            order,
            vec![
                PathBuf::from("Healthy/m.png"),
                PathBuf::from("Healthy/z.png"),
                PathBuf::from("Healthy/nested/a.png"),
                PathBuf::from("Healthy/nested/b.png"),
            ]
        );

        // The first quarter of the class goes to validation
        let split = dataset.split(0.25).unwrap();
        assert_eq!(split.validation.len(), 1);
        assert_eq!(split.validation[0].path, root.join("Healthy/m.png"));
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("leaf.JPG")));
        assert!(is_image_file(Path::new("leaf.tiff")));
        assert!(!is_image_file(Path::new("leaf.gif")));
        assert!(!is_image_file(Path::new("leaf")));
    }

    #[test]
    fn test_load_image_resizes_exactly() {
        let dir = sample_tree();
        let img = load_image(&dir.path().join("Healthy/a.png"), 16).unwrap();
        assert_eq!(img.dimensions(), (16, 16));
        assert_eq!(img.get_pixel(3, 3), &Rgb([0, 200, 0]));
    }

    #[test]
    fn test_load_image_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = load_image(&path, 16).unwrap_err();
        assert!(matches!(err, LeafError::ImageLoad(_, _)));
    }

    #[test]
    fn test_to_chw_tensor_data_layout() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 51]));
        img.put_pixel(1, 0, Rgb([0, 255, 102]));

        let data = to_chw_tensor_data(&img);
        assert_eq!(data.len(), 6);
        assert_eq!(&data[0..2], &[1.0, 0.0]);
        assert_eq!(&data[2..4], &[0.0, 1.0]);
        assert!((data[4] - 0.2).abs() < 1e-6);
        assert!((data[5] - 0.4).abs() < 1e-6);
    }
}
