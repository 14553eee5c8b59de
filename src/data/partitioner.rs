// ============================================================
// Layer 4 — Deterministic Partitioner
// ============================================================
// Scans `image_dir/<label>/<image>` and assigns every image to
// training, testing or validation.
//
// The category of a file depends only on its name: the name
// (minus any `_nohash_...` suffix) is hashed with SHA-256 and
// mapped onto [0, 100). Adding images to the corpus never moves
// an existing image to another category, and shots sharing a
// `_nohash_` basis always stay together.
//
//   percentage = (sha256(basis) mod 2^27) * (100 / (2^27 - 1))
//
//   percentage < validation                → validation
//   percentage < validation + testing      → testing
//   otherwise                              → training

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{
    category::Category,
    error::{RetrainError, RetrainResult},
    image_lists::{ImageLists, LabelPartition},
};

/// Upper bound of the ordinal index domain. Images past this count in
/// one label can never be drawn by the random sampler.
pub const MAX_NUM_IMAGES_PER_CLASS: u64 = (1 << 27) - 1;

/// Below this many images a label gets a data-quality warning.
pub const MIN_RECOMMENDED_IMAGES: usize = 20;

/// Probed in this order; results are concatenated.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];

static NON_ALNUM_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

static NOHASH_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_nohash_.*$").expect("static regex"));

/// Build the label → partition mapping for `image_dir`.
pub fn create_image_lists(
    image_dir: &Path,
    testing_percentage: f64,
    validation_percentage: f64,
) -> RetrainResult<ImageLists> {
    if !(testing_percentage >= 0.0
        && validation_percentage >= 0.0
        && testing_percentage + validation_percentage <= 100.0)
    {
        return Err(RetrainError::InvalidPercentages {
            testing:    testing_percentage,
            validation: validation_percentage,
        });
    }

    if !image_dir.is_dir() {
        tracing::error!("Image directory '{}' not found.", image_dir.display());
        return Err(RetrainError::ImageDirNotFound { path: image_dir.to_path_buf() });
    }

    let mut lists = ImageLists::new();

    for sub_dir in list_label_dirs(image_dir)? {
        let dir_name = match sub_dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                tracing::warn!("Skipping non UTF-8 directory '{}'", sub_dir.display());
                continue;
            }
        };

        tracing::info!("Looking for images in '{}'", dir_name);
        let file_list = list_images(&sub_dir)?;

        if file_list.is_empty() {
            tracing::warn!("No files found in '{}'", dir_name);
            continue;
        }
        if file_list.len() < MIN_RECOMMENDED_IMAGES {
            tracing::warn!(
                "Folder '{}' has less than {} images, which may cause issues.",
                dir_name,
                MIN_RECOMMENDED_IMAGES
            );
        } else if file_list.len() as u64 > MAX_NUM_IMAGES_PER_CLASS {
            tracing::warn!(
                "Folder '{}' has more than {} images. Some images will never be selected.",
                dir_name,
                MAX_NUM_IMAGES_PER_CLASS
            );
        }

        let mut partition = LabelPartition::new(label_name(&dir_name), dir_name);
        for base_name in file_list {
            let category = assign_category(
                percentage_hash(hash_basis(&base_name)),
                testing_percentage,
                validation_percentage,
            );
            partition.category_mut(category).push(base_name);
        }

        tracing::debug!(
            "Label '{}': {} images ({} training, {} testing, {} validation)",
            partition.label,
            partition.total_images(),
            partition.training.len(),
            partition.testing.len(),
            partition.validation.len()
        );

        let existing_index = lists.label_index(&partition.label);
        let dir = partition.dir.clone();
        if let (Some(index), Some(previous)) = (existing_index, lists.insert(partition)) {
            tracing::warn!(
                "Directory '{}' normalises to the same label as '{}'; it replaces label {}",
                dir,
                previous.dir,
                index
            );
        }
    }

    Ok(lists)
}

/// Lower-case the directory name and collapse every run of
/// characters outside `[a-z0-9]` into a single space.
pub fn label_name(dir_name: &str) -> String {
    NON_ALNUM_RUN.replace_all(&dir_name.to_lowercase(), " ").into_owned()
}

/// The part of a filename that decides its category.
pub fn hash_basis(file_name: &str) -> &str {
    match NOHASH_SUFFIX.find(file_name) {
        Some(m) => &file_name[..m.start()],
        None => file_name,
    }
}

/// Map a hash basis uniformly and deterministically onto [0, 100].
pub fn percentage_hash(basis: &str) -> f64 {
    let digest = Sha256::digest(basis.as_bytes());

    // 2^27 divides 2^32, so the digest taken as a big-endian integer
    // modulo 2^27 only depends on its last four bytes.
    let tail: [u8; 4] = [digest[28], digest[29], digest[30], digest[31]];
    let reduced = u64::from(u32::from_be_bytes(tail)) % (MAX_NUM_IMAGES_PER_CLASS + 1);

    reduced as f64 * (100.0 / MAX_NUM_IMAGES_PER_CLASS as f64)
}

pub fn assign_category(percentage: f64, testing_percentage: f64, validation_percentage: f64) -> Category {
    if percentage < validation_percentage {
        Category::Validation
    } else if percentage < testing_percentage + validation_percentage {
        Category::Testing
    } else {
        Category::Training
    }
}

/// Immediate subdirectories of `image_dir`, sorted by path.
fn list_label_dirs(image_dir: &Path) -> RetrainResult<Vec<PathBuf>> {
    let entries = fs::read_dir(image_dir).map_err(|e| RetrainError::io(image_dir, e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| RetrainError::io(image_dir, e))?.path();
        if path.is_dir() && path != image_dir {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Base names of the images in one label directory.
///
/// Each extension is matched case-sensitively like a `*.<ext>` glob
/// (hidden files excluded) and sorted; the per-extension results are
/// concatenated as they are, without deduplication.
fn list_images(sub_dir: &Path) -> RetrainResult<Vec<String>> {
    let entries = fs::read_dir(sub_dir).map_err(|e| RetrainError::io(sub_dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RetrainError::io(sub_dir, e))?;
        if !entry.path().is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) if !name.starts_with('.') => names.push(name),
            Ok(_) => {}
            Err(raw) => tracing::warn!("Skipping non UTF-8 file name {:?}", raw),
        }
    }

    let mut file_list = Vec::new();
    for extension in IMAGE_EXTENSIONS {
        let suffix = format!(".{extension}");
        let mut matched: Vec<String> = names
            .iter()
            .filter(|name| name.ends_with(&suffix))
            .cloned()
            .collect();
        matched.sort();
        file_list.extend(matched);
    }
    Ok(file_list)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, names: &[String]) {
        fs::create_dir_all(dir).unwrap();
        for name in names {
            fs::write(dir.join(name), name.as_bytes()).unwrap();
        }
    }

    fn numbered(prefix: &str, n: usize, ext: &str) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}_{i:03}.{ext}")).collect()
    }

    #[test]
    fn test_label_name_normalisation() {
        assert_eq!(label_name("Golden_Retriever"), "golden retriever");
        assert_eq!(label_name("Sea--Lion  2"), "sea lion 2");
        assert_eq!(label_name("cat"), "cat");
    }

    #[test]
    fn test_hash_basis_strips_nohash_suffix() {
        assert_eq!(hash_basis("leaf_nohash_1.jpg"), "leaf");
        assert_eq!(hash_basis("leaf_nohash_2.jpg"), "leaf");
        assert_eq!(hash_basis("leaf.jpg"), "leaf.jpg");
    }

    #[test]
    fn test_percentage_hash_range_and_stability() {
        for i in 0..500 {
            let basis = format!("img_{i}.jpg");
            let p = percentage_hash(&basis);
            assert!((0.0..=100.0).contains(&p), "{p} out of range");
            assert_eq!(p, percentage_hash(&basis));
        }
    }

    #[test]
    fn test_threshold_monotonicity() {
        // The hash never depends on the thresholds, so anything in
        // validation at a lower threshold stays there at a higher one.
        let names = numbered("shot", 300, "jpg");
        for name in &names {
            let p = percentage_hash(hash_basis(name));
            for low in [0.0, 5.0, 10.0, 25.0] {
                if assign_category(p, 10.0, low) == Category::Validation {
                    for high in [low + 1.0, low + 20.0, 60.0] {
                        assert_eq!(assign_category(p, 10.0, high), Category::Validation);
                    }
                }
            }
        }
    }

    #[test]
    fn test_partition_is_deterministic_and_complete() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("Cat"), &numbered("cat", 40, "jpg"));
        touch(&root.path().join("dog"), &numbered("dog", 30, "png"));

        let first = create_image_lists(root.path(), 10.0, 10.0).unwrap();
        let second = create_image_lists(root.path(), 10.0, 10.0).unwrap();
        assert_eq!(first, second);

        for (label, expected) in [("cat", numbered("cat", 40, "jpg")), ("dog", numbered("dog", 30, "png"))] {
            let p = first.get(label).unwrap();
            let mut all: Vec<String> = p
                .training
                .iter()
                .chain(&p.testing)
                .chain(&p.validation)
                .cloned()
                .collect();
            all.sort();
            assert_eq!(all, expected);
        }
    }

    #[test]
    fn test_coverage_holds_for_extreme_splits() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("a"), &numbered("a", 25, "jpg"));
        touch(&root.path().join("b"), &numbered("b", 25, "jpg"));

        for (t, v) in [(0.0, 0.0), (0.0, 100.0), (100.0, 0.0), (30.0, 70.0), (50.0, 25.0)] {
            let lists = create_image_lists(root.path(), t, v).unwrap();
            for p in lists.iter() {
                assert_eq!(p.total_images(), 25);
            }
            if t == 0.0 && v == 0.0 {
                assert!(lists.iter().all(|p| p.training.len() == 25));
            }
            if v == 100.0 {
                assert!(lists.iter().all(|p| p.validation.len() == 25));
            }
        }
    }

    #[test]
    fn test_partition_is_stable_as_corpus_grows() {
        let root = tempfile::tempdir().unwrap();
        let cat = root.path().join("cat");
        touch(&cat, &numbered("cat", 30, "jpg"));
        touch(&root.path().join("dog"), &numbered("dog", 30, "jpg"));
        let before = create_image_lists(root.path(), 20.0, 20.0).unwrap();

        touch(&cat, &numbered("extra", 50, "jpg"));
        let after = create_image_lists(root.path(), 20.0, 20.0).unwrap();

        let (b, a) = (before.get("cat").unwrap(), after.get("cat").unwrap());
        for category in Category::ALL {
            for name in b.category(category) {
                assert!(a.category(category).contains(name), "{name} moved out of {category}");
            }
        }
    }

    #[test]
    fn test_nohash_variants_share_a_category() {
        let root = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..20)
            .flat_map(|s| (0..3).map(move |k| format!("subject{s}_nohash_{k}.jpg")))
            .collect();
        touch(&root.path().join("leaf"), &names);
        touch(&root.path().join("stem"), &numbered("stem", 5, "jpg"));

        let lists = create_image_lists(root.path(), 30.0, 30.0).unwrap();
        let leaf = lists.get("leaf").unwrap();
        for s in 0..20 {
            let prefix = format!("subject{s}_nohash_");
            let categories: Vec<Category> = Category::ALL
                .into_iter()
                .filter(|c| leaf.category(*c).iter().any(|n| n.starts_with(&prefix)))
                .collect();
            assert_eq!(categories.len(), 1, "subject{s} split across {categories:?}");
        }
    }

    #[test]
    fn test_extensions_probed_in_order_and_case_sensitive() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("mixed");
        touch(
            &dir,
            &[
                "b.png".into(), "a.png".into(), "z.jpg".into(), "c.bmp".into(),
                "d.JPG".into(), "notes.txt".into(), ".hidden.jpg".into(), "e.jpeg".into(),
            ],
        );
        assert_eq!(
            list_images(&dir).unwrap(),
            vec!["z.jpg", "e.jpeg", "a.png", "b.png", "c.bmp"]
        );
    }

    #[test]
    fn test_scenario_empty_label_is_dropped() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("cat"), &numbered("cat", 12, "jpg"));
        touch(&root.path().join("dog"), &numbered("dog", 15, "jpg"));
        fs::create_dir_all(root.path().join("fish")).unwrap();

        let lists = create_image_lists(root.path(), 10.0, 10.0).unwrap();
        assert_eq!(lists.labels().collect::<Vec<_>>(), vec!["cat", "dog"]);
        assert_eq!(lists.get("cat").unwrap().total_images(), 12);
        assert_eq!(lists.get("dog").unwrap().total_images(), 15);
        assert!(lists.require_classifiable(root.path()).is_ok());
    }

    #[test]
    fn test_duplicate_label_keeps_first_position_with_later_directory() {
        let root = tempfile::tempdir().unwrap();
        // Sorted scan order: "Sea_Lion", "cat", "sea-lion".
        touch(&root.path().join("Sea_Lion"), &numbered("old", 4, "jpg"));
        touch(&root.path().join("cat"), &numbered("cat", 4, "jpg"));
        touch(&root.path().join("sea-lion"), &numbered("new", 6, "jpg"));

        let lists = create_image_lists(root.path(), 0.0, 0.0).unwrap();
        assert_eq!(lists.labels().collect::<Vec<_>>(), vec!["sea lion", "cat"]);
        assert_eq!(lists.label_index("sea lion"), Some(0));

        let sea_lion = lists.get("sea lion").unwrap();
        assert_eq!(sea_lion.dir, "sea-lion");
        assert_eq!(sea_lion.training, numbered("new", 6, "jpg"));
    }

    #[test]
    fn test_directory_without_images_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("cat"), &numbered("cat", 3, "jpg"));
        touch(&root.path().join("dog"), &numbered("dog", 3, "jpg"));
        touch(&root.path().join("notes"), &["readme.txt".to_string(), "photo.JPG".to_string()]);

        let lists = create_image_lists(root.path(), 0.0, 0.0).unwrap();
        assert_eq!(lists.labels().collect::<Vec<_>>(), vec!["cat", "dog"]);
        assert!(lists.get("notes").is_none());
    }

    #[test]
    fn test_small_label_is_kept_whole() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("rare"), &numbered("rare", MIN_RECOMMENDED_IMAGES - 1, "png"));
        touch(&root.path().join("common"), &numbered("common", MIN_RECOMMENDED_IMAGES, "png"));

        let lists = create_image_lists(root.path(), 10.0, 10.0).unwrap();
        assert_eq!(lists.get("rare").unwrap().total_images(), MIN_RECOMMENDED_IMAGES - 1);
        assert_eq!(lists.get("common").unwrap().total_images(), MIN_RECOMMENDED_IMAGES);
    }

    #[test]
    fn test_missing_root_and_bad_percentages_fail() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        assert!(matches!(
            create_image_lists(&missing, 10.0, 10.0),
            Err(RetrainError::ImageDirNotFound { .. })
        ));
        assert!(matches!(
            create_image_lists(root.path(), 60.0, 50.0),
            Err(RetrainError::InvalidPercentages { .. })
        ));
        assert!(matches!(
            create_image_lists(root.path(), -1.0, 10.0),
            Err(RetrainError::InvalidPercentages { .. })
        ));
    }

    #[test]
    fn test_plain_files_in_root_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("stray.jpg"), b"x").unwrap();
        touch(&root.path().join("cat"), &numbered("cat", 3, "jpg"));
        let lists = create_image_lists(root.path(), 0.0, 0.0).unwrap();
        assert_eq!(lists.class_count(), 1);
    }
}
