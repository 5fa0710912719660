use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{info, warn};

use crate::cli::{InventoryArgs, ItemSourceArgs};
use crate::model::{ItemEntry, ItemInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.source.image_dir, &args.source.extensions)?;

    if args.dry_run {
        info!(
            item_count = manifest.item_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.source.manifest_path();
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(item_count = manifest.item_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(image_dir: &Path, extensions: &[String]) -> Result<ItemInventoryManifest> {
    let item_paths = discover_items(image_dir, extensions)?;
    if item_paths.is_empty() {
        bail!("no candidate items found in {}", image_dir.display());
    }

    let mut items = Vec::with_capacity(item_paths.len());
    for path in item_paths {
        let name = item_name(&path)?;
        let sha256 = sha256_file(&path)?;

        items.push(ItemEntry {
            name,
            path: path.display().to_string(),
            sha256,
        });
    }

    Ok(ItemInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: image_dir.display().to_string(),
        item_count: items.len(),
        items,
    })
}

/// Candidate keys for a session: the inventory manifest when one exists, otherwise a
/// fresh directory scan.
pub fn load_candidates(source: &ItemSourceArgs) -> Result<Vec<String>> {
    let manifest_path = source.manifest_path();

    if manifest_path.exists() {
        let raw = fs::read(&manifest_path)
            .with_context(|| format!("failed to read {}", manifest_path.display()))?;
        let manifest: ItemInventoryManifest = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

        let mut missing = 0_usize;
        let mut names = Vec::with_capacity(manifest.items.len());
        for item in manifest.items {
            if !Path::new(&item.path).exists() {
                warn!(item = %item.name, path = %item.path, "inventoried item no longer on disk");
                missing += 1;
                continue;
            }
            names.push(item.name);
        }

        info!(
            path = %manifest_path.display(),
            candidates = names.len(),
            missing,
            "loaded candidates from inventory manifest"
        );
        return Ok(names);
    }

    let names = discover_items(&source.image_dir, &source.extensions)?
        .iter()
        .map(|path| item_name(path))
        .collect::<Result<Vec<_>>>()?;
    info!(
        image_dir = %source.image_dir.display(),
        candidates = names.len(),
        "scanned candidates from image directory"
    );
    Ok(names)
}

pub fn discover_items(image_dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let pattern = extension_pattern(extensions)?;
    let mut items = Vec::new();

    let entries = fs::read_dir(image_dir)
        .with_context(|| format!("failed to read {}", image_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", image_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| pattern.is_match(name));

        if matches {
            items.push(path);
        }
    }

    items.sort();
    Ok(items)
}

fn extension_pattern(extensions: &[String]) -> Result<Regex> {
    let alternatives = extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>();

    if alternatives.is_empty() {
        bail!("at least one non-empty --extension is required");
    }

    Regex::new(&format!(r"(?i)\.(?:{})$", alternatives.join("|")))
        .context("failed to compile item extension regex")
}

fn item_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{build_manifest, discover_items, extension_pattern, load_candidates};
    use crate::cli::ItemSourceArgs;
    use crate::util::write_json_pretty;

    fn source_for(dir: &TempDir) -> ItemSourceArgs {
        ItemSourceArgs {
            image_dir: dir.path().to_path_buf(),
            results_dir: None,
            manifest_path: None,
            extensions: vec!["jpg".to_string()],
        }
    }

    fn touch(dir: &TempDir, name: &str, body: &str) {
        fs::write(dir.path().join(name), body).expect("write fixture file");
    }

    #[test]
    fn extension_pattern_matches_case_insensitively_and_ignores_leading_dots() {
        let pattern = extension_pattern(&[".jpg".to_string(), "png".to_string()])
            .expect("pattern should compile");
        assert!(pattern.is_match("crater_01.JPG"));
        assert!(pattern.is_match("crater_02.png"));
        assert!(!pattern.is_match("crater_03.jpg.txt"));
        assert!(!pattern.is_match("notes.txt"));
    }

    #[test]
    fn extension_pattern_rejects_empty_extension_list() {
        assert!(extension_pattern(&[" ".to_string()]).is_err());
    }

    #[test]
    fn discover_items_returns_sorted_matching_files_only() {
        let dir = TempDir::new().expect("create temp dir");
        touch(&dir, "c.jpg", "c");
        touch(&dir, "a.jpg", "a");
        touch(&dir, "b.txt", "b");
        fs::create_dir(dir.path().join("results.jpg")).expect("create decoy directory");

        let items = discover_items(dir.path(), &["jpg".to_string()]).expect("scan directory");
        let names = items
            .iter()
            .map(|path| path.file_name().and_then(|n| n.to_str()).unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.jpg", "c.jpg"]);
    }

    #[test]
    fn build_manifest_hashes_each_item() {
        let dir = TempDir::new().expect("create temp dir");
        touch(&dir, "a.jpg", "abc");

        let manifest = build_manifest(dir.path(), &["jpg".to_string()]).expect("build manifest");
        assert_eq!(manifest.item_count, 1);
        assert_eq!(manifest.items[0].name, "a.jpg");
        assert_eq!(
            manifest.items[0].sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn build_manifest_fails_on_empty_directory() {
        let dir = TempDir::new().expect("create temp dir");
        assert!(build_manifest(dir.path(), &["jpg".to_string()]).is_err());
    }

    #[test]
    fn load_candidates_prefers_manifest_and_drops_missing_files() {
        let dir = TempDir::new().expect("create temp dir");
        touch(&dir, "a.jpg", "a");
        touch(&dir, "b.jpg", "b");
        let source = source_for(&dir);

        let manifest = build_manifest(dir.path(), &source.extensions).expect("build manifest");
        write_json_pretty(&source.manifest_path(), &manifest).expect("write manifest");
        fs::remove_file(dir.path().join("b.jpg")).expect("remove item");
        touch(&dir, "z.jpg", "z");

        let candidates = load_candidates(&source).expect("load candidates");
        assert_eq!(candidates, vec!["a.jpg".to_string()]);

        fs::remove_file(source.manifest_path()).expect("remove manifest");
        let scanned = load_candidates(&source).expect("scan candidates");
        assert_eq!(scanned, vec!["a.jpg".to_string(), "z.jpg".to_string()]);
    }
}
