// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Placing files according to their estimated age

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::buckets::AgeBuckets;
use crate::history::{Action, History};
use crate::pipeline::{BatchReport, EstimateOutcome};
use crate::scan::display_name;
use crate::Result;

/// Where and how to write results
pub struct Placement<'a> {
    pub output_dir: &'a Path,
    pub history: Option<&'a History>,
    pub dry_run: bool,
}

/// Move every estimated file into `{output}/{bucket}/{stem}_{age}{ext}`
pub fn sort_into_buckets(outcomes: &[EstimateOutcome], buckets: &AgeBuckets, placement: &Placement<'_>) -> BatchReport {
    let mut report = BatchReport::default();

    for outcome in outcomes {
        let name = display_name(&outcome.path);
        let age = match &outcome.result {
            Ok(estimate) => estimate.years(),
            Err(e) => {
                warn!("Skipped {}: {}", name, e);
                report.record_skipped(&outcome.path, None, e.to_string());
                continue;
            }
        };

        let dest_dir = placement.output_dir.join(buckets.label_for(age));
        let stem = format!("{}_{}", file_stem(&outcome.path), age);
        let ext = dotted_extension(&outcome.path);

        match move_into(&outcome.path, &dest_dir, &stem, &ext, age, placement) {
            Ok(dest) => {
                info!("Moved {} -> {}", name, dest.display());
                report.record_done(&outcome.path, Some(age), dest);
            }
            Err(e) => {
                warn!("Failed to move {}: {}", name, e);
                report.record_skipped(&outcome.path, Some(age), e.to_string());
            }
        }
    }

    report
}

/// Copy every estimated file to `{output}/image{age}{ext}`.
///
/// Repeated ages get a counter: `image32.jpg`, `image32_1.jpg`, `image32_2.jpg`.
pub fn rename_by_age(outcomes: &[EstimateOutcome], placement: &Placement<'_>) -> BatchReport {
    let mut report = BatchReport::default();
    let mut counters: HashMap<String, usize> = HashMap::new();

    for outcome in outcomes {
        let name = display_name(&outcome.path);
        let age = match &outcome.result {
            Ok(estimate) => estimate.years(),
            Err(e) => {
                warn!("Skipped {}: {}", name, e);
                report.record_skipped(&outcome.path, None, e.to_string());
                continue;
            }
        };

        let base = format!("image{}", age);
        let ext = dotted_extension(&outcome.path);
        let next = counters.entry(base.clone()).or_insert(0);
        let (index, dest) = free_numbered(placement.output_dir, &base, &ext, *next, &HashSet::new());
        *next = index + 1;

        let result = if placement.dry_run {
            info!("DRY RUN: Would copy {} -> {}", name, dest.display());
            Ok(())
        } else {
            copy_and_record(&outcome.path, &dest, Some(age), placement.history)
        };

        match result {
            Ok(()) => {
                if !placement.dry_run {
                    info!("Renamed and saved {} -> {}", name, dest.display());
                }
                report.record_done(&outcome.path, Some(age), dest);
            }
            Err(e) => {
                warn!("Failed to copy {}: {}", name, e);
                report.record_skipped(&outcome.path, Some(age), e.to_string());
            }
        }
    }

    report
}

fn copy_and_record(src: &Path, dest: &Path, age: Option<i64>, history: Option<&History>) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dest)?;
    if let Some(history) = history {
        journal(history, Action::Copy, src, dest, age);
    }
    Ok(())
}

/// Move `src` into `dir` under a collision-free `{stem}{ext}`
fn move_into(src: &Path, dir: &Path, stem: &str, ext: &str, age: i64, placement: &Placement<'_>) -> Result<PathBuf> {
    let dest = unique_destination(dir, stem, ext);
    if placement.dry_run {
        info!("DRY RUN: Would move {} -> {}", src.display(), dest.display());
        return Ok(dest);
    }

    fs::create_dir_all(dir)?;
    move_file(src, &dest)?;
    if let Some(history) = placement.history {
        journal(history, Action::Move, src, &dest, Some(age));
    }
    Ok(dest)
}

/// Record a completed operation. The file is already in place, so a journal
/// failure only costs the ability to undo it.
pub(crate) fn journal(history: &History, action: Action, src: &Path, dest: &Path, age: Option<i64>) {
    if let Err(e) = history.record(action, src, dest, age) {
        warn!("Failed to write history entry for {}: {}", dest.display(), e);
    }
}

/// Move a file, falling back to copy and delete across filesystems
pub fn move_file(src: &Path, dest: &Path) -> Result<()> {
    move_file_with(src, dest, |from, to| fs::rename(from, to))
}

fn move_file_with(src: &Path, dest: &Path, rename: impl FnOnce(&Path, &Path) -> io::Result<()>) -> Result<()> {
    match rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("rename {:?} -> {:?} failed ({}), copying instead", src, dest, e);
            fs::copy(src, dest)?;
            fs::remove_file(src)?;
            Ok(())
        }
    }
}

/// `{dir}/{stem}{ext}`, or `{stem}_1{ext}`, `{stem}_2{ext}`, ... if taken
pub fn unique_destination(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    free_numbered(dir, stem, ext, 0, &HashSet::new()).1
}

/// Like [`unique_destination`], also passing over names in `claimed`
pub fn unclaimed_destination(dir: &Path, stem: &str, ext: &str, claimed: &HashSet<PathBuf>) -> PathBuf {
    free_numbered(dir, stem, ext, 0, claimed).1
}

/// First free name at or after `start`, where index 0 is the bare stem
fn free_numbered(dir: &Path, stem: &str, ext: &str, start: usize, claimed: &HashSet<PathBuf>) -> (usize, PathBuf) {
    let mut index = start;
    loop {
        let candidate = if index == 0 {
            dir.join(format!("{}{}", stem, ext))
        } else {
            dir.join(format!("{}_{}{}", stem, index, ext))
        };
        if !candidate.exists() && !claimed.contains(&candidate) {
            return (index, candidate);
        }
        index += 1;
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

/// Extension with its leading dot, original case kept; empty if none
fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::AgeEstimate;
    use crate::AgesortError;

    fn ok(path: PathBuf, age: f64) -> EstimateOutcome {
        EstimateOutcome { path, result: Ok(AgeEstimate { age }) }
    }

    fn touch(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn sorts_into_bucket_folders() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let history = History::new(output.path().join("journal.jsonl"));
        let outcomes = vec![
            ok(touch(input.path(), "alice.jpg", b"a"), 23.7),
            ok(touch(input.path(), "bob.PNG", b"b"), 5.0),
            EstimateOutcome {
                path: touch(input.path(), "cat.jpg", b"c"),
                result: Err(AgesortError::NoFaceDetected),
            },
        ];
        let placement = Placement { output_dir: output.path(), history: Some(&history), dry_run: false };

        let report = sort_into_buckets(&outcomes, &AgeBuckets::default(), &placement);

        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, 1);
        assert!(output.path().join("21-25/alice_23.jpg").exists());
        assert!(output.path().join("1-5/bob_5.PNG").exists());
        assert!(!input.path().join("alice.jpg").exists());
        assert!(input.path().join("cat.jpg").exists());
        assert_eq!(history.read_all().unwrap().len(), 2);
    }

    #[test]
    fn sort_never_overwrites() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::create_dir(output.path().join("26-30")).unwrap();
        touch(&output.path().join("26-30"), "face_30.jpg", b"old");
        let outcomes = vec![ok(touch(input.path(), "face.jpg", b"new"), 30.0)];
        let placement = Placement { output_dir: output.path(), history: None, dry_run: false };

        sort_into_buckets(&outcomes, &AgeBuckets::default(), &placement);

        assert_eq!(fs::read(output.path().join("26-30/face_30.jpg")).unwrap(), b"old");
        assert_eq!(fs::read(output.path().join("26-30/face_30_1.jpg")).unwrap(), b"new");
    }

    #[test]
    fn dry_run_leaves_files_alone() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let src = touch(input.path(), "face.jpg", b"x");
        let outcomes = vec![ok(src.clone(), 44.0)];
        let placement = Placement { output_dir: output.path(), history: None, dry_run: true };

        let report = sort_into_buckets(&outcomes, &AgeBuckets::default(), &placement);

        assert_eq!(report.files[0].destination, Some(output.path().join("41-45/face_44.jpg")));
        assert!(src.exists());
        assert!(!output.path().join("41-45").exists());
    }

    #[test]
    fn renames_with_per_age_counter() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let outcomes = vec![
            ok(touch(input.path(), "a.jpg", b"a"), 32.2),
            ok(touch(input.path(), "b.jpg", b"b"), 32.9),
            ok(touch(input.path(), "c.webp", b"c"), 18.0),
            ok(touch(input.path(), "d.png", b"d"), 32.0),
        ];
        let placement = Placement { output_dir: output.path(), history: None, dry_run: false };

        let report = rename_by_age(&outcomes, &placement);

        assert_eq!(report.processed, 4);
        let names: Vec<String> = report
            .files
            .iter()
            .map(|f| display_name(f.destination.as_ref().unwrap()))
            .collect();
        assert_eq!(names, vec!["image32.jpg", "image32_1.jpg", "image18.webp", "image32_2.png"]);
        // Copies, so the inputs stay
        assert!(input.path().join("a.jpg").exists());
        assert_eq!(fs::read(output.path().join("image32_1.jpg")).unwrap(), b"b");
    }

    #[test]
    fn rename_skips_names_taken_by_earlier_runs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(output.path(), "image50.jpg", b"earlier");
        let outcomes = vec![ok(touch(input.path(), "a.jpg", b"a"), 50.0)];
        let placement = Placement { output_dir: output.path(), history: None, dry_run: false };

        rename_by_age(&outcomes, &placement);

        assert_eq!(fs::read(output.path().join("image50.jpg")).unwrap(), b"earlier");
        assert_eq!(fs::read(output.path().join("image50_1.jpg")).unwrap(), b"a");
    }

    #[test]
    fn move_file_relocates() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "a.jpg", b"a");
        let dest = dir.path().join("b.jpg");
        move_file(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"a");
    }

    #[test]
    fn move_falls_back_to_copy_when_rename_fails() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "a.jpg", b"a");
        let dest = dir.path().join("b.jpg");

        move_file_with(&src, &dest, |_, _| Err(io::Error::new(io::ErrorKind::Other, "cross-device link")))
            .unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"a");
    }

    #[test]
    fn journal_failure_still_reports_the_move() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let history = History::new(output.path().join("no-such-dir/journal.jsonl"));
        let outcomes = vec![ok(touch(input.path(), "face.jpg", b"x"), 30.0)];
        let placement = Placement { output_dir: output.path(), history: Some(&history), dry_run: false };

        let report = sort_into_buckets(&outcomes, &AgeBuckets::default(), &placement);

        let dest = output.path().join("26-30/face_30.jpg");
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.files[0].destination, Some(dest.clone()));
        assert!(dest.exists());
    }

    #[test]
    fn journal_failure_still_reports_the_copy() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let history = History::new(output.path().join("no-such-dir/journal.jsonl"));
        let outcomes = vec![ok(touch(input.path(), "face.jpg", b"x"), 30.0)];
        let placement = Placement { output_dir: output.path(), history: Some(&history), dry_run: false };

        let report = rename_by_age(&outcomes, &placement);

        assert_eq!(report.processed, 1);
        assert!(output.path().join("image30.jpg").exists());
    }

    #[test]
    fn rename_dry_run_predicts_real_names() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(output.path(), "image32.jpg", b"earlier");
        let outcomes = vec![
            ok(touch(input.path(), "a.jpg", b"a"), 32.0),
            ok(touch(input.path(), "b.jpg", b"b"), 32.5),
            ok(touch(input.path(), "c.jpg", b"c"), 7.0),
            ok(touch(input.path(), "d.jpg", b"d"), 32.1),
        ];
        let destinations = |report: &BatchReport| -> Vec<PathBuf> {
            report.files.iter().map(|f| f.destination.clone().unwrap()).collect()
        };

        let planned = rename_by_age(&outcomes, &Placement { output_dir: output.path(), history: None, dry_run: true });
        assert!(!output.path().join("image7.jpg").exists());
        let done = rename_by_age(&outcomes, &Placement { output_dir: output.path(), history: None, dry_run: false });

        assert_eq!(destinations(&planned), destinations(&done));
        assert_eq!(destinations(&done)[0], output.path().join("image32_1.jpg"));
    }

    #[test]
    fn unclaimed_destination_skips_planned_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut claimed = HashSet::new();
        claimed.insert(dir.path().join("face.jpg"));
        assert_eq!(unclaimed_destination(dir.path(), "face", ".jpg", &claimed), dir.path().join("face_1.jpg"));
    }

    #[test]
    fn extensionless_files_keep_no_extension() {
        assert_eq!(dotted_extension(Path::new("/x/face")), "");
        assert_eq!(dotted_extension(Path::new("/x/face.JPEG")), ".JPEG");
        assert_eq!(file_stem(Path::new("/x/face.tar.jpg")), "face.tar");
    }
}
