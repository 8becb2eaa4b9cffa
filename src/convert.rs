// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Batch JPEG conversion and recompression

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::codec::{load_rgb, save_jpeg, strip_extended_attributes};
use crate::history::{Action, History};
use crate::organize::{journal, unclaimed_destination};
use crate::pipeline::BatchReport;
use crate::scan::display_name;
use crate::Result;

/// How a conversion batch behaves
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// JPEG quality, 1-100
    pub quality: u8,
    /// Remove extended attributes from each input before reading it
    pub strip_xattrs: bool,
    pub dry_run: bool,
}

/// Output path for an input: `{output}/{stem}.jpg`, or `{stem}_1.jpg`, ...
/// when that name exists on disk or was already handed out in this batch
pub fn jpeg_destination(output_dir: &Path, input: &Path, claimed: &HashSet<PathBuf>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    unclaimed_destination(output_dir, &stem, ".jpg", claimed)
}

/// Convert one file to JPEG
pub fn convert_one(input: &Path, output: &Path, options: &ConvertOptions) -> Result<()> {
    if options.strip_xattrs {
        strip_extended_attributes(input);
    }
    let img = load_rgb(input)?;
    save_jpeg(&img, output, options.quality)
}

/// Convert every file in `files` into `output_dir`.
///
/// Files are handled one after another on the blocking pool; a failure is
/// logged and counted, and the batch continues.
pub async fn convert_all(
    files: Vec<PathBuf>,
    output_dir: &Path,
    options: &ConvertOptions,
    history: Option<&History>,
) -> Result<BatchReport> {
    tokio::fs::create_dir_all(output_dir).await?;

    let total = files.len();
    let mut report = BatchReport::default();
    let mut claimed = HashSet::new();

    for (i, input) in files.into_iter().enumerate() {
        let name = display_name(&input);
        let output = jpeg_destination(output_dir, &input, &claimed);
        claimed.insert(output.clone());
        info!("{}/{} Processing {}", i + 1, total, name);

        if options.dry_run {
            info!("DRY RUN: Would convert {} -> {}", name, output.display());
            report.record_done(&input, None, output);
            continue;
        }

        let result = {
            let (input, output, options) = (input.clone(), output.clone(), options.clone());
            tokio::task::spawn_blocking(move || convert_one(&input, &output, &options)).await?
        };

        match result {
            Ok(()) => {
                if let Some(history) = history {
                    journal(history, Action::Convert, &input, &output, None);
                }
                info!("Converted {} -> {}", name, display_name(&output));
                report.record_done(&input, None, output);
            }
            Err(e) => {
                warn!("Failed to process {}: {}", name, e);
                report.record_skipped(&input, None, e.to_string());
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn options(quality: u8) -> ConvertOptions {
        ConvertOptions { quality, strip_xattrs: true, dry_run: false }
    }

    #[test]
    fn destination_swaps_extension() {
        let none = HashSet::new();
        assert_eq!(
            jpeg_destination(Path::new("/out"), Path::new("/in/IMG_0001.HEIC"), &none),
            PathBuf::from("/out/IMG_0001.jpg")
        );
        assert_eq!(
            jpeg_destination(Path::new("/out"), Path::new("/in/face.webp"), &none),
            PathBuf::from("/out/face.jpg")
        );
    }

    #[tokio::test]
    async fn same_stem_inputs_get_separate_outputs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let png = input.path().join("face.png");
        RgbImage::from_pixel(10, 10, Rgb([9, 9, 9])).save(&png).unwrap();
        let webp = input.path().join("face.webp");
        RgbImage::from_pixel(20, 20, Rgb([9, 9, 9])).save(&webp).unwrap();

        let report = convert_all(vec![png, webp], output.path(), &options(75), None).await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(image::open(output.path().join("face.jpg")).unwrap().width(), 10);
        assert_eq!(image::open(output.path().join("face_1.jpg")).unwrap().width(), 20);
    }

    #[tokio::test]
    async fn dry_run_plans_distinct_names() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let opts = ConvertOptions { dry_run: true, ..options(75) };
        let files = vec![input.path().join("face.png"), input.path().join("face.webp")];

        let report = convert_all(files, output.path(), &opts, None).await.unwrap();

        let planned: Vec<PathBuf> = report.files.iter().map(|f| f.destination.clone().unwrap()).collect();
        assert_eq!(planned, vec![output.path().join("face.jpg"), output.path().join("face_1.jpg")]);
    }

    #[tokio::test]
    async fn in_place_conversion_keeps_the_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("user.jpg");
        RgbImage::from_pixel(8, 8, Rgb([50, 60, 70])).save(&original).unwrap();
        let before = std::fs::read(&original).unwrap();
        let history = History::new(dir.path().join("journal.jsonl"));

        let report = convert_all(vec![original.clone()], dir.path(), &options(30), Some(&history))
            .await
            .unwrap();
        assert_eq!(report.files[0].destination, Some(dir.path().join("user_1.jpg")));
        assert_eq!(std::fs::read(&original).unwrap(), before);

        history.undo(0, false).unwrap();
        assert!(original.exists());
        assert!(!dir.path().join("user_1.jpg").exists());
    }

    #[tokio::test]
    async fn converts_and_reports_failures() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let good = input.path().join("face.png");
        RgbImage::from_pixel(20, 10, Rgb([1, 2, 3])).save(&good).unwrap();
        let bad = input.path().join("broken.webp");
        std::fs::write(&bad, b"nope").unwrap();
        let out_dir = output.path().join("converted");
        let history = History::new(output.path().join("journal.jsonl"));

        let report = convert_all(vec![good.clone(), bad], &out_dir, &options(75), Some(&history))
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        let converted = image::open(out_dir.join("face.jpg")).unwrap();
        assert_eq!((converted.width(), converted.height()), (20, 10));
        assert!(good.exists());
        assert_eq!(history.read_all().unwrap().len(), 1);
    }

    #[test]
    fn lower_quality_gives_smaller_files() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let src = input.path().join("noise.png");
        RgbImage::from_fn(128, 128, |x, y| Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8]))
            .save(&src)
            .unwrap();

        let high = output.path().join("high.jpg");
        let low = output.path().join("low.jpg");
        convert_one(&src, &high, &options(95)).unwrap();
        convert_one(&src, &low, &options(30)).unwrap();

        let size = |p: &Path| std::fs::metadata(p).unwrap().len();
        assert!(size(&low) < size(&high));
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let src = input.path().join("a.png");
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])).save(&src).unwrap();
        let opts = ConvertOptions { dry_run: true, ..options(60) };

        let report = convert_all(vec![src], output.path(), &opts, None).await.unwrap();

        assert_eq!(report.processed, 1);
        assert!(!output.path().join("a.jpg").exists());
    }
}
