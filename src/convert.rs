use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;

use log::{error, info};

use crate::codecs::png::PngImage;
use crate::codecs::ppm::PpmImage;
use crate::error::{ConvertError, Stage};
use crate::image::{ReadImage, WriteImage};

const PPM_SUFFIX: &str = ".ppm";
const PNG_SUFFIX: &str = ".png";

pub struct ConversionTask {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Destination name for a source file name: a literal trailing ".ppm" is
/// removed, then ".png" is appended. Names without the suffix keep it:
/// "notes.txt" becomes "notes.txt.png".
pub fn output_name(name: &str) -> String {
    let stem = name.strip_suffix(PPM_SUFFIX).unwrap_or(name);
    format!("{}{}", stem, PNG_SUFFIX)
}

/// Converts one file. The destination is only created once the source has
/// fully decoded, so a failed file never leaves partial output behind.
pub fn convert_file(src: &Path, dst: &Path) -> Result<(), ConvertError> {
    info!("converting {} to {}", src.display(), dst.display());

    let source = File::open(src).map_err(|e| ConvertError::new(src, Stage::Open, e.into()))?;
    let image =
        PpmImage::read_image(source).map_err(|e| ConvertError::new(src, Stage::Decode, e))?;

    let destination =
        File::create(dst).map_err(|e| ConvertError::new(src, Stage::Create, e.into()))?;
    PngImage::write_image(destination, &*image)
        .map_err(|e| ConvertError::new(src, Stage::Encode, e))?;

    info!("converted {} to {}", src.display(), dst.display());
    Ok(())
}

fn run_task(task: &ConversionTask) -> bool {
    match convert_file(&task.source, &task.destination) {
        Ok(()) => true,
        Err(e) => {
            error!("{}", e);
            false
        }
    }
}

/// Runs every task to completion, sequentially in slice order or fanned out
/// as one thread per task. The scope join is the single barrier: all tasks
/// have finished when this returns. Returns the number of failed files.
pub fn run_batch(tasks: &[ConversionTask], parallel: bool) -> usize {
    if parallel {
        thread::scope(|s| {
            let handles: Vec<_> = tasks
                .iter()
                .map(|task| s.spawn(move || run_task(task)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(false))
                .filter(|converted| !converted)
                .count()
        })
    } else {
        tasks.iter().filter(|task| !run_task(task)).count()
    }
}

#[cfg(test)]
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ppm2png-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[cfg(test)]
fn write_file(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[cfg(test)]
fn tasks_for(input: &Path, output: &Path) -> Vec<ConversionTask> {
    let mut tasks: Vec<ConversionTask> = std::fs::read_dir(input)
        .unwrap()
        .map(|entry| entry.unwrap())
        .filter(|entry| !entry.file_type().unwrap().is_dir())
        .map(|entry| ConversionTask {
            source: entry.path(),
            destination: output.join(output_name(&entry.file_name().to_string_lossy())),
        })
        .collect();
    tasks.sort_by(|a, b| a.source.cmp(&b.source));
    tasks
}

#[test]
fn test_output_name_swaps_suffix() {
    assert_eq!(output_name("sunset.ppm"), "sunset.png");
    assert_eq!(output_name("a.ppm.ppm"), "a.ppm.png");
}

#[test]
fn test_output_name_appends_without_suffix() {
    // literal suffix match, not extension replacement
    assert_eq!(output_name("notes.txt"), "notes.txt.png");
    assert_eq!(output_name("UPPER.PPM"), "UPPER.PPM.png");
    assert_eq!(output_name(".ppm"), ".png");
}

#[test]
fn test_convert_file_writes_png() {
    let dir = scratch_dir("convert-ok");
    write_file(&dir, "red.ppm", "P3\n2 1\n255\n255 0 0\n0 255 0\n");

    let dst = dir.join("red.png");
    convert_file(&dir.join("red.ppm"), &dst).unwrap();

    let png = std::fs::read(&dst).unwrap();
    assert_eq!(png[..8], [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
}

#[test]
fn test_convert_file_missing_source() {
    let dir = scratch_dir("convert-missing");

    let err = convert_file(&dir.join("nope.ppm"), &dir.join("nope.png")).unwrap_err();
    assert_eq!(err.stage, Stage::Open);
    assert!(!dir.join("nope.png").exists());
}

#[test]
fn test_convert_file_bad_source_leaves_no_output() {
    let dir = scratch_dir("convert-bad");
    write_file(&dir, "bad.ppm", "P6\n2 1\n255\n");

    let err = convert_file(&dir.join("bad.ppm"), &dir.join("bad.png")).unwrap_err();
    assert_eq!(err.stage, Stage::Decode);
    assert!(!dir.join("bad.png").exists());
}

#[cfg(test)]
fn check_mixed_batch(name: &str, parallel: bool) {
    let input = scratch_dir(&format!("{}-in", name));
    let output = scratch_dir(&format!("{}-out", name));
    write_file(&input, "a.ppm", "P3\n1 1\n255\n9 9 9\n");
    write_file(&input, "broken.ppm", "P3\n2 2\n255\n0 0 0\n");
    write_file(&input, "notes.txt", "P3\n1 1\n255\n1 2 3\n");
    std::fs::create_dir(input.join("sub")).unwrap();

    let tasks = tasks_for(&input, &output);
    assert_eq!(tasks.len(), 3);

    let failed = run_batch(&tasks, parallel);
    assert_eq!(failed, 1);
    assert!(output.join("a.png").exists());
    assert!(output.join("notes.txt.png").exists());
    assert!(!output.join("broken.png").exists());
}

#[test]
fn test_batch_sequential_mixed() {
    check_mixed_batch("seq", false);
}

#[test]
fn test_batch_parallel_mixed() {
    check_mixed_batch("par", true);
}
