use std::path::Path;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::TempDir;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

fn solid_png(path: &Path, color: [u8; 3]) -> Result<()> {
    RgbImage::from_pixel(32, 32, Rgb(color)).save(path)?;
    Ok(())
}

struct Dataset {
    conf_dir: TempDir,
    images: TempDir,
}

#[fixture]
fn dataset() -> Dataset {
    let images = TempDir::new().unwrap();
    solid_png(&images.path().join("red.png"), [250, 10, 10]).unwrap();
    solid_png(&images.path().join("blue.png"), [10, 10, 250]).unwrap();
    std::fs::write(images.path().join("readme.txt"), "not an image").unwrap();
    Dataset { conf_dir: TempDir::new().unwrap(), images }
}

#[rstest]
fn scan_and_color_search(dataset: Dataset) -> Result<()> {
    let conf = dataset.conf_dir.path();

    cargo_run!("clipsearch", "-c", conf, "scan", dataset.images.path())
        .success()
        .stdout(predicate::str::contains("新增 2 张图片，移除 0 张，失败 0 张"));

    cargo_run!("clipsearch", "-c", conf, "color", "--count", "1", "#ff0000")
        .success()
        .stdout(
            predicate::str::contains("red.png").and(predicate::str::contains("blue.png").not()),
        );

    // 第二次扫描不会有任何变化
    cargo_run!("clipsearch", "-c", conf, "scan")
        .success()
        .stdout(predicate::str::contains("新增 0 张图片，移除 0 张，失败 0 张"));

    Ok(())
}

#[rstest]
fn color_search_json(dataset: Dataset) -> Result<()> {
    let conf = dataset.conf_dir.path();
    cargo_run!("clipsearch", "-c", conf, "scan", dataset.images.path()).success();

    let output = Command::cargo_bin("clipsearch")?
        .args(["-c", conf.to_str().unwrap(), "color", "--output-format", "json", "#0000ff"])
        .output()?;
    assert!(output.status.success());
    let hits: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0]["path"].as_str().unwrap().ends_with("blue.png"));
    assert!(hits[0]["score"].as_f64().unwrap() > hits[1]["score"].as_f64().unwrap());

    Ok(())
}

#[rstest]
fn invalid_color_fails(dataset: Dataset) -> Result<()> {
    cargo_run!("clipsearch", "-c", dataset.conf_dir.path(), "color", "#zzzzzz").failure();
    Ok(())
}

#[rstest]
fn removed_image_is_forgotten(dataset: Dataset) -> Result<()> {
    let conf = dataset.conf_dir.path();
    cargo_run!("clipsearch", "-c", conf, "scan", dataset.images.path()).success();

    std::fs::remove_file(dataset.images.path().join("blue.png"))?;
    cargo_run!("clipsearch", "-c", conf, "scan")
        .success()
        .stdout(predicate::str::contains("新增 0 张图片，移除 1 张"));

    cargo_run!("clipsearch", "-c", conf, "color", "#0000ff")
        .success()
        .stdout(predicate::str::contains("blue.png").not());

    Ok(())
}

#[rstest]
fn rename_keeps_features(dataset: Dataset) -> Result<()> {
    let conf = dataset.conf_dir.path();
    let red = dataset.images.path().join("red.png");
    cargo_run!("clipsearch", "-c", conf, "scan", dataset.images.path()).success();

    cargo_run!("clipsearch", "-c", conf, "rename", &red, "crimson").success();
    assert!(!red.exists());
    assert!(dataset.images.path().join("crimson.png").exists());

    cargo_run!("clipsearch", "-c", conf, "color", "--count", "1", "#ff0000")
        .success()
        .stdout(predicate::str::contains("crimson.png"));

    // 目标已存在
    let crimson = dataset.images.path().join("crimson.png");
    cargo_run!("clipsearch", "-c", conf, "rename", &crimson, "blue").failure();
    assert!(crimson.exists());

    Ok(())
}

#[rstest]
fn delete_removes_file_and_cache(dataset: Dataset) -> Result<()> {
    let conf = dataset.conf_dir.path();
    let blue = dataset.images.path().join("blue.png");
    cargo_run!("clipsearch", "-c", conf, "scan", dataset.images.path()).success();

    cargo_run!("clipsearch", "-c", conf, "delete", "--yes", &blue)
        .success()
        .stdout(predicate::str::contains("已从缓存中移除"));
    assert!(!blue.exists());

    cargo_run!("clipsearch", "-c", conf, "status")
        .success()
        .stdout(predicate::str::contains("调色板  : 1"));

    Ok(())
}
