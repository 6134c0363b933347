//! Fixture project on disk. Compiled into both the unit tests
//! (`src/test_helpers.rs`) and the integration tests (`tests/common`), so it
//! only depends on dev-dependencies and std.

use image::{ImageBuffer, Rgb};
use std::path::Path;
use tempfile::TempDir;

/// Copy `fixtures/project/` to a temp directory and add a generated PNG.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/project");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    write_png(&tmp.path().join("src/assets/images/logo.png"), 64, 48);
    tmp
}

/// A gradient PNG, written with the encoder's default settings.
fn write_png(path: &Path, width: u32, height: u32) {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 4) as u8, (y * 5) as u8, ((x + y) * 2) as u8])
    });
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    img.save(path).unwrap();
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}
