pub mod check;
pub mod render;
pub mod run;
pub mod validate_url;

use overlaycast_overlay_model::{OverlaySpec, Position};

/// Split `VALUE@POSITION`. The suffix is only taken when it names a
/// position, so values that contain `@` themselves are left whole.
pub fn split_position(arg: &str) -> (&str, Option<&str>) {
    match arg.rsplit_once('@') {
        Some((value, position)) if !value.is_empty() && position.parse::<Position>().is_ok() => {
            (value, Some(position))
        }
        _ => (arg, None),
    }
}

/// Overlay definitions from repeated `--text` / `--image` flags, texts first.
pub fn overlay_specs(texts: &[String], images: &[String]) -> Vec<OverlaySpec> {
    let texts = texts.iter().map(|arg| {
        let (content, position) = split_position(arg);
        OverlaySpec::text(content, position)
    });
    let images = images.iter().map(|arg| {
        let (path, position) = split_position(arg);
        OverlaySpec::image(path, position)
    });
    texts.chain(images).collect()
}
