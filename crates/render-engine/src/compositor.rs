//! Frame compositor: blends cached overlay bitmaps onto a video frame.
//!
//! Positions are read from the live store on every frame rather than from
//! the cache, so a moved overlay follows its new anchor immediately and a
//! deleted one disappears before the next cache rebuild.

use overlaycast_overlay_model::OverlayStore;

use crate::bitmap::{Bitmap, Frame};
use crate::cache::CachedBitmap;

/// Draw every cached overlay that still exists in `store` onto `frame`.
///
/// Returns the number of overlays drawn.
pub fn composite(frame: &mut Frame, cache: &[CachedBitmap], store: &OverlayStore) -> usize {
    let mut drawn = 0;
    for entry in cache {
        let Some((x, y)) = store.coordinates(&entry.id) else {
            tracing::trace!(overlay_id = %entry.id, "Skipping cached overlay no longer in store");
            continue;
        };
        blit(frame, &entry.bitmap, x, y);
        drawn += 1;
    }
    drawn
}

/// Clamp an overlay origin so the bitmap stays inside the frame.
///
/// Negative offsets pin to 0 and offsets that would run past the right or
/// bottom edge pin to that edge. A bitmap larger than the frame ends up
/// with a negative origin and still overflows; [`blit`] simply skips the
/// off-frame part.
pub fn clamp_origin(
    (x, y): (i32, i32),
    (bitmap_width, bitmap_height): (u32, u32),
    (frame_width, frame_height): (u32, u32),
) -> (i64, i64) {
    let max_x = frame_width as i64 - bitmap_width as i64;
    let max_y = frame_height as i64 - bitmap_height as i64;
    ((x as i64).max(0).min(max_x), (y as i64).max(0).min(max_y))
}

/// Draw `bitmap` onto `frame` at the clamped position for (`x`, `y`).
///
/// RGBA bitmaps are blended per channel as `a * overlay + (1 - a) * frame`
/// with `a = alpha / 255`; RGB bitmaps overwrite the frame. Only pixels
/// inside the frame are touched.
pub fn blit(frame: &mut Frame, bitmap: &Bitmap, x: i32, y: i32) {
    let (origin_x, origin_y) = clamp_origin((x, y), bitmap.dimensions(), frame.dimensions());
    let (frame_width, frame_height) = (frame.width() as i64, frame.height() as i64);

    // Visible rows/columns of the bitmap, in bitmap coordinates.
    let col_start = (-origin_x).max(0);
    let row_start = (-origin_y).max(0);
    let col_end = (bitmap.width() as i64).min(frame_width - origin_x);
    let row_end = (bitmap.height() as i64).min(frame_height - origin_y);
    if col_start >= col_end || row_start >= row_end {
        return;
    }

    match bitmap {
        Bitmap::Rgba(overlay) => {
            for by in row_start..row_end {
                for bx in col_start..col_end {
                    let src = overlay.get_pixel(bx as u32, by as u32);
                    let alpha = src[3];
                    if alpha == 0 {
                        continue;
                    }
                    let dst =
                        frame.get_pixel_mut((origin_x + bx) as u32, (origin_y + by) as u32);
                    if alpha == u8::MAX {
                        dst.0 = [src[0], src[1], src[2]];
                        continue;
                    }
                    let a = alpha as f32 / 255.0;
                    for c in 0..3 {
                        dst[c] = (a * src[c] as f32 + (1.0 - a) * dst[c] as f32) as u8;
                    }
                }
            }
        }
        Bitmap::Rgb(overlay) => {
            for by in row_start..row_end {
                for bx in col_start..col_end {
                    let src = overlay.get_pixel(bx as u32, by as u32);
                    frame.put_pixel((origin_x + bx) as u32, (origin_y + by) as u32, *src);
                }
            }
        }
    }
}
