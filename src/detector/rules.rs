//! Geometry and text rules applied to a candidate skip control.
//!
//! Each rule records what it measured on the outcome, then returns the
//! rejection that failed it, if any.

use super::types::{Axis, Bounds, CheckOutcome, Rejection, RejectionKind};

/// Longest label, in characters, a skip control may carry.
pub const MAX_TEXT_CHARS: usize = 6;

/// Most characters outside printable ASCII a label may carry.
pub const MAX_WIDE_CHARS: usize = 4;

pub fn check_text(text: &str, outcome: &mut CheckOutcome) -> Result<(), Rejection> {
    outcome.text = Some(text.to_string());

    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(Rejection::on(RejectionKind::IllegalText, Axis::Transverse));
    }
    let wide = text.chars().filter(|c| u32::from(*c) > 0x7E).count();
    if wide > MAX_WIDE_CHARS {
        return Err(Rejection::on(RejectionKind::IllegalText, Axis::Portrait));
    }
    Ok(())
}

/// Skip controls sit in the right quarter of the window, in the top or bottom band.
///
/// Only centers left of the 3/4 line are rejected horizontally; there is no
/// right-hand limit. Vertically the band strictly between 1/4 and 2/3 of the
/// height is rejected. Positions are taken relative to the window origin.
pub fn check_region(node: &Bounds, window: &Bounds) -> Result<(), Rejection> {
    let width = window.width as i64;
    let height = window.height as i64;
    let cx = node.center_x() - i64::from(window.x);
    let cy = node.center_y() - i64::from(window.y);

    if cx < width * 3 / 4 {
        return Err(Rejection::on(RejectionKind::IllegalLocation, Axis::Transverse));
    }
    if cy > height / 4 && cy < height * 2 / 3 {
        return Err(Rejection::on(RejectionKind::IllegalLocation, Axis::Portrait));
    }
    Ok(())
}

/// Size limits relative to the window, chosen by window orientation.
///
/// Portrait windows reject at the limit (`>=`), landscape windows only past
/// it (`>`). Both comparisons are kept as they are.
pub fn check_size(
    node: &Bounds,
    window: &Bounds,
    outcome: &mut CheckOutcome,
) -> Result<(), Rejection> {
    let long_side = node.long_side();
    let short_side = node.short_side();
    let portrait = window.is_portrait();
    outcome.is_portrait_window = portrait;

    let (long_fails, short_fails) = if portrait {
        (
            long_side == 0 || long_side >= window.width / 3,
            short_side == 0 || short_side >= window.height / 8,
        )
    } else {
        (
            long_side == 0 || long_side > window.width / 6,
            short_side == 0 || short_side > window.height / 4,
        )
    };

    if long_fails {
        return Err(Rejection::on(RejectionKind::IllegalSize, Axis::Transverse));
    }
    if short_fails {
        return Err(Rejection::on(RejectionKind::IllegalSize, Axis::Portrait));
    }
    Ok(())
}
