use serde::{Deserialize, Serialize};
use std::fmt;

/// Rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from edge coordinates. Inverted edges collapse to an empty side.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: right.saturating_sub(left).max(0) as u32,
            height: bottom.saturating_sub(top).max(0) as u32,
        }
    }

    /// Horizontal center. Computed in `i64` so no coordinate can overflow.
    pub fn center_x(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width / 2)
    }

    pub fn center_y(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height / 2)
    }

    pub fn long_side(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn short_side(&self) -> u32 {
        self.width.min(self.height)
    }

    pub fn is_portrait(&self) -> bool {
        self.width < self.height
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Which measurement of a two-dimensional check failed.
///
/// `Transverse` is the horizontal or long-side measurement, `Portrait` the
/// vertical or short-side one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Portrait,
    Transverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionKind {
    /// No candidate (portrait axis) or more than one (transverse axis).
    IllegalTarget,
    IllegalText,
    IllegalLocation,
    IllegalSize,
    Invisible,
    NotClickable,
    ParentFault,
    InternalError,
}

/// One terminal reason plus at most one axis qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub axis: Option<Axis>,
}

impl Rejection {
    pub const fn on(kind: RejectionKind, axis: Axis) -> Self {
        Self {
            kind,
            axis: Some(axis),
        }
    }

    pub const fn plain(kind: RejectionKind) -> Self {
        Self { kind, axis: None }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.axis {
            Some(axis) => write!(f, "{:?}|{:?}", self.kind, axis),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationKind {
    DirectInvoke,
    SyntheticPointerEvent,
    #[default]
    None,
}

/// Result of one classification attempt.
///
/// `rejection` is set exactly when `accepted` is false. Activation fallbacks
/// taken after an acceptance (the node was not clickable, the parent could not
/// stand in for it) are kept apart in `activation_fault` so an accepted outcome
/// never carries a rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub source_app: String,
    pub text: Option<String>,
    pub bounds: Option<Bounds>,
    pub parent_bounds: Option<Bounds>,
    pub is_portrait_window: bool,
    pub accepted: bool,
    pub rejection: Option<Rejection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_fault: Option<Rejection>,
    pub activation: ActivationKind,
}

impl CheckOutcome {
    pub fn new(source_app: &str) -> Self {
        Self {
            source_app: source_app.to_string(),
            ..Self::default()
        }
    }

    /// Clear every field so a pooled outcome can serve the next attempt.
    pub fn reset(&mut self, source_app: &str) {
        self.source_app.clear();
        self.source_app.push_str(source_app);
        self.text = None;
        self.bounds = None;
        self.parent_bounds = None;
        self.is_portrait_window = false;
        self.accepted = false;
        self.rejection = None;
        self.activation_fault = None;
        self.activation = ActivationKind::None;
    }

    pub fn reject(&mut self, rejection: Rejection) {
        self.accepted = false;
        self.rejection = Some(rejection);
    }

    pub fn mark_internal_error(&mut self) {
        self.reject(Rejection::plain(RejectionKind::InternalError));
    }

    /// True when the tree held no candidate or an ambiguous set of them.
    pub fn is_target_missing(&self) -> bool {
        matches!(
            self.rejection,
            Some(Rejection {
                kind: RejectionKind::IllegalTarget,
                ..
            })
        )
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source_app)?;
        if self.accepted {
            f.write_str(" accepted")?;
        } else {
            f.write_str(" rejected")?;
        }
        if let Some(rejection) = &self.rejection {
            write!(f, " [{rejection}]")?;
        }
        if let Some(text) = &self.text {
            write!(f, " {text:?}")?;
        }
        if let Some(bounds) = &self.bounds {
            write!(f, " bounds={bounds}")?;
        }
        if let Some(parent) = &self.parent_bounds {
            write!(f, " parent={parent}")?;
        }
        if self.bounds.is_some() {
            let orientation = if self.is_portrait_window {
                "portrait"
            } else {
                "landscape"
            };
            write!(f, " {orientation}")?;
        }
        if let Some(fault) = &self.activation_fault {
            write!(f, " fallback={fault}")?;
        }
        write!(f, " via={:?}", self.activation)
    }
}
