//! Derived quantities shown to the viewer.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// When the final velocity is recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsMode {
    /// Every frame while running, from the release height and current gravity.
    #[default]
    Continuous,
    /// Once, at the start transition, from the height at that moment.
    StartOnly,
}

/// Impact velocity of a drop from `height` under `gravity`: `sqrt(2 g h)`.
///
/// Negative or NaN heights clamp to zero instead of producing NaN.
pub fn compute_final_velocity(gravity: f32, height: f32) -> f32 {
    let height = if height.is_nan() { 0.0 } else { height.max(0.0) };
    let gravity = if gravity.is_nan() { 0.0 } else { gravity.max(0.0) };
    (2.0 * gravity * height).sqrt()
}

/// Values published to the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DisplayMetrics {
    pub height: f32,
    pub instantaneous_velocity: f32,
    pub final_velocity: f32,
    pub gravity: f32,
}

impl DisplayMetrics {
    /// Zeroed metrics, keeping only the active gravity.
    pub fn placeholder(gravity: f32) -> Self {
        Self {
            gravity,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Non-fatal message for the display surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Bounded history of notices, oldest dropped first.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    notices: VecDeque<Notice>,
    capacity: usize,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::with_capacity(8)
    }
}

impl NoticeBoard {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            notices: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, level: NoticeLevel, message: impl Into<String>) {
        if self.notices.len() == self.capacity {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.notices.back()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_velocity_formula() {
        let v = compute_final_velocity(9.81, 3.0);
        assert!((v - (2.0f32 * 9.81 * 3.0).sqrt()).abs() < 1e-5);
        assert!((v - 7.67).abs() < 0.01);

        let reduced = compute_final_velocity(5.76, 3.0);
        assert!((reduced - 5.879).abs() < 0.01);
    }

    #[test]
    fn test_final_velocity_clamps_negative_height() {
        assert_eq!(compute_final_velocity(9.81, -0.25), 0.0);
        assert_eq!(compute_final_velocity(9.81, f32::NAN), 0.0);
        assert_eq!(compute_final_velocity(9.81, 0.0), 0.0);
    }

    #[test]
    fn test_placeholder_keeps_gravity() {
        let m = DisplayMetrics::placeholder(5.76);
        assert_eq!(m.gravity, 5.76);
        assert_eq!(m.height, 0.0);
        assert_eq!(m.final_velocity, 0.0);
    }

    #[test]
    fn test_notice_board_drops_oldest() {
        let mut board = NoticeBoard::with_capacity(2);
        board.push(NoticeLevel::Info, "one");
        board.push(NoticeLevel::Warning, "two");
        board.push(NoticeLevel::Warning, "three");

        let messages: Vec<_> = board.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["two", "three"]);
        assert_eq!(board.latest().map(|n| n.level), Some(NoticeLevel::Warning));
    }
}
