use std::fmt;

use tracing::debug;

/// Indicator colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Off,
    Red,
    Yellow,
    Green,
    Cyan,
    Blue,
    Purple,
    White,
}

impl fmt::Display for StatusColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusColor::Off => "off",
            StatusColor::Red => "red",
            StatusColor::Yellow => "yellow",
            StatusColor::Green => "green",
            StatusColor::Cyan => "cyan",
            StatusColor::Blue => "blue",
            StatusColor::Purple => "purple",
            StatusColor::White => "white",
        };
        f.write_str(name)
    }
}

/// Status light driver. Called every status tick; must not block.
pub trait StatusIndicator {
    fn set_solid(&mut self, color: StatusColor);

    /// Advance a pulse animation one step.
    fn pulse(&mut self, color: StatusColor);
}

/// Indicator for headless hosts: logs pattern changes.
#[derive(Debug, Default)]
pub struct LogIndicator {
    current: Option<(StatusColor, bool)>,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn show(&mut self, color: StatusColor, pulsing: bool) {
        if self.current == Some((color, pulsing)) {
            return;
        }
        self.current = Some((color, pulsing));
        debug!(%color, pulsing, "status indicator changed");
    }

    /// Last pattern shown.
    pub fn current(&self) -> Option<(StatusColor, bool)> {
        self.current
    }
}

impl StatusIndicator for LogIndicator {
    fn set_solid(&mut self, color: StatusColor) {
        self.show(color, false);
    }

    fn pulse(&mut self, color: StatusColor) {
        self.show(color, true);
    }
}
