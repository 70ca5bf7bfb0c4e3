use serde::Serialize;

use rtkrelay_frame::CarrierSolution;

use crate::collab::{StatusColor, StatusIndicator};

/// Overall rover health, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    LinkDown,
    SessionDown,
    Stale,
    CarrierFixed,
    CarrierFloat,
    PlainFix,
}

impl StatusClass {
    /// Pick the first condition that holds, in severity order.
    pub fn derive(
        link_up: bool,
        streaming: bool,
        stale: bool,
        carrier: Option<CarrierSolution>,
    ) -> Self {
        if !link_up {
            StatusClass::LinkDown
        } else if !streaming {
            StatusClass::SessionDown
        } else if stale {
            StatusClass::Stale
        } else {
            match carrier {
                Some(CarrierSolution::Fixed) => StatusClass::CarrierFixed,
                Some(CarrierSolution::Float) => StatusClass::CarrierFloat,
                _ => StatusClass::PlainFix,
            }
        }
    }

    /// Indicator colour for this class.
    pub fn color(self) -> StatusColor {
        match self {
            StatusClass::LinkDown => StatusColor::Blue,
            StatusClass::SessionDown => StatusColor::Purple,
            StatusClass::Stale => StatusColor::Red,
            StatusClass::CarrierFixed => StatusColor::Green,
            StatusClass::CarrierFloat => StatusColor::Cyan,
            StatusClass::PlainFix => StatusColor::Yellow,
        }
    }

    /// Settled states are shown solid; anything still converging pulses.
    pub fn pulses(self) -> bool {
        !matches!(self, StatusClass::CarrierFixed | StatusClass::PlainFix)
    }

    pub fn apply(self, indicator: &mut dyn StatusIndicator) {
        if self.pulses() {
            indicator.pulse(self.color());
        } else {
            indicator.set_solid(self.color());
        }
    }
}
