//! Events the display surface sends to the controller.

use bevy::prelude::Message;

use crate::attachment::ModelSlot;
use crate::config::{validate_height, validate_mass};
use crate::error::ConfigError;
use crate::state::GravityPreset;

#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    Start,
    Reset,
    SelectPreset(GravityPreset),
    SetHeight(f32),
    SetMass(f32),
    /// `None` clears the attached model
    SelectModel(Option<ModelSlot>),
}

impl SimEvent {
    /// Reject payloads the controller must never see.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            SimEvent::SetHeight(height) => validate_height(height),
            SimEvent::SetMass(mass) => validate_mass(mass),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_payloads() {
        assert!(SimEvent::SetHeight(4.0).validate().is_ok());
        assert_eq!(
            SimEvent::SetHeight(f32::INFINITY).validate(),
            Err(ConfigError::InvalidHeight(f32::INFINITY))
        );
        assert_eq!(
            SimEvent::SetMass(-2.0).validate(),
            Err(ConfigError::InvalidMass(-2.0))
        );
        assert!(SimEvent::SelectModel(None).validate().is_ok());
    }
}
