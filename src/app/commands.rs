//! Inbound operator commands.
//!
//! These represent actions requested by the outside world (dashboard REST
//! call, bus message) that the [`Orchestrator`](super::service::Orchestrator)
//! validates against the transition table and forwards to the machine.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::machine::{MachineStatus, Material};

/// Command identity without parameters.  Indexes the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    Start,
    Stop,
    Pause,
    Reset,
    ToggleBarrier,
    SetMaterial,
}

impl CommandName {
    pub const COUNT: usize = 6;

    pub const ALL: [CommandName; Self::COUNT] = [
        Self::Start,
        Self::Stop,
        Self::Pause,
        Self::Reset,
        Self::ToggleBarrier,
        Self::SetMaterial,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Reset => "reset",
            Self::ToggleBarrier => "toggle_barrier",
            Self::SetMaterial => "set_material",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|c| c.as_str() == raw)
    }
}

/// A validated operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Write run=true.
    Start,
    /// Write run=false.
    Stop,
    /// Write pause=true.
    Pause,
    /// Clear the alarm latch once every critical condition has cleared.
    Reset,
    /// Invert the safety barrier.
    ToggleBarrier,
    /// Change the loaded material.
    SetMaterial(Material),
}

impl Command {
    pub fn name(&self) -> CommandName {
        match self {
            Self::Start => CommandName::Start,
            Self::Stop => CommandName::Stop,
            Self::Pause => CommandName::Pause,
            Self::Reset => CommandName::Reset,
            Self::ToggleBarrier => CommandName::ToggleBarrier,
            Self::SetMaterial(_) => CommandName::SetMaterial,
        }
    }

    /// Parse a request body of the form
    /// `{"command": "set_material", "parameters": {"material": "Wood"}}`.
    pub fn from_json(body: &str) -> Result<Self, ValidationError> {
        let request: CommandRequest =
            serde_json::from_str(body).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::try_from(request)
    }
}

/// Wire shape of a command request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub parameters: CommandParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

impl TryFrom<CommandRequest> for Command {
    type Error = ValidationError;

    fn try_from(request: CommandRequest) -> Result<Self, Self::Error> {
        let name = CommandName::parse(&request.command)
            .ok_or_else(|| ValidationError::UnknownCommand(request.command.clone()))?;
        Ok(match name {
            CommandName::Start => Self::Start,
            CommandName::Stop => Self::Stop,
            CommandName::Pause => Self::Pause,
            CommandName::Reset => Self::Reset,
            CommandName::ToggleBarrier => Self::ToggleBarrier,
            CommandName::SetMaterial => {
                let raw = request
                    .parameters
                    .material
                    .ok_or(ValidationError::MissingParameter("material"))?;
                let material =
                    Material::parse(&raw).ok_or(ValidationError::InvalidMaterial(raw))?;
                Self::SetMaterial(material)
            }
        })
    }
}

/// Successful command outcome: the command and the state it was accepted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub command: CommandName,
    pub state: MachineStatus,
}
