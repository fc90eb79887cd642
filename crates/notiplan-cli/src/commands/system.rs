use clap::{Subcommand, ValueEnum};
use notiplan_core::{PermissionEnv, PlatformStatus};

use crate::device::Device;

#[derive(Clone, Copy, ValueEnum)]
pub enum PromptAnswer {
    Grant,
    Deny,
}

#[derive(Subcommand)]
pub enum SystemAction {
    /// Show the simulated OS authorization status
    Status,
    /// Overwrite the OS authorization status
    Set {
        /// not_determined, denied, authorized, provisional or ephemeral
        status: String,
    },
    /// Choose how the simulated user answers the next OS prompt
    Answer {
        #[arg(value_enum)]
        answer: PromptAnswer,
    },
}

pub async fn run(action: SystemAction) -> Result<(), Box<dyn std::error::Error>> {
    let device = Device::open()?;

    match action {
        SystemAction::Status => {
            let status = device.permission.authorization_status().await?;
            let answer = if device.permission.prompt_answer()? {
                "grant"
            } else {
                "deny"
            };
            println!("{status} (next prompt: {answer})");
        }
        SystemAction::Set { status } => {
            let status: PlatformStatus = status.parse()?;
            device.permission.set_status(status)?;
            println!("ok");
        }
        SystemAction::Answer { answer } => {
            device
                .permission
                .set_prompt_answer(matches!(answer, PromptAnswer::Grant))?;
            println!("ok");
        }
    }
    Ok(())
}
