use clap::Subcommand;
use notiplan_core::GroupConsent;

use crate::device::{parse_group, Device};

#[derive(Subcommand)]
pub enum ConsentAction {
    /// Show a group's in-app consent
    Get {
        #[arg(value_parser = parse_group)]
        group: notiplan_core::GroupId,
    },
    /// Record an in-app answer for a group
    Set {
        #[arg(value_parser = parse_group)]
        group: notiplan_core::GroupId,
        /// true to allow, false to refuse
        #[arg(action = clap::ArgAction::Set)]
        allowed: bool,
    },
    /// Forget a group's answer
    Reset {
        #[arg(value_parser = parse_group)]
        group: notiplan_core::GroupId,
    },
    /// List every recorded answer
    List,
    /// Combined group and OS status
    Status {
        #[arg(value_parser = parse_group)]
        group: notiplan_core::GroupId,
    },
}

pub async fn run(action: ConsentAction) -> Result<(), Box<dyn std::error::Error>> {
    let device = Device::open()?;
    let scheduler = device.scheduler();
    let store = scheduler.consent();

    match action {
        ConsentAction::Get { group } => {
            let label = match store.get(&group)? {
                GroupConsent::NotAsked => "not_asked",
                GroupConsent::Allowed => "allowed",
                GroupConsent::Denied => "denied",
            };
            println!("{label}");
        }
        ConsentAction::Set { group, allowed } => {
            store.set(&group, allowed)?;
            println!("ok");
        }
        ConsentAction::Reset { group } => {
            store.reset(&group)?;
            println!("ok");
        }
        ConsentAction::List => {
            let prefix = &device.config.consent.key_prefix;
            for (key, value) in device.db.kv_scan(prefix)? {
                let group = key.strip_prefix(prefix.as_str()).unwrap_or(&key);
                let label = if value == "true" { "allowed" } else { "denied" };
                println!("{group}\t{label}");
            }
        }
        ConsentAction::Status { group } => {
            let status = scheduler.current_authorization_status(&group).await;
            println!("{}", serde_json::to_string(&status)?.trim_matches('"'));
        }
    }
    Ok(())
}
