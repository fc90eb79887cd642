use clap::Subcommand;
use notiplan_core::NotificationCenter;
use serde::Serialize;

use crate::device::{parse_group, Device};

#[derive(Subcommand)]
pub enum PendingAction {
    /// List pending notifications, soonest first
    List {
        /// Only this group's notifications
        #[arg(long, value_parser = parse_group)]
        group: Option<notiplan_core::GroupId>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove pending notifications without touching consent
    Clear {
        /// Only this group's notifications
        #[arg(value_parser = parse_group)]
        group: Option<notiplan_core::GroupId>,
    },
}

#[derive(Serialize)]
struct PendingEntry {
    id: String,
    title: String,
    body: String,
    fire_at: Option<String>,
}

pub async fn run(action: PendingAction) -> Result<(), Box<dyn std::error::Error>> {
    let device = Device::open()?;

    match action {
        PendingAction::List { group, json } => {
            let entries: Vec<PendingEntry> = device
                .center
                .pending_with_fire_dates()?
                .into_iter()
                .filter(|(request, _)| group.as_ref().map_or(true, |g| g.owns(&request.identifier)))
                .map(|(request, fire_at)| PendingEntry {
                    id: request.identifier,
                    title: request.content.title,
                    body: request.content.body,
                    fire_at: fire_at.map(|t| t.to_rfc3339()),
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("no pending notifications");
            } else {
                for entry in entries {
                    let at = entry.fire_at.as_deref().unwrap_or("-");
                    println!("{at}\t{}\t{}", entry.id, entry.title);
                }
            }
        }
        PendingAction::Clear { group } => {
            let ids: Vec<String> = device
                .center
                .pending()
                .await
                .into_iter()
                .map(|request| request.identifier)
                .filter(|id| group.as_ref().map_or(true, |g| g.owns(id)))
                .collect();
            device.center.remove_pending(&ids).await;
            println!("removed {}", ids.len());
        }
    }
    Ok(())
}
