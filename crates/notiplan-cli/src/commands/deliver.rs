use chrono::{DateTime, Utc};
use clap::Args;

use crate::device::Device;

#[derive(Args)]
pub struct DeliverArgs {
    /// Treat this instant (RFC 3339) as the current time
    #[arg(long)]
    now: Option<DateTime<Utc>>,
    /// Present this notification immediately instead
    #[arg(long, conflicts_with = "now")]
    id: Option<String>,
}

pub fn run(args: DeliverArgs) -> Result<(), Box<dyn std::error::Error>> {
    let device = Device::open()?;

    if let Some(id) = args.id {
        if !device.center.deliver(&id)? {
            return Err(format!("no pending notification with id {id}").into());
        }
        println!("delivered\t{id}");
        return Ok(());
    }

    let delivered = device.center.deliver_due(args.now.unwrap_or_else(Utc::now))?;
    for id in &delivered {
        println!("delivered\t{id}");
    }
    if delivered.is_empty() {
        println!("nothing due");
    }
    Ok(())
}
