use crate::device::{parse_group, Device};

pub async fn run(group: String) -> Result<(), Box<dyn std::error::Error>> {
    let group = parse_group(&group)?;
    let device = Device::open()?;
    device.scheduler().disable(&group).await;
    println!("disabled {group}");
    Ok(())
}
