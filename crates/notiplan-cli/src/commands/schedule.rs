use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use notiplan_core::scheduler::DispatchAction;
use notiplan_core::{
    ask_fn, AdHocGroup, AskError, AskMode, GroupId, GroupLevel, NotificationContent,
    PermissionAsker, PermissionStrategy, ResolvedDate, SchedulingResult, SystemLevel, Timeline,
    TriggerSet,
};

use crate::device::{parse_group, Device};

#[derive(Clone, Copy, ValueEnum)]
pub enum StrategyPreset {
    /// Ask the OS when needed, no in-app prompt
    AskIfNeeded,
    /// Only schedule when the OS already allows it
    IfAlreadyAllowed,
    /// In-app prompt on stdin, then the OS prompt
    PrePermission,
    /// Mark the group allowed, then ask the OS when needed
    Automatic,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Mode {
    Once,
    Always,
}

#[derive(Args)]
pub struct ScheduleArgs {
    /// Group identifier
    #[arg(value_parser = parse_group)]
    group: GroupId,
    /// Notification title
    title: String,
    /// Notification body
    #[arg(default_value = "")]
    body: String,
    /// Fire instant in RFC 3339; repeat for several notifications
    #[arg(long = "at", required = true)]
    at: Vec<DateTime<Utc>>,
    /// Permission strategy
    #[arg(long, value_enum, default_value_t = StrategyPreset::AskIfNeeded)]
    strategy: StrategyPreset,
    /// When the in-app prompt may be repeated (pre-permission only)
    #[arg(long, value_enum, default_value_t = Mode::Once)]
    ask_mode: Mode,
    /// Replace everything the group has pending
    #[arg(long)]
    replace: bool,
    /// Category identifier attached to every notification
    #[arg(long)]
    category: Option<String>,
    /// Schedule without sound
    #[arg(long)]
    muted: bool,
}

/// In-app prompt answered on the terminal.
fn stdin_asker(group: GroupId) -> impl PermissionAsker + 'static {
    ask_fn(move || {
        let group = group.clone();
        async move {
            tokio::task::spawn_blocking(move || -> Result<bool, AskError> {
                eprint!("Allow notifications for {group}? [y/N] ");
                let mut line = String::new();
                std::io::stdin()
                    .read_line(&mut line)
                    .map_err(|e| AskError::Failed(e.to_string()))?;
                Ok(matches!(line.trim(), "y" | "Y" | "yes"))
            })
            .await
            .map_err(|e| AskError::Failed(e.to_string()))?
        }
    })
}

fn strategy_for(args: &ScheduleArgs) -> PermissionStrategy {
    match args.strategy {
        StrategyPreset::AskIfNeeded => PermissionStrategy::ask_permission_if_needed(),
        StrategyPreset::IfAlreadyAllowed => PermissionStrategy::schedule_if_already_allowed(),
        StrategyPreset::PrePermission => {
            let mode = match args.ask_mode {
                Mode::Once => AskMode::Once,
                Mode::Always => AskMode::AlwaysIfNotAllowed,
            };
            PermissionStrategy::ask_with_pre_permission(mode, stdin_asker(args.group.clone()))
        }
        StrategyPreset::Automatic => {
            PermissionStrategy::new(GroupLevel::AllowAutomatically, SystemLevel::AskPermission)
        }
    }
}

pub async fn run(args: ScheduleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let device = Device::open()?;
    let scheduler = device.scheduler();
    let strategy = strategy_for(&args);

    let content = if args.muted {
        NotificationContent::muted(&args.title, "", &args.body)
    } else {
        NotificationContent::titled(&args.title, &args.body)
    };
    let triggers = TriggerSet::from_dates(args.at.iter().copied().map(ResolvedDate::Exact), Utc::now());
    if triggers.len() < args.at.len() {
        eprintln!("skipped {} instant(s) not in the future", args.at.len() - triggers.len());
    }
    let mut request = triggers.schedule(content);
    if let Some(category) = args.category {
        request = request.with_category(category);
    }

    let group = AdHocGroup::new(Timeline::new(vec![request]), Some(args.group));
    let (result, log) = scheduler
        .reschedule_group_logged(&group, &strategy, args.replace)
        .await;

    if let Some(log) = log {
        if log.purged > 0 {
            println!("purged\t{}", log.purged);
        }
        for record in &log.records {
            let action = match (record.action, record.is_failure()) {
                (_, true) => "failed",
                (DispatchAction::Add, false) => "added",
                (DispatchAction::Remove, false) => "removed",
            };
            println!("{action}\t{}", record.notification_id);
        }
    }

    match result {
        SchedulingResult::ScheduledSuccessfully => Ok(()),
        SchedulingResult::SystemError(e) => Err(e.into()),
        SchedulingResult::DeniedOnGroupLevel => Err("permission denied on group level".into()),
        SchedulingResult::DeniedOnSystemLevel => Err("permission denied on system level".into()),
    }
}
