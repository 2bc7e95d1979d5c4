//! Waitlist lottery walkthrough
//!
//! Registers entrants for a small event, lets one leave, runs the lottery, has one winner
//! decline and draws a replacement. Storage is in memory; notifications are
//! written to the log.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waitlist_lottery_core::environment::SystemClock;
use waitlist_lottery_core::{
    EntrantId, Event, EventId, EventStatus, Notification, Notifier, NotifyError,
};
use waitlist_lottery_runtime::{
    DrawReport, LotteryConfig, LotteryCoordinator, LotteryService, metrics::MetricsServer,
};
use waitlist_lottery_testing::InMemoryEventRepository;

/// Notifier that logs every message
struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async move {
            info!(
                entrant = %notification.recipient,
                kind = ?notification.kind,
                "{}",
                notification.message()
            );
            Ok(())
        })
    }
}

fn print_report(label: &str, report: &DrawReport) {
    match report {
        DrawReport::Completed(draw) => {
            println!("{label}: selected {:?}", ids(&draw.selected));
            println!("  still waiting: {:?}", ids(&draw.still_waiting));
            println!(
                "  persisted: {}, notifications sent: {}",
                draw.persisted, draw.notifications.sent
            );
        },
        DrawReport::Skipped(reason) => println!("{label}: skipped ({reason})"),
    }
}

fn ids(entrants: &[EntrantId]) -> Vec<&str> {
    entrants.iter().map(EntrantId::as_str).collect()
}

fn print_lists(event: &Event) {
    println!("  waiting:   {:?}", ids(&event.waiting_list));
    println!("  selected:  {:?}", ids(&event.selected_attendees));
    println!("  cancelled: {:?}", ids(&event.cancelled_attendees));
    println!("  confirmed: {:?}", ids(&event.confirmed_attendees));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LotteryConfig::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.observability.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_server = if config.observability.metrics_enabled {
        let mut server = MetricsServer::new(config.metrics_addr()?);
        server.start()?;
        Some(server)
    } else {
        None
    };

    println!("=== Waitlist Lottery Demo ===\n");

    let repository = Arc::new(InMemoryEventRepository::new());
    let service = Arc::new(LotteryService::from_config(repository.clone(), &config.draw));
    let coordinator =
        LotteryCoordinator::new(service, Arc::new(LogNotifier), Arc::new(SystemClock))
            .with_config(&config.draw);

    let event_id = EventId::generate();
    repository.insert(
        Event::new(event_id.clone(), "Community Dinner", 3)
            .with_status(EventStatus::OpenForRegistration)
            .with_max_waiting_list_size(8),
    );
    info!(%event_id, "Event created");

    for name in ["ana", "ben", "chen", "dara", "eli", "fatima", "gus"] {
        let registered = coordinator
            .register_entrant(&event_id, EntrantId::new(name))
            .await?;
        println!("Registered {name}: {registered}");
    }

    let left = coordinator
        .leave_waitlist(&event_id, &EntrantId::new("gus"))
        .await?;
    println!("gus leaves the waiting list: {left}");

    println!();
    let report = coordinator.run_lottery(&event_id).await?;
    print_report("Initial draw", &report);

    if let Some(decliner) = report.completed().and_then(|draw| draw.selected.first()) {
        println!("\n{decliner} declines");
        coordinator.decline_selection(&event_id, decliner).await?;

        let replacement = coordinator.draw_replacements(&event_id).await?;
        print_report("Replacement draw", &replacement);
    }

    if let Some(event) = repository.get(&event_id) {
        println!("\nFinal lists (status {}):", event.status);
        print_lists(&event);
    }

    if let Some(rendered) = metrics_server.as_ref().and_then(|server| server.render()) {
        println!("\n{rendered}");
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
