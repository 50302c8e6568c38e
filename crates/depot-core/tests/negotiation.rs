//! Integration tests for the contract-net negotiation between a coordinator
//! and robots, driven through dispatch tables with wire payloads.

#![allow(clippy::unwrap_used, clippy::panic)]

use depot_core::{
    Command, Coordinator, CoordinatorSettings, DepotConfig, Outbox, Outgoing, Participant,
    ProposalVerdict, RobotEntry, WorkerAgent,
};
use depot_types::{Award, PackageType, Proposal, RobotStatus, Tick};

fn worker(config: &DepotConfig, name: &str) -> WorkerAgent {
    let entry = config.robot(name).unwrap();
    WorkerAgent::new(config.worker_settings(entry).unwrap()).unwrap()
}

/// Deliver every publication in `out` to the given agents, returning the
/// commands they produced.
fn relay_to_workers(out: &mut Outbox, workers: &mut [WorkerAgent]) -> Vec<Command> {
    let mut produced = Vec::new();
    for command in out.drain() {
        let Command::Publish(envelope) = command else {
            continue;
        };
        let payload = envelope.message.encode().unwrap();
        for w in workers.iter_mut() {
            let table = w.routes();
            let mut local = Outbox::new();
            let _ = table.dispatch(w, &envelope.channel, &payload, &mut local);
            produced.extend(local.drain());
        }
    }
    produced
}

fn proposals(commands: &[Command]) -> Vec<Proposal> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Publish(e) => match &e.message {
                Outgoing::Proposal(p) => Some(p.clone()),
                _ => None,
            },
            Command::ScheduleCompletion { .. } => None,
        })
        .collect()
}

fn three_robot_config() -> DepotConfig {
    let mut config = DepotConfig::default();
    config.robots.push(RobotEntry::numbered(3, PackageType::Type1));
    config.supplier.seed = Some(11);
    config
}

#[test]
fn only_capable_robots_bid_and_one_wins() {
    let config = three_robot_config();
    let mut coordinator = Coordinator::new(config.coordinator_settings().unwrap());
    let mut workers = vec![
        worker(&config, "roboter-1"),
        worker(&config, "roboter-2"),
        worker(&config, "roboter-3"),
    ];

    let mut out = Outbox::new();
    coordinator.on_tick(&Tick::new("t1"), &mut out);
    let produced = relay_to_workers(&mut out, &mut workers);
    let bids = proposals(&produced);

    // roboter-1 and roboter-3 handle kind 1, roboter-2 handles kind 2.
    assert_eq!(bids.len(), 3);
    for bid in &bids {
        let capability = config.robot(&bid.name).unwrap().capability;
        assert_eq!(bid.package_type, capability);
    }
    for bid in bids {
        assert_eq!(coordinator.on_proposal(bid), ProposalVerdict::Accepted);
    }

    let mut out = Outbox::new();
    let awards = coordinator.select_winner_and_award(&mut out);
    assert_eq!(awards.len(), 2);
    let kind_1: Vec<&Award> = awards
        .iter()
        .filter(|a| a.package_type == PackageType::Type1)
        .collect();
    assert_eq!(kind_1.len(), 1);

    let produced = relay_to_workers(&mut out, &mut workers);
    let scheduled = produced
        .iter()
        .filter(|c| matches!(c, Command::ScheduleCompletion { .. }))
        .count();
    assert_eq!(scheduled, 2);

    // Exactly one kind-1 robot is busy; the other went back to ready.
    let busy: Vec<&str> = workers
        .iter()
        .filter(|w| w.robot().status() == RobotStatus::Busy)
        .map(|w| w.robot().name())
        .collect();
    assert_eq!(busy.len(), 2);
    assert!(busy.contains(&"roboter-2"));
    assert!(
        workers
            .iter()
            .all(|w| matches!(w.robot().status(), RobotStatus::Busy | RobotStatus::Ready))
    );
}

#[test]
fn proposal_after_award_step_is_dropped() {
    let config = DepotConfig::default();
    let mut coordinator = Coordinator::new(CoordinatorSettings {
        seed: Some(5),
        ..config.coordinator_settings().unwrap()
    });
    let mut workers = vec![worker(&config, "roboter-1")];

    let mut out = Outbox::new();
    coordinator.on_tick(&Tick::new("t1"), &mut out);
    let bids = proposals(&relay_to_workers(&mut out, &mut workers));
    let late = bids.into_iter().next().unwrap();

    // The next tick closes the round before the bid arrives.
    let mut out = Outbox::new();
    coordinator.on_tick(&Tick::new("t2"), &mut out);
    assert_eq!(coordinator.on_proposal(late), ProposalVerdict::StaleRound);

    let awards: Vec<_> = out
        .published()
        .filter(|e| matches!(e.message, Outgoing::Award(_)))
        .collect();
    assert!(awards.is_empty());
}

#[test]
fn sole_bidder_recovers_after_its_bid_arrives_late() {
    let config = DepotConfig::default();
    let mut coordinator = Coordinator::new(CoordinatorSettings {
        seed: Some(5),
        cfp_probability: 1.0,
        ..config.coordinator_settings().unwrap()
    });
    let mut workers = vec![worker(&config, "roboter-1")];

    let mut out = Outbox::new();
    coordinator.on_tick(&Tick::new("t1"), &mut out);
    let late = proposals(&relay_to_workers(&mut out, &mut workers))
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(workers.first().unwrap().robot().status(), RobotStatus::AwaitingAward);

    // The next round opens before the first bid reaches the coordinator.
    let mut out = Outbox::new();
    coordinator.on_tick(&Tick::new("t2"), &mut out);
    let rebids = proposals(&relay_to_workers(&mut out, &mut workers));
    assert_eq!(coordinator.on_proposal(late), ProposalVerdict::StaleRound);
    assert_eq!(rebids.len(), 1);
    let rebid = rebids.into_iter().next().unwrap();
    assert_ne!(rebid.round, None);
    assert_eq!(coordinator.on_proposal(rebid), ProposalVerdict::Accepted);

    let mut won = false;
    for n in 3..=10 {
        let timestamp = format!("t{n}");
        let mut out = Outbox::new();
        coordinator.on_tick(&Tick::new(timestamp.clone()), &mut out);
        let produced = relay_to_workers(&mut out, &mut workers);
        won |= produced
            .iter()
            .any(|c| matches!(c, Command::ScheduleCompletion { .. }));
        for bid in proposals(&produced) {
            let _ = coordinator.on_proposal(bid);
        }
        let mut status = Outbox::new();
        workers
            .first_mut()
            .unwrap()
            .on_tick(&Tick::new(timestamp), &mut status);
        if won {
            break;
        }
    }
    assert!(won);
    assert_eq!(workers.first().unwrap().robot().status(), RobotStatus::Busy);
    assert!(coordinator.awards_issued() >= 1);
}

#[test]
fn busy_robot_never_holds_two_jobs() {
    let config = DepotConfig::default();
    let mut coordinator = Coordinator::new(config.coordinator_settings().unwrap());
    let mut workers = vec![worker(&config, "roboter-1")];

    let mut jobs: usize = 0;
    for n in 1..=6 {
        let mut out = Outbox::new();
        coordinator.on_tick(&Tick::new(format!("t{n}")), &mut out);
        let produced = relay_to_workers(&mut out, &mut workers);
        let scheduled = produced
            .iter()
            .filter(|c| matches!(c, Command::ScheduleCompletion { .. }))
            .count();
        jobs = jobs.saturating_add(scheduled);
        for bid in proposals(&produced) {
            let _ = coordinator.on_proposal(bid);
        }
    }
    // Without completions the robot stays busy after its first award.
    assert_eq!(jobs, 1);
    let robot = workers.first().unwrap().robot();
    assert_eq!(robot.status(), RobotStatus::Busy);
    assert!(robot.current_job().is_some());
}
