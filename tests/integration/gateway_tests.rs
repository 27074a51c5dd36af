//! End-to-end tests of the gateway facade over the mock endpoint.

use std::pin::pin;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use futures_lite::future;
use sawgate::alarms::AlarmRule;
use sawgate::app::events::ChangeEvent;
use sawgate::error::{InterlockReason, ProtocolError};
use sawgate::protocol::session::SessionState;
use sawgate::protocol::tags::{Tag, TagValue};
use sawgate::{Command, Gateway, GatewayError, MachineStatus, Material};

use crate::mock_endpoint::{
    MachineHandle, RecordingSink, SteppingClock, mock_machine, test_config, wait_until,
};

fn start() -> (Gateway, MachineHandle, RecordingSink) {
    let config = test_config();
    let (endpoint, machine) = mock_machine(&config.tags);
    let sink = RecordingSink::default();
    let gw = Gateway::spawn_with_clock(config, endpoint, sink.clone(), SteppingClock::default())
        .expect("gateway starts");
    wait_until("initial snapshot", || gw.get_state().is_ok());
    (gw, machine, sink)
}

fn push_and_wait(gw: &Gateway, machine: &MachineHandle, tag: Tag, value: f64) {
    machine.push(tag, TagValue::Float(value));
    wait_until("value to publish", || match (tag, gw.get_state()) {
        (Tag::PowerConsumption, Ok(s)) => s.power_consumption == value,
        (Tag::Temperature, Ok(s)) => s.temperature == value,
        (Tag::BladeWear, Ok(s)) => s.blade_wear == value,
        (Tag::CuttingSpeed, Ok(s)) => s.cutting_speed == value,
        _ => false,
    });
}

fn set_running(gw: &Gateway, machine: &MachineHandle) {
    machine.push(Tag::State, TagValue::Text("running".into()));
    wait_until("running", || gw.get_state().is_ok_and(|s| s.state == MachineStatus::Running));
}

#[test]
fn initial_read_builds_state() {
    let (gw, _machine, sink) = start();
    let s = gw.get_state().unwrap();
    assert_eq!(s.state, MachineStatus::Inactive);
    assert_eq!(s.temperature, 22.0);
    assert_eq!(s.current_material, Material::Steel);
    assert!(s.safety_barrier);
    assert_eq!(gw.session_status(), SessionState::Connected);
    assert!(
        sink.events()
            .iter()
            .any(|e| *e == ChangeEvent::SessionChanged(SessionState::Connected))
    );
}

#[test]
fn start_in_alarm_is_refused_without_writes() {
    let (gw, machine, _) = start();
    set_running(&gw, &machine);
    machine.push(Tag::PowerConsumption, TagValue::Float(11.0));
    wait_until("alarm", || gw.get_state().is_ok_and(|s| s.state == MachineStatus::Alarm));

    let err = gw.submit_command_blocking(Command::Start).unwrap_err();
    match err {
        GatewayError::InterlockViolation(v) => {
            assert_eq!(v.state, MachineStatus::Alarm);
            assert_eq!(v.reason, InterlockReason::IllegalTransition);
        }
        other => panic!("expected interlock violation, got {other:?}"),
    }
    assert!(machine.writes().is_empty());
}

#[test]
fn power_rise_and_reset_end_to_end() {
    let (gw, machine, sink) = start();
    set_running(&gw, &machine);

    push_and_wait(&gw, &machine, Tag::PowerConsumption, 7.0);
    assert!(gw.get_active_alerts().is_empty());
    assert_eq!(gw.get_state().unwrap().state, MachineStatus::Running);

    push_and_wait(&gw, &machine, Tag::PowerConsumption, 9.0);
    let active = gw.get_active_alerts();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].rule, AlarmRule::PowerWarn);
    assert_eq!(gw.get_state().unwrap().state, MachineStatus::Running);

    push_and_wait(&gw, &machine, Tag::PowerConsumption, 11.0);
    let rules: Vec<_> = gw.get_active_alerts().iter().map(|a| a.rule).collect();
    assert!(rules.contains(&AlarmRule::PowerWarn));
    assert!(rules.contains(&AlarmRule::PowerHigh));
    assert_eq!(gw.get_state().unwrap().state, MachineStatus::Alarm);

    push_and_wait(&gw, &machine, Tag::PowerConsumption, 7.0);
    assert_eq!(gw.get_state().unwrap().state, MachineStatus::Alarm);
    assert_eq!(gw.get_active_alerts().len(), 2);

    let ack = gw.submit_command_blocking(Command::Reset).unwrap();
    assert_eq!(ack.state, MachineStatus::Inactive);
    assert_eq!(gw.get_state().unwrap().state, MachineStatus::Inactive);
    assert!(gw.get_active_alerts().is_empty());
    assert_eq!(gw.get_alerts().len(), 2);
    assert_eq!(machine.writes(), vec![(Tag::Reset, TagValue::Bool(true))]);

    let cleared: Vec<_> = sink.alert_changes().into_iter().filter(|a| !a.active).collect();
    assert_eq!(cleared.len(), 2);
    assert_eq!(gw.get_alert_history(0).len(), 4);
}

#[test]
fn reset_refused_while_temperature_still_high() {
    let (gw, machine, _) = start();
    set_running(&gw, &machine);
    push_and_wait(&gw, &machine, Tag::Temperature, 52.0);
    push_and_wait(&gw, &machine, Tag::Temperature, 45.0);

    match gw.submit_command_blocking(Command::Reset) {
        Err(GatewayError::InterlockViolation(v)) => {
            assert_eq!(v.reason, InterlockReason::ConditionActive(vec!["temp-high"]));
        }
        other => panic!("expected interlock violation, got {other:?}"),
    }
    assert!(machine.writes().is_empty());

    push_and_wait(&gw, &machine, Tag::Temperature, 38.0);
    assert!(gw.submit_command_blocking(Command::Reset).is_ok());
    assert_eq!(gw.get_state().unwrap().state, MachineStatus::Inactive);
}

#[test]
fn reset_refused_while_barrier_open_on_running_machine() {
    let (gw, machine, _) = start();
    set_running(&gw, &machine);
    machine.push(Tag::SafetyBarrier, TagValue::Bool(false));
    wait_until("alarm", || gw.get_state().is_ok_and(|s| s.state == MachineStatus::Alarm));

    match gw.submit_command_blocking(Command::Reset) {
        Err(GatewayError::InterlockViolation(v)) => {
            assert_eq!(v.reason, InterlockReason::ConditionActive(vec!["barrier-open"]));
        }
        other => panic!("expected interlock violation, got {other:?}"),
    }
    assert!(machine.writes().is_empty());
    assert!(gw.get_active_alerts().iter().any(|a| a.rule == AlarmRule::BarrierOpen));

    // Once the machine has stopped, the open barrier no longer blocks.
    machine.push(Tag::State, TagValue::Text("inactive".into()));
    push_and_wait(&gw, &machine, Tag::CuttingSpeed, 0.5);
    let ack = gw.submit_command_blocking(Command::Reset).unwrap();
    assert_eq!(ack.state, MachineStatus::Inactive);
    assert!(gw.get_active_alerts().is_empty());
    assert_eq!(machine.writes(), vec![(Tag::Reset, TagValue::Bool(true))]);
}

#[test]
fn fault_still_reported_after_reset_stays_latched() {
    let (gw, machine, _) = start();
    machine.set_persistent_fault(true);
    machine.push(Tag::State, TagValue::Text("error".into()));
    wait_until("error", || gw.get_state().is_ok_and(|s| s.state == MachineStatus::Error));

    let ack = gw.submit_command_blocking(Command::Reset).unwrap();
    assert_eq!(ack.state, MachineStatus::Error);
    assert_eq!(gw.get_state().unwrap().state, MachineStatus::Error);
    assert!(gw.get_active_alerts().iter().any(|a| a.rule == AlarmRule::HardwareFault));

    machine.set_persistent_fault(false);
    let ack = gw.submit_command_blocking(Command::Reset).unwrap();
    assert_eq!(ack.state, MachineStatus::Inactive);
    assert_eq!(gw.get_state().unwrap().state, MachineStatus::Inactive);
    assert!(gw.get_active_alerts().is_empty());
    assert_eq!(machine.writes().len(), 2);
}

#[test]
fn concurrent_submissions_apply_in_enqueue_order() {
    let (gw, machine, _) = start();
    machine.set_write_delay(Duration::from_millis(30));
    let enqueued = Mutex::new(Vec::new());

    thread::scope(|scope| {
        for i in 0..6 {
            let (gw, enqueued) = (&gw, &enqueued);
            scope.spawn(move || {
                let material = Material::ALL[i % Material::ALL.len()];
                let mut reply = pin!(gw.submit_command(Command::SetMaterial(material)));
                // The first poll enqueues; record the order under the same lock.
                let early = {
                    let mut enqueued = enqueued.lock().unwrap();
                    let early = future::block_on(future::poll_once(reply.as_mut()));
                    enqueued.push(material.canonical_name());
                    early
                };
                let result = match early {
                    Some(result) => result,
                    None => future::block_on(reply),
                };
                assert!(result.is_ok(), "{material:?}: {result:?}");
            });
        }
    });

    let expected: Vec<_> = enqueued
        .into_inner()
        .unwrap()
        .into_iter()
        .map(|name| (Tag::CurrentMaterial, TagValue::Text(name.into())))
        .collect();
    assert_eq!(expected.len(), 6);
    assert_eq!(machine.writes(), expected);
}

#[test]
fn full_queue_is_service_unavailable() {
    let mut config = test_config();
    config.command_timeout_ms = 10_000;
    let (endpoint, machine) = mock_machine(&config.tags);
    let gw = Gateway::spawn(config, endpoint, RecordingSink::default()).unwrap();
    wait_until("initial snapshot", || gw.get_state().is_ok());
    machine.set_write_delay(Duration::from_millis(100));

    let (mut accepted, mut refused) = (0, 0);
    for i in 0..20 {
        let command = Command::SetMaterial(Material::ALL[i % Material::ALL.len()]);
        match future::block_on(future::poll_once(gw.submit_command(command))) {
            None => accepted += 1,
            Some(Err(GatewayError::ServiceUnavailable)) => refused += 1,
            Some(other) => panic!("unexpected outcome {other:?}"),
        }
    }
    // Eight queued, plus possibly one already taken by the I/O thread.
    assert!((8..=9).contains(&accepted), "accepted {accepted}");
    assert_eq!(accepted + refused, 20);

    // Abandoned callers do not cancel queued commands.
    wait_until("queued writes", || machine.writes().len() == accepted);
}

#[test]
fn commands_write_expected_tags_in_order() {
    let (gw, machine, _) = start();
    gw.submit_command_blocking(Command::SetMaterial(Material::Wood)).unwrap();
    gw.submit_command_blocking(Command::Start).unwrap();
    gw.submit_command_blocking(Command::ToggleBarrier).unwrap();
    assert_eq!(
        machine.writes(),
        vec![
            (Tag::CurrentMaterial, TagValue::Text("Wood".into())),
            (Tag::Run, TagValue::Bool(true)),
            (Tag::SafetyBarrier, TagValue::Bool(false)),
        ]
    );
}

#[test]
fn illegal_stop_from_inactive() {
    let (gw, machine, _) = start();
    assert!(matches!(
        gw.submit_command_blocking(Command::Stop),
        Err(GatewayError::InterlockViolation(_))
    ));
    assert!(machine.writes().is_empty());
}

#[test]
fn degraded_session_is_service_unavailable() {
    let (gw, machine, _) = start();
    push_and_wait(&gw, &machine, Tag::CuttingSpeed, 40.0);

    machine.set_online(false);
    wait_until("degraded", || matches!(gw.session_status(), SessionState::Degraded { .. }));

    assert_eq!(gw.get_state(), Err(GatewayError::ServiceUnavailable));
    assert_eq!(
        gw.submit_command_blocking(Command::Start),
        Err(GatewayError::ServiceUnavailable)
    );
    assert!(!gw.get_metrics().is_empty());
    assert!(machine.writes().is_empty());

    machine.set_online(true);
    wait_until("reconnected", || gw.get_state().is_ok());
    assert!(machine.connects() >= 2);
}

#[test]
fn slow_write_times_out() {
    let mut config = test_config();
    config.command_timeout_ms = 50;
    let (endpoint, machine) = mock_machine(&config.tags);
    let gw = Gateway::spawn(config, endpoint, RecordingSink::default()).unwrap();
    wait_until("initial snapshot", || gw.get_state().is_ok());

    machine.set_write_delay(Duration::from_millis(300));
    assert_eq!(gw.submit_command_blocking(Command::Start), Err(GatewayError::Timeout));

    // Not cancelable once dispatched: the write still lands.
    wait_until("late write", || !machine.writes().is_empty());
}

#[test]
fn rejected_write_surfaces_protocol_error() {
    let (gw, machine, _) = start();
    machine.set_reject_writes(true);
    match gw.submit_command_blocking(Command::Start) {
        Err(GatewayError::Protocol(ProtocolError::Rejected { .. })) => {}
        other => panic!("expected rejected write, got {other:?}"),
    }
    assert_eq!(gw.session_status(), SessionState::Connected);
}

#[test]
fn metrics_window_stays_bounded() {
    let (gw, machine, _) = start();
    for i in 0..70 {
        machine.push(Tag::CuttingSpeed, TagValue::Float(f64::from(i) + 1.0));
    }
    wait_until("last sample", || gw.get_metrics().last().is_some_and(|m| m.speed == 70.0));
    let metrics = gw.get_metrics();
    assert_eq!(metrics.len(), 60);
    assert!(metrics.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(gw.get_metrics_summary().speed.max, 70.0);
}

#[test]
fn shutdown_closes_session() {
    let (mut gw, _machine, sink) = start();
    gw.shutdown();
    assert_eq!(gw.session_status(), SessionState::Disconnected);
    assert!(
        sink.events()
            .iter()
            .any(|e| *e == ChangeEvent::SessionChanged(SessionState::Disconnected))
    );
    gw.shutdown();
}
