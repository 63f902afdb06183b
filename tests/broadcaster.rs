//! Broadcaster semantics: role-scoped channels, permission checks on
//! subscribe, pruning of broken connections and per-connection ordering.

mod common;

use bytes::Bytes;

use common::{at, employee, harness, scan};
use hrm_sync::model::{ChangeEvent, ChangeKind};
use hrm_sync::realtime::{Broadcaster, Role, SubscribeError, channel_allowed, channels};

#[tokio::test]
async fn employee_only_sees_own_channel() {
    let b = Broadcaster::new();
    let mut own = b.connect("own".into(), Role::Employee, Some(7)).await;
    let mut other = b.connect("other".into(), Role::Employee, Some(8)).await;

    b.broadcast(&channels::attendance_employee(7), Bytes::from_static(b"x"))
        .await;

    assert!(own.try_recv().is_ok());
    assert!(other.try_recv().is_err());
}

#[tokio::test]
async fn unauthorized_subscribe_is_rejected_and_undelivered() {
    let b = Broadcaster::new();
    let mut rx = b.connect("emp".into(), Role::Employee, Some(7)).await;

    let err = b.subscribe("emp", channels::ATTENDANCE_ALL).await.unwrap_err();
    assert_eq!(
        err,
        SubscribeError::Denied(channels::ATTENDANCE_ALL.to_string())
    );

    b.broadcast(channels::ATTENDANCE_ALL, Bytes::from_static(b"x"))
        .await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn employee_may_not_claim_another_employees_channel() {
    assert!(channel_allowed(Role::Employee, Some(7), &channels::attendance_employee(7)));
    assert!(!channel_allowed(Role::Employee, Some(7), &channels::attendance_employee(8)));
    assert!(!channel_allowed(Role::Employee, Some(7), channels::DEVICES_ALL));
    assert!(!channel_allowed(Role::Employee, None, &channels::attendance_employee(7)));
    assert!(channel_allowed(Role::Manager, None, channels::ATTENDANCE_ALL));
}

#[tokio::test]
async fn manager_connect_seeds_attendance_and_devices() {
    let b = Broadcaster::new();
    let mut rx = b.connect("mgr".into(), Role::Manager, None).await;

    b.broadcast(channels::ATTENDANCE_ALL, Bytes::from_static(b"a"))
        .await;
    b.broadcast(channels::DEVICES_ALL, Bytes::from_static(b"d"))
        .await;

    assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"a"));
    assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"d"));
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let b = Broadcaster::new();
    let mut rx = b.connect("mgr".into(), Role::Manager, None).await;

    b.unsubscribe("mgr", channels::ATTENDANCE_ALL).await.unwrap();
    b.broadcast(channels::ATTENDANCE_ALL, Bytes::from_static(b"x"))
        .await;

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn broken_connection_is_pruned_without_aborting_broadcast() {
    let b = Broadcaster::new();
    let rx_dead = b.connect("dead".into(), Role::Admin, None).await;
    let mut rx_live = b.connect("live".into(), Role::Admin, None).await;
    drop(rx_dead);

    let delivered = b
        .broadcast(channels::ATTENDANCE_ALL, Bytes::from_static(b"x"))
        .await;

    assert_eq!(delivered, 1);
    assert!(rx_live.try_recv().is_ok());
    assert_eq!(b.connection_count().await, 1);
}

#[tokio::test]
async fn delivery_is_fifo_per_connection() {
    let b = Broadcaster::new();
    let mut rx = b.connect("mgr".into(), Role::Manager, None).await;

    for i in 0u8..20 {
        b.broadcast(channels::ATTENDANCE_ALL, Bytes::from(vec![i])).await;
    }
    for i in 0u8..20 {
        assert_eq!(rx.try_recv().unwrap(), Bytes::from(vec![i]));
    }
}

#[tokio::test]
async fn change_event_fans_out_to_both_attendance_channels() {
    let h = harness(vec![employee(1, 34, true)]);
    let mut admin = h.broadcaster.connect("adm".into(), Role::Admin, None).await;
    let mut owner = h
        .broadcaster
        .connect("own".into(), Role::Employee, Some(1))
        .await;
    let mut stranger = h
        .broadcaster
        .connect("str".into(), Role::Employee, Some(2))
        .await;

    h.engine
        .reconcile(1, vec![scan(34, at("08:12:00"))], chrono::Duration::days(1))
        .await
        .unwrap();

    let event: ChangeEvent = serde_json::from_slice(&admin.try_recv().unwrap()).unwrap();
    assert_eq!(event.kind, ChangeKind::Created);
    assert!(owner.try_recv().is_ok());
    assert!(stranger.try_recv().is_err());
}

#[tokio::test]
async fn disconnect_drops_all_state() {
    let b = Broadcaster::new();
    let _rx = b.connect("mgr".into(), Role::Manager, None).await;
    assert_eq!(b.connection_count().await, 1);

    b.disconnect("mgr").await;
    assert_eq!(b.connection_count().await, 0);
    assert!(matches!(
        b.subscribe("mgr", channels::ATTENDANCE_ALL).await,
        Err(SubscribeError::UnknownConnection(_))
    ));
}
