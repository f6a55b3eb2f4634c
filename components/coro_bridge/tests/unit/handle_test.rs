//! Unit tests for the handle bridge

use async_runtime::{EventLoop, Promise};
use coro_bridge::{BridgeError, Handle, HandleBridge};
use core_types::Value;

#[test]
fn promise_handle_identity_is_stable() {
    let host = EventLoop::new();
    let bridge = HandleBridge::new();
    let promise = Promise::new(&host);

    let a = bridge.to_handle(promise.to_value());
    let b = bridge.to_handle(promise.to_value());
    assert_eq!(a, b);

    let back = bridge.to_value(a).unwrap();
    assert_eq!(back.as_object().and_then(Promise::from_object), Some(promise));
}

#[test]
fn clones_share_one_table() {
    let bridge = HandleBridge::new();
    let other = bridge.clone();
    let h = bridge.to_handle(Value::from("shared"));
    assert_eq!(other.take(h).unwrap(), Value::from("shared"));
    assert!(bridge.is_empty());
}

#[test]
fn release_from_inside_a_host_callback() {
    let host = EventLoop::new();
    let bridge = HandleBridge::new();
    let (promise, resolve, _) = Promise::with_resolvers(&host);
    let h = bridge.to_handle(Value::Smi(1));

    let inner = bridge.clone();
    promise.subscribe(
        move |v| {
            let fresh = inner.to_handle(v);
            inner.release(h).unwrap();
            inner.release(fresh).unwrap();
        },
        |_| {},
    );
    resolve.resolve(Value::Smi(2));
    host.run_until_done().unwrap();
    assert!(bridge.is_empty());
}

#[test]
fn clear_invalidates_everything() {
    let bridge = HandleBridge::new();
    let h = bridge.to_handle(Value::Smi(1));
    bridge.retain(h).unwrap();
    bridge.clear();
    assert_eq!(bridge.to_value(h), Err(BridgeError::InvalidHandle(h)));
    assert_eq!(bridge.to_value(Handle::UNDEFINED), Ok(Value::Undefined));
}
