mod common;

use std::thread;
use std::time::Duration;

use common::*;
use lkv_client::{ClientError, Context, Pool, PoolConfig, PoolStats};

fn noop_handler(_: usize, _: usize, _: Vec<Vec<u8>>, _: &mut std::net::TcpStream) {}

#[test]
fn idle_connection_is_reused_lifo() {
    let server = spawn_server(1, noop_handler);
    let config = PoolConfig::new(&server.addr).max_idle(1).max_open(1).min_idle(0);
    let pool = Pool::new(config).expect("pool");
    let ctx = Context::background();

    let conn = pool.get(&ctx).expect("first get");
    server.wait_accepted(1);
    pool.put(conn).expect("put");
    assert_eq!(pool.stats(), PoolStats { open: 1, idle: 1 });

    // Same underlying connection comes back: the server accepted only once.
    let conn = pool.get(&ctx).expect("second get");
    assert_eq!(server.accepted(), 1);

    // At the ceiling with nothing idle, acquisition fails fast.
    let err = pool.get(&ctx).unwrap_err();
    assert!(matches!(err, ClientError::PoolExhausted));

    pool.put(conn).expect("put back");
}

#[test]
fn open_count_respects_the_ceiling() {
    let server = spawn_server(2, noop_handler);
    let config = PoolConfig::new(&server.addr).max_idle(1).max_open(2).min_idle(0);
    let pool = Pool::new(config).expect("pool");
    let ctx = Context::background();

    let first = pool.get(&ctx).expect("get");
    let second = pool.get(&ctx).expect("get");
    server.wait_accepted(2);
    assert_eq!(pool.stats(), PoolStats { open: 2, idle: 0 });
    assert!(matches!(pool.get(&ctx), Err(ClientError::PoolExhausted)));

    // The ring holds one entry; the second return closes its connection.
    pool.put(first).expect("put");
    pool.put(second).expect("put");
    assert_eq!(pool.stats(), PoolStats { open: 1, idle: 1 });
    assert_eq!(server.accepted(), 2);
}

#[test]
fn discard_releases_the_open_slot() {
    let server = spawn_server(2, noop_handler);
    let config = PoolConfig::new(&server.addr).max_idle(1).max_open(1).min_idle(0);
    let pool = Pool::new(config).expect("pool");
    let ctx = Context::background();

    let conn = pool.get(&ctx).expect("get");
    pool.discard(conn).expect("discard");
    assert_eq!(pool.stats(), PoolStats { open: 0, idle: 0 });

    // The freed slot admits a fresh dial.
    let conn = pool.get(&ctx).expect("get");
    server.wait_accepted(2);
    pool.put(conn).expect("put");
}

#[test]
fn evictor_closes_stale_idles() {
    let server = spawn_server(2, noop_handler);
    let config = PoolConfig::new(&server.addr)
        .max_idle(2)
        .min_idle(0)
        .idle_timeout(Duration::from_millis(20));
    let pool = Pool::new(config).expect("pool");
    let ctx = Context::background();

    pool.start().expect("start");
    let conn = pool.get(&ctx).expect("get");
    pool.put(conn).expect("put");
    assert_eq!(pool.stats().idle, 1);

    thread::sleep(Duration::from_millis(300));
    assert_eq!(pool.stats(), PoolStats { open: 0, idle: 0 });

    // A later acquisition dials fresh.
    let conn = pool.get(&ctx).expect("get");
    server.wait_accepted(2);
    pool.put(conn).expect("put");
    pool.close().expect("close");
}

#[test]
fn warm_floor_survives_eviction() {
    let server = spawn_server(2, noop_handler);
    let config = PoolConfig::new(&server.addr)
        .max_idle(4)
        .min_idle(2)
        .idle_timeout(Duration::from_millis(20));
    let pool = Pool::new(config).expect("pool");

    pool.start().expect("start");
    server.wait_accepted(2);
    assert_eq!(pool.stats(), PoolStats { open: 2, idle: 2 });

    // Both entries age past the timeout but sit at the warm floor.
    thread::sleep(Duration::from_millis(300));
    assert_eq!(pool.stats(), PoolStats { open: 2, idle: 2 });
    assert_eq!(server.accepted(), 2);

    pool.close().expect("close");
    assert_eq!(pool.stats(), PoolStats { open: 0, idle: 0 });
}

#[test]
fn close_drains_every_idle() {
    let server = spawn_server(2, noop_handler);
    let config = PoolConfig::new(&server.addr).max_idle(2).max_open(2).min_idle(0);
    let pool = Pool::new(config).expect("pool");
    let ctx = Context::background();

    let first = pool.get(&ctx).expect("get");
    let second = pool.get(&ctx).expect("get");
    pool.put(first).expect("put");
    pool.put(second).expect("put");
    assert_eq!(pool.stats(), PoolStats { open: 2, idle: 2 });

    pool.close().expect("close");
    assert_eq!(pool.stats(), PoolStats { open: 0, idle: 0 });
}

#[test]
fn cancelled_context_fails_before_dialing() {
    let server = spawn_server(1, noop_handler);
    let config = PoolConfig::new(&server.addr).max_idle(1).min_idle(0);
    let pool = Pool::new(config).expect("pool");

    let (ctx, token) = Context::background().cancellable();
    token.cancel();

    let err = pool.get(&ctx).unwrap_err();
    assert!(matches!(err, ClientError::Cancelled { can_reuse: true }));
    assert_eq!(server.accepted(), 0);
    assert_eq!(pool.stats(), PoolStats { open: 0, idle: 0 });
}
