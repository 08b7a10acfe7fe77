//! Origin-side failures and how the proxy recovers from them.

use http::{Method, StatusCode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

mod common;
use common::{
    config_for, ok, start_origin, start_origin_at, start_proxy, unused_addr, RawClient, Reply,
};

#[tokio::test]
async fn unreachable_origin_drops_client_silently() {
    let proxy = start_proxy(config_for(unused_addr().await, 10)).await;

    let mut client = RawClient::connect(proxy.addr).await;
    client.send(b"GET /foo HTTP/1.1\r\nHost: proxy\r\n\r\n").await;

    let rest = tokio::time::timeout(Duration::from_secs(5), client.drain())
        .await
        .expect("proxy should close the connection");
    assert!(rest.is_empty());
    assert_eq!(proxy.state.stats.get("/foo"), None);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn stale_pooled_backend_fails_once_then_redials() {
    // The origin answers and hangs up without announcing it, so the
    // pooled backend is dead by the time it is reused.
    let origin = start_origin(|_, _| Reply::then_close(ok("once"))).await;
    let proxy = start_proxy(config_for(origin.addr, 10)).await;

    let mut first = RawClient::connect(proxy.addr).await;
    let res = first.exchange(b"GET /a HTTP/1.1\r\n\r\n", Method::GET).await;
    assert_eq!(&res.body[..], b"once");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(proxy.state.pool.idle_count(), 1);

    let mut second = RawClient::connect(proxy.addr).await;
    second.send(b"GET /b HTTP/1.1\r\n\r\n").await;
    assert!(second.drain().await.is_empty());
    assert_eq!(proxy.state.pool.idle_count(), 0, "dead backend must be closed");

    let mut third = RawClient::connect(proxy.addr).await;
    let res = third.exchange(b"GET /c HTTP/1.1\r\n\r\n", Method::GET).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(origin.connections(), 2);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn malformed_origin_response_terminates_client() {
    let origin = start_origin(|n, _| {
        if n == 1 {
            Reply::keep(b"NOT HTTP AT ALL\r\n\r\n".to_vec())
        } else {
            Reply::keep(ok("fine"))
        }
    })
    .await;
    let proxy = start_proxy(config_for(origin.addr, 10)).await;

    let mut client = RawClient::connect(proxy.addr).await;
    client.send(b"GET /bad HTTP/1.1\r\n\r\n").await;
    assert!(client.drain().await.is_empty());
    assert_eq!(proxy.state.stats.get("/bad"), None);

    let mut client = RawClient::connect(proxy.addr).await;
    let res = client.exchange(b"GET /good HTTP/1.1\r\n\r\n", Method::GET).await;
    assert_eq!(&res.body[..], b"fine");
    assert_eq!(origin.connections(), 2, "broken backend must not be reused");

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn origin_recovers_after_outage() {
    let addr = unused_addr().await;
    let proxy = start_proxy(config_for(addr, 10)).await;

    let mut client = RawClient::connect(proxy.addr).await;
    client.send(b"GET /x HTTP/1.1\r\n\r\n").await;
    assert!(client.drain().await.is_empty());

    let origin = start_origin_at(addr, |_, _| Reply::keep(ok("back"))).await;

    let mut client = RawClient::connect(proxy.addr).await;
    let res = client.exchange(b"GET /x HTTP/1.1\r\n\r\n", Method::GET).await;
    assert_eq!(&res.body[..], b"back");
    assert_eq!(origin.connections(), 1);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn origin_dying_mid_body_closes_client() {
    let origin = start_origin(|_, _| {
        Reply::then_close(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial".to_vec())
    })
    .await;
    let proxy = start_proxy(config_for(origin.addr, 10)).await;

    let mut client = RawClient::connect(proxy.addr).await;
    client.send(b"GET /cut HTTP/1.1\r\n\r\n").await;
    assert!(client.drain().await.is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(proxy.state.pool.idle_count(), 0);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn interim_response_does_not_leak_to_next_client() {
    let origin = start_origin(|n, _| {
        if n == 1 {
            Reply::keep(
                b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nSECRET"
                    .to_vec(),
            )
        } else {
            Reply::keep(ok("bob!!"))
        }
    })
    .await;
    let proxy = start_proxy(config_for(origin.addr, 1)).await;

    let mut alice = RawClient::connect(proxy.addr).await;
    let res = alice
        .exchange(
            b"POST /alice HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 5\r\n\r\nhello",
            Method::POST,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(&res.body[..], b"SECRET");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut bob = RawClient::connect(proxy.addr).await;
    let res = bob.exchange(b"GET /bob HTTP/1.1\r\n\r\n", Method::GET).await;
    assert_eq!(&res.body[..], b"bob!!");
    assert_eq!(origin.connections(), 1);

    proxy.shutdown.trigger();
}

/// Read from `socket` until `buf` ends with `terminator`.
async fn read_until_suffix(socket: &mut tokio::net::TcpStream, buf: &mut Vec<u8>, terminator: &[u8]) {
    let mut chunk = [0u8; 1024];
    while !buf.ends_with(terminator) {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "proxy closed before sending the full request");
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[tokio::test]
async fn chunked_request_with_content_length_stays_in_sync() {
    // Raw origin that sees exactly what the proxy puts on the wire.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin_addr = listener.local_addr().unwrap();
    let forwarded = Arc::new(Mutex::new(Vec::new()));
    let seen = forwarded.clone();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut first = Vec::new();
        read_until_suffix(&mut socket, &mut first, b"0\r\n\r\n").await;
        *seen.lock().unwrap() = first;
        socket.write_all(&ok("one")).await.unwrap();

        let mut second = Vec::new();
        read_until_suffix(&mut socket, &mut second, b"\r\n\r\n").await;
        assert!(second.starts_with(b"GET /next "));
        socket.write_all(&ok("two")).await.unwrap();

        let mut rest = [0u8; 16];
        let _ = socket.read(&mut rest).await;
    });
    let proxy = start_proxy(config_for(origin_addr, 1)).await;

    let mut client = RawClient::connect(proxy.addr).await;
    let res = client
        .exchange(
            b"POST /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\nContent-Length: 3\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
            Method::POST,
        )
        .await;
    assert_eq!(&res.body[..], b"one");

    let wire = String::from_utf8(forwarded.lock().unwrap().clone()).unwrap();
    assert!(!wire.to_ascii_lowercase().contains("content-length"), "{wire:?}");
    assert!(wire.ends_with("5\r\nhello\r\n0\r\n\r\n"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let res = client.exchange(b"GET /next HTTP/1.1\r\n\r\n", Method::GET).await;
    assert_eq!(&res.body[..], b"two");

    proxy.shutdown.trigger();
}
