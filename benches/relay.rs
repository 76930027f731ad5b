#![allow(clippy::all)]
//! Benchmarks for the datagram relay and stream accept loop.
//!
//! Tests: UDP echo round trips through a virtual connection, new-peer
//! setup cost, TCP echo round trips for comparison.

mod common;

use common::harness::{bench_runtime, payload, start_echo};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

// ─── UDP echo through an established peer ────────────────────────────────────

fn bench_udp_echo(c: &mut Criterion) {
    let mut group = c.benchmark_group("relay/udp_echo");
    let rt = bench_runtime();
    let (server, addr) = start_echo(&rt, "udp");

    let peer = rt.block_on(async {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        peer.connect(addr).await.unwrap();
        peer
    });

    for size in [64usize, 512, 1400] {
        let data = payload(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            let mut buf = vec![0u8; 2048];
            b.iter(|| {
                rt.block_on(async {
                    peer.send(data).await.unwrap();
                    let len = peer.recv(&mut buf).await.unwrap();
                    black_box(len);
                });
            });
        });
    }

    group.finish();
    rt.block_on(server.stop()).unwrap();
}

// ─── New peer: virtual connection setup and first reply ──────────────────────

fn bench_udp_new_peer(c: &mut Criterion) {
    let mut group = c.benchmark_group("relay/udp_new_peer");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    let rt = bench_runtime();
    let (server, addr) = start_echo(&rt, "udp");
    let data = payload(32);

    group.bench_function("first_round_trip", |b| {
        let mut buf = [0u8; 64];
        b.iter(|| {
            rt.block_on(async {
                let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
                peer.send_to(&data, addr).await.unwrap();
                let (len, _) = peer.recv_from(&mut buf).await.unwrap();
                black_box(len);
            });
        });
    });

    group.finish();
    rt.block_on(server.stop()).unwrap();
}

// ─── TCP echo for comparison ─────────────────────────────────────────────────

fn bench_tcp_echo(c: &mut Criterion) {
    let mut group = c.benchmark_group("relay/tcp_echo");
    let rt = bench_runtime();
    let (server, addr) = start_echo(&rt, "tcp");

    let mut stream = rt.block_on(TcpStream::connect(addr)).unwrap();
    stream.set_nodelay(true).unwrap();

    for size in [64usize, 512, 1400] {
        let data = payload(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            let mut buf = vec![0u8; size];
            b.iter(|| {
                rt.block_on(async {
                    stream.write_all(data).await.unwrap();
                    stream.read_exact(&mut buf).await.unwrap();
                    black_box(&buf);
                });
            });
        });
    }

    group.finish();
    drop(stream);
    rt.block_on(server.stop()).unwrap();
}

criterion_group!(benches, bench_udp_echo, bench_udp_new_peer, bench_tcp_echo);
criterion_main!(benches);
