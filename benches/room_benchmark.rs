use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;

use rendezvous::delivery::{DeliveryChannel, DeliveryError, Payload, SessionToken};
use rendezvous::{ClientId, Coordinator, MemoryRoomStore, RandomUserIds, Room, RoomName, UserId};

/// Accepts every send without doing anything
struct NullChannel;

impl DeliveryChannel for NullChannel {
    fn open(&self, _: &ClientId) -> Result<SessionToken, DeliveryError> {
        Ok(SessionToken::from("bench"))
    }

    fn send(&self, _: &ClientId, _: &Payload) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// state machine benchmark
fn bench_room(c: &mut Criterion) {
    let name = RoomName::new("alpha").unwrap();
    let u1 = UserId::new("U1").unwrap();
    let u2 = UserId::new("U2").unwrap();

    let mut group = c.benchmark_group("Room");
    group.throughput(Throughput::Elements(1));

    group.bench_function("pair_connect_leave", |b| {
        b.iter(|| {
            let mut room = Room::new(name.clone());
            room.add_occupant(u1.clone());
            room.add_occupant(u2.clone());
            room.mark_connected(black_box(&u1));
            black_box(room.other_occupant(&u1));
            room.remove_occupant(&u1);
            black_box(room.remove_occupant(&u2))
        })
    });

    group.finish();
}

/// client identity parsing benchmark
fn bench_client_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("ClientId");
    group.throughput(Throughput::Elements(1));

    group.bench_function("parse", |b| {
        b.iter(|| black_box("K3J9QX0ZPA@curious-otter").parse::<ClientId>().unwrap())
    });

    group.finish();
}

/// full event cycle through the coordinator
fn bench_coordinator(c: &mut Criterion) {
    let mut coordinator = Coordinator::new(
        MemoryRoomStore::new(),
        NullChannel,
        Box::new(RandomUserIds::seeded(0, 10)),
    );
    let name = RoomName::new("alpha").unwrap();
    let offer = json!({"type": "offer", "sdp": "v=0"});

    let mut group = c.benchmark_group("Coordinator");
    group.throughput(Throughput::Elements(1));

    group.bench_function("join_connect_relay_leave", |b| {
        b.iter(|| {
            let a = coordinator.join(name.clone()).unwrap().client.to_string();
            let z = coordinator.join(name.clone()).unwrap().client.to_string();
            coordinator.peer_connected(&a).unwrap();
            coordinator.relay_message(&a, black_box(offer.clone())).unwrap();
            coordinator.peer_disconnected(&a).unwrap();
            coordinator.peer_disconnected(&z).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_room, bench_client_id, bench_coordinator);
criterion_main!(benches);
