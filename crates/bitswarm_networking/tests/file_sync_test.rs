//! # File Sync Integration Tests
//!
//! Content-addressed delivery of file-bearing initial state: identical files
//! never cross the wire, differing local copies are kept aside.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use bitswarm_networking::{
    ClientConfig, ClientState, FileStatus, FileStore, MemoryFileStore, MemoryNetwork, NetClient, NetFile, PeerId,
    ServerEvent,
};
use common::{client, pump, registry, server, Level, Welcome};

const MAP: &str = "maps/arena.bin";

fn map_bytes() -> Vec<u8> {
    (0..4096u32).map(|i| (i * 31 % 251) as u8).collect()
}

fn level() -> Level {
    Level {
        title: "Arena".into(),
        map: NetFile::new(MAP, map_bytes()),
    }
}

fn resolutions(events: &[ServerEvent]) -> Vec<(PeerId, String, FileStatus, usize)> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::FileResolved {
                peer,
                name,
                status,
                payload_bytes,
            } => Some((*peer, name.clone(), *status, *payload_bytes)),
            _ => None,
        })
        .collect()
}

fn store_with(bytes: &[u8]) -> MemoryFileStore {
    let mut store = MemoryFileStore::new();
    store.write(MAP, bytes).unwrap();
    store
}

fn level_log(client: &mut NetClient<bitswarm_networking::MemoryTransport>) -> Rc<RefCell<Vec<Level>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    client
        .on_receive::<Level, _>(move |env| sink.borrow_mut().push(env.message))
        .unwrap();
    seen
}

#[test]
fn test_identical_file_is_not_resent() {
    let network = MemoryNetwork::new();
    let mut server = server(&network, 4, false);
    server.push_initial_data(&level()).unwrap();

    let mut clients = vec![client(&network).with_file_store(store_with(&map_bytes()))];
    let seen = level_log(&mut clients[0]);
    let pumped = pump(&mut server, &mut clients);

    assert_eq!(
        resolutions(&pumped.server),
        vec![(PeerId(0), MAP.to_string(), FileStatus::Identical, 0)]
    );
    assert_eq!(*seen.borrow(), vec![level()]);
    assert_eq!(clients[0].state(), ClientState::Active);
    // offer + resolution + handshake, all far smaller than the map
    assert!(server.stats().bytes_sent < 256);
}

#[test]
fn test_changed_file_is_resent_and_local_copy_kept() {
    let network = MemoryNetwork::new();
    let mut server = server(&network, 4, false);
    server.push_initial_data(&level()).unwrap();

    let mut stale = map_bytes();
    stale[100] ^= 0x01;
    let mut clients = vec![client(&network).with_file_store(store_with(&stale))];
    let seen = level_log(&mut clients[0]);
    let pumped = pump(&mut server, &mut clients);

    assert_eq!(
        resolutions(&pumped.server),
        vec![(PeerId(0), MAP.to_string(), FileStatus::Different, map_bytes().len())]
    );
    assert_eq!(*seen.borrow(), vec![level()]);

    let store = clients[0].file_store();
    assert_eq!(store.read(MAP).unwrap(), Some(map_bytes()));
    assert_eq!(store.read("maps/arena.bin.orig").unwrap(), Some(stale));
    assert!(server.stats().bytes_sent > map_bytes().len() as u64);
}

#[test]
fn test_missing_file_is_delivered() {
    let network = MemoryNetwork::new();
    let mut server = server(&network, 4, false);
    server.push_initial_data(&level()).unwrap();

    let mut clients = vec![client(&network)];
    let pumped = pump(&mut server, &mut clients);

    assert_eq!(
        resolutions(&pumped.server),
        vec![(PeerId(0), MAP.to_string(), FileStatus::Different, map_bytes().len())]
    );
    assert_eq!(clients[0].file_store().read(MAP).unwrap(), Some(map_bytes()));
    assert!(!clients[0].file_store().exists("maps/arena.bin.orig"));
}

#[test]
fn test_stream_resumes_after_file_item() {
    let network = MemoryNetwork::new();
    let mut server = server(&network, 4, false);
    server.push_initial_data(&Welcome { motd: "before".into() }).unwrap();
    server.push_initial_data(&level()).unwrap();
    server.push_initial_data(&Welcome { motd: "after".into() }).unwrap();

    let mut clients = vec![client(&network)];
    let order = Rc::new(RefCell::new(Vec::new()));
    let welcome_sink = Rc::clone(&order);
    clients[0]
        .on_receive::<Welcome, _>(move |env| welcome_sink.borrow_mut().push(env.message.motd))
        .unwrap();
    let level_sink = Rc::clone(&order);
    clients[0]
        .on_receive::<Level, _>(move |env| level_sink.borrow_mut().push(env.message.title))
        .unwrap();

    let pumped = pump(&mut server, &mut clients);

    assert_eq!(*order.borrow(), vec!["before", "Arena", "after"]);
    assert!(pumped.server.contains(&ServerEvent::PeerJoined(PeerId(0))));
}

#[test]
fn test_each_peer_resolves_independently() {
    let network = MemoryNetwork::new();
    let mut server = server(&network, 4, false);
    server.push_initial_data(&level()).unwrap();

    let mut clients = vec![
        client(&network).with_file_store(store_with(&map_bytes())),
        client(&network),
    ];
    let pumped = pump(&mut server, &mut clients);

    let mut resolved = resolutions(&pumped.server);
    resolved.sort_by_key(|(peer, ..)| *peer);
    assert_eq!(
        resolved,
        vec![
            (PeerId(0), MAP.to_string(), FileStatus::Identical, 0),
            (PeerId(1), MAP.to_string(), FileStatus::Different, map_bytes().len()),
        ]
    );
}

#[test]
fn test_directory_store_from_config() {
    let root = std::env::temp_dir().join(format!("bitswarm_sync_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(root.join("maps")).unwrap();
    std::fs::write(root.join(MAP), map_bytes()).unwrap();

    let network = MemoryNetwork::new();
    let mut server = server(&network, 4, false);
    server.push_initial_data(&level()).unwrap();

    let config = ClientConfig {
        port: common::PORT,
        file_root: Some(root.clone()),
        ..ClientConfig::default()
    };
    let mut clients = vec![NetClient::connect(config, registry(), network.endpoint()).unwrap()];
    let pumped = pump(&mut server, &mut clients);

    assert_eq!(
        resolutions(&pumped.server),
        vec![(PeerId(0), MAP.to_string(), FileStatus::Identical, 0)]
    );
    assert_eq!(std::fs::read(root.join(MAP)).unwrap(), map_bytes());
    std::fs::remove_dir_all(&root).unwrap();
}
