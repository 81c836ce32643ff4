//! # Swarm Loopback
//!
//! Runs a server and a handful of clients over the in-process transport and
//! reports what crossed the wire.
//!
//! ## Usage
//!
//! ```bash
//! swarm_loopback --peers 8 --rounds 60
//! swarm_loopback --config server.toml
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use bitswarm_networking::{
    ClientConfig, DeliveryMethod, FieldDef, FieldKind, MemoryFileStore, MemoryNetwork, MessageDescriptor, NetClient,
    NetFile, NetMessage, NetResult, NetServer, Record, Registry, Schema, SchemaError, ServerConfig, ServerEvent,
    Value,
};

/// Free-text chat.
struct Chat {
    text: String,
}

impl NetMessage for Chat {
    fn descriptor() -> MessageDescriptor {
        MessageDescriptor::new(Schema::new("Chat").field(FieldDef::new("text", FieldKind::String)))
    }
    fn to_record(&self) -> Record {
        Record::new(vec![Value::from(self.text.as_str())])
    }
    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        Ok(Self { text: record.read(0)? })
    }
}

/// Per-peer position, pushed by the server each round.
struct Position {
    peer: u16,
    at: Vec<f32>,
}

impl NetMessage for Position {
    fn descriptor() -> MessageDescriptor {
        MessageDescriptor::new(
            Schema::new("Position")
                .field(FieldDef::new("peer", FieldKind::U16).peer_id())
                .field(FieldDef::new("at", FieldKind::Vector(3))),
        )
        .server_only()
    }
    fn to_record(&self) -> Record {
        Record::new(vec![Value::U16(self.peer), Value::Vector(self.at.clone())])
    }
    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        Ok(Self {
            peer: record.read(0)?,
            at: record.read(1)?,
        })
    }
}

/// Map asset streamed during the join.
struct Map {
    file: NetFile,
}

impl NetMessage for Map {
    fn descriptor() -> MessageDescriptor {
        MessageDescriptor::new(Schema::new("Map").field(FieldDef::new("file", FieldKind::File))).initial_state()
    }
    fn to_record(&self) -> Record {
        Record::new(vec![Value::File(self.file.clone())])
    }
    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        Ok(Self { file: record.read(0)? })
    }
}

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         BITSWARM LOOPBACK                                        ║");
    println!("║         Server + clients over the in-process transport           ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    // Parse command line arguments (simple parsing, no external deps)
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();
    let mut peers = 4u16;
    let mut rounds = 30u32;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--peers" | "-n" => {
                if i + 1 < args.len() {
                    peers = args[i + 1].parse().unwrap_or(4);
                    i += 1;
                }
            }
            "--rounds" | "-r" => {
                if i + 1 < args.len() {
                    rounds = args[i + 1].parse().unwrap_or(30);
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    match ServerConfig::load(&args[i + 1]) {
                        Ok(loaded) => config = loaded,
                        Err(e) => {
                            eprintln!("Cannot load {}: {}", args[i + 1], e);
                            std::process::exit(2);
                        }
                    }
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: swarm_loopback [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --peers <N>       Clients to connect (default: 4)");
                println!("  -r, --rounds <N>      Position sync rounds (default: 30)");
                println!("  -c, --config <FILE>   Server TOML configuration");
                return;
            }
            _ => {}
        }
        i += 1;
    }

    if let Err(e) = run(config, peers, rounds) {
        eprintln!("Loopback failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: ServerConfig, peers: u16, rounds: u32) -> NetResult<()> {
    let registry = Registry::builder()
        .register::<Chat>()
        .register::<Position>()
        .register::<Map>()
        .build()?
        .shared();
    let network = MemoryNetwork::new();
    let port = config.port;
    let mut server = NetServer::new(config, Arc::clone(&registry), network.endpoint())?;

    let map: Vec<u8> = (0..64 * 1024u32).map(|i| (i % 253) as u8).collect();
    server.push_initial_data(&Map {
        file: NetFile::new("maps/loopback.bin", map.clone()),
    })?;

    let heard = Rc::new(Cell::new(0usize));
    let mut clients = Vec::with_capacity(usize::from(peers));
    for index in 0..peers {
        let client_config = ClientConfig {
            port,
            ..ClientConfig::default()
        };
        // every other client already holds the map
        let mut store = MemoryFileStore::new();
        if index % 2 == 0 {
            bitswarm_networking::FileStore::write(&mut store, "maps/loopback.bin", &map)?;
        }
        let mut client = NetClient::connect(client_config, Arc::clone(&registry), network.endpoint())?.with_file_store(store);
        let counter = Rc::clone(&heard);
        client.on_receive::<Position, _>(move |_| counter.set(counter.get() + 1))?;
        client.on_receive::<Chat, _>(|env| match env.origin.peer() {
            Some(id) => println!("  peer {id} says: {}", env.message.text),
            None => println!("  server says: {}", env.message.text),
        })?;
        clients.push(client);
    }

    let started = Instant::now();
    let mut saved = 0usize;
    let mut sent = 0usize;
    for _ in 0..8 {
        for event in server.tick() {
            if let ServerEvent::FileResolved { payload_bytes, .. } = event {
                if payload_bytes == 0 {
                    saved += map.len();
                } else {
                    sent += payload_bytes;
                }
            }
        }
        for client in &mut clients {
            client.tick();
        }
    }
    println!(
        "Joined {} of {} clients in {:?}",
        server.peer_ids().len(),
        peers,
        started.elapsed()
    );
    println!("Map bytes sent: {sent}, skipped as identical: {saved}");

    if let Some(first) = clients.first_mut() {
        first.send(&Chat { text: "hello swarm".into() }, DeliveryMethod::ReliableOrdered)?;
    }

    let started = Instant::now();
    for round in 0..rounds {
        server.sync_each_peer(DeliveryMethod::Sequenced, |id| {
            Some(Position {
                peer: id.0,
                at: vec![round as f32, f32::from(id.0), 0.0],
            })
        })?;
        server.tick();
        for client in &mut clients {
            client.tick();
        }
    }

    let stats = server.stats();
    println!();
    println!("Rounds: {rounds} in {:?}", started.elapsed());
    println!("Positions delivered: {}", heard.get());
    println!(
        "Server sent {} packets / {} bytes, {} send errors",
        stats.packets_sent, stats.bytes_sent, stats.send_errors
    );
    Ok(())
}
