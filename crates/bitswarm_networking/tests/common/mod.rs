//! Shared message types and a pump for in-process sessions.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use bitswarm_networking::{
    ArrayValue, ClientConfig, ClientEvent, EnumDef, FieldDef, FieldKind, MemoryNetwork, MemoryTransport,
    MessageDescriptor, NetClient, NetFile, NetMessage, NetServer, Record, Registry, Schema, SchemaError,
    ServerConfig, ServerEvent, Value,
};

pub const PORT: u16 = 7777;

/// Free-text chat, relayed to everyone.
#[derive(Clone, Debug, PartialEq)]
pub struct Chat {
    pub text: String,
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

/// Ballot the server tallies but never rebroadcasts.
#[derive(Clone, Debug, PartialEq)]
pub struct Vote {
    pub choice: u8,
}

impl NetMessage for Vote {
    fn descriptor() -> MessageDescriptor {
        MessageDescriptor::new(Schema::new("Vote").field(FieldDef::new("choice", FieldKind::U8).ranged(0, 3)))
            .client_only()
            .no_relay()
    }
    fn to_record(&self) -> Record {
        Record::new(vec![Value::U8(self.choice)])
    }
    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        Ok(Self { choice: record.read(0)? })
    }
}

/// Per-peer position pushed by the server.
#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    pub peer: u16,
    pub at: Vec<f32>,
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

/// Greeting streamed during the join.
#[derive(Clone, Debug, PartialEq)]
pub struct Welcome {
    pub motd: String,
}

impl NetMessage for Welcome {
    fn descriptor() -> MessageDescriptor {
        MessageDescriptor::new(Schema::new("Welcome").field(FieldDef::new("motd", FieldKind::String)))
            .initial_state()
    }
    fn to_record(&self) -> Record {
        Record::new(vec![Value::from(self.motd.as_str())])
    }
    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        Ok(Self { motd: record.read(0)? })
    }
}

/// Map asset synced by content hash.
#[derive(Clone, Debug, PartialEq)]
pub struct Level {
    pub title: String,
    pub map: NetFile,
}

impl NetMessage for Level {
    fn descriptor() -> MessageDescriptor {
        MessageDescriptor::new(
            Schema::new("Level")
                .field(FieldDef::new("title", FieldKind::String))
                .field(FieldDef::new("map", FieldKind::File)),
        )
        .initial_state()
    }
    fn to_record(&self) -> Record {
        Record::new(vec![Value::from(self.title.as_str()), Value::File(self.map.clone())])
    }
    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        Ok(Self {
            title: record.read(0)?,
            map: record.read(1)?,
        })
    }
}

pub const TEAM_RED: i64 = 1;
pub const TEAM_BLUE: i64 = 4;

/// Nested record, enum and a rank-2 array in one message.
#[derive(Clone, Debug, PartialEq)]
pub struct Spawn {
    pub owner: u16,
    pub team: i64,
    pub origin: Vec<f32>,
    pub health: i16,
    pub grid: ArrayValue,
}

impl Spawn {
    pub fn schema() -> Schema {
        let transform = Schema::new("Transform")
            .field(FieldDef::new("origin", FieldKind::Vector(3)))
            .field(FieldDef::new("health", FieldKind::I16).ranged(-100, 100));
        let team = EnumDef::new("Team", &[("Red", TEAM_RED), ("Blue", TEAM_BLUE)]).expect("team enum");
        Schema::new("Spawn")
            .field(FieldDef::new("owner", FieldKind::U16).peer_id())
            .field(FieldDef::new("team", FieldKind::enumeration(team)))
            .field(FieldDef::new("transform", FieldKind::record(transform)))
            .field(FieldDef::new("grid", FieldKind::array(2, FieldKind::U8)))
    }
}

impl NetMessage for Spawn {
    fn descriptor() -> MessageDescriptor {
        MessageDescriptor::new(Self::schema())
    }
    fn to_record(&self) -> Record {
        Record::new(vec![
            Value::U16(self.owner),
            Value::Enum(self.team),
            Value::Record(Record::new(vec![Value::Vector(self.origin.clone()), Value::I16(self.health)])),
            Value::Array(self.grid.clone()),
        ])
    }
    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        let transform: Record = record.read(2)?;
        Ok(Self {
            owner: record.read(0)?,
            team: record.read_enum(1)?,
            origin: transform.read(0)?,
            health: transform.read(1)?,
            grid: record.read(3)?,
        })
    }
}

/// Registry shared by every session in the suite.
pub fn registry() -> Arc<Registry> {
    Registry::builder()
        .register::<Chat>()
        .register::<Vote>()
        .register::<Position>()
        .register::<Welcome>()
        .register::<Level>()
        .register::<Spawn>()
        .build()
        .expect("valid registry")
        .shared()
}

pub fn server(network: &MemoryNetwork, max_peers: u16, listen: bool) -> NetServer<MemoryTransport> {
    let config = ServerConfig {
        port: PORT,
        max_peers,
        listen,
    };
    NetServer::new(config, registry(), network.endpoint()).expect("server starts")
}

pub fn client(network: &MemoryNetwork) -> NetClient<MemoryTransport> {
    let config = ClientConfig {
        port: PORT,
        ..ClientConfig::default()
    };
    NetClient::connect(config, registry(), network.endpoint()).expect("client connects")
}

/// Events gathered while pumping a session to quiescence.
#[derive(Debug, Default)]
pub struct Pumped {
    pub server: Vec<ServerEvent>,
    pub clients: Vec<Vec<ClientEvent>>,
}

/// Ticks every endpoint until in-flight traffic settles.
pub fn pump(server: &mut NetServer<MemoryTransport>, clients: &mut [NetClient<MemoryTransport>]) -> Pumped {
    let mut pumped = Pumped {
        server: Vec::new(),
        clients: vec![Vec::new(); clients.len()],
    };
    for _ in 0..16 {
        pumped.server.extend(server.tick());
        for (client, events) in clients.iter_mut().zip(&mut pumped.clients) {
            events.extend(client.tick());
        }
    }
    pumped
}

/// Collects every message a hook receives.
pub fn recorder<T>() -> (Rc<RefCell<Vec<T>>>, Rc<RefCell<Vec<T>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    (Rc::clone(&seen), seen)
}
