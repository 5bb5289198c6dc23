//! TCP front end and the world loop.
//!
//! Connections get a reader task and a writer task each; everything
//! else happens on the loop task, which owns the [`Engine`] and wakes
//! every quarter second to poll the pulse timers and flush output.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use embermud_proto::{Frame, GmcpFrame, SessionId, TelnetDecoder, Vnum};
use embermud_session::FileCredentials;
use embermud_tick::{PulseConfig, PulseTimer};
use embermud_world::{
    Dice, Direction, Exit, MobReset, MobTemplate, ObjectReset, ObjectStore, ObjectTemplate,
    PlayerStore, Room, ThreadDice, World, WorldData,
};

use crate::error::MudError;
use crate::gateway::{Engine, Event};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".to_owned(),
            data_dir: PathBuf::from("data"),
        }
    }
}

/// The pulse timers the loop polls each wakeup.
struct Timers {
    fast: PulseTimer,
    main: PulseTimer,
    combat: PulseTimer,
    repop: PulseTimer,
    decay: PulseTimer,
    object_flush: PulseTimer,
}

impl Timers {
    fn start(now: Instant) -> Self {
        Self {
            fast: PulseTimer::start(PulseConfig::fast_wander(), now),
            main: PulseTimer::start(PulseConfig::main_heartbeat(), now),
            combat: PulseTimer::start(PulseConfig::combat_round(), now),
            repop: PulseTimer::start(PulseConfig::repop(), now),
            decay: PulseTimer::start(PulseConfig::decay(), now),
            object_flush: PulseTimer::start(PulseConfig::object_flush(), now),
        }
    }
}

pub struct Server {
    listener: TcpListener,
    engine: Engine,
}

impl Server {
    /// Binds the listener and loads world data from the data
    /// directory, falling back to the built-in starter world.
    pub async fn bind(config: ServerConfig) -> Result<Self, MudError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        std::fs::create_dir_all(&config.data_dir)?;

        let data = match std::fs::read(config.data_dir.join("world.json")) {
            Ok(bytes) => serde_json::from_slice::<WorldData>(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("no world.json, using the starter world");
                starter_world()
            }
            Err(err) => return Err(err.into()),
        };
        let mut roller = ThreadDice;
        let world = World::load(data, &mut roller);

        let players = PlayerStore::open(config.data_dir.join("players"))?;
        let objects = ObjectStore::open(config.data_dir.join("objects"))?;
        let credentials = FileCredentials::open(config.data_dir.join("accounts"))?;
        let engine = Engine::new(world, players, objects, Box::new(credentials));

        info!(addr = %listener.local_addr()?, "listening");
        Ok(Self { listener, engine })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, MudError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs until ctrl-c. One select loop: accepts, events, and a
    /// quarter-second pulse that drives the timers and the flush.
    pub async fn run(mut self) -> Result<(), MudError> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut timers = Timers::start(Instant::now());
        let mut pulse = tokio::time::interval(Duration::from_millis(250));
        pulse.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    self.engine.shutdown();
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "connection accepted");
                            spawn_connection(stream, &mut self.engine, events_tx.clone());
                        }
                        Err(err) => warn!(%err, "accept failed"),
                    }
                }
                Some(event) = events_rx.recv() => {
                    self.engine.handle_event(event);
                }
                _ = pulse.tick() => {}
            }

            let now = Instant::now();
            if timers.combat.due(now) {
                self.engine.combat_tick();
            }
            if timers.fast.due(now) {
                self.engine.fast_tick();
            }
            if timers.main.due(now) {
                self.engine.main_tick();
            }
            if timers.repop.due(now) {
                self.engine.repop_tick();
            }
            if timers.decay.due(now) {
                self.engine.decay_tick();
            }
            if timers.object_flush.due(now) {
                self.engine.object_flush_tick();
            }
            self.engine.flush_all();
        }
        Ok(())
    }
}

fn spawn_connection(stream: TcpStream, engine: &mut Engine, events: UnboundedSender<Event>) {
    let (read_half, write_half) = stream.into_split();
    let (writer_tx, writer_rx) = mpsc::unbounded_channel();
    let session = engine.accept(writer_tx);
    tokio::spawn(writer_task(session, write_half, writer_rx, events.clone()));
    tokio::spawn(reader_task(session, read_half, events));
}

async fn writer_task(
    session: SessionId,
    mut half: OwnedWriteHalf,
    mut rx: UnboundedReceiver<Vec<u8>>,
    events: UnboundedSender<Event>,
) {
    while let Some(bytes) = rx.recv().await {
        if let Err(err) = half.write_all(&bytes).await {
            debug!(%session, %err, "write failed");
            let _ = events.send(Event::Disconnected { session });
            return;
        }
    }
    // Channel closed: the engine dropped this session. Flush the socket
    // so a final goodbye reaches the client.
    let _ = half.shutdown().await;
}

async fn reader_task(session: SessionId, mut half: OwnedReadHalf, events: UnboundedSender<Event>) {
    let mut decoder = TelnetDecoder::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = match half.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                debug!(%session, %err, "read failed");
                break;
            }
        };
        for frame in decoder.feed(&buf[..n]) {
            let event = match frame {
                Frame::Line(line) => Event::Line { session, line },
                Frame::GmcpAccept => Event::GmcpAccept { session },
                Frame::GmcpRefuse => Event::GmcpRefuse { session },
                Frame::Subneg(payload) => match GmcpFrame::parse(&payload) {
                    Ok(frame) => Event::Gmcp { session, frame },
                    Err(err) => {
                        warn!(%session, %err, "bad gmcp subnegotiation");
                        continue;
                    }
                },
            };
            if events.send(event).is_err() {
                return;
            }
        }
    }
    let _ = events.send(Event::Disconnected { session });
}

/// A two-room world used when no data file exists: a temple haven, a
/// road north of it, a patrolling guard, and a sword on the floor.
pub fn starter_world() -> WorldData {
    let temple = Vnum(3001);
    let road = Vnum(3002);
    let room = |vnum, name: &str, description: &str, environment: &str, haven| Room {
        vnum,
        name: name.to_owned(),
        description: description.to_owned(),
        zone: "Emberton".to_owned(),
        environment: environment.to_owned(),
        haven,
        exits: Default::default(),
        players: Default::default(),
        mobs: Default::default(),
        objects: Default::default(),
    };
    let mut square = room(
        temple,
        "Temple Square",
        "Worn flagstones surround a dry fountain. The temple doors stand open to the north road.",
        "city",
        true,
    );
    square
        .exits
        .insert(Direction::North, Exit { to_room: road, locked: false });
    let mut north_road = room(
        road,
        "North Road",
        "A rutted dirt road runs north out of Emberton between shuttered stalls.",
        "road",
        false,
    );
    north_road
        .exits
        .insert(Direction::South, Exit { to_room: temple, locked: false });

    WorldData {
        rooms: vec![square, north_road],
        mob_templates: vec![MobTemplate {
            vnum: Vnum(3100),
            keywords: vec!["guard".to_owned(), "city".to_owned()],
            short_desc: "the city guard".to_owned(),
            long_desc: "A city guard leans on a spear, watching the road.".to_owned(),
            level: 10,
            hitroll: 5,
            armor_class: 10,
            hit_dice: Dice::new(3, 8, 20),
            damage_dice: Dice::new(1, 6, 1),
            gold: 25,
            sentinel: true,
        }],
        object_templates: vec![ObjectTemplate {
            vnum: Vnum(3200),
            keywords: vec!["sword".to_owned(), "short".to_owned()],
            short_desc: "a short sword".to_owned(),
            long_desc: "A plain short sword lies here.".to_owned(),
            weight: 5,
            cost: 40,
        }],
        mob_resets: vec![MobReset {
            mob_vnum: Vnum(3100),
            room_vnum: road,
            equipment: vec![],
            inventory: vec![],
        }],
        object_resets: vec![ObjectReset {
            object_vnum: Vnum(3200),
            room_vnum: temple,
        }],
        respawn_room: temple,
    }
}
