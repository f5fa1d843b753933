//! The world driver: per-tick glue between the player, chunk streaming and
//! the multiplayer session.
//!
//! Each [`tick`](WorldDriver::tick):
//! 1. feeds transport events into the [`SessionCoordinator`] and acts on the
//!    session events it raises (a newly established seed starts or restarts
//!    chunk streaming),
//! 2. folds generator results into the [`ChunkLifecycleManager`],
//! 3. recomputes the player's chunk and moves the viewport if it changed,
//! 4. queues a position broadcast when the [`BroadcastThrottle`] allows it,
//! 5. flushes queued frames to the transport.
//!
//! Nothing here blocks: generator and transport are both polled.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use voxlink_config::Config;
use voxlink_net::{
    Credentials, PeerPositionEvent, SessionCoordinator, SessionError, SessionEvent, SessionLink,
    TransportError, TransportEvent,
};
use voxlink_terrain::{ChunkGenerator, GenerationError, GeneratorSettings, TerrainParams};
use voxlink_voxel::{
    ChunkCoordinate, ChunkLifecycleManager, ChunkRenderer, GeneratorEvent,
    GeneratorRequest, LifecycleError, Viewport, WorldSeed,
};

/// Errors that stop the driver from making progress.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The chunk generator could not be started.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The chunk generator stopped accepting requests.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The session rejected an operation.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Continuous player position in world units plus camera yaw.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerPose {
    /// World X.
    pub x: f64,
    /// World Y (height).
    pub y: f64,
    /// World Z.
    pub z: f64,
    /// Camera yaw in radians.
    pub camera_angle: f64,
}

impl PlayerPose {
    /// A pose at `position` looking along the default direction.
    pub fn at(position: [f64; 3]) -> Self {
        Self {
            x: position[0],
            y: position[1],
            z: position[2],
            camera_angle: 0.0,
        }
    }
}

/// Tunables the driver needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    /// Chunk edge length in blocks.
    pub chunk_size: u32,
    /// World units per block.
    pub block_scale: f64,
    /// Render distance in chunks.
    pub render_distance: u32,
    /// Minimum time between position broadcasts.
    pub position_interval: Duration,
    /// Chunk generator configuration.
    pub generator: GeneratorSettings,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DriverSettings {
    /// Settings taken from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.world.chunk_size,
            block_scale: config.world.block_scale,
            render_distance: config.world.render_distance,
            position_interval: Duration::from_millis(config.network.position_interval_ms),
            generator: GeneratorSettings {
                chunk_size: config.world.chunk_size,
                worker_threads: config.generator.worker_threads,
                params: TerrainParams::with_max_height(config.generator.max_height),
            },
        }
    }
}

/// Lets position broadcasts through at most once per interval of wall-clock
/// time, independent of frame rate.
#[derive(Debug, Clone)]
pub struct BroadcastThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl BroadcastThrottle {
    /// A throttle that has never fired.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether a broadcast may go out at `now`. Returning `true` starts a new
    /// interval.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Forget the last broadcast so the next check fires immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Receives world notifications. Every method defaults to doing nothing.
pub trait WorldObserver {
    /// The streamed viewport moved.
    fn on_viewport_changed(&mut self, _viewport: Viewport) {}
    /// A generator result was reconciled; `visible` is the chunk's state
    /// afterwards, so a suppressed stale add reports `false`.
    fn on_chunk_reconciled(&mut self, _coordinate: ChunkCoordinate, _visible: bool) {}
    /// The world seed is known or changed.
    fn on_seed_established(&mut self, _seed: &WorldSeed) {}
    /// The server accepted the login.
    fn on_authenticated(&mut self) {}
    /// The server rejected the login.
    fn on_login_failed(&mut self, _reason: &str) {}
    /// A remote player joined; spawn a proxy for it.
    fn on_peer_joined(&mut self, _token: &str) {}
    /// A remote player left; despawn its proxy.
    fn on_peer_left(&mut self, _token: &str) {}
    /// A remote player moved.
    fn on_peer_position(&mut self, _event: &PeerPositionEvent) {}
    /// A chat line; `user_name` is empty for server messages.
    fn on_chat(&mut self, _user_name: &str, _text: &str, _own: bool) {}
    /// A system notice such as a lost connection.
    fn on_notice(&mut self, _text: &str) {}
}

impl WorldObserver for () {}

/// A frame transport the driver can poll.
pub trait SessionTransport {
    /// Queue one frame.
    fn send(&mut self, frame: String) -> Result<(), TransportError>;
    /// Every event received since the last call.
    fn poll(&mut self) -> Vec<TransportEvent>;
}

impl SessionTransport for SessionLink {
    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        SessionLink::send(self, frame)
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        self.drain()
    }
}

/// Drives chunk streaming and the session for one local player.
pub struct WorldDriver<R: ChunkRenderer, O: WorldObserver> {
    settings: DriverSettings,
    manager: ChunkLifecycleManager<R>,
    generator: ChunkGenerator,
    session: SessionCoordinator,
    transport: Option<Box<dyn SessionTransport>>,
    observer: O,
    throttle: BroadcastThrottle,
    world_seed: Option<WorldSeed>,
    streaming: bool,
    current_chunk: Option<ChunkCoordinate>,
}

impl<R: ChunkRenderer, O: WorldObserver> WorldDriver<R, O> {
    /// Single-player: the generator invents the seed and streaming starts on
    /// the first tick.
    pub fn offline(settings: DriverSettings, renderer: R, observer: O) -> Result<Self, DriverError> {
        let mut driver = Self::build(settings, renderer, observer)?;
        driver.streaming = true;
        info!("World driver started offline");
        Ok(driver)
    }

    /// Multiplayer over `transport`. No chunk is requested until the session
    /// establishes a seed.
    pub fn online(
        settings: DriverSettings,
        renderer: R,
        observer: O,
        transport: Box<dyn SessionTransport>,
        credentials: Credentials,
    ) -> Result<Self, DriverError> {
        let mut driver = Self::build(settings, renderer, observer)?;
        driver.session.connect(credentials)?;
        driver.transport = Some(transport);
        info!("World driver started online, waiting for a world seed");
        Ok(driver)
    }

    fn build(settings: DriverSettings, renderer: R, observer: O) -> Result<Self, DriverError> {
        let generator = ChunkGenerator::spawn(settings.generator.clone(), None)?;
        let manager = ChunkLifecycleManager::new(renderer, generator.sender());
        let throttle = BroadcastThrottle::new(settings.position_interval);
        Ok(Self {
            settings,
            manager,
            generator,
            session: SessionCoordinator::new(),
            transport: None,
            observer,
            throttle,
            world_seed: None,
            streaming: false,
            current_chunk: None,
        })
    }

    /// Advance one simulation step with the player at `pose`.
    pub fn tick(&mut self, now: Instant, pose: PlayerPose) -> Result<(), DriverError> {
        self.poll_transport()?;
        for event in self.session.drain_events() {
            self.on_session_event(event)?;
        }

        for event in self.generator.drain_events() {
            match event {
                GeneratorEvent::SeedChosen(seed) => {
                    info!("World seed {} chosen by the generator", seed);
                    self.world_seed = Some(seed.clone());
                    self.observer.on_seed_established(&seed);
                }
                GeneratorEvent::Chunk(chunk) => {
                    let coordinate = chunk.coordinate;
                    self.manager.on_generator_event(chunk);
                    let visible = self.manager.is_visible(coordinate);
                    self.observer.on_chunk_reconciled(coordinate, visible);
                }
            }
        }

        if self.streaming {
            self.track_player(pose)?;
        }

        if self.session.phase().is_connected() && self.throttle.ready(now) {
            self.session
                .broadcast_position(pose.x, pose.y, pose.z, pose.camera_angle)?;
        }

        self.flush_outbound();
        Ok(())
    }

    /// Leave the session. Chunk streaming continues with the current seed.
    pub fn disconnect(&mut self) {
        self.flush_outbound();
        self.session.disconnect();
        self.transport = None;
        info!("Disconnected from session");
    }

    /// Queue a chat line. Returns `Ok(false)` when not connected.
    pub fn send_chat(&mut self, text: &str) -> Result<bool, DriverError> {
        Ok(self.session.send_chat(text)?)
    }

    fn poll_transport(&mut self) -> Result<(), DriverError> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(());
        };
        for event in transport.poll() {
            match event {
                TransportEvent::Opened => self.session.on_transport_open()?,
                TransportEvent::Frame(frame) => self.session.handle_frame(&frame)?,
                TransportEvent::Error(e) => {
                    debug!("Transport error: {}", e);
                    self.session.on_transport_error();
                }
                TransportEvent::Closed => self.session.on_transport_closed(),
            }
        }
        Ok(())
    }

    fn flush_outbound(&mut self) {
        let frames = self.session.drain_outbound();
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        for frame in frames {
            if let Err(e) = transport.send(frame) {
                warn!("Cannot send frame: {}", e);
                self.session.on_transport_closed();
                break;
            }
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) -> Result<(), DriverError> {
        match event {
            SessionEvent::SeedEstablished(seed) => self.adopt_seed(seed)?,
            SessionEvent::Authenticated => self.observer.on_authenticated(),
            SessionEvent::LoginFailed(reason) => self.observer.on_login_failed(&reason),
            SessionEvent::PeerJoined(token) => self.observer.on_peer_joined(&token),
            SessionEvent::PeerLeft(token) => self.observer.on_peer_left(&token),
            SessionEvent::PeerPosition(position) => self.observer.on_peer_position(&position),
            SessionEvent::Chat {
                user_name,
                text,
                own,
            } => self.observer.on_chat(&user_name, &text, own),
            SessionEvent::ServerChat(text) => self.observer.on_chat("", &text, false),
            SessionEvent::Notice(text) => self.observer.on_notice(&text),
        }
        Ok(())
    }

    /// Start streaming with `seed`, or restart the world if a different seed
    /// was already in use.
    fn adopt_seed(&mut self, seed: WorldSeed) -> Result<(), DriverError> {
        match &self.world_seed {
            Some(current) if *current == seed => return Ok(()),
            Some(current) => {
                info!("World seed changed from {} to {}, regenerating", current, seed);
                let generator =
                    ChunkGenerator::spawn(self.settings.generator.clone(), Some(seed.clone()))?;
                self.manager.reset();
                self.manager.replace_generator(generator.sender());
                self.generator = generator;
            }
            None => self
                .generator
                .request(GeneratorRequest::SetSeed(seed.clone()))?,
        }
        self.world_seed = Some(seed.clone());
        self.streaming = true;
        self.current_chunk = None;
        self.observer.on_seed_established(&seed);
        Ok(())
    }

    fn track_player(&mut self, pose: PlayerPose) -> Result<(), DriverError> {
        let Some(chunk) = ChunkCoordinate::from_world(
            pose.x,
            pose.z,
            self.settings.chunk_size,
            self.settings.block_scale,
        ) else {
            debug!("Player position ({}, {}) has no chunk", pose.x, pose.z);
            return Ok(());
        };
        if self.current_chunk == Some(chunk) {
            return Ok(());
        }
        self.current_chunk = Some(chunk);
        if self
            .manager
            .set_viewport(chunk, self.settings.render_distance)?
            && let Some(viewport) = self.manager.viewport()
        {
            self.observer.on_viewport_changed(viewport);
        }
        Ok(())
    }

    // --- Queries ---

    /// The chunk lifecycle manager.
    pub fn manager(&self) -> &ChunkLifecycleManager<R> {
        &self.manager
    }

    /// The session coordinator.
    pub fn session(&self) -> &SessionCoordinator {
        &self.session
    }

    /// The observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Mutable access to the observer.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// The seed chunks are generated from, once known.
    pub fn world_seed(&self) -> Option<&WorldSeed> {
        self.world_seed.as_ref()
    }

    /// Whether chunks are being requested.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// The chunk the player was last seen in.
    pub fn current_chunk(&self) -> Option<ChunkCoordinate> {
        self.current_chunk
    }

    /// Active driver settings.
    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessRenderer;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        seeds: Vec<WorldSeed>,
        viewports: Vec<Viewport>,
        peers_joined: Vec<String>,
        notices: Vec<String>,
        reconciled: Vec<(ChunkCoordinate, bool)>,
    }

    impl WorldObserver for Recorder {
        fn on_viewport_changed(&mut self, viewport: Viewport) {
            self.viewports.push(viewport);
        }
        fn on_seed_established(&mut self, seed: &WorldSeed) {
            self.seeds.push(seed.clone());
        }
        fn on_peer_joined(&mut self, token: &str) {
            self.peers_joined.push(token.to_string());
        }
        fn on_notice(&mut self, text: &str) {
            self.notices.push(text.to_string());
        }
        fn on_chunk_reconciled(&mut self, coordinate: ChunkCoordinate, visible: bool) {
            self.reconciled.push((coordinate, visible));
        }
    }

    #[derive(Clone, Default)]
    struct Scripted {
        inbox: Rc<RefCell<VecDeque<TransportEvent>>>,
        sent: Rc<RefCell<Vec<String>>>,
    }

    impl Scripted {
        fn push(&self, event: TransportEvent) {
            self.inbox.borrow_mut().push_back(event);
        }
        fn frame(&self, raw: &str) {
            self.push(TransportEvent::Frame(raw.to_string()));
        }
        fn sent(&self) -> Vec<String> {
            self.sent.borrow().clone()
        }
    }

    impl SessionTransport for Scripted {
        fn send(&mut self, frame: String) -> Result<(), TransportError> {
            self.sent.borrow_mut().push(frame);
            Ok(())
        }
        fn poll(&mut self) -> Vec<TransportEvent> {
            self.inbox.borrow_mut().drain(..).collect()
        }
    }

    fn settings() -> DriverSettings {
        DriverSettings {
            chunk_size: 8,
            block_scale: 1.0,
            render_distance: 1,
            position_interval: Duration::from_millis(1000),
            generator: GeneratorSettings {
                chunk_size: 8,
                worker_threads: 2,
                params: TerrainParams::default(),
            },
        }
    }

    fn credentials() -> Credentials {
        Credentials::Password {
            login: "alex".into(),
            password: "secret".into(),
        }
    }

    fn tick_until<R: ChunkRenderer, O: WorldObserver>(
        driver: &mut WorldDriver<R, O>,
        pose: PlayerPose,
        mut done: impl FnMut(&WorldDriver<R, O>) -> bool,
    ) -> bool {
        let deadline = Instant::now() + Duration::from_secs(30);
        while Instant::now() < deadline {
            driver.tick(Instant::now(), pose).unwrap();
            if done(driver) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn box_around(center: ChunkCoordinate) -> Vec<ChunkCoordinate> {
        let mut coords = Viewport::new(center, 1).coordinates();
        coords.sort();
        coords
    }

    fn visible_sorted<R: ChunkRenderer, O: WorldObserver>(
        driver: &WorldDriver<R, O>,
    ) -> Vec<ChunkCoordinate> {
        let mut coords: Vec<_> = driver.manager().visible().collect();
        coords.sort();
        coords
    }

    #[test]
    fn test_throttle_fires_once_per_interval() {
        let mut throttle = BroadcastThrottle::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        assert!(throttle.ready(t0));
        assert!(!throttle.ready(t0 + Duration::from_millis(500)));
        assert!(!throttle.ready(t0 + Duration::from_millis(999)));
        assert!(throttle.ready(t0 + Duration::from_millis(1000)));
        assert!(!throttle.ready(t0 + Duration::from_millis(1999)));
        throttle.reset();
        assert!(throttle.ready(t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config::default();
        let s = DriverSettings::from_config(&config);
        assert_eq!(s.chunk_size, config.world.chunk_size);
        assert_eq!(s.generator.chunk_size, config.world.chunk_size);
        assert_eq!(s.position_interval, Duration::from_millis(1000));
        assert_eq!(s.render_distance, config.world.render_distance);
    }

    #[test]
    fn test_offline_streams_and_follows_player() {
        let mut driver = WorldDriver::offline(settings(), HeadlessRenderer::default(), Recorder::default())
            .unwrap();
        let origin = ChunkCoordinate::new(0, 0);
        assert!(tick_until(&mut driver, PlayerPose::default(), |d| {
            visible_sorted(d) == box_around(origin)
        }));
        assert_eq!(driver.observer().seeds.len(), 1);
        assert_eq!(driver.world_seed(), driver.observer().seeds.first());

        // One chunk east.
        let east = PlayerPose {
            x: 8.5,
            ..PlayerPose::default()
        };
        let target = ChunkCoordinate::new(1, 0);
        assert!(tick_until(&mut driver, east, |d| {
            visible_sorted(d) == box_around(target)
        }));
        assert_eq!(driver.current_chunk(), Some(target));
        assert_eq!(driver.observer().viewports.len(), 2);
        assert_eq!(driver.manager().renderer().live(), 9);

        // Removes of the west column were reported after reconciliation.
        let reconciled = &driver.observer().reconciled;
        for x in [-1, 0, 1, 2] {
            for z in -1..=1 {
                let c = ChunkCoordinate::new(x, z);
                let last = reconciled.iter().rev().find(|(rc, _)| *rc == c);
                assert_eq!(last.map(|(_, v)| *v), Some(driver.manager().is_visible(c)));
            }
        }
    }

    #[test]
    fn test_negative_positions_floor_to_lower_chunk() {
        let mut driver = WorldDriver::offline(settings(), HeadlessRenderer::default(), ()).unwrap();
        let pose = PlayerPose {
            x: -0.5,
            z: -8.0,
            ..PlayerPose::default()
        };
        driver.tick(Instant::now(), pose).unwrap();
        assert_eq!(driver.current_chunk(), Some(ChunkCoordinate::new(-1, -1)));
    }

    #[test]
    fn test_online_waits_for_seed_then_host_streams() {
        let transport = Scripted::default();
        let mut driver = WorldDriver::online(
            settings(),
            HeadlessRenderer::default(),
            Recorder::default(),
            Box::new(transport.clone()),
            credentials(),
        )
        .unwrap();

        let pose = PlayerPose::default();
        driver.tick(Instant::now(), pose).unwrap();
        assert!(!driver.is_streaming());
        assert!(driver.manager().viewport().is_none());
        assert!(transport.sent().is_empty());

        transport.push(TransportEvent::Opened);
        driver.tick(Instant::now(), pose).unwrap();
        assert!(transport.sent()[0].starts_with(r#"0{"ask":"loginThroughPass""#));
        assert!(driver.manager().viewport().is_none());

        transport.frame(r#"{"setWsToken":"me","setUserMount":"1"}"#);
        driver.tick(Instant::now(), pose).unwrap();
        assert!(driver.session().is_host());
        let seed = driver.world_seed().cloned().unwrap();
        assert_eq!(driver.observer().seeds, vec![seed.clone()]);
        assert!(
            transport
                .sent()
                .contains(&format!(r#"{{"setSeed":"{}"}}"#, seed.as_str()))
        );
        assert!(driver.manager().viewport().is_some());

        assert!(tick_until(&mut driver, pose, |d| {
            visible_sorted(d) == box_around(ChunkCoordinate::new(0, 0))
        }));
        // The generator was given the seed, so it never invented one.
        assert_eq!(driver.observer().seeds.len(), 1);
    }

    #[test]
    fn test_online_position_broadcast_is_throttled() {
        let transport = Scripted::default();
        let mut driver = WorldDriver::online(
            settings(),
            HeadlessRenderer::default(),
            (),
            Box::new(transport.clone()),
            credentials(),
        )
        .unwrap();
        transport.push(TransportEvent::Opened);
        transport.frame(r#"{"setWsToken":"me"}"#);

        let t0 = Instant::now();
        let pose = PlayerPose::at([1.0, 2.0, 3.0]);
        for ms in [0, 400, 999, 1000, 1500, 2500] {
            driver.tick(t0 + Duration::from_millis(ms), pose).unwrap();
        }
        let positions: Vec<_> = transport
            .sent()
            .into_iter()
            .filter(|f| f.starts_with('1'))
            .collect();
        assert_eq!(positions.len(), 3);
        assert_eq!(
            positions[0],
            r#"1{"gameMessage":"me","x":"1","z":"3","y":"2","c":"0"}"#
        );
    }

    #[test]
    fn test_new_seed_restarts_world() {
        let transport = Scripted::default();
        let mut driver = WorldDriver::online(
            settings(),
            HeadlessRenderer::default(),
            Recorder::default(),
            Box::new(transport.clone()),
            credentials(),
        )
        .unwrap();
        let pose = PlayerPose::default();
        transport.push(TransportEvent::Opened);
        transport.frame(r#"{"setWsToken":"me","setUserMount":"2","setNewWsToken":"host"}"#);
        transport.frame(r#"{"setSeed":"alpha"}"#);
        let origin_box = box_around(ChunkCoordinate::new(0, 0));
        assert!(tick_until(&mut driver, pose, |d| visible_sorted(d) == origin_box));
        assert!(!driver.session().is_host());
        assert_eq!(driver.observer().peers_joined, vec!["host".to_string()]);

        transport.frame(r#"{"setSeed":"beta"}"#);
        driver.tick(Instant::now(), pose).unwrap();
        assert_eq!(driver.world_seed().map(WorldSeed::as_str), Some("beta"));
        assert!(tick_until(&mut driver, pose, |d| visible_sorted(d) == origin_box));
        let seeds: Vec<_> = driver
            .observer()
            .seeds
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        assert_eq!(seeds, vec!["alpha", "beta"]);
        // Every chunk of the first world was released.
        assert_eq!(driver.manager().renderer().live(), 9);
    }

    #[test]
    fn test_transport_close_raises_notice() {
        let transport = Scripted::default();
        let mut driver = WorldDriver::online(
            settings(),
            HeadlessRenderer::default(),
            Recorder::default(),
            Box::new(transport.clone()),
            credentials(),
        )
        .unwrap();
        transport.push(TransportEvent::Opened);
        driver.tick(Instant::now(), PlayerPose::default()).unwrap();
        transport.push(TransportEvent::Error("reset by peer".into()));
        transport.push(TransportEvent::Closed);
        driver.tick(Instant::now(), PlayerPose::default()).unwrap();
        assert_eq!(driver.observer().notices, vec!["connection error".to_string()]);
        assert!(!driver.session().phase().is_connected());
    }

    #[test]
    fn test_invalid_credentials_rejected() {
        let result = WorldDriver::online(
            settings(),
            HeadlessRenderer::default(),
            (),
            Box::new(Scripted::default()),
            Credentials::Password {
                login: "a".into(),
                password: "secret".into(),
            },
        );
        assert!(matches!(
            result,
            Err(DriverError::Session(SessionError::InvalidCredentials(_)))
        ));
    }

    #[test]
    fn test_promotion_to_host_regenerates_world() {
        let transport = Scripted::default();
        let mut driver = WorldDriver::online(
            settings(),
            HeadlessRenderer::default(),
            Recorder::default(),
            Box::new(transport.clone()),
            credentials(),
        )
        .unwrap();
        let pose = PlayerPose::default();
        transport.push(TransportEvent::Opened);
        transport.frame(r#"{"setWsToken":"me","setUserMount":"2"}"#);
        transport.frame(r#"{"setSeed":"alpha"}"#);
        let origin_box = box_around(ChunkCoordinate::new(0, 0));
        assert!(tick_until(&mut driver, pose, |d| visible_sorted(d) == origin_box));

        // The previous host left.
        transport.frame(r#"{"setUserMount":"1"}"#);
        driver.tick(Instant::now(), pose).unwrap();
        assert!(driver.session().is_host());
        let fresh = driver.world_seed().cloned().unwrap();
        assert_ne!(fresh.as_str(), "alpha");
        assert!(
            transport
                .sent()
                .contains(&format!(r#"{{"setSeed":"{}"}}"#, fresh.as_str()))
        );
        assert!(tick_until(&mut driver, pose, |d| visible_sorted(d) == origin_box));
        assert_eq!(driver.observer().seeds.len(), 2);
        assert_eq!(driver.observer().seeds[1], fresh);
        assert_eq!(driver.manager().renderer().live(), 9);
    }
}
