//! Background chunk generation.
//!
//! A `chunk-dispatch` thread consumes [`GeneratorRequest`]s in the order they
//! were sent, emits removes straight away and hands adds to a pool of
//! `chunk-gen-worker` threads. Workers finish in any order, so add events may
//! arrive after removes issued by later requests. The caller and the
//! generator share no state; everything crosses a channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use tracing::{debug, info, warn};
use voxlink_voxel::{
    ChunkCoordinate, ChunkEvent, GeneratorEvent, GeneratorRequest, LifecycleError,
    MAX_RENDER_DISTANCE, Viewport, WorldSeed,
};

use crate::error::GenerationError;
use crate::height::{TerrainNoise, TerrainParams};
use crate::mesher::{MAX_CHUNK_SIZE, mesh_chunk};

/// How the generator builds chunks.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorSettings {
    /// Chunk edge length in blocks.
    pub chunk_size: u32,
    /// Worker threads. `0` picks a count from the number of CPUs.
    pub worker_threads: usize,
    /// Heightfield shape.
    pub params: TerrainParams,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            worker_threads: 0,
            params: TerrainParams::default(),
        }
    }
}

impl GeneratorSettings {
    /// Worker count after resolving `0`, leaving headroom for the main thread.
    pub fn resolved_workers(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            num_cpus::get().saturating_sub(2).max(1)
        }
    }
}

struct Job {
    coordinate: ChunkCoordinate,
    noise: Arc<TerrainNoise>,
}

/// Owns the generator threads. Dropping it stops and joins them.
pub struct ChunkGenerator {
    requests: Sender<GeneratorRequest>,
    events: Receiver<GeneratorEvent>,
    shutdown: Option<Sender<()>>,
    cancelled: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl ChunkGenerator {
    /// Start the dispatcher and worker threads.
    ///
    /// With `seed == None` the generator picks a seed on the first load and
    /// reports it with [`GeneratorEvent::SeedChosen`].
    pub fn spawn(
        settings: GeneratorSettings,
        seed: Option<WorldSeed>,
    ) -> Result<Self, GenerationError> {
        settings.params.validate()?;
        if settings.chunk_size == 0 || settings.chunk_size > MAX_CHUNK_SIZE {
            return Err(GenerationError::InvalidChunkSize(settings.chunk_size));
        }

        let (request_tx, request_rx) = unbounded::<GeneratorRequest>();
        let (event_tx, event_rx) = unbounded::<GeneratorEvent>();
        let (job_tx, job_rx) = unbounded::<Job>();
        let (shutdown_tx, shutdown_rx) = unbounded::<()>();
        let cancelled = Arc::new(AtomicBool::new(false));

        let worker_count = settings.resolved_workers();
        let mut threads = Vec::with_capacity(worker_count + 1);

        for _ in 0..worker_count {
            let jobs = job_rx.clone();
            let events = event_tx.clone();
            let worker_cancelled = Arc::clone(&cancelled);
            let chunk_size = settings.chunk_size;

            let handle = std::thread::Builder::new()
                .name("chunk-gen-worker".into())
                .spawn(move || {
                    while let Ok(job) = jobs.recv() {
                        if worker_cancelled.load(Ordering::Relaxed) {
                            break;
                        }
                        match mesh_chunk(&job.noise, job.coordinate, chunk_size) {
                            Ok(geometry) => {
                                let event = GeneratorEvent::Chunk(ChunkEvent::add(geometry));
                                if events.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Chunk {} generation failed: {}", job.coordinate, e),
                        }
                    }
                });
            match handle {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    drop(job_tx);
                    shut_down(&cancelled, None, &mut threads);
                    return Err(e.into());
                }
            }
        }
        drop(job_rx);

        let dispatcher = Dispatcher {
            seed,
            noise: None,
            params: settings.params.clone(),
            jobs: job_tx,
            events: event_tx,
        };
        let handle = std::thread::Builder::new()
            .name("chunk-dispatch".into())
            .spawn(move || dispatcher.run(request_rx, shutdown_rx));
        match handle {
            Ok(handle) => threads.push(handle),
            Err(e) => {
                shut_down(&cancelled, None, &mut threads);
                return Err(e.into());
            }
        }

        debug!(
            "Chunk generator started with {} workers, chunk size {}",
            worker_count, settings.chunk_size
        );

        Ok(Self {
            requests: request_tx,
            events: event_rx,
            shutdown: Some(shutdown_tx),
            cancelled,
            threads,
        })
    }

    /// A handle for sending requests, typically given to the lifecycle manager.
    pub fn sender(&self) -> Sender<GeneratorRequest> {
        self.requests.clone()
    }

    /// Queue a request. Fails once the dispatcher has stopped.
    pub fn request(&self, request: GeneratorRequest) -> Result<(), LifecycleError> {
        self.requests
            .send(request)
            .map_err(|_| LifecycleError::GeneratorClosed)
    }

    /// Collect every event produced since the last call.
    ///
    /// Call this once per tick on the main thread.
    pub fn drain_events(&self) -> Vec<GeneratorEvent> {
        self.events.try_iter().collect()
    }

    /// Number of running generator threads, dispatcher included.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

impl Drop for ChunkGenerator {
    fn drop(&mut self) {
        shut_down(&self.cancelled, self.shutdown.take(), &mut self.threads);
    }
}

fn shut_down(
    cancelled: &AtomicBool,
    shutdown: Option<Sender<()>>,
    threads: &mut Vec<JoinHandle<()>>,
) {
    cancelled.store(true, Ordering::Relaxed);
    drop(shutdown);
    for handle in threads.drain(..) {
        let _ = handle.join();
    }
}

struct Dispatcher {
    seed: Option<WorldSeed>,
    noise: Option<Arc<TerrainNoise>>,
    params: TerrainParams,
    jobs: Sender<Job>,
    events: Sender<GeneratorEvent>,
}

impl Dispatcher {
    fn run(mut self, requests: Receiver<GeneratorRequest>, shutdown: Receiver<()>) {
        loop {
            select! {
                recv(requests) -> request => match request {
                    Ok(request) => {
                        if self.handle(request).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            }
        }
        debug!("Chunk dispatcher stopped");
    }

    /// `Err` means the event or job channel closed and the thread should stop.
    fn handle(&mut self, request: GeneratorRequest) -> Result<(), ()> {
        match request {
            GeneratorRequest::SetSeed(seed) => {
                if self.seed.as_ref() != Some(&seed) {
                    info!("Generator seed set to {}", seed);
                    self.seed = Some(seed);
                    self.noise = None;
                }
                Ok(())
            }
            GeneratorRequest::Load(viewport) => {
                if !self.accepts(&viewport) {
                    return Ok(());
                }
                let noise = self.noise()?;
                for coordinate in viewport.coordinates() {
                    self.submit(coordinate, &noise)?;
                }
                Ok(())
            }
            GeneratorRequest::UpdateRange { old, new } => {
                if !self.accepts(&old) || !self.accepts(&new) {
                    return Ok(());
                }
                let noise = self.noise()?;
                for coordinate in old.difference(&new) {
                    self.events
                        .send(GeneratorEvent::Chunk(ChunkEvent::remove(coordinate)))
                        .map_err(|_| ())?;
                }
                for coordinate in new.difference(&old) {
                    self.submit(coordinate, &noise)?;
                }
                Ok(())
            }
        }
    }

    fn accepts(&self, viewport: &Viewport) -> bool {
        if viewport.render_distance > MAX_RENDER_DISTANCE {
            warn!(
                "Ignoring viewport with render distance {}",
                viewport.render_distance
            );
            return false;
        }
        if !viewport.center.is_within_limits() {
            warn!(
                "Viewport centered on out-of-range chunk {}, generating in-range part only",
                viewport.center
            );
        }
        true
    }

    /// Noise for the current seed, inventing and announcing a seed if none is set.
    fn noise(&mut self) -> Result<Arc<TerrainNoise>, ()> {
        if let Some(noise) = &self.noise {
            return Ok(Arc::clone(noise));
        }
        let seed = match &self.seed {
            Some(seed) => seed.clone(),
            None => {
                let seed = WorldSeed::random();
                info!("Generator chose world seed {}", seed);
                self.events
                    .send(GeneratorEvent::SeedChosen(seed.clone()))
                    .map_err(|_| ())?;
                self.seed = Some(seed.clone());
                seed
            }
        };
        // Params were validated at spawn.
        let noise = TerrainNoise::new(&seed, self.params.clone()).map_err(|e| {
            warn!("Cannot build terrain noise: {}", e);
        })?;
        let noise = Arc::new(noise);
        self.noise = Some(Arc::clone(&noise));
        Ok(noise)
    }

    fn submit(&self, coordinate: ChunkCoordinate, noise: &Arc<TerrainNoise>) -> Result<(), ()> {
        self.jobs
            .send(Job {
                coordinate,
                noise: Arc::clone(noise),
            })
            .map_err(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use voxlink_voxel::{ChunkEventKind, ChunkGeometry};

    fn settings(workers: usize) -> GeneratorSettings {
        GeneratorSettings {
            chunk_size: 8,
            worker_threads: workers,
            params: TerrainParams::default(),
        }
    }

    fn collect(generator: &ChunkGenerator, expected: usize) -> Vec<GeneratorEvent> {
        let mut events = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(30);
        while events.len() < expected && Instant::now() < deadline {
            events.extend(generator.drain_events());
            if events.len() < expected {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        events
    }

    fn only_geometry(events: &[GeneratorEvent]) -> Arc<ChunkGeometry> {
        events
            .iter()
            .find_map(|e| match e {
                GeneratorEvent::Chunk(ChunkEvent {
                    kind: ChunkEventKind::Add(g),
                    ..
                }) => Some(Arc::clone(g)),
                _ => None,
            })
            .unwrap()
    }

    fn seed(s: &str) -> WorldSeed {
        WorldSeed::parse(s).unwrap()
    }

    #[test]
    fn test_load_generates_full_box() {
        let generator = ChunkGenerator::spawn(settings(2), Some(seed("abc"))).unwrap();
        generator
            .request(GeneratorRequest::Load(Viewport::new(
                ChunkCoordinate::new(0, 0),
                1,
            )))
            .unwrap();

        let events = collect(&generator, 9);
        assert_eq!(events.len(), 9);
        let mut coords: Vec<_> = events
            .iter()
            .map(|e| match e {
                GeneratorEvent::Chunk(c) if c.is_add() => c.coordinate,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        coords.sort();
        coords.dedup();
        assert_eq!(coords.len(), 9);
    }

    #[test]
    fn test_same_seed_same_geometry_twice_and_across_instances() {
        let vp = Viewport::new(ChunkCoordinate::new(0, 0), 0);

        let first = ChunkGenerator::spawn(settings(1), Some(seed("abc"))).unwrap();
        first.request(GeneratorRequest::Load(vp)).unwrap();
        let a = only_geometry(&collect(&first, 1));

        // Same instance again, after moving away and back.
        let away = Viewport::new(ChunkCoordinate::new(5, 5), 0);
        first
            .request(GeneratorRequest::UpdateRange { old: vp, new: away })
            .unwrap();
        first
            .request(GeneratorRequest::UpdateRange { old: away, new: vp })
            .unwrap();
        let again: Vec<_> = collect(&first, 4)
            .into_iter()
            .filter(|e| {
                matches!(e, GeneratorEvent::Chunk(c) if c.is_add() && c.coordinate == vp.center)
            })
            .collect();
        let b = only_geometry(&again);

        let second = ChunkGenerator::spawn(settings(3), Some(seed("abc"))).unwrap();
        second.request(GeneratorRequest::Load(vp)).unwrap();
        let c = only_geometry(&collect(&second, 1));

        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.as_bytes(), c.as_bytes());
        assert!(!a.is_empty());
    }

    #[test]
    fn test_missing_seed_is_chosen_and_reported_first() {
        let generator = ChunkGenerator::spawn(settings(2), None).unwrap();
        generator
            .request(GeneratorRequest::Load(Viewport::new(
                ChunkCoordinate::new(0, 0),
                1,
            )))
            .unwrap();

        let events = collect(&generator, 10);
        assert_eq!(events.len(), 10);
        match &events[0] {
            GeneratorEvent::SeedChosen(seed) => assert!(!seed.as_str().is_empty()),
            other => panic!("expected SeedChosen first, got {other:?}"),
        }
        let chosen = events
            .iter()
            .filter(|e| matches!(e, GeneratorEvent::SeedChosen(_)))
            .count();
        assert_eq!(chosen, 1);
    }

    #[test]
    fn test_set_seed_prevents_invention() {
        let generator = ChunkGenerator::spawn(settings(1), None).unwrap();
        generator
            .request(GeneratorRequest::SetSeed(seed("shared")))
            .unwrap();
        generator
            .request(GeneratorRequest::Load(Viewport::new(
                ChunkCoordinate::new(0, 0),
                0,
            )))
            .unwrap();
        let events = collect(&generator, 1);
        assert!(
            events
                .iter()
                .all(|e| !matches!(e, GeneratorEvent::SeedChosen(_)))
        );
    }

    #[test]
    fn test_update_range_emits_adds_and_removes() {
        let generator = ChunkGenerator::spawn(settings(2), Some(seed("abc"))).unwrap();
        let old = Viewport::new(ChunkCoordinate::new(0, 0), 1);
        let new = Viewport::new(ChunkCoordinate::new(1, 0), 1);
        generator.request(GeneratorRequest::UpdateRange { old, new }).unwrap();

        let events = collect(&generator, 6);
        assert_eq!(events.len(), 6);
        for event in &events {
            let GeneratorEvent::Chunk(chunk) = event else {
                panic!("unexpected {event:?}");
            };
            if chunk.is_add() {
                assert_eq!(chunk.coordinate.x, 2);
            } else {
                assert_eq!(chunk.coordinate.x, -1);
            }
        }
    }

    #[test]
    fn test_oversized_viewport_ignored() {
        let generator = ChunkGenerator::spawn(settings(1), Some(seed("abc"))).unwrap();
        generator
            .request(GeneratorRequest::Load(Viewport {
                center: ChunkCoordinate::new(0, 0),
                render_distance: MAX_RENDER_DISTANCE + 1,
            }))
            .unwrap();
        generator
            .request(GeneratorRequest::Load(Viewport::new(
                ChunkCoordinate::new(0, 0),
                0,
            )))
            .unwrap();
        let events = collect(&generator, 1);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(events.len() + generator.drain_events().len(), 1);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let bad = GeneratorSettings {
            chunk_size: 0,
            ..settings(1)
        };
        assert!(matches!(
            ChunkGenerator::spawn(bad, None),
            Err(GenerationError::InvalidChunkSize(0))
        ));
    }

    #[test]
    fn test_drop_joins_threads() {
        let generator = ChunkGenerator::spawn(settings(2), Some(seed("abc"))).unwrap();
        assert_eq!(generator.thread_count(), 3);
        // An outstanding sender must not keep the threads alive.
        let sender = generator.sender();
        generator
            .request(GeneratorRequest::Load(Viewport::new(
                ChunkCoordinate::new(0, 0),
                4,
            )))
            .unwrap();
        drop(generator);
        let late = GeneratorRequest::Load(Viewport::new(ChunkCoordinate::new(0, 0), 0));
        assert!(sender.send(late).is_err());
    }

    #[test]
    fn test_resolved_workers() {
        assert_eq!(settings(3).resolved_workers(), 3);
        assert!(settings(0).resolved_workers() >= 1);
    }

    #[test]
    fn test_request_fails_after_dispatcher_stops() {
        let mut generator = ChunkGenerator::spawn(settings(1), None).unwrap();
        assert!(generator.request(GeneratorRequest::SetSeed(seed("a"))).is_ok());

        // Without its shutdown sender the dispatcher exits and drops the
        // request receiver.
        generator.shutdown.take();
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut result = Ok(());
        while Instant::now() < deadline {
            result = generator.request(GeneratorRequest::SetSeed(seed("a")));
            if result.is_err() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(result, Err(LifecycleError::GeneratorClosed));
    }
}
